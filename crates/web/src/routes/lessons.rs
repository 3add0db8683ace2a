use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use lessons_core::model::{CategoryId, LessonId};
use serde::Deserialize;
use services::ProgressServiceError;
use storage::repository::LessonQuery;

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::extract::FormOrJson;
use crate::flash;
use crate::views::{
    LessonBody, LessonDetailBody, LessonListBody, LessonListItem, ProgressBody, ProgressUpdateBody,
};

pub const LESSONS_PAGE_SIZE: u32 = 12;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub category: Option<String>,
    pub page: Option<u32>,
}

impl ListParams {
    /// Blank or unparseable values mean "all categories".
    fn category(&self) -> Option<CategoryId> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .and_then(|c| c.parse().ok())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProgressForm {
    pub watched_seconds: i64,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/lessons", get(list_lessons))
        .route("/lessons/:id", get(lesson_detail))
        .route("/lessons/:id/progress", post(update_progress))
}

async fn list_lessons(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
    Query(params): Query<ListParams>,
) -> Result<(CookieJar, Json<LessonListBody>), ApiError> {
    let (jar, notice) = flash::take(jar);
    let category = params.category();
    let page = params.page.unwrap_or(1).max(1);
    let query = LessonQuery::page(
        LESSONS_PAGE_SIZE,
        (page - 1).saturating_mul(LESSONS_PAGE_SIZE),
    )
    .in_category(category);

    let lessons = state
        .services
        .access()
        .visible_lessons(current.viewer(), query)
        .await?;
    let categories = state.services.catalog().list_categories().await?;

    let mut progress = if current.user.is_staff {
        HashMap::new()
    } else {
        let ids: Vec<LessonId> = lessons.iter().map(|l| l.id).collect();
        state
            .services
            .progress()
            .progress_for(current.user.id, &ids)
            .await?
    };

    let lessons = lessons
        .into_iter()
        .map(|lesson| LessonListItem {
            progress: progress
                .remove(&lesson.id)
                .map(|p| ProgressBody::new(&p, lesson.duration_secs)),
            lesson: LessonBody::from(lesson),
        })
        .collect();

    Ok((
        jar,
        Json(LessonListBody {
            notice,
            category,
            page,
            categories: categories.into_iter().map(Into::into).collect(),
            lessons,
        }),
    ))
}

/// Open a lesson. A denied caller is sent back to the list with a notice.
async fn lesson_detail(
    State(state): State<AppState>,
    current: CurrentUser,
    jar: CookieJar,
    Path(id): Path<LessonId>,
) -> Result<Response, ApiError> {
    match state
        .services
        .progress()
        .open_lesson(current.viewer(), id)
        .await
    {
        Ok(view) => Ok(Json(LessonDetailBody::from(view)).into_response()),
        Err(ProgressServiceError::Denied(reason)) => {
            Ok((flash::push(jar, reason), Redirect::to("/lessons")).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

async fn update_progress(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<LessonId>,
    FormOrJson(form): FormOrJson<ProgressForm>,
) -> Result<Json<ProgressUpdateBody>, ApiError> {
    if form.watched_seconds < 0 {
        return Err(ApiError::invalid(
            "watched_seconds",
            "Watched seconds must not be negative.",
        ));
    }
    let watched = u32::try_from(form.watched_seconds).map_err(|_| {
        ApiError::invalid(
            "watched_seconds",
            format!("Watched seconds must be at most {}.", u32::MAX),
        )
    })?;
    let view = state
        .services
        .progress()
        .record_progress(current.viewer(), id, watched)
        .await?;
    Ok(Json(view.into()))
}
