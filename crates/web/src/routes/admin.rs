//! Staff-only management routes. Every handler starts by turning the
//! caller into a `Staff` proof.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDateTime, Utc};
use lessons_core::model::{
    CategoryDraft, CategoryId, GrantId, GrantStatus, LessonDraft, LessonId, UserId,
};
use serde::de::{self, Unexpected};
use serde::{Deserialize, Deserializer};
use services::{AccessServiceError, CatalogServiceError, catalog_service::ADMIN_PAGE_SIZE};

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::extract::FormOrJson;
use crate::routes::PageParams;
use crate::views::{
    AdminLessonsBody, CategoryBody, CreatedBody, GrantBody, LessonAccessBody, LessonBody, UserBody,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/lessons", get(list_lessons).post(create_lesson))
        .route("/admin/lessons/:id", put(update_lesson))
        .route(
            "/admin/lessons/:id/access",
            get(lesson_access).post(grant_lesson_access),
        )
        .route(
            "/admin/categories",
            get(list_categories).post(create_category),
        )
        .route(
            "/admin/categories/:id",
            put(update_category).delete(delete_category),
        )
        .route(
            "/admin/access/global",
            get(global_access).post(grant_global_access),
        )
        .route("/admin/access/:id/revoke", post(revoke_grant))
        .route("/admin/access/:id/restore", post(restore_grant))
        .route("/admin/users", get(search_users))
        .route("/admin/users/:id/access", get(user_access))
}

//
// ─── FORMS ─────────────────────────────────────────────────────────────────────
//

/// Checkbox semantics: an absent field is unchecked. Takes a JSON bool or
/// the strings an HTML form sends (`on`, `true`, `1`, `off`, `false`, `0`).
fn checkbox<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Bool(checked) => Ok(checked),
        Raw::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "on" | "true" | "1" => Ok(true),
            "" | "off" | "false" | "0" => Ok(false),
            other => Err(de::Error::invalid_value(
                Unexpected::Str(other),
                &"a checkbox value",
            )),
        },
    }
}

#[derive(Debug, Deserialize)]
pub struct LessonForm {
    pub category_id: CategoryId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub video_ref: String,
    #[serde(default)]
    pub thumbnail_ref: Option<String>,
    #[serde(default)]
    pub duration: i64,
    #[serde(default, deserialize_with = "checkbox")]
    pub is_active: bool,
}

impl From<LessonForm> for LessonDraft {
    fn from(form: LessonForm) -> Self {
        Self {
            category_id: form.category_id,
            title: form.title,
            description: form.description,
            video_ref: form.video_ref,
            thumbnail_ref: form
                .thumbnail_ref
                .map(|t| t.trim().to_owned())
                .filter(|t| !t.is_empty()),
            duration: form.duration,
            is_active: form.is_active,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CategoryForm {
    pub name: String,
    pub description: String,
}

impl From<CategoryForm> for CategoryDraft {
    fn from(form: CategoryForm) -> Self {
        Self {
            name: form.name,
            description: form.description,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RestoreForm {
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GrantForm {
    pub user: UserId,
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub search: Option<String>,
}

/// Accepts RFC 3339, or the `YYYY-MM-DDTHH:MM` a datetime-local input
/// submits, read as UTC. Blank means no expiry.
fn parse_expiry(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(at.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .map(|at| Some(at.and_utc()))
        .map_err(|_| ApiError::invalid("expires_at", "Enter a valid date and time."))
}

/// On the lesson form an unknown category is a field error, not a 404.
fn lesson_form_error(e: CatalogServiceError) -> ApiError {
    match e {
        CatalogServiceError::CategoryNotFound => {
            ApiError::invalid("category_id", "Select a valid category.")
        }
        other => other.into(),
    }
}

//
// ─── LESSONS ───────────────────────────────────────────────────────────────────
//

async fn list_lessons(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<PageParams>,
) -> Result<Json<AdminLessonsBody>, ApiError> {
    let staff = current.require_staff()?;
    let page = params.page();
    let lessons = state.services.catalog().admin_lessons(&staff, page).await?;
    Ok(Json(AdminLessonsBody {
        page,
        page_size: ADMIN_PAGE_SIZE,
        lessons: lessons.into_iter().map(Into::into).collect(),
    }))
}

async fn load_lesson(state: &AppState, id: LessonId) -> Result<LessonBody, ApiError> {
    state
        .services
        .catalog()
        .get_lesson(id)
        .await?
        .map(LessonBody::from)
        .ok_or_else(|| ApiError::not_found("lesson"))
}

async fn create_lesson(
    State(state): State<AppState>,
    current: CurrentUser,
    FormOrJson(form): FormOrJson<LessonForm>,
) -> Result<(StatusCode, Json<LessonBody>), ApiError> {
    let staff = current.require_staff()?;
    let id = state
        .services
        .catalog()
        .create_lesson(&staff, form.into())
        .await
        .map_err(lesson_form_error)?;
    Ok((StatusCode::CREATED, Json(load_lesson(&state, id).await?)))
}

async fn update_lesson(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<LessonId>,
    FormOrJson(form): FormOrJson<LessonForm>,
) -> Result<Json<LessonBody>, ApiError> {
    let staff = current.require_staff()?;
    state
        .services
        .catalog()
        .update_lesson(&staff, id, form.into())
        .await
        .map_err(lesson_form_error)?;
    Ok(Json(load_lesson(&state, id).await?))
}

//
// ─── CATEGORIES ────────────────────────────────────────────────────────────────
//

async fn list_categories(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<CategoryBody>>, ApiError> {
    current.require_staff()?;
    let categories = state.services.catalog().list_categories().await?;
    Ok(Json(categories.into_iter().map(Into::into).collect()))
}

async fn create_category(
    State(state): State<AppState>,
    current: CurrentUser,
    FormOrJson(form): FormOrJson<CategoryForm>,
) -> Result<(StatusCode, Json<CreatedBody>), ApiError> {
    let staff = current.require_staff()?;
    let id = state
        .services
        .catalog()
        .create_category(&staff, form.into())
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedBody { id: id.value() })))
}

async fn update_category(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<CategoryId>,
    FormOrJson(form): FormOrJson<CategoryForm>,
) -> Result<StatusCode, ApiError> {
    let staff = current.require_staff()?;
    state
        .services
        .catalog()
        .update_category(&staff, id, form.into())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_category(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode, ApiError> {
    let staff = current.require_staff()?;
    state.services.catalog().delete_category(&staff, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//
// ─── ACCESS ────────────────────────────────────────────────────────────────────
//

async fn lesson_access(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<LessonId>,
) -> Result<Json<LessonAccessBody>, ApiError> {
    let staff = current.require_staff()?;
    let lesson = load_lesson(&state, id).await?;
    let grants = state.services.access().lesson_grants(&staff, id).await?;
    Ok(Json(LessonAccessBody {
        lesson,
        grants: grants.into_iter().map(Into::into).collect(),
    }))
}

async fn grant_lesson_access(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<LessonId>,
    FormOrJson(form): FormOrJson<GrantForm>,
) -> Result<(StatusCode, Json<CreatedBody>), ApiError> {
    let staff = current.require_staff()?;
    let expires_at = parse_expiry(form.expires_at.as_deref())?;
    let grant = state
        .services
        .access()
        .grant_lesson_access(&staff, form.user, id, expires_at)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedBody { id: grant.value() })))
}

async fn global_access(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<GrantBody>>, ApiError> {
    let staff = current.require_staff()?;
    let grants = state.services.access().global_grants(&staff).await?;
    Ok(Json(grants.into_iter().map(Into::into).collect()))
}

async fn grant_global_access(
    State(state): State<AppState>,
    current: CurrentUser,
    FormOrJson(form): FormOrJson<GrantForm>,
) -> Result<(StatusCode, Json<CreatedBody>), ApiError> {
    let staff = current.require_staff()?;
    let expires_at = parse_expiry(form.expires_at.as_deref())?;
    let grant = state
        .services
        .access()
        .grant_global_access(&staff, form.user, expires_at)
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedBody { id: grant.value() })))
}

async fn revoke_grant(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<GrantId>,
) -> Result<Json<GrantBody>, ApiError> {
    let staff = current.require_staff()?;
    let grant = state.services.access().revoke(&staff, id).await?;
    Ok(Json(GrantBody::new(&grant, None, GrantStatus::Revoked)))
}

async fn restore_grant(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<GrantId>,
    FormOrJson(form): FormOrJson<RestoreForm>,
) -> Result<Json<GrantBody>, ApiError> {
    let staff = current.require_staff()?;
    let expires_at = parse_expiry(form.expires_at.as_deref())?;
    let grant = state
        .services
        .access()
        .restore(&staff, id, expires_at)
        .await?;
    Ok(Json(GrantBody::new(&grant, None, GrantStatus::Valid)))
}

//
// ─── USERS ─────────────────────────────────────────────────────────────────────
//

async fn search_users(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<UserBody>>, ApiError> {
    let staff = current.require_staff()?;
    let users = state
        .services
        .accounts()
        .search_users(&staff, params.search.as_deref())
        .await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

async fn user_access(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<UserId>,
) -> Result<Json<Vec<GrantBody>>, ApiError> {
    let staff = current.require_staff()?;
    let grants = state
        .services
        .access()
        .user_grants(&staff, id)
        .await
        .map_err(|e| match e {
            AccessServiceError::UnknownUser => ApiError::not_found("user"),
            other => other.into(),
        })?;
    Ok(Json(grants.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn expiry_accepts_rfc3339_and_datetime_local() {
        let expected = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 0).single();
        assert_eq!(
            parse_expiry(Some("2030-01-02T03:04:00Z")).unwrap(),
            expected
        );
        assert_eq!(parse_expiry(Some("2030-01-02T03:04")).unwrap(), expected);
        assert_eq!(parse_expiry(Some("  ")).unwrap(), None);
        assert_eq!(parse_expiry(None).unwrap(), None);
    }

    #[test]
    fn unparseable_expiry_is_a_field_error() {
        let err = parse_expiry(Some("next tuesday")).unwrap_err();
        assert!(matches!(err, ApiError::Invalid { field: "expires_at", .. }));
    }

    fn lesson_json(extra: &str) -> String {
        format!(r#"{{"category_id": 1, "title": "t", "duration": 60{extra}}}"#)
    }

    #[test]
    fn missing_is_active_means_unchecked() {
        let form: LessonForm = serde_json::from_str(&lesson_json("")).unwrap();
        assert!(!form.is_active);
    }

    #[test]
    fn is_active_takes_bools_and_checkbox_strings() {
        for (raw, expected) in [
            (r#", "is_active": true"#, true),
            (r#", "is_active": "on""#, true),
            (r#", "is_active": "1""#, true),
            (r#", "is_active": false"#, false),
            (r#", "is_active": "off""#, false),
        ] {
            let form: LessonForm = serde_json::from_str(&lesson_json(raw)).unwrap();
            assert_eq!(form.is_active, expected, "{raw}");
        }
        let unknown = lesson_json(r#", "is_active": "maybe""#);
        assert!(serde_json::from_str::<LessonForm>(&unknown).is_err());
    }

    #[test]
    fn unknown_category_on_lesson_form_names_the_field() {
        let err = lesson_form_error(CatalogServiceError::CategoryNotFound);
        assert!(matches!(err, ApiError::Invalid { field: "category_id", .. }));
    }
}
