use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::FieldError;
use crate::model::ids::{CategoryId, LessonId};

const MAX_TITLE_CHARS: usize = 200;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson title cannot be empty")]
    EmptyTitle,

    #[error("lesson title must be at most {MAX_TITLE_CHARS} characters")]
    TitleTooLong,

    #[error("lesson description cannot be empty")]
    EmptyDescription,

    #[error("a video reference is required")]
    MissingVideo,

    #[error("duration must be greater than 0")]
    InvalidDuration,
}

impl FieldError for LessonError {
    fn field(&self) -> &'static str {
        match self {
            LessonError::EmptyTitle | LessonError::TitleTooLong => "title",
            LessonError::EmptyDescription => "description",
            LessonError::MissingVideo => "video_ref",
            LessonError::InvalidDuration => "duration",
        }
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// A video lesson. The video and thumbnail are references only; the files
/// themselves live outside this system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    pub id: LessonId,
    pub category_id: CategoryId,
    pub title: String,
    pub description: String,
    pub video_ref: String,
    pub thumbnail_ref: Option<String>,
    pub duration_secs: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lesson {
    /// Duration formatted as `MM:SS`. Minutes are not wrapped into hours.
    #[must_use]
    pub fn duration_display(&self) -> String {
        format!("{:02}:{:02}", self.duration_secs / 60, self.duration_secs % 60)
    }
}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

/// Unvalidated lesson input from the staff lesson form.
///
/// `duration` is signed so that negative submissions reach validation
/// instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonDraft {
    pub category_id: CategoryId,
    pub title: String,
    pub description: String,
    pub video_ref: String,
    pub thumbnail_ref: Option<String>,
    pub duration: i64,
    pub is_active: bool,
}

/// Lesson input that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLesson {
    pub category_id: CategoryId,
    pub title: String,
    pub description: String,
    pub video_ref: String,
    pub thumbnail_ref: Option<String>,
    pub duration_secs: u32,
    pub is_active: bool,
}

impl LessonDraft {
    /// Validate the draft.
    ///
    /// Whether `category_id` exists is checked by the caller against storage.
    ///
    /// # Errors
    ///
    /// Returns the first `LessonError` found, checking fields in form order.
    pub fn validate(self) -> Result<NewLesson, LessonError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(LessonError::EmptyTitle);
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(LessonError::TitleTooLong);
        }
        let description = self.description.trim();
        if description.is_empty() {
            return Err(LessonError::EmptyDescription);
        }
        let video_ref = self.video_ref.trim();
        if video_ref.is_empty() {
            return Err(LessonError::MissingVideo);
        }
        if self.duration <= 0 {
            return Err(LessonError::InvalidDuration);
        }
        let duration_secs =
            u32::try_from(self.duration).map_err(|_| LessonError::InvalidDuration)?;

        let thumbnail_ref = self
            .thumbnail_ref
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty());

        Ok(NewLesson {
            category_id: self.category_id,
            title: title.to_owned(),
            description: description.to_owned(),
            video_ref: video_ref.to_owned(),
            thumbnail_ref,
            duration_secs,
            is_active: self.is_active,
        })
    }
}
