//! Response bodies.

use chrono::{DateTime, Utc};
use lessons_core::model::{
    AccessGrant, Category, CategoryId, GrantId, GrantStatus, Lesson, LessonId, ProgressRecord,
    User, UserId,
};
use serde::Serialize;
use services::{GrantListing, LessonView};

#[derive(Debug, Serialize)]
pub struct LessonBody {
    pub id: LessonId,
    pub category_id: CategoryId,
    pub title: String,
    pub description: String,
    pub video_ref: String,
    pub thumbnail_ref: Option<String>,
    pub duration: u32,
    pub duration_display: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Lesson> for LessonBody {
    fn from(lesson: Lesson) -> Self {
        Self {
            duration_display: lesson.duration_display(),
            id: lesson.id,
            category_id: lesson.category_id,
            title: lesson.title,
            description: lesson.description,
            video_ref: lesson.video_ref,
            thumbnail_ref: lesson.thumbnail_ref,
            duration: lesson.duration_secs,
            is_active: lesson.is_active,
            created_at: lesson.created_at,
            updated_at: lesson.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProgressBody {
    pub watched_seconds: u32,
    pub is_completed: bool,
    pub last_watched_at: DateTime<Utc>,
    pub percentage: f64,
}

impl ProgressBody {
    pub fn new(progress: &ProgressRecord, duration_secs: u32) -> Self {
        Self {
            watched_seconds: progress.watched_seconds(),
            is_completed: progress.is_completed(),
            last_watched_at: progress.last_watched_at(),
            percentage: progress.percentage(duration_secs),
        }
    }
}

/// A row of the lesson list. `progress` is absent for staff and for lessons
/// the caller has never opened.
#[derive(Debug, Serialize)]
pub struct LessonListItem {
    #[serde(flatten)]
    pub lesson: LessonBody,
    pub progress: Option<ProgressBody>,
}

#[derive(Debug, Serialize)]
pub struct LessonListBody {
    pub notice: Option<&'static str>,
    pub category: Option<CategoryId>,
    pub page: u32,
    pub categories: Vec<CategoryBody>,
    pub lessons: Vec<LessonListItem>,
}

#[derive(Debug, Serialize)]
pub struct LessonDetailBody {
    pub lesson: LessonBody,
    pub progress: ProgressBody,
}

impl From<LessonView> for LessonDetailBody {
    fn from(view: LessonView) -> Self {
        let progress = ProgressBody::new(&view.progress, view.lesson.duration_secs);
        Self {
            lesson: view.lesson.into(),
            progress,
        }
    }
}

/// Reply to a progress update.
#[derive(Debug, Serialize)]
pub struct ProgressUpdateBody {
    pub success: bool,
    pub progress_percentage: f64,
    pub is_completed: bool,
}

impl From<LessonView> for ProgressUpdateBody {
    fn from(view: LessonView) -> Self {
        Self {
            success: true,
            progress_percentage: view.percentage,
            is_completed: view.progress.is_completed(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryBody {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<Category> for CategoryBody {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
            description: category.description,
            created_at: category.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserBody {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
}

impl From<User> for UserBody {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            is_staff: user.is_staff,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionBody {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserBody,
}

#[derive(Debug, Serialize)]
pub struct GrantBody {
    pub id: GrantId,
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// `None` for a global grant.
    pub lesson_id: Option<LessonId>,
    pub approved: bool,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub granted_by: Option<UserId>,
    pub granted_at: DateTime<Utc>,
    pub status: GrantStatus,
}

impl GrantBody {
    pub fn new(grant: &AccessGrant, username: Option<String>, status: GrantStatus) -> Self {
        Self {
            id: grant.id(),
            user_id: grant.user_id(),
            username,
            lesson_id: grant.scope().lesson_id(),
            approved: grant.approved(),
            is_active: grant.is_active(),
            expires_at: grant.expires_at(),
            granted_by: grant.granted_by(),
            granted_at: grant.granted_at(),
            status,
        }
    }
}

impl From<GrantListing> for GrantBody {
    fn from(listing: GrantListing) -> Self {
        GrantBody::new(&listing.grant, Some(listing.username), listing.status)
    }
}

#[derive(Debug, Serialize)]
pub struct LessonAccessBody {
    pub lesson: LessonBody,
    pub grants: Vec<GrantBody>,
}

#[derive(Debug, Serialize)]
pub struct AdminLessonsBody {
    pub page: u32,
    pub page_size: u32,
    pub lessons: Vec<LessonBody>,
}

#[derive(Debug, Serialize)]
pub struct CreatedBody {
    pub id: u64,
}
