use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lessons_core::model::{
    AccessGrant, Category, CategoryId, GrantId, Lesson, LessonId, NewCategory, NewGrant,
    NewLesson, ProgressRecord, User, UserId, Viewer,
};
use thiserror::Error;

pub use crate::memory::InMemoryRepository;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// A user ready to insert. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub joined_at: DateTime<Utc>,
}

/// A user together with the stored password hash, for login only.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// A grant with the grantee's username, for the staff access screens.
#[derive(Debug, Clone)]
pub struct GrantEntry {
    pub grant: AccessGrant,
    pub username: String,
}

/// Listing filter and page window for lessons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonQuery {
    pub category: Option<CategoryId>,
    pub limit: u32,
    pub offset: u32,
}

impl LessonQuery {
    #[must_use]
    pub fn page(limit: u32, offset: u32) -> Self {
        Self {
            category: None,
            limit,
            offset,
        }
    }

    #[must_use]
    pub fn in_category(mut self, category: Option<CategoryId>) -> Self {
        self.category = category;
        self
    }
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new account.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the username or email is taken.
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError>;

    /// Fetch a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError>;

    /// Fetch a user and password hash by exact username.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn find_credentials(&self, username: &str)
    -> Result<Option<UserCredentials>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn username_exists(&self, username: &str) -> Result<bool, StorageError>;

    /// Case-insensitive email lookup.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn email_exists(&self, email: &str) -> Result<bool, StorageError>;

    /// Non-staff users whose username or email contains `needle`
    /// (case-insensitive), ordered by username.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn search_users(&self, needle: Option<&str>, limit: u32)
    -> Result<Vec<User>, StorageError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the token already exists.
    async fn create_session(
        &self,
        token: &str,
        user_id: UserId,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// The active user behind an unexpired session token.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn session_user(&self, token: &str, now: DateTime<Utc>)
    -> Result<Option<User>, StorageError>;

    /// Delete a session. Deleting an unknown token is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn delete_session(&self, token: &str) -> Result<(), StorageError>;

    /// Drop every session that has expired at `now`. Returns how many went.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the category cannot be stored.
    async fn insert_category(
        &self,
        category: &NewCategory,
        created_at: DateTime<Utc>,
    ) -> Result<CategoryId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the category does not exist.
    async fn update_category(&self, id: CategoryId, category: &NewCategory)
    -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StorageError>;

    /// All categories ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn list_categories(&self) -> Result<Vec<Category>, StorageError>;

    /// Delete a category along with its lessons and their grants and progress.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the category does not exist.
    async fn delete_category(&self, id: CategoryId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait LessonRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the category does not exist.
    async fn insert_lesson(
        &self,
        lesson: &NewLesson,
        now: DateTime<Utc>,
    ) -> Result<LessonId, StorageError>;

    /// Replace a lesson's editable fields and bump `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson or category does not exist.
    async fn update_lesson(
        &self,
        id: LessonId,
        lesson: &NewLesson,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError>;

    /// Every lesson, active or not, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn list_lessons(&self, limit: u32, offset: u32) -> Result<Vec<Lesson>, StorageError>;

    /// Active lessons the viewer may watch at `now`, newest first.
    ///
    /// Must agree with [`lessons_core::access::can_access`] for every lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn visible_lessons(
        &self,
        viewer: Viewer,
        now: DateTime<Utc>,
        query: LessonQuery,
    ) -> Result<Vec<Lesson>, StorageError>;
}

#[async_trait]
pub trait GrantRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the user already has a grant with
    /// the same scope, `StorageError::NotFound` if the user or lesson is missing.
    async fn insert_grant(&self, grant: &NewGrant) -> Result<GrantId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn get_grant(&self, id: GrantId) -> Result<Option<AccessGrant>, StorageError>;

    /// All grants held by a user, any scope and any status.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn grants_for_user(&self, user_id: UserId) -> Result<Vec<AccessGrant>, StorageError>;

    /// Grants scoped to one lesson, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn grants_for_lesson(&self, lesson_id: LessonId)
    -> Result<Vec<GrantEntry>, StorageError>;

    /// Global grants of every user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn global_grants(&self) -> Result<Vec<GrantEntry>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the grant does not exist.
    async fn set_grant_active(&self, id: GrantId, active: bool) -> Result<(), StorageError>;

    /// Mark a grant active again and replace its expiry.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the grant does not exist.
    async fn reactivate_grant(
        &self,
        id: GrantId,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the (user, lesson) record, creating an empty one if missing.
    /// Never creates a second row for the same pair.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user or lesson is missing.
    async fn get_or_create_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist.
    async fn save_progress(&self, progress: &ProgressRecord) -> Result<(), StorageError>;

    /// Existing records for the user among `lessons`. Lessons without a
    /// record are simply absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure.
    async fn progress_for_lessons(
        &self,
        user_id: UserId,
        lessons: &[LessonId],
    ) -> Result<Vec<ProgressRecord>, StorageError>;
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub lessons: Arc<dyn LessonRepository>,
    pub grants: Arc<dyn GrantRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            users: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            categories: Arc::new(repo.clone()),
            lessons: Arc::new(repo.clone()),
            grants: Arc::new(repo.clone()),
            progress: Arc::new(repo),
        }
    }
}
