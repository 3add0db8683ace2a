//! Shared error types for the services crate.

use thiserror::Error;

use lessons_core::access::DenialReason;
use lessons_core::model::{CategoryError, GrantError, LessonError, RegistrationError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `AccessService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AccessServiceError {
    #[error(transparent)]
    Grant(#[from] GrantError),
    #[error("user not found")]
    UnknownUser,
    #[error("lesson not found")]
    UnknownLesson,
    #[error("grant not found")]
    UnknownGrant,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("lesson not found")]
    LessonNotFound,
    #[error("{}", .0.message())]
    Denied(DenialReason),
    #[error(transparent)]
    Access(#[from] AccessServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogServiceError {
    #[error(transparent)]
    Category(#[from] CategoryError),
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error("category not found")]
    CategoryNotFound,
    #[error("lesson not found")]
    LessonNotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AccountService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AccountServiceError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
