//! HTTP error mapping.
//!
//! Every handler returns `Result<_, ApiError>`; the body is always
//! `{"code": "...", "message": "..."}`, plus `fields` for form errors.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lessons_core::FieldError;
use serde_json::json;
use services::{
    AccessServiceError, AccountServiceError, CatalogServiceError, NotStaff, ProgressServiceError,
};
use storage::repository::StorageError;
use thiserror::Error;

/// Stable, machine-readable error codes.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const ALREADY_EXISTS: &str = "ALREADY_EXISTS";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
    pub const INTERNAL: &str = "INTERNAL";
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    /// A single form field failed validation.
    #[error("{message}")]
    Invalid {
        field: &'static str,
        message: String,
    },

    /// The request body could not be read at all.
    #[error("{0}")]
    Malformed(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{what} not found"))
    }

    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::Invalid {
            field,
            message: message.into(),
        }
    }

    fn from_field<E: FieldError>(e: &E) -> Self {
        ApiError::invalid(e.field(), e.to_string())
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => error_code::NOT_FOUND,
            ApiError::Forbidden(_) => error_code::PERMISSION_DENIED,
            ApiError::Invalid { .. } | ApiError::Malformed(_) => error_code::VALIDATION_FAILED,
            ApiError::Unauthenticated(_) => error_code::UNAUTHENTICATED,
            ApiError::Conflict(_) => error_code::ALREADY_EXISTS,
            ApiError::Internal(_) => error_code::INTERNAL,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Invalid { .. } | ApiError::Malformed(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            ApiError::Invalid { field, message } => json!({
                "code": self.error_code(),
                "message": message,
                "fields": { *field: [message] },
            }),
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                json!({
                    "code": self.error_code(),
                    "message": "internal server error",
                })
            }
            _ => json!({
                "code": self.error_code(),
                "message": self.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => ApiError::NotFound("not found".into()),
            StorageError::Conflict => ApiError::Conflict("already exists".into()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<NotStaff> for ApiError {
    fn from(e: NotStaff) -> Self {
        ApiError::Forbidden(e.to_string())
    }
}

impl From<AccessServiceError> for ApiError {
    fn from(e: AccessServiceError) -> Self {
        match e {
            AccessServiceError::Grant(e) => ApiError::from_field(&e),
            AccessServiceError::UnknownUser => {
                ApiError::invalid("user", "select a valid user")
            }
            AccessServiceError::UnknownLesson => ApiError::not_found("lesson"),
            AccessServiceError::UnknownGrant => ApiError::not_found("grant"),
            AccessServiceError::Storage(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ProgressServiceError> for ApiError {
    fn from(e: ProgressServiceError) -> Self {
        match e {
            ProgressServiceError::LessonNotFound => ApiError::not_found("lesson"),
            ProgressServiceError::Denied(reason) => ApiError::Forbidden(reason.message().into()),
            ProgressServiceError::Access(e) => e.into(),
            ProgressServiceError::Storage(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<CatalogServiceError> for ApiError {
    fn from(e: CatalogServiceError) -> Self {
        match e {
            CatalogServiceError::Category(e) => ApiError::from_field(&e),
            CatalogServiceError::Lesson(e) => ApiError::from_field(&e),
            CatalogServiceError::CategoryNotFound => ApiError::not_found("category"),
            CatalogServiceError::LessonNotFound => ApiError::not_found("lesson"),
            CatalogServiceError::Storage(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AccountServiceError> for ApiError {
    fn from(e: AccountServiceError) -> Self {
        match e {
            AccountServiceError::Registration(e) => ApiError::from_field(&e),
            AccountServiceError::InvalidCredentials => {
                ApiError::Unauthenticated("invalid username or password".into())
            }
            AccountServiceError::Storage(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessons_core::access::DenialReason;
    use lessons_core::model::GrantError;

    #[test]
    fn status_code_mapping() {
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::invalid("title", "x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthenticated("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Internal("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn denial_and_duplicate_grant_mapping() {
        let denied: ApiError = ProgressServiceError::Denied(DenialReason::Expired).into();
        assert_eq!(denied.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(denied.to_string(), "Your access to this lesson has expired.");

        let duplicate: ApiError = AccessServiceError::Grant(GrantError::Duplicate).into();
        assert!(matches!(duplicate, ApiError::Invalid { field: "user", .. }));
    }
}
