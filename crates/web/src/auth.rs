//! Current-user extraction.
//!
//! The session token comes from the `session_id` cookie set at login, or
//! from an `Authorization: Bearer <token>` header when the cookie is missing
//! or stale.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum_extra::extract::cookie::CookieJar;
use lessons_core::model::{User, Viewer};
use services::Staff;

use crate::AppState;
use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "session_id";

/// An authenticated caller. Rejects with 401 when there is no valid session.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

impl CurrentUser {
    #[must_use]
    pub fn viewer(&self) -> Viewer {
        self.user.viewer()
    }

    /// # Errors
    ///
    /// Returns `ApiError::Forbidden` unless the caller is active staff.
    pub fn require_staff(&self) -> Result<Staff, ApiError> {
        Staff::verify(&self.user).map_err(|e| {
            tracing::debug!(user = self.user.id.value(), "staff-only route refused");
            ApiError::from(e)
        })
    }
}

/// A caller that may or may not be logged in.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

/// Candidate tokens in the order they are tried: cookie, then bearer header.
fn session_tokens(parts: &Parts) -> Vec<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    let cookie = jar.get(SESSION_COOKIE).map(|c| c.value().to_owned());
    let bearer = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_owned());
    let mut tokens: Vec<String> = cookie
        .into_iter()
        .chain(bearer)
        .filter(|t| !t.is_empty())
        .collect();
    tokens.dedup();
    tokens
}

/// The first candidate token that maps to a live session wins, so a stale
/// cookie does not hide a valid bearer header.
async fn resolve(parts: &Parts, state: &AppState) -> Result<Option<CurrentUser>, ApiError> {
    let accounts = state.services.accounts();
    for token in session_tokens(parts) {
        if let Some(user) = accounts.authenticate(&token).await? {
            return Ok(Some(CurrentUser { user, token }));
        }
    }
    Ok(None)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve(parts, state)
            .await?
            .ok_or_else(|| ApiError::Unauthenticated("login required".into()))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve(parts, state).await?))
    }
}
