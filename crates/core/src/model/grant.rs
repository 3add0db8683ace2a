use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::FieldError;
use crate::model::ids::{GrantId, LessonId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GrantError {
    #[error("expiry must be in the future")]
    ExpiryNotInFuture,

    #[error("staff accounts already see every lesson")]
    StaffTarget,

    #[error("this user already has an access record for that target")]
    Duplicate,
}

impl FieldError for GrantError {
    fn field(&self) -> &'static str {
        match self {
            GrantError::ExpiryNotInFuture => "expires_at",
            GrantError::StaffTarget | GrantError::Duplicate => "user",
        }
    }
}

/// What a grant authorizes: every active lesson, or one lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "lesson_id", rename_all = "snake_case")]
pub enum GrantScope {
    Global,
    Lesson(LessonId),
}

impl GrantScope {
    /// True if a grant with this scope covers `lesson`.
    #[must_use]
    pub fn covers(self, lesson: LessonId) -> bool {
        match self {
            GrantScope::Global => true,
            GrantScope::Lesson(id) => id == lesson,
        }
    }

    #[must_use]
    pub fn lesson_id(self) -> Option<LessonId> {
        match self {
            GrantScope::Global => None,
            GrantScope::Lesson(id) => Some(id),
        }
    }
}

/// Validity of a grant at a specific instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    Valid,
    Revoked,
    Expired,
}

/// A record authorizing a user to view one lesson or all lessons.
///
/// Only `active` and `expires_at` change after creation; revocation never
/// deletes the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    id: GrantId,
    user_id: UserId,
    scope: GrantScope,
    approved: bool,
    active: bool,
    expires_at: Option<DateTime<Utc>>,
    granted_by: Option<UserId>,
    granted_at: DateTime<Utc>,
}

impl AccessGrant {
    /// Rehydrate a grant from storage.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn from_persisted(
        id: GrantId,
        user_id: UserId,
        scope: GrantScope,
        approved: bool,
        active: bool,
        expires_at: Option<DateTime<Utc>>,
        granted_by: Option<UserId>,
        granted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            scope,
            approved,
            active,
            expires_at,
            granted_by,
            granted_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> GrantId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn scope(&self) -> GrantScope {
        self.scope
    }

    /// Historical "admitted" marker. Stored and shown, not part of validity.
    #[must_use]
    pub fn approved(&self) -> bool {
        self.approved
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    #[must_use]
    pub fn granted_by(&self) -> Option<UserId> {
        self.granted_by
    }

    #[must_use]
    pub fn granted_at(&self) -> DateTime<Utc> {
        self.granted_at
    }

    /// Status at `now`. An inactive grant reports `Revoked` even if it has
    /// also expired.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>) -> GrantStatus {
        if !self.active {
            return GrantStatus::Revoked;
        }
        match self.expires_at {
            Some(expires_at) if expires_at <= now => GrantStatus::Expired,
            _ => GrantStatus::Valid,
        }
    }

    /// Active and not expired at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.status_at(now) == GrantStatus::Valid
    }

    /// Soft revoke.
    pub fn revoke(&mut self) {
        self.active = false;
    }

    /// Undo a revoke or an expiry. `expires_at` replaces the stored expiry.
    ///
    /// # Errors
    ///
    /// Returns `GrantError::ExpiryNotInFuture` if the new expiry is at or
    /// before `now`.
    pub fn reinstate(
        &mut self,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), GrantError> {
        if expires_at.is_some_and(|at| at <= now) {
            return Err(GrantError::ExpiryNotInFuture);
        }
        self.active = true;
        self.expires_at = expires_at;
        Ok(())
    }
}

/// Unvalidated grant request from the staff access form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantDraft {
    pub user_id: UserId,
    pub scope: GrantScope,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A grant request ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGrant {
    pub user_id: UserId,
    pub scope: GrantScope,
    pub expires_at: Option<DateTime<Utc>>,
    pub granted_by: UserId,
    pub granted_at: DateTime<Utc>,
}

impl GrantDraft {
    /// Validate against the current time and stamp the granter.
    ///
    /// # Errors
    ///
    /// Returns `GrantError::ExpiryNotInFuture` if the expiry is at or before `now`.
    pub fn validate(self, granted_by: UserId, now: DateTime<Utc>) -> Result<NewGrant, GrantError> {
        if self.expires_at.is_some_and(|expires_at| expires_at <= now) {
            return Err(GrantError::ExpiryNotInFuture);
        }
        Ok(NewGrant {
            user_id: self.user_id,
            scope: self.scope,
            expires_at: self.expires_at,
            granted_by,
            granted_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn grant(active: bool, expires_at: Option<DateTime<Utc>>) -> AccessGrant {
        AccessGrant::from_persisted(
            GrantId::new(1),
            UserId::new(2),
            GrantScope::Lesson(LessonId::new(3)),
            true,
            active,
            expires_at,
            Some(UserId::new(1)),
            fixed_now() - Duration::days(1),
        )
    }

    #[test]
    fn expired_grant_is_never_valid() {
        let now = fixed_now();
        let g = grant(true, Some(now - Duration::hours(1)));
        assert_eq!(g.status_at(now), GrantStatus::Expired);
        assert!(!g.is_valid_at(now));
    }

    #[test]
    fn expiry_equal_to_now_is_expired() {
        let now = fixed_now();
        assert!(!grant(true, Some(now)).is_valid_at(now));
    }

    #[test]
    fn inactive_grant_is_never_valid() {
        let now = fixed_now();
        assert!(!grant(false, None).is_valid_at(now));
        assert!(!grant(false, Some(now + Duration::days(30))).is_valid_at(now));
        assert_eq!(grant(false, Some(now - Duration::days(1))).status_at(now), GrantStatus::Revoked);
    }

    #[test]
    fn revoke_keeps_everything_but_active() {
        let now = fixed_now();
        let mut g = grant(true, None);
        assert!(g.is_valid_at(now));
        g.revoke();
        assert!(!g.is_active());
        assert_eq!(g.id(), GrantId::new(1));
        assert_eq!(g.scope(), GrantScope::Lesson(LessonId::new(3)));
    }

    #[test]
    fn reinstate_revives_revoked_and_expired_grants() {
        let now = fixed_now();
        let mut revoked = grant(false, None);
        revoked.reinstate(None, now).unwrap();
        assert!(revoked.is_valid_at(now));

        let mut lapsed = grant(true, Some(now - Duration::hours(1)));
        lapsed.reinstate(Some(now + Duration::days(1)), now).unwrap();
        assert_eq!(lapsed.status_at(now), GrantStatus::Valid);
        assert_eq!(lapsed.expires_at(), Some(now + Duration::days(1)));
    }

    #[test]
    fn reinstate_rejects_past_expiry_and_leaves_grant_alone() {
        let now = fixed_now();
        let mut g = grant(false, None);
        assert_eq!(g.reinstate(Some(now), now).unwrap_err(), GrantError::ExpiryNotInFuture);
        assert!(!g.is_active());
    }

    #[test]
    fn scope_coverage() {
        assert!(GrantScope::Global.covers(LessonId::new(99)));
        assert!(GrantScope::Lesson(LessonId::new(1)).covers(LessonId::new(1)));
        assert!(!GrantScope::Lesson(LessonId::new(1)).covers(LessonId::new(2)));
    }

    #[test]
    fn draft_rejects_past_expiry() {
        let now = fixed_now();
        let draft = GrantDraft {
            user_id: UserId::new(2),
            scope: GrantScope::Global,
            expires_at: Some(now - Duration::minutes(1)),
        };
        assert_eq!(
            draft.validate(UserId::new(1), now).unwrap_err(),
            GrantError::ExpiryNotInFuture
        );
    }

    #[test]
    fn draft_without_expiry_is_valid() {
        let now = fixed_now();
        let draft = GrantDraft {
            user_id: UserId::new(2),
            scope: GrantScope::Global,
            expires_at: None,
        };
        let grant = draft.validate(UserId::new(1), now).unwrap();
        assert_eq!(grant.granted_at, now);
        assert_eq!(grant.granted_by, UserId::new(1));
    }
}
