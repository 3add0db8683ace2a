use std::sync::Arc;

use chrono::{DateTime, Utc};
use lessons_core::access::{self, AccessBasis, AccessDecision};
use lessons_core::model::{
    AccessGrant, GrantDraft, GrantError, GrantId, GrantScope, GrantStatus, Lesson, LessonId,
    UserId, Viewer,
};
use storage::repository::{
    GrantEntry, GrantRepository, LessonQuery, LessonRepository, StorageError, UserRepository,
};

use crate::Clock;
use crate::error::AccessServiceError;
use crate::gate::Staff;

/// A grant as shown on the staff access screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantListing {
    pub grant: AccessGrant,
    pub username: String,
    pub status: GrantStatus,
}

/// Decides who may watch what, and lets staff change it.
#[derive(Clone)]
pub struct AccessService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
    lessons: Arc<dyn LessonRepository>,
    grants: Arc<dyn GrantRepository>,
}

impl AccessService {
    #[must_use]
    pub fn new(
        clock: Clock,
        users: Arc<dyn UserRepository>,
        lessons: Arc<dyn LessonRepository>,
        grants: Arc<dyn GrantRepository>,
    ) -> Self {
        Self {
            clock,
            users,
            lessons,
            grants,
        }
    }

    /// Evaluate access to a lesson at the current time.
    ///
    /// Does not check that the lesson exists.
    ///
    /// # Errors
    ///
    /// Returns `AccessServiceError::Storage` if grants cannot be loaded.
    pub async fn decide(
        &self,
        viewer: Viewer,
        lesson_id: LessonId,
    ) -> Result<AccessDecision, AccessServiceError> {
        if viewer.is_staff {
            return Ok(AccessDecision::Granted(AccessBasis::Staff));
        }
        let grants = self.grants.grants_for_user(viewer.user_id).await?;
        Ok(access::evaluate(viewer, lesson_id, &grants, self.clock.now()))
    }

    /// # Errors
    ///
    /// Returns `AccessServiceError::Storage` if grants cannot be loaded.
    pub async fn can_access(
        &self,
        viewer: Viewer,
        lesson_id: LessonId,
    ) -> Result<bool, AccessServiceError> {
        Ok(self.decide(viewer, lesson_id).await?.is_granted())
    }

    /// Active lessons the viewer may watch, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AccessServiceError::Storage` if the query fails.
    pub async fn visible_lessons(
        &self,
        viewer: Viewer,
        query: LessonQuery,
    ) -> Result<Vec<Lesson>, AccessServiceError> {
        let lessons = self
            .lessons
            .visible_lessons(viewer, self.clock.now(), query)
            .await?;
        Ok(lessons)
    }

    /// Grant a non-staff user access to one lesson.
    ///
    /// # Errors
    ///
    /// Returns `AccessServiceError::Grant` for a past expiry, a staff target or
    /// a duplicate grant, `UnknownUser` / `UnknownLesson` for missing targets.
    pub async fn grant_lesson_access(
        &self,
        staff: &Staff,
        user_id: UserId,
        lesson_id: LessonId,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<GrantId, AccessServiceError> {
        self.grant(
            staff,
            GrantDraft {
                user_id,
                scope: GrantScope::Lesson(lesson_id),
                expires_at,
            },
        )
        .await
    }

    /// Grant a non-staff user access to every lesson.
    ///
    /// # Errors
    ///
    /// Same as [`AccessService::grant_lesson_access`].
    pub async fn grant_global_access(
        &self,
        staff: &Staff,
        user_id: UserId,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<GrantId, AccessServiceError> {
        self.grant(
            staff,
            GrantDraft {
                user_id,
                scope: GrantScope::Global,
                expires_at,
            },
        )
        .await
    }

    async fn grant(&self, staff: &Staff, draft: GrantDraft) -> Result<GrantId, AccessServiceError> {
        let grant = draft.validate(staff.user_id(), self.clock.now())?;

        let user = self
            .users
            .get_user(grant.user_id)
            .await?
            .ok_or(AccessServiceError::UnknownUser)?;
        if user.is_staff {
            return Err(GrantError::StaffTarget.into());
        }
        if let Some(lesson_id) = grant.scope.lesson_id() {
            self.lessons
                .get_lesson(lesson_id)
                .await?
                .ok_or(AccessServiceError::UnknownLesson)?;
        }

        match self.grants.insert_grant(&grant).await {
            Ok(id) => {
                tracing::info!(
                    grant = id.value(),
                    user = %user.username,
                    scope = ?grant.scope,
                    by = staff.user_id().value(),
                    "access granted"
                );
                Ok(id)
            }
            Err(StorageError::Conflict) => Err(GrantError::Duplicate.into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Soft-revoke a grant. The row is kept with `active = false`.
    ///
    /// # Errors
    ///
    /// Returns `AccessServiceError::UnknownGrant` if the grant does not exist.
    pub async fn revoke(
        &self,
        staff: &Staff,
        grant_id: GrantId,
    ) -> Result<AccessGrant, AccessServiceError> {
        let mut grant = self
            .grants
            .get_grant(grant_id)
            .await?
            .ok_or(AccessServiceError::UnknownGrant)?;
        self.grants.set_grant_active(grant_id, false).await?;
        grant.revoke();
        tracing::info!(
            grant = grant_id.value(),
            by = staff.user_id().value(),
            "access revoked"
        );
        Ok(grant)
    }

    /// Reactivate a revoked or expired grant. `expires_at` replaces the old
    /// expiry; `None` leaves the grant open-ended.
    ///
    /// # Errors
    ///
    /// Returns `AccessServiceError::UnknownGrant` if the grant does not exist,
    /// `AccessServiceError::Grant` for an expiry that is not in the future.
    pub async fn restore(
        &self,
        staff: &Staff,
        grant_id: GrantId,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<AccessGrant, AccessServiceError> {
        let mut grant = self
            .grants
            .get_grant(grant_id)
            .await?
            .ok_or(AccessServiceError::UnknownGrant)?;
        grant.reinstate(expires_at, self.clock.now())?;
        self.grants.reactivate_grant(grant_id, expires_at).await?;
        tracing::info!(
            grant = grant_id.value(),
            by = staff.user_id().value(),
            "access restored"
        );
        Ok(grant)
    }

    /// Every global grant with its current validity, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AccessServiceError::Storage` if grants cannot be loaded.
    pub async fn global_grants(
        &self,
        _staff: &Staff,
    ) -> Result<Vec<GrantListing>, AccessServiceError> {
        let entries = self.grants.global_grants().await?;
        Ok(self.listings(entries))
    }

    /// Everything one user holds, global and per-lesson.
    ///
    /// # Errors
    ///
    /// Returns `AccessServiceError::UnknownUser` if the user does not exist.
    pub async fn user_grants(
        &self,
        _staff: &Staff,
        user_id: UserId,
    ) -> Result<Vec<GrantListing>, AccessServiceError> {
        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or(AccessServiceError::UnknownUser)?;
        let entries = self
            .grants
            .grants_for_user(user_id)
            .await?
            .into_iter()
            .map(|grant| GrantEntry {
                grant,
                username: user.username.clone(),
            })
            .collect();
        Ok(self.listings(entries))
    }

    fn listings(&self, entries: Vec<GrantEntry>) -> Vec<GrantListing> {
        let now = self.clock.now();
        entries
            .into_iter()
            .map(|entry| GrantListing {
                status: entry.grant.status_at(now),
                grant: entry.grant,
                username: entry.username,
            })
            .collect()
    }

    /// Grants for one lesson with their current validity, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AccessServiceError::UnknownLesson` if the lesson does not exist.
    pub async fn lesson_grants(
        &self,
        _staff: &Staff,
        lesson_id: LessonId,
    ) -> Result<Vec<GrantListing>, AccessServiceError> {
        self.lessons
            .get_lesson(lesson_id)
            .await?
            .ok_or(AccessServiceError::UnknownLesson)?;
        let entries = self.grants.grants_for_lesson(lesson_id).await?;
        Ok(self.listings(entries))
    }
}
