use std::collections::HashMap;
use std::sync::Arc;

use lessons_core::access::AccessDecision;
use lessons_core::model::{Lesson, LessonId, ProgressRecord, UserId, Viewer};
use storage::repository::{LessonRepository, ProgressRepository};

use crate::Clock;
use crate::access_service::AccessService;
use crate::error::ProgressServiceError;

/// A lesson opened by a viewer, with their progress on it.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonView {
    pub lesson: Lesson,
    pub progress: ProgressRecord,
    pub percentage: f64,
}

impl LessonView {
    fn new(lesson: Lesson, progress: ProgressRecord) -> Self {
        let percentage = progress.percentage(lesson.duration_secs);
        Self {
            lesson,
            progress,
            percentage,
        }
    }
}

/// Tracks how far viewers have watched, behind the access check.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    access: Arc<AccessService>,
    lessons: Arc<dyn LessonRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        access: Arc<AccessService>,
        lessons: Arc<dyn LessonRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            access,
            lessons,
            progress,
        }
    }

    /// Open a lesson for watching: check access, then fetch or create the
    /// viewer's progress record.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::LessonNotFound` for unknown lessons and,
    /// for non-staff, inactive ones. Returns `ProgressServiceError::Denied`
    /// when the viewer has no valid grant.
    pub async fn open_lesson(
        &self,
        viewer: Viewer,
        lesson_id: LessonId,
    ) -> Result<LessonView, ProgressServiceError> {
        let lesson = self.watchable_lesson(viewer, lesson_id).await?;
        let progress = self.ensure_progress(viewer.user_id, lesson_id).await?;
        Ok(LessonView::new(lesson, progress))
    }

    /// Record a watch position reported by the player.
    ///
    /// `watched_seconds` replaces the stored value. Completion is set once the
    /// position reaches 90% of the lesson and is never cleared.
    ///
    /// # Errors
    ///
    /// Same as [`ProgressService::open_lesson`].
    pub async fn record_progress(
        &self,
        viewer: Viewer,
        lesson_id: LessonId,
        watched_seconds: u32,
    ) -> Result<LessonView, ProgressServiceError> {
        let lesson = self.watchable_lesson(viewer, lesson_id).await?;
        let now = self.clock.now();
        let mut progress = self
            .progress
            .get_or_create_progress(viewer.user_id, lesson_id, now)
            .await?;
        let was_completed = progress.is_completed();
        progress.record_watch(watched_seconds, lesson.duration_secs, now);
        self.progress.save_progress(&progress).await?;

        if progress.is_completed() && !was_completed {
            tracing::info!(
                user = viewer.user_id.value(),
                lesson = lesson_id.value(),
                "lesson completed"
            );
        }
        Ok(LessonView::new(lesson, progress))
    }

    /// Fetch or create the (user, lesson) record without changing it.
    ///
    /// Performs no access check.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if persistence fails.
    pub async fn ensure_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<ProgressRecord, ProgressServiceError> {
        let progress = self
            .progress
            .get_or_create_progress(user_id, lesson_id, self.clock.now())
            .await?;
        Ok(progress)
    }

    /// Existing progress for the user among `lessons`, keyed by lesson.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the query fails.
    pub async fn progress_for(
        &self,
        user_id: UserId,
        lessons: &[LessonId],
    ) -> Result<HashMap<LessonId, ProgressRecord>, ProgressServiceError> {
        let records = self.progress.progress_for_lessons(user_id, lessons).await?;
        Ok(records.into_iter().map(|p| (p.lesson_id(), p)).collect())
    }

    async fn watchable_lesson(
        &self,
        viewer: Viewer,
        lesson_id: LessonId,
    ) -> Result<Lesson, ProgressServiceError> {
        let lesson = self
            .lessons
            .get_lesson(lesson_id)
            .await?
            .filter(|l| l.is_active || viewer.is_staff)
            .ok_or(ProgressServiceError::LessonNotFound)?;

        match self.access.decide(viewer, lesson_id).await? {
            AccessDecision::Granted(_) => Ok(lesson),
            AccessDecision::Denied(reason) => {
                tracing::debug!(
                    user = viewer.user_id.value(),
                    lesson = lesson_id.value(),
                    ?reason,
                    "lesson access denied"
                );
                Err(ProgressServiceError::Denied(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lessons_core::access::DenialReason;
    use lessons_core::model::{GrantScope, NewCategory, NewGrant, NewLesson};
    use lessons_core::time::fixed_now;
    use storage::repository::{
        CategoryRepository, GrantRepository, InMemoryRepository, NewUserRecord, UserRepository,
    };

    const STAFF: UserId = UserId::new(1);

    struct Fixture {
        repo: InMemoryRepository,
        viewer: Viewer,
        lesson: LessonId,
        hidden: LessonId,
    }

    impl Fixture {
        fn service(&self, clock: Clock) -> ProgressService {
            let access = AccessService::new(
                clock,
                Arc::new(self.repo.clone()),
                Arc::new(self.repo.clone()),
                Arc::new(self.repo.clone()),
            );
            ProgressService::new(
                clock,
                Arc::new(access),
                Arc::new(self.repo.clone()),
                Arc::new(self.repo.clone()),
            )
        }

        async fn grant(&self, lesson: LessonId, expires_at: Option<chrono::DateTime<chrono::Utc>>) {
            self.repo
                .insert_grant(&NewGrant {
                    user_id: self.viewer.user_id,
                    scope: GrantScope::Lesson(lesson),
                    expires_at,
                    granted_by: STAFF,
                    granted_at: fixed_now(),
                })
                .await
                .unwrap();
        }
    }

    async fn fixture() -> Fixture {
        let repo = InMemoryRepository::new();
        for (name, is_staff) in [("staff", true), ("viewer", false)] {
            repo.insert_user(NewUserRecord {
                username: name.into(),
                email: format!("{name}@example.com"),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: "x".into(),
                is_staff,
                joined_at: fixed_now(),
            })
            .await
            .unwrap();
        }
        let viewer = repo
            .find_credentials("viewer")
            .await
            .unwrap()
            .unwrap()
            .user
            .viewer();
        let category = repo
            .insert_category(
                &NewCategory {
                    name: "Basics".into(),
                    description: String::new(),
                },
                fixed_now(),
            )
            .await
            .unwrap();
        let mut ids = Vec::new();
        for is_active in [true, false] {
            let id = repo
                .insert_lesson(
                    &NewLesson {
                        category_id: category,
                        title: "Intro".into(),
                        description: "d".into(),
                        video_ref: "v.mp4".into(),
                        thumbnail_ref: None,
                        duration_secs: 600,
                        is_active,
                    },
                    fixed_now(),
                )
                .await
                .unwrap();
            ids.push(id);
        }
        Fixture {
            repo,
            viewer,
            lesson: ids[0],
            hidden: ids[1],
        }
    }

    #[tokio::test]
    async fn watching_ninety_percent_completes() {
        let fx = fixture().await;
        fx.grant(fx.lesson, None).await;
        let service = fx.service(Clock::fixed(fixed_now()));

        let view = service.record_progress(fx.viewer, fx.lesson, 540).await.unwrap();
        assert!(view.progress.is_completed());
        assert!((view.percentage - 90.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn partial_watch_then_rewind_keeps_latest_position() {
        let fx = fixture().await;
        fx.grant(fx.lesson, None).await;
        let service = fx.service(Clock::fixed(fixed_now()));

        let view = service.record_progress(fx.viewer, fx.lesson, 100).await.unwrap();
        assert!(!view.progress.is_completed());
        assert!((view.percentage - 16.666_666).abs() < 0.001);

        let later = fx.service(Clock::fixed(fixed_now() + Duration::minutes(3)));
        let view = later.record_progress(fx.viewer, fx.lesson, 40).await.unwrap();
        assert_eq!(view.progress.watched_seconds(), 40);
        assert_eq!(
            view.progress.last_watched_at(),
            fixed_now() + Duration::minutes(3)
        );

        let stored = later.progress_for(fx.viewer.user_id, &[fx.lesson]).await.unwrap();
        assert_eq!(stored[&fx.lesson].watched_seconds(), 40);
    }

    #[tokio::test]
    async fn completion_is_sticky() {
        let fx = fixture().await;
        fx.grant(fx.lesson, None).await;
        let service = fx.service(Clock::fixed(fixed_now()));
        service.record_progress(fx.viewer, fx.lesson, 590).await.unwrap();
        let view = service.record_progress(fx.viewer, fx.lesson, 5).await.unwrap();
        assert!(view.progress.is_completed());
    }

    #[tokio::test]
    async fn expired_grant_blocks_recording_and_leaves_progress_alone() {
        let fx = fixture().await;
        fx.grant(fx.lesson, Some(fixed_now() + Duration::minutes(5))).await;
        let service = fx.service(Clock::fixed(fixed_now()));
        service.record_progress(fx.viewer, fx.lesson, 60).await.unwrap();

        let later = fx.service(Clock::fixed(fixed_now() + Duration::minutes(10)));
        let err = later
            .record_progress(fx.viewer, fx.lesson, 300)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProgressServiceError::Denied(DenialReason::Expired)
        ));

        let stored = later.progress_for(fx.viewer.user_id, &[fx.lesson]).await.unwrap();
        assert_eq!(stored[&fx.lesson].watched_seconds(), 60);
    }

    #[tokio::test]
    async fn no_grant_means_denied_and_no_record() {
        let fx = fixture().await;
        let service = fx.service(Clock::fixed(fixed_now()));
        let err = service.open_lesson(fx.viewer, fx.lesson).await.unwrap_err();
        assert!(matches!(
            err,
            ProgressServiceError::Denied(DenialReason::NoGrant)
        ));
        assert!(
            service
                .progress_for(fx.viewer.user_id, &[fx.lesson])
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn open_lesson_creates_one_record() {
        let fx = fixture().await;
        fx.grant(fx.lesson, None).await;
        let service = fx.service(Clock::fixed(fixed_now()));
        let first = service.open_lesson(fx.viewer, fx.lesson).await.unwrap();
        let second = service.open_lesson(fx.viewer, fx.lesson).await.unwrap();
        assert_eq!(first.progress.id(), second.progress.id());
        assert_eq!(first.progress.watched_seconds(), 0);
        assert!(first.percentage.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn inactive_lessons_are_hidden_from_non_staff_only() {
        let fx = fixture().await;
        fx.grant(fx.hidden, None).await;
        let service = fx.service(Clock::fixed(fixed_now()));
        let err = service.open_lesson(fx.viewer, fx.hidden).await.unwrap_err();
        assert!(matches!(err, ProgressServiceError::LessonNotFound));

        let staff = Viewer {
            user_id: STAFF,
            is_staff: true,
        };
        let view = service.open_lesson(staff, fx.hidden).await.unwrap();
        assert_eq!(view.lesson.id, fx.hidden);

        let err = service
            .open_lesson(fx.viewer, LessonId::new(999))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::LessonNotFound));
    }
}
