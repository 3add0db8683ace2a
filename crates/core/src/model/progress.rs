use chrono::{DateTime, Utc};

use crate::model::ids::{LessonId, ProgressId, UserId};
use crate::tracker;

/// Watch progress for one (user, lesson) pair.
///
/// `watched_seconds` is stored as reported and may exceed the lesson
/// duration; only [`ProgressRecord::percentage`] clamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    id: ProgressId,
    user_id: UserId,
    lesson_id: LessonId,
    watched_seconds: u32,
    completed: bool,
    last_watched_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// A fresh record: nothing watched, not completed.
    #[must_use]
    pub fn started(
        id: ProgressId,
        user_id: UserId,
        lesson_id: LessonId,
        now: DateTime<Utc>,
    ) -> Self {
        Self::from_persisted(id, user_id, lesson_id, 0, false, now)
    }

    #[must_use]
    pub fn from_persisted(
        id: ProgressId,
        user_id: UserId,
        lesson_id: LessonId,
        watched_seconds: u32,
        completed: bool,
        last_watched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            lesson_id,
            watched_seconds,
            completed,
            last_watched_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> ProgressId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn watched_seconds(&self) -> u32 {
        self.watched_seconds
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn last_watched_at(&self) -> DateTime<Utc> {
        self.last_watched_at
    }

    /// Percentage watched against `duration_secs`, clamped to `0..=100`.
    #[must_use]
    pub fn percentage(&self, duration_secs: u32) -> f64 {
        tracker::percentage(self.watched_seconds, duration_secs)
    }

    /// Overwrite the watched position and stamp `now`.
    ///
    /// Completion is sticky: once set it stays set, even if a smaller
    /// position is reported later.
    pub fn record_watch(&mut self, watched_seconds: u32, duration_secs: u32, now: DateTime<Utc>) {
        self.watched_seconds = watched_seconds;
        self.completed = self.completed || tracker::is_complete(watched_seconds, duration_secs);
        self.last_watched_at = now;
    }
}
