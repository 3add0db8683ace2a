//! Progress tracking rules.

/// Share of the lesson, in percent, that counts as watched to completion.
pub const COMPLETION_PERCENT: u32 = 90;

/// Percentage watched, clamped to `0..=100`. Zero when the duration is zero.
#[must_use]
pub fn percentage(watched_seconds: u32, duration_secs: u32) -> f64 {
    if duration_secs == 0 {
        return 0.0;
    }
    (f64::from(watched_seconds) / f64::from(duration_secs) * 100.0).min(100.0)
}

/// True once `watched_seconds >= 90% of duration_secs`.
///
/// Compared in integers so the boundary is exact. A zero-length lesson is
/// complete as soon as anything is reported.
#[must_use]
pub fn is_complete(watched_seconds: u32, duration_secs: u32) -> bool {
    u64::from(watched_seconds) * 100 >= u64::from(duration_secs) * u64::from(COMPLETION_PERCENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LessonId, ProgressId, ProgressRecord, UserId};
    use crate::time::fixed_now;
    use chrono::Duration;

    fn record() -> ProgressRecord {
        ProgressRecord::started(ProgressId::new(1), UserId::new(1), LessonId::new(1), fixed_now())
    }

    #[test]
    fn ninety_percent_completes() {
        let mut progress = record();
        progress.record_watch(540, 600, fixed_now());
        assert!(progress.is_completed());
        assert!((progress.percentage(600) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn partial_watch_is_not_complete() {
        let mut progress = record();
        progress.record_watch(100, 600, fixed_now());
        assert!(!progress.is_completed());
        assert!((progress.percentage(600) - 16.666_666).abs() < 0.001);
    }

    #[test]
    fn zero_duration_percentage_is_zero() {
        assert!(percentage(50, 0).abs() < f64::EPSILON);
        let mut progress = record();
        progress.record_watch(50, 0, fixed_now());
        assert!(progress.percentage(0).abs() < f64::EPSILON);
    }

    #[test]
    fn percentage_clamps_but_storage_does_not() {
        let mut progress = record();
        progress.record_watch(10_000, 600, fixed_now());
        assert_eq!(progress.watched_seconds(), 10_000);
        assert!((progress.percentage(600) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn percentage_is_monotonic_and_bounded() {
        let duration = 137;
        let mut last = 0.0;
        for watched in 0..400 {
            let p = percentage(watched, duration);
            assert!((0.0..=100.0).contains(&p));
            assert!(p >= last);
            last = p;
        }
    }

    #[test]
    fn threshold_edge() {
        assert!(!is_complete(539, 600));
        assert!(is_complete(540, 600));
        assert!(is_complete(0, 0));
    }

    #[test]
    fn repeated_identical_input_is_idempotent() {
        let mut once = record();
        once.record_watch(300, 600, fixed_now());
        let mut twice = once.clone();
        twice.record_watch(300, 600, fixed_now());
        assert_eq!(once, twice);
    }

    #[test]
    fn completion_sticks_after_rewind() {
        let mut progress = record();
        progress.record_watch(590, 600, fixed_now());
        progress.record_watch(10, 600, fixed_now() + Duration::minutes(1));
        assert_eq!(progress.watched_seconds(), 10);
        assert!(progress.is_completed());
        assert_eq!(progress.last_watched_at(), fixed_now() + Duration::minutes(1));
    }
}
