//! Access evaluation: may this viewer watch this lesson right now?
//!
//! Staff always may. Everyone else needs a grant that is active and not
//! expired at the moment of the check, either global or for the lesson.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{AccessGrant, GrantScope, GrantStatus, LessonId, Viewer};

/// Why access was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessBasis {
    Staff,
    Global,
    Lesson,
}

/// Why access was refused. Only used for the human-readable message; every
/// reason maps to the same denial at the protocol level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    NoGrant,
    Revoked,
    Expired,
}

impl DenialReason {
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            DenialReason::NoGrant => "You do not have access to this lesson.",
            DenialReason::Revoked => "Your access to this lesson has been revoked.",
            DenialReason::Expired => "Your access to this lesson has expired.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Granted(AccessBasis),
    Denied(DenialReason),
}

impl AccessDecision {
    #[must_use]
    pub fn is_granted(self) -> bool {
        matches!(self, AccessDecision::Granted(_))
    }
}

/// Decide whether `viewer` may watch `lesson` at `now`.
///
/// `grants` are the viewer's grants; grants for other users or other lessons
/// are ignored. When denied, the reason comes from the lesson-specific grant
/// if there is one, otherwise from the global grant.
pub fn evaluate<'a>(
    viewer: Viewer,
    lesson: LessonId,
    grants: impl IntoIterator<Item = &'a AccessGrant>,
    now: DateTime<Utc>,
) -> AccessDecision {
    if viewer.is_staff {
        return AccessDecision::Granted(AccessBasis::Staff);
    }

    let mut global = None;
    let mut specific = None;
    for grant in grants {
        if grant.user_id() != viewer.user_id || !grant.scope().covers(lesson) {
            continue;
        }
        let status = grant.status_at(now);
        match grant.scope() {
            GrantScope::Global => global = Some(status),
            GrantScope::Lesson(_) => specific = Some(status),
        }
    }

    if global == Some(GrantStatus::Valid) {
        return AccessDecision::Granted(AccessBasis::Global);
    }
    if specific == Some(GrantStatus::Valid) {
        return AccessDecision::Granted(AccessBasis::Lesson);
    }

    let reason = match specific.or(global) {
        Some(GrantStatus::Expired) => DenialReason::Expired,
        Some(GrantStatus::Revoked) => DenialReason::Revoked,
        Some(GrantStatus::Valid) | None => DenialReason::NoGrant,
    };
    AccessDecision::Denied(reason)
}

/// Boolean form of [`evaluate`].
pub fn can_access<'a>(
    viewer: Viewer,
    lesson: LessonId,
    grants: impl IntoIterator<Item = &'a AccessGrant>,
    now: DateTime<Utc>,
) -> bool {
    evaluate(viewer, lesson, grants, now).is_granted()
}

/// True if the viewer sees every active lesson: staff, or a valid global grant.
pub fn sees_all_lessons<'a>(
    viewer: Viewer,
    grants: impl IntoIterator<Item = &'a AccessGrant>,
    now: DateTime<Utc>,
) -> bool {
    viewer.is_staff
        || grants.into_iter().any(|g| {
            g.user_id() == viewer.user_id
                && g.scope() == GrantScope::Global
                && g.is_valid_at(now)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GrantId, UserId};
    use crate::time::fixed_now;
    use chrono::Duration;

    const USER: UserId = UserId::new(10);
    const NO_GRANTS: [AccessGrant; 0] = [];

    fn viewer(is_staff: bool) -> Viewer {
        Viewer {
            user_id: USER,
            is_staff,
        }
    }

    fn grant(
        scope: GrantScope,
        active: bool,
        expires_at: Option<DateTime<Utc>>,
    ) -> AccessGrant {
        AccessGrant::from_persisted(
            GrantId::new(1),
            USER,
            scope,
            true,
            active,
            expires_at,
            None,
            fixed_now() - Duration::days(10),
        )
    }

    fn lesson(id: u64) -> LessonId {
        LessonId::new(id)
    }

    #[test]
    fn staff_bypasses_grants() {
        let decision = evaluate(viewer(true), lesson(1), &NO_GRANTS, fixed_now());
        assert_eq!(decision, AccessDecision::Granted(AccessBasis::Staff));
    }

    #[test]
    fn no_grants_means_no_access() {
        let decision = evaluate(viewer(false), lesson(1), &NO_GRANTS, fixed_now());
        assert_eq!(decision, AccessDecision::Denied(DenialReason::NoGrant));
    }

    #[test]
    fn valid_global_grant_covers_every_lesson() {
        let grants = [grant(GrantScope::Global, true, None)];
        for id in 1..=5 {
            assert!(can_access(viewer(false), lesson(id), &grants, fixed_now()));
        }
        assert!(sees_all_lessons(viewer(false), &grants, fixed_now()));
    }

    #[test]
    fn lesson_grant_covers_only_its_lesson() {
        let grants = [grant(GrantScope::Lesson(lesson(1)), true, None)];
        assert_eq!(
            evaluate(viewer(false), lesson(1), &grants, fixed_now()),
            AccessDecision::Granted(AccessBasis::Lesson)
        );
        assert_eq!(
            evaluate(viewer(false), lesson(2), &grants, fixed_now()),
            AccessDecision::Denied(DenialReason::NoGrant)
        );
        assert!(!sees_all_lessons(viewer(false), &grants, fixed_now()));
    }

    #[test]
    fn expired_lesson_grant_denies() {
        let now = fixed_now();
        let grants = [grant(
            GrantScope::Lesson(lesson(1)),
            true,
            Some(now - Duration::hours(1)),
        )];
        assert_eq!(
            evaluate(viewer(false), lesson(1), &grants, now),
            AccessDecision::Denied(DenialReason::Expired)
        );
    }

    #[test]
    fn revoked_grant_denies() {
        let grants = [grant(GrantScope::Lesson(lesson(1)), false, None)];
        assert_eq!(
            evaluate(viewer(false), lesson(1), &grants, fixed_now()),
            AccessDecision::Denied(DenialReason::Revoked)
        );
    }

    #[test]
    fn grant_expiring_between_checks_denies_on_next_check() {
        let mut now = fixed_now();
        let grants = [grant(
            GrantScope::Lesson(lesson(1)),
            true,
            Some(now + Duration::minutes(5)),
        )];
        assert!(can_access(viewer(false), lesson(1), &grants, now));
        now += Duration::minutes(5);
        assert!(!can_access(viewer(false), lesson(1), &grants, now));
    }

    #[test]
    fn valid_lesson_grant_wins_over_expired_global() {
        let now = fixed_now();
        let grants = [
            grant(GrantScope::Global, true, Some(now - Duration::days(1))),
            grant(GrantScope::Lesson(lesson(3)), true, None),
        ];
        assert!(can_access(viewer(false), lesson(3), &grants, now));
        assert_eq!(
            evaluate(viewer(false), lesson(4), &grants, now),
            AccessDecision::Denied(DenialReason::Expired)
        );
    }

    #[test]
    fn lesson_reason_preferred_over_global_reason() {
        let now = fixed_now();
        let grants = [
            grant(GrantScope::Global, false, None),
            grant(GrantScope::Lesson(lesson(1)), true, Some(now - Duration::hours(1))),
        ];
        assert_eq!(
            evaluate(viewer(false), lesson(1), &grants, now),
            AccessDecision::Denied(DenialReason::Expired)
        );
    }

    #[test]
    fn other_users_grants_are_ignored() {
        let other = AccessGrant::from_persisted(
            GrantId::new(2),
            UserId::new(99),
            GrantScope::Global,
            true,
            true,
            None,
            None,
            fixed_now(),
        );
        assert!(!can_access(viewer(false), lesson(1), [&other], fixed_now()));
    }

    #[test]
    fn can_access_matches_definition_over_grant_combinations() {
        let now = fixed_now();
        let states = [
            (true, None),
            (false, None),
            (true, Some(now - Duration::hours(1))),
            (true, Some(now + Duration::hours(1))),
        ];
        for staff in [false, true] {
            for global in states.iter().map(Some).chain([None]) {
                for specific in states.iter().map(Some).chain([None]) {
                    let mut grants = Vec::new();
                    if let Some(&(active, exp)) = global {
                        grants.push(grant(GrantScope::Global, active, exp));
                    }
                    if let Some(&(active, exp)) = specific {
                        grants.push(grant(GrantScope::Lesson(lesson(1)), active, exp));
                    }
                    let expected = staff || grants.iter().any(|g| g.is_valid_at(now));
                    assert_eq!(
                        can_access(viewer(staff), lesson(1), &grants, now),
                        expected,
                        "staff={staff} global={global:?} specific={specific:?}"
                    );
                }
            }
        }
    }
}
