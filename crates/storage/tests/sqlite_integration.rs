use chrono::Duration;
use lessons_core::access::can_access;
use lessons_core::model::{
    CategoryId, GrantId, GrantScope, LessonId, NewCategory, NewGrant, NewLesson, UserId, Viewer,
};
use lessons_core::time::fixed_now;
use storage::repository::{
    CategoryRepository, GrantRepository, LessonQuery, LessonRepository, NewUserRecord,
    ProgressRepository, SessionRepository, StorageError, UserRepository,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn user_record(username: &str, is_staff: bool) -> NewUserRecord {
    NewUserRecord {
        username: username.into(),
        email: format!("{username}@example.com"),
        first_name: String::new(),
        last_name: String::new(),
        password_hash: "hash".into(),
        is_staff,
        joined_at: fixed_now(),
    }
}

async fn category(repo: &SqliteRepository, name: &str) -> CategoryId {
    repo.insert_category(
        &NewCategory {
            name: name.into(),
            description: String::new(),
        },
        fixed_now(),
    )
    .await
    .unwrap()
}

async fn lesson(
    repo: &SqliteRepository,
    category_id: CategoryId,
    title: &str,
    is_active: bool,
    minutes_after: i64,
) -> LessonId {
    repo.insert_lesson(
        &NewLesson {
            category_id,
            title: title.into(),
            description: "about".into(),
            video_ref: format!("{title}.mp4"),
            thumbnail_ref: None,
            duration_secs: 600,
            is_active,
        },
        fixed_now() + Duration::minutes(minutes_after),
    )
    .await
    .unwrap()
}

fn grant(user_id: UserId, scope: GrantScope, granted_by: UserId) -> NewGrant {
    NewGrant {
        user_id,
        scope,
        expires_at: None,
        granted_by,
        granted_at: fixed_now(),
    }
}

#[tokio::test]
async fn usernames_and_emails_are_unique() {
    let repo = connect("memdb_unique_users").await;
    repo.insert_user(user_record("anna", false)).await.unwrap();

    let err = repo.insert_user(user_record("anna", false)).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let mut shouty = user_record("anna2", false);
    shouty.email = "ANNA@example.com".into();
    let err = repo.insert_user(shouty).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    assert!(repo.username_exists("anna").await.unwrap());
    assert!(repo.email_exists("Anna@Example.com").await.unwrap());
    assert!(!repo.email_exists("bob@example.com").await.unwrap());
}

#[tokio::test]
async fn one_grant_per_user_and_scope() {
    let repo = connect("memdb_unique_grants").await;
    let staff = repo.insert_user(user_record("staff", true)).await.unwrap();
    let viewer = repo.insert_user(user_record("viewer", false)).await.unwrap();
    let cat = category(&repo, "Basics").await;
    let l1 = lesson(&repo, cat, "one", true, 0).await;

    repo.insert_grant(&grant(viewer, GrantScope::Lesson(l1), staff))
        .await
        .unwrap();
    let err = repo
        .insert_grant(&grant(viewer, GrantScope::Lesson(l1), staff))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    repo.insert_grant(&grant(viewer, GrantScope::Global, staff))
        .await
        .unwrap();
    let err = repo
        .insert_grant(&grant(viewer, GrantScope::Global, staff))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let err = repo
        .insert_grant(&grant(viewer, GrantScope::Lesson(LessonId::new(999)), staff))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn visible_lessons_agrees_with_access_rule() {
    let repo = connect("memdb_visible").await;
    let staff_id = repo.insert_user(user_record("staff", true)).await.unwrap();
    let viewer_id = repo.insert_user(user_record("viewer", false)).await.unwrap();
    let cat = category(&repo, "Basics").await;
    let open = lesson(&repo, cat, "open", true, 0).await;
    let expired = lesson(&repo, cat, "expired", true, 1).await;
    let revoked = lesson(&repo, cat, "revoked", true, 2).await;
    let hidden = lesson(&repo, cat, "hidden", false, 3).await;
    let _ungranted = lesson(&repo, cat, "ungranted", true, 4).await;

    repo.insert_grant(&grant(viewer_id, GrantScope::Lesson(open), staff_id))
        .await
        .unwrap();
    let mut stale = grant(viewer_id, GrantScope::Lesson(expired), staff_id);
    stale.expires_at = Some(fixed_now() - Duration::hours(1));
    repo.insert_grant(&stale).await.unwrap();
    let gone = repo
        .insert_grant(&grant(viewer_id, GrantScope::Lesson(revoked), staff_id))
        .await
        .unwrap();
    repo.set_grant_active(gone, false).await.unwrap();
    repo.insert_grant(&grant(viewer_id, GrantScope::Lesson(hidden), staff_id))
        .await
        .unwrap();

    let viewer = Viewer {
        user_id: viewer_id,
        is_staff: false,
    };
    let now = fixed_now();
    let visible = repo
        .visible_lessons(viewer, now, LessonQuery::page(50, 0))
        .await
        .unwrap();
    assert_eq!(visible.iter().map(|l| l.id).collect::<Vec<_>>(), vec![open]);

    let grants = repo.grants_for_user(viewer_id).await.unwrap();
    for lesson in repo.list_lessons(50, 0).await.unwrap() {
        let listed = visible.iter().any(|l| l.id == lesson.id);
        let allowed = lesson.is_active && can_access(viewer, lesson.id, &grants, now);
        assert_eq!(listed, allowed, "{}", lesson.title);
    }

    let staff = Viewer {
        user_id: staff_id,
        is_staff: true,
    };
    let all = repo
        .visible_lessons(staff, now, LessonQuery::page(50, 0))
        .await
        .unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all[0].title, "ungranted");
}

#[tokio::test]
async fn global_grant_and_expiry_boundary() {
    let repo = connect("memdb_global").await;
    let staff = repo.insert_user(user_record("staff", true)).await.unwrap();
    let viewer_id = repo.insert_user(user_record("viewer", false)).await.unwrap();
    let cat = category(&repo, "Basics").await;
    let other = category(&repo, "Advanced").await;
    lesson(&repo, cat, "a", true, 0).await;
    lesson(&repo, cat, "b", true, 1).await;
    lesson(&repo, other, "c", true, 2).await;

    let mut global = grant(viewer_id, GrantScope::Global, staff);
    global.expires_at = Some(fixed_now() + Duration::days(1));
    repo.insert_grant(&global).await.unwrap();

    let viewer = Viewer {
        user_id: viewer_id,
        is_staff: false,
    };
    let before = repo
        .visible_lessons(viewer, fixed_now(), LessonQuery::page(50, 0))
        .await
        .unwrap();
    assert_eq!(before.len(), 3);

    let filtered = repo
        .visible_lessons(
            viewer,
            fixed_now(),
            LessonQuery::page(50, 0).in_category(Some(other)),
        )
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].title, "c");

    let paged = repo
        .visible_lessons(viewer, fixed_now(), LessonQuery::page(2, 2))
        .await
        .unwrap();
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].title, "a");

    let at_expiry = repo
        .visible_lessons(
            viewer,
            fixed_now() + Duration::days(1),
            LessonQuery::page(50, 0),
        )
        .await
        .unwrap();
    assert!(at_expiry.is_empty());
}

#[tokio::test]
async fn progress_is_created_once_and_saved() {
    let repo = connect("memdb_progress").await;
    let viewer = repo.insert_user(user_record("viewer", false)).await.unwrap();
    let cat = category(&repo, "Basics").await;
    let l1 = lesson(&repo, cat, "one", true, 0).await;

    let mut first = repo
        .get_or_create_progress(viewer, l1, fixed_now())
        .await
        .unwrap();
    let again = repo
        .get_or_create_progress(viewer, l1, fixed_now() + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(first, again);

    first.record_watch(560, 600, fixed_now() + Duration::minutes(10));
    repo.save_progress(&first).await.unwrap();

    let stored = repo.progress_for_lessons(viewer, &[l1]).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].watched_seconds(), 560);
    assert!(stored[0].is_completed());
    assert_eq!(stored[0].last_watched_at(), fixed_now() + Duration::minutes(10));
}

#[tokio::test]
async fn deleting_category_removes_lessons_grants_and_progress() {
    let repo = connect("memdb_cascade").await;
    let staff = repo.insert_user(user_record("staff", true)).await.unwrap();
    let viewer = repo.insert_user(user_record("viewer", false)).await.unwrap();
    let cat = category(&repo, "Basics").await;
    let l1 = lesson(&repo, cat, "one", true, 0).await;
    let g = repo
        .insert_grant(&grant(viewer, GrantScope::Lesson(l1), staff))
        .await
        .unwrap();
    repo.get_or_create_progress(viewer, l1, fixed_now())
        .await
        .unwrap();

    repo.delete_category(cat).await.unwrap();

    assert!(repo.get_lesson(l1).await.unwrap().is_none());
    assert!(repo.get_grant(g).await.unwrap().is_none());
    assert!(repo.progress_for_lessons(viewer, &[l1]).await.unwrap().is_empty());
    assert!(matches!(
        repo.delete_category(cat).await.unwrap_err(),
        StorageError::NotFound
    ));
}

#[tokio::test]
async fn sessions_expire_and_can_be_deleted() {
    let repo = connect("memdb_sessions").await;
    let viewer = repo.insert_user(user_record("viewer", false)).await.unwrap();
    let expires = fixed_now() + Duration::hours(2);
    repo.create_session("tok", viewer, fixed_now(), expires)
        .await
        .unwrap();

    let user = repo.session_user("tok", fixed_now()).await.unwrap();
    assert_eq!(user.map(|u| u.id), Some(viewer));
    assert!(repo.session_user("tok", expires).await.unwrap().is_none());
    assert!(repo.session_user("nope", fixed_now()).await.unwrap().is_none());

    repo.delete_session("tok").await.unwrap();
    assert!(repo.session_user("tok", fixed_now()).await.unwrap().is_none());
}

#[tokio::test]
async fn expired_sessions_are_purged() {
    let repo = connect("memdb_session_purge").await;
    let viewer = repo.insert_user(user_record("viewer", false)).await.unwrap();
    repo.create_session("old", viewer, fixed_now(), fixed_now() + Duration::hours(1))
        .await
        .unwrap();
    repo.create_session("new", viewer, fixed_now(), fixed_now() + Duration::hours(3))
        .await
        .unwrap();

    let later = fixed_now() + Duration::hours(1);
    assert_eq!(repo.delete_expired_sessions(later).await.unwrap(), 1);
    assert_eq!(repo.delete_expired_sessions(later).await.unwrap(), 0);
    assert!(repo.session_user("new", later).await.unwrap().is_some());
}

#[tokio::test]
async fn global_grants_are_listed_and_can_be_reactivated() {
    let repo = connect("memdb_global_listing").await;
    let staff = repo.insert_user(user_record("staff", true)).await.unwrap();
    let viewer = repo.insert_user(user_record("viewer", false)).await.unwrap();
    let cat = category(&repo, "Basics").await;
    let l1 = lesson(&repo, cat, "one", true, 0).await;

    repo.insert_grant(&grant(viewer, GrantScope::Lesson(l1), staff))
        .await
        .unwrap();
    let global = repo
        .insert_grant(&grant(viewer, GrantScope::Global, staff))
        .await
        .unwrap();

    let listed = repo.global_grants().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].grant.id(), global);
    assert_eq!(listed[0].username, "viewer");

    repo.set_grant_active(global, false).await.unwrap();
    let expiry = fixed_now() + Duration::days(7);
    repo.reactivate_grant(global, Some(expiry)).await.unwrap();
    let restored = repo.get_grant(global).await.unwrap().unwrap();
    assert!(restored.is_active());
    assert_eq!(restored.expires_at(), Some(expiry));

    let err = repo
        .reactivate_grant(GrantId::new(999), None)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn search_skips_staff_and_matches_email() {
    let repo = connect("memdb_search").await;
    repo.insert_user(user_record("staffer", true)).await.unwrap();
    repo.insert_user(user_record("anna", false)).await.unwrap();
    repo.insert_user(user_record("bob", false)).await.unwrap();

    let all = repo.search_users(None, 50).await.unwrap();
    assert_eq!(
        all.iter().map(|u| u.username.as_str()).collect::<Vec<_>>(),
        vec!["anna", "bob"]
    );

    let by_email = repo.search_users(Some("BOB@EX"), 50).await.unwrap();
    assert_eq!(by_email.len(), 1);
    assert_eq!(by_email[0].username, "bob");

    let none = repo.search_users(Some("staff"), 50).await.unwrap();
    assert!(none.is_empty());
}
