//! In-memory adapter for tests and prototyping.
//!
//! Enforces the same uniqueness and cascade rules as the `SQLite` schema so
//! service tests exercise realistic behaviour.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lessons_core::access;
use lessons_core::model::{
    AccessGrant, Category, CategoryId, GrantId, GrantScope, Lesson, LessonId, NewCategory,
    NewGrant, NewLesson, ProgressId, ProgressRecord, User, UserId, Viewer,
};

use crate::repository::{
    CategoryRepository, GrantEntry, GrantRepository, LessonQuery, LessonRepository,
    NewUserRecord, ProgressRepository, SessionRepository, StorageError, UserCredentials,
    UserRepository,
};

#[derive(Default)]
struct State {
    next_id: u64,
    users: BTreeMap<UserId, UserCredentials>,
    sessions: HashMap<String, (UserId, DateTime<Utc>)>,
    categories: BTreeMap<CategoryId, Category>,
    lessons: BTreeMap<LessonId, Lesson>,
    grants: BTreeMap<GrantId, AccessGrant>,
    progress: BTreeMap<(UserId, LessonId), ProgressRecord>,
}

impl State {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn drop_lesson(&mut self, lesson_id: LessonId) {
        self.lessons.remove(&lesson_id);
        self.grants
            .retain(|_, g| g.scope() != GrantScope::Lesson(lesson_id));
        self.progress.retain(|(_, l), _| *l != lesson_id);
    }

    fn grant_entries(&self, keep: impl Fn(&AccessGrant) -> bool) -> Vec<GrantEntry> {
        let mut entries: Vec<GrantEntry> = self
            .grants
            .values()
            .filter(|&g| keep(g))
            .map(|g| GrantEntry {
                grant: g.clone(),
                username: self
                    .users
                    .get(&g.user_id())
                    .map(|c| c.user.username.clone())
                    .unwrap_or_default(),
            })
            .collect();
        entries.sort_by(|a, b| {
            b.grant
                .granted_at()
                .cmp(&a.grant.granted_at())
                .then(b.grant.id().cmp(&a.grant.id()))
        });
        entries
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<State>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an existing user as staff. Test setup helper; there is no
    /// promotion flow in the application itself.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist.
    pub fn set_staff(&self, id: UserId, is_staff: bool) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let creds = state.users.get_mut(&id).ok_or(StorageError::NotFound)?;
        creds.user.is_staff = is_staff;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn newest_first(a: &Lesson, b: &Lesson) -> std::cmp::Ordering {
    b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
}

fn rebuild_grant(
    grant: &AccessGrant,
    active: bool,
    expires_at: Option<DateTime<Utc>>,
) -> AccessGrant {
    AccessGrant::from_persisted(
        grant.id(),
        grant.user_id(),
        grant.scope(),
        grant.approved(),
        active,
        expires_at,
        grant.granted_by(),
        grant.granted_at(),
    )
}

fn page<T>(items: Vec<T>, limit: u32, offset: u32) -> Vec<T> {
    items
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect()
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError> {
        let mut state = self.lock()?;
        let clash = state.users.values().any(|c| {
            c.user.username == user.username || c.user.email.eq_ignore_ascii_case(&user.email)
        });
        if clash {
            return Err(StorageError::Conflict);
        }
        let id = UserId::new(state.allocate());
        state.users.insert(
            id,
            UserCredentials {
                user: User {
                    id,
                    username: user.username,
                    email: user.email,
                    first_name: user.first_name,
                    last_name: user.last_name,
                    is_staff: user.is_staff,
                    is_active: true,
                    joined_at: user.joined_at,
                },
                password_hash: user.password_hash,
            },
        );
        Ok(id)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        Ok(self.lock()?.users.get(&id).map(|c| c.user.clone()))
    }

    async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, StorageError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|c| c.user.username == username)
            .cloned())
    }

    async fn username_exists(&self, username: &str) -> Result<bool, StorageError> {
        Ok(self
            .lock()?
            .users
            .values()
            .any(|c| c.user.username == username))
    }

    async fn email_exists(&self, email: &str) -> Result<bool, StorageError> {
        Ok(self
            .lock()?
            .users
            .values()
            .any(|c| c.user.email.eq_ignore_ascii_case(email)))
    }

    async fn search_users(
        &self,
        needle: Option<&str>,
        limit: u32,
    ) -> Result<Vec<User>, StorageError> {
        let needle = needle.map(str::to_lowercase);
        let state = self.lock()?;
        let mut users: Vec<User> = state
            .users
            .values()
            .map(|c| &c.user)
            .filter(|u| !u.is_staff)
            .filter(|u| {
                needle.as_deref().is_none_or(|n| {
                    u.username.to_lowercase().contains(n) || u.email.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(page(users, limit, 0))
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn create_session(
        &self,
        token: &str,
        user_id: UserId,
        _created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if !state.users.contains_key(&user_id) {
            return Err(StorageError::NotFound);
        }
        if state.sessions.contains_key(token) {
            return Err(StorageError::Conflict);
        }
        state
            .sessions
            .insert(token.to_owned(), (user_id, expires_at));
        Ok(())
    }

    async fn session_user(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StorageError> {
        let state = self.lock()?;
        let Some((user_id, expires_at)) = state.sessions.get(token) else {
            return Ok(None);
        };
        if *expires_at <= now {
            return Ok(None);
        }
        Ok(state
            .users
            .get(user_id)
            .map(|c| c.user.clone())
            .filter(|u| u.is_active))
    }

    async fn delete_session(&self, token: &str) -> Result<(), StorageError> {
        self.lock()?.sessions.remove(token);
        Ok(())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut state = self.lock()?;
        let before = state.sessions.len();
        state.sessions.retain(|_, (_, expires_at)| *expires_at > now);
        Ok(u64::try_from(before - state.sessions.len()).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl CategoryRepository for InMemoryRepository {
    async fn insert_category(
        &self,
        category: &NewCategory,
        created_at: DateTime<Utc>,
    ) -> Result<CategoryId, StorageError> {
        let mut state = self.lock()?;
        let id = CategoryId::new(state.allocate());
        state.categories.insert(
            id,
            Category {
                id,
                name: category.name.clone(),
                description: category.description.clone(),
                created_at,
            },
        );
        Ok(id)
    }

    async fn update_category(
        &self,
        id: CategoryId,
        category: &NewCategory,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let existing = state.categories.get_mut(&id).ok_or(StorageError::NotFound)?;
        existing.name.clone_from(&category.name);
        existing.description.clone_from(&category.description);
        Ok(())
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StorageError> {
        Ok(self.lock()?.categories.get(&id).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StorageError> {
        let mut categories: Vec<Category> = self.lock()?.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(categories)
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if state.categories.remove(&id).is_none() {
            return Err(StorageError::NotFound);
        }
        let owned: Vec<LessonId> = state
            .lessons
            .values()
            .filter(|l| l.category_id == id)
            .map(|l| l.id)
            .collect();
        for lesson_id in owned {
            state.drop_lesson(lesson_id);
        }
        Ok(())
    }
}

#[async_trait]
impl LessonRepository for InMemoryRepository {
    async fn insert_lesson(
        &self,
        lesson: &NewLesson,
        now: DateTime<Utc>,
    ) -> Result<LessonId, StorageError> {
        let mut state = self.lock()?;
        if !state.categories.contains_key(&lesson.category_id) {
            return Err(StorageError::NotFound);
        }
        let id = LessonId::new(state.allocate());
        state.lessons.insert(
            id,
            Lesson {
                id,
                category_id: lesson.category_id,
                title: lesson.title.clone(),
                description: lesson.description.clone(),
                video_ref: lesson.video_ref.clone(),
                thumbnail_ref: lesson.thumbnail_ref.clone(),
                duration_secs: lesson.duration_secs,
                is_active: lesson.is_active,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn update_lesson(
        &self,
        id: LessonId,
        lesson: &NewLesson,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if !state.categories.contains_key(&lesson.category_id) {
            return Err(StorageError::NotFound);
        }
        let existing = state.lessons.get_mut(&id).ok_or(StorageError::NotFound)?;
        existing.category_id = lesson.category_id;
        existing.title.clone_from(&lesson.title);
        existing.description.clone_from(&lesson.description);
        existing.video_ref.clone_from(&lesson.video_ref);
        existing.thumbnail_ref.clone_from(&lesson.thumbnail_ref);
        existing.duration_secs = lesson.duration_secs;
        existing.is_active = lesson.is_active;
        existing.updated_at = now;
        Ok(())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        Ok(self.lock()?.lessons.get(&id).cloned())
    }

    async fn list_lessons(&self, limit: u32, offset: u32) -> Result<Vec<Lesson>, StorageError> {
        let mut lessons: Vec<Lesson> = self.lock()?.lessons.values().cloned().collect();
        lessons.sort_by(newest_first);
        Ok(page(lessons, limit, offset))
    }

    async fn visible_lessons(
        &self,
        viewer: Viewer,
        now: DateTime<Utc>,
        query: LessonQuery,
    ) -> Result<Vec<Lesson>, StorageError> {
        let state = self.lock()?;
        let grants: Vec<&AccessGrant> = state
            .grants
            .values()
            .filter(|g| g.user_id() == viewer.user_id)
            .collect();
        let mut lessons: Vec<Lesson> = state
            .lessons
            .values()
            .filter(|l| l.is_active)
            .filter(|l| query.category.is_none_or(|c| l.category_id == c))
            .filter(|l| access::can_access(viewer, l.id, grants.iter().copied(), now))
            .cloned()
            .collect();
        lessons.sort_by(newest_first);
        Ok(page(lessons, query.limit, query.offset))
    }
}

#[async_trait]
impl GrantRepository for InMemoryRepository {
    async fn insert_grant(&self, grant: &NewGrant) -> Result<GrantId, StorageError> {
        let mut state = self.lock()?;
        if !state.users.contains_key(&grant.user_id) {
            return Err(StorageError::NotFound);
        }
        if let GrantScope::Lesson(lesson_id) = grant.scope {
            if !state.lessons.contains_key(&lesson_id) {
                return Err(StorageError::NotFound);
            }
        }
        let duplicate = state
            .grants
            .values()
            .any(|g| g.user_id() == grant.user_id && g.scope() == grant.scope);
        if duplicate {
            return Err(StorageError::Conflict);
        }
        let id = GrantId::new(state.allocate());
        state.grants.insert(
            id,
            AccessGrant::from_persisted(
                id,
                grant.user_id,
                grant.scope,
                true,
                true,
                grant.expires_at,
                Some(grant.granted_by),
                grant.granted_at,
            ),
        );
        Ok(id)
    }

    async fn get_grant(&self, id: GrantId) -> Result<Option<AccessGrant>, StorageError> {
        Ok(self.lock()?.grants.get(&id).cloned())
    }

    async fn grants_for_user(&self, user_id: UserId) -> Result<Vec<AccessGrant>, StorageError> {
        Ok(self
            .lock()?
            .grants
            .values()
            .filter(|g| g.user_id() == user_id)
            .cloned()
            .collect())
    }

    async fn grants_for_lesson(
        &self,
        lesson_id: LessonId,
    ) -> Result<Vec<GrantEntry>, StorageError> {
        let state = self.lock()?;
        Ok(state.grant_entries(|g| g.scope() == GrantScope::Lesson(lesson_id)))
    }

    async fn global_grants(&self) -> Result<Vec<GrantEntry>, StorageError> {
        let state = self.lock()?;
        Ok(state.grant_entries(|g| g.scope() == GrantScope::Global))
    }

    async fn set_grant_active(&self, id: GrantId, active: bool) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let grant = state.grants.get_mut(&id).ok_or(StorageError::NotFound)?;
        *grant = rebuild_grant(grant, active, grant.expires_at());
        Ok(())
    }

    async fn reactivate_grant(
        &self,
        id: GrantId,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let grant = state.grants.get_mut(&id).ok_or(StorageError::NotFound)?;
        *grant = rebuild_grant(grant, true, expires_at);
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_or_create_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError> {
        let mut state = self.lock()?;
        if let Some(existing) = state.progress.get(&(user_id, lesson_id)) {
            return Ok(existing.clone());
        }
        if !state.users.contains_key(&user_id) || !state.lessons.contains_key(&lesson_id) {
            return Err(StorageError::NotFound);
        }
        let id = ProgressId::new(state.allocate());
        let record = ProgressRecord::started(id, user_id, lesson_id, now);
        state.progress.insert((user_id, lesson_id), record.clone());
        Ok(record)
    }

    async fn save_progress(&self, progress: &ProgressRecord) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let key = (progress.user_id(), progress.lesson_id());
        match state.progress.get_mut(&key) {
            Some(existing) if existing.id() == progress.id() => {
                *existing = progress.clone();
                Ok(())
            }
            _ => Err(StorageError::NotFound),
        }
    }

    async fn progress_for_lessons(
        &self,
        user_id: UserId,
        lessons: &[LessonId],
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let state = self.lock()?;
        Ok(lessons
            .iter()
            .filter_map(|l| state.progress.get(&(user_id, *l)).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lessons_core::time::fixed_now;

    async fn seed_lesson(repo: &InMemoryRepository) -> (UserId, LessonId) {
        let user = repo
            .insert_user(NewUserRecord {
                username: "viewer".into(),
                email: "viewer@example.com".into(),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: "x".into(),
                is_staff: false,
                joined_at: fixed_now(),
            })
            .await
            .unwrap();
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
        let lesson = repo
            .insert_lesson(
                &NewLesson {
                    category_id: category,
                    title: "Intro".into(),
                    description: "d".into(),
                    video_ref: "v.mp4".into(),
                    thumbnail_ref: None,
                    duration_secs: 600,
                    is_active: true,
                },
                fixed_now(),
            )
            .await
            .unwrap();
        (user, lesson)
    }

    #[tokio::test]
    async fn duplicate_grant_is_rejected() {
        let repo = InMemoryRepository::new();
        let (user, lesson) = seed_lesson(&repo).await;
        let grant = NewGrant {
            user_id: user,
            scope: GrantScope::Lesson(lesson),
            expires_at: None,
            granted_by: user,
            granted_at: fixed_now(),
        };
        repo.insert_grant(&grant).await.unwrap();
        let err = repo.insert_grant(&grant).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));

        let global = NewGrant {
            scope: GrantScope::Global,
            ..grant
        };
        repo.insert_grant(&global).await.unwrap();
        assert!(matches!(
            repo.insert_grant(&global).await.unwrap_err(),
            StorageError::Conflict
        ));
    }

    #[tokio::test]
    async fn get_or_create_returns_existing_row() {
        let repo = InMemoryRepository::new();
        let (user, lesson) = seed_lesson(&repo).await;
        let first = repo
            .get_or_create_progress(user, lesson, fixed_now())
            .await
            .unwrap();
        let second = repo
            .get_or_create_progress(user, lesson, fixed_now() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn deleting_category_cascades() {
        let repo = InMemoryRepository::new();
        let (user, lesson) = seed_lesson(&repo).await;
        let category = repo.get_lesson(lesson).await.unwrap().unwrap().category_id;
        repo.get_or_create_progress(user, lesson, fixed_now())
            .await
            .unwrap();
        repo.delete_category(category).await.unwrap();
        assert!(repo.get_lesson(lesson).await.unwrap().is_none());
        assert!(
            repo.progress_for_lessons(user, &[lesson])
                .await
                .unwrap()
                .is_empty()
        );
    }
}
