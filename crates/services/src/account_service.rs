use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use lessons_core::model::{RegistrationDraft, RegistrationError, User};
use storage::repository::{NewUserRecord, SessionRepository, StorageError, UserRepository};
use uuid::Uuid;

use crate::Clock;
use crate::error::AccountServiceError;
use crate::gate::Staff;
use crate::password::{hash_password, verify_password};

/// Results returned by the staff user search.
pub const USER_SEARCH_LIMIT: u32 = 50;

/// A freshly opened login session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSession {
    pub token: String,
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

/// Registration, login sessions and user lookup.
#[derive(Clone)]
pub struct AccountService {
    clock: Clock,
    session_ttl: Duration,
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
}

impl AccountService {
    #[must_use]
    pub fn new(
        clock: Clock,
        session_ttl: Duration,
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            clock,
            session_ttl,
            users,
            sessions,
        }
    }

    /// Register a regular (non-staff) account.
    ///
    /// # Errors
    ///
    /// Returns `AccountServiceError::Registration` for invalid or taken fields.
    pub async fn register(&self, draft: RegistrationDraft) -> Result<User, AccountServiceError> {
        let user = self.create_account(draft, false).await?;
        tracing::info!(user = user.id.value(), username = %user.username, "account registered");
        Ok(user)
    }

    /// Create a staff account. Used to bootstrap a fresh database.
    ///
    /// # Errors
    ///
    /// Same as [`AccountService::register`].
    pub async fn create_staff(&self, draft: RegistrationDraft) -> Result<User, AccountServiceError> {
        let user = self.create_account(draft, true).await?;
        tracing::info!(user = user.id.value(), username = %user.username, "staff account created");
        Ok(user)
    }

    async fn create_account(
        &self,
        draft: RegistrationDraft,
        is_staff: bool,
    ) -> Result<User, AccountServiceError> {
        let new_user = draft.validate()?;
        if self.users.username_exists(&new_user.username).await? {
            return Err(RegistrationError::UsernameTaken.into());
        }
        if self.users.email_exists(&new_user.email).await? {
            return Err(RegistrationError::EmailTaken.into());
        }

        let record = NewUserRecord {
            password_hash: hash_password(&new_user.password)?,
            username: new_user.username,
            email: new_user.email,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            is_staff,
            joined_at: self.clock.now(),
        };
        let email = record.email.clone();
        let id = match self.users.insert_user(record).await {
            Ok(id) => id,
            // Lost a race with a concurrent registration.
            Err(StorageError::Conflict) => {
                let taken = if self.users.email_exists(&email).await? {
                    RegistrationError::EmailTaken
                } else {
                    RegistrationError::UsernameTaken
                };
                return Err(taken.into());
            }
            Err(e) => return Err(e.into()),
        };

        self.users
            .get_user(id)
            .await?
            .ok_or_else(|| StorageError::NotFound.into())
    }

    /// Verify credentials and open a session.
    ///
    /// # Errors
    ///
    /// Returns `AccountServiceError::InvalidCredentials` for an unknown user,
    /// a wrong password or a deactivated account.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginSession, AccountServiceError> {
        let Some(credentials) = self.users.find_credentials(username.trim()).await? else {
            tracing::debug!(username, "login for unknown user");
            return Err(AccountServiceError::InvalidCredentials);
        };
        if !credentials.user.is_active || !verify_password(password, &credentials.password_hash)? {
            tracing::debug!(username, "login rejected");
            return Err(AccountServiceError::InvalidCredentials);
        }

        let now = self.clock.now();
        let purged = self.sessions.delete_expired_sessions(now).await?;
        if purged > 0 {
            tracing::debug!(purged, "expired sessions removed");
        }
        let token = Uuid::new_v4().simple().to_string();
        let expires_at = now + self.session_ttl;
        self.sessions
            .create_session(&token, credentials.user.id, now, expires_at)
            .await?;
        tracing::info!(user = credentials.user.id.value(), "logged in");

        Ok(LoginSession {
            token,
            user: credentials.user,
            expires_at,
        })
    }

    /// # Errors
    ///
    /// Returns `AccountServiceError::Storage` if the session cannot be deleted.
    pub async fn logout(&self, token: &str) -> Result<(), AccountServiceError> {
        self.sessions.delete_session(token).await?;
        Ok(())
    }

    /// Resolve a session token to its user. Expired or unknown tokens and
    /// deactivated users yield `None`.
    ///
    /// # Errors
    ///
    /// Returns `AccountServiceError::Storage` if the lookup fails.
    pub async fn authenticate(&self, token: &str) -> Result<Option<User>, AccountServiceError> {
        let user = self.sessions.session_user(token, self.clock.now()).await?;
        Ok(user)
    }

    /// Non-staff users whose username or email contains `needle`.
    ///
    /// # Errors
    ///
    /// Returns `AccountServiceError::Storage` if the query fails.
    pub async fn search_users(
        &self,
        _staff: &Staff,
        needle: Option<&str>,
    ) -> Result<Vec<User>, AccountServiceError> {
        let needle = needle.map(str::trim).filter(|n| !n.is_empty());
        let users = self.users.search_users(needle, USER_SEARCH_LIMIT).await?;
        Ok(users)
    }
}
