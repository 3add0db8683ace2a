use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::FieldError;
use crate::model::ids::UserId;

const MAX_USERNAME_CHARS: usize = 150;
const MAX_NAME_CHARS: usize = 30;
const MIN_PASSWORD_CHARS: usize = 8;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistrationError {
    #[error("username is required")]
    EmptyUsername,

    #[error("username may contain only letters, digits and @/./+/-/_ (at most {MAX_USERNAME_CHARS})")]
    InvalidUsername,

    #[error("a user with that username already exists")]
    UsernameTaken,

    #[error("enter a valid email address")]
    InvalidEmail,

    #[error("a user with this email already exists")]
    EmailTaken,

    #[error("first name must be at most {MAX_NAME_CHARS} characters")]
    FirstNameTooLong,

    #[error("last name must be at most {MAX_NAME_CHARS} characters")]
    LastNameTooLong,

    #[error("password must contain at least {MIN_PASSWORD_CHARS} characters")]
    PasswordTooShort,

    #[error("password cannot be entirely numeric")]
    PasswordNumeric,

    #[error("the two password fields didn't match")]
    PasswordMismatch,
}

impl FieldError for RegistrationError {
    fn field(&self) -> &'static str {
        match self {
            RegistrationError::EmptyUsername
            | RegistrationError::InvalidUsername
            | RegistrationError::UsernameTaken => "username",
            RegistrationError::InvalidEmail | RegistrationError::EmailTaken => "email",
            RegistrationError::FirstNameTooLong => "first_name",
            RegistrationError::LastNameTooLong => "last_name",
            RegistrationError::PasswordTooShort | RegistrationError::PasswordNumeric => "password1",
            RegistrationError::PasswordMismatch => "password2",
        }
    }
}

//
// ─── USER ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn viewer(&self) -> Viewer {
        Viewer {
            user_id: self.id,
            is_staff: self.is_staff,
        }
    }
}

/// The part of a user the access evaluator looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: UserId,
    pub is_staff: bool,
}

//
// ─── REGISTRATION ──────────────────────────────────────────────────────────────
//

/// Registration form input. Passwords are plain text here and are hashed by
/// the account service; uniqueness is checked against storage there as well.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationDraft {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password1: String,
    pub password2: String,
}

/// Registration input that passed shape validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl RegistrationDraft {
    /// Validate field shapes.
    ///
    /// # Errors
    ///
    /// Returns the first `RegistrationError` in form order.
    pub fn validate(self) -> Result<NewUser, RegistrationError> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(RegistrationError::EmptyUsername);
        }
        if username.chars().count() > MAX_USERNAME_CHARS
            || !username.chars().all(is_username_char)
        {
            return Err(RegistrationError::InvalidUsername);
        }

        let email = self.email.trim();
        if !is_plausible_email(email) {
            return Err(RegistrationError::InvalidEmail);
        }

        let first_name = self.first_name.trim();
        if first_name.chars().count() > MAX_NAME_CHARS {
            return Err(RegistrationError::FirstNameTooLong);
        }
        let last_name = self.last_name.trim();
        if last_name.chars().count() > MAX_NAME_CHARS {
            return Err(RegistrationError::LastNameTooLong);
        }

        if self.password1.chars().count() < MIN_PASSWORD_CHARS {
            return Err(RegistrationError::PasswordTooShort);
        }
        if self.password1.chars().all(|c| c.is_ascii_digit()) {
            return Err(RegistrationError::PasswordNumeric);
        }
        if self.password1 != self.password2 {
            return Err(RegistrationError::PasswordMismatch);
        }

        Ok(NewUser {
            username: username.to_owned(),
            email: email.to_owned(),
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
            password: self.password1,
        })
    }
}

fn is_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_')
}

fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}
