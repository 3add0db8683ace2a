//! Staff capability gate.
//!
//! Administrative operations take a `&Staff`, which can only be obtained by
//! checking a user, so an unchecked caller cannot reach them.

use lessons_core::model::{User, UserId};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("staff access required")]
pub struct NotStaff;

/// Proof that the acting user is active staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Staff {
    user_id: UserId,
}

impl Staff {
    /// # Errors
    ///
    /// Returns `NotStaff` unless the user is active and flagged as staff.
    pub fn verify(user: &User) -> Result<Self, NotStaff> {
        if user.is_staff && user.is_active {
            Ok(Self { user_id: user.id })
        } else {
            Err(NotStaff)
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}
