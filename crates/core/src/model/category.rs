use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::FieldError;
use crate::model::ids::CategoryId;

const MAX_NAME_CHARS: usize = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CategoryError {
    #[error("category name cannot be empty")]
    EmptyName,

    #[error("category name must be at most {MAX_NAME_CHARS} characters")]
    NameTooLong,
}

impl FieldError for CategoryError {
    fn field(&self) -> &'static str {
        match self {
            CategoryError::EmptyName | CategoryError::NameTooLong => "name",
        }
    }
}

/// A grouping of lessons. Deleting a category deletes its lessons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Unvalidated category input as submitted by staff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryDraft {
    pub name: String,
    pub description: String,
}

/// Category input that passed validation and is ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub description: String,
}

impl CategoryDraft {
    /// Validate the draft.
    ///
    /// # Errors
    ///
    /// Returns `CategoryError` if the name is blank or too long.
    pub fn validate(self) -> Result<NewCategory, CategoryError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CategoryError::EmptyName);
        }
        if name.chars().count() > MAX_NAME_CHARS {
            return Err(CategoryError::NameTooLong);
        }
        Ok(NewCategory {
            name: name.to_owned(),
            description: self.description.trim().to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_name_and_description() {
        let draft = CategoryDraft {
            name: "  Basics ".into(),
            description: " intro ".into(),
        };
        let valid = draft.validate().unwrap();
        assert_eq!(valid.name, "Basics");
        assert_eq!(valid.description, "intro");
    }

    #[test]
    fn rejects_blank_name() {
        let err = CategoryDraft::default().validate().unwrap_err();
        assert_eq!(err, CategoryError::EmptyName);
        assert_eq!(err.field(), "name");
    }

    #[test]
    fn rejects_long_name() {
        let draft = CategoryDraft {
            name: "x".repeat(101),
            description: String::new(),
        };
        assert_eq!(draft.validate().unwrap_err(), CategoryError::NameTooLong);
    }
}
