use std::sync::Arc;

use lessons_core::model::{Category, CategoryDraft, CategoryId, Lesson, LessonDraft, LessonId};
use storage::repository::{CategoryRepository, LessonRepository, StorageError};

use crate::Clock;
use crate::error::CatalogServiceError;
use crate::gate::Staff;

/// Page size of the staff lesson table.
pub const ADMIN_PAGE_SIZE: u32 = 20;

/// Staff-maintained categories and lessons.
#[derive(Clone)]
pub struct CatalogService {
    clock: Clock,
    categories: Arc<dyn CategoryRepository>,
    lessons: Arc<dyn LessonRepository>,
}

impl CatalogService {
    #[must_use]
    pub fn new(
        clock: Clock,
        categories: Arc<dyn CategoryRepository>,
        lessons: Arc<dyn LessonRepository>,
    ) -> Self {
        Self {
            clock,
            categories,
            lessons,
        }
    }

    /// All categories ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` if repository access fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, CatalogServiceError> {
        let categories = self.categories.list_categories().await?;
        Ok(categories)
    }

    /// # Errors
    ///
    /// Returns `CatalogServiceError::Category` for validation failures.
    /// Returns `CatalogServiceError::Storage` if persistence fails.
    pub async fn create_category(
        &self,
        _staff: &Staff,
        draft: CategoryDraft,
    ) -> Result<CategoryId, CatalogServiceError> {
        let category = draft.validate()?;
        let id = self
            .categories
            .insert_category(&category, self.clock.now())
            .await?;
        tracing::info!(category = id.value(), name = %category.name, "category created");
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns `CatalogServiceError::CategoryNotFound` if the category does not exist.
    pub async fn update_category(
        &self,
        _staff: &Staff,
        id: CategoryId,
        draft: CategoryDraft,
    ) -> Result<(), CatalogServiceError> {
        let category = draft.validate()?;
        self.categories
            .update_category(id, &category)
            .await
            .map_err(category_not_found)
    }

    /// Delete a category with all of its lessons.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::CategoryNotFound` if the category does not exist.
    pub async fn delete_category(
        &self,
        _staff: &Staff,
        id: CategoryId,
    ) -> Result<(), CatalogServiceError> {
        self.categories
            .delete_category(id)
            .await
            .map_err(category_not_found)?;
        tracing::info!(category = id.value(), "category deleted");
        Ok(())
    }

    /// Fetch a lesson by ID regardless of its active flag.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` if repository access fails.
    pub async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, CatalogServiceError> {
        let lesson = self.lessons.get_lesson(id).await?;
        Ok(lesson)
    }

    /// One page of every lesson, active or not, newest first. Pages start at 1.
    ///
    /// # Errors
    ///
    /// Returns `CatalogServiceError::Storage` if repository access fails.
    pub async fn admin_lessons(
        &self,
        _staff: &Staff,
        page: u32,
    ) -> Result<Vec<Lesson>, CatalogServiceError> {
        let offset = page.saturating_sub(1).saturating_mul(ADMIN_PAGE_SIZE);
        let lessons = self.lessons.list_lessons(ADMIN_PAGE_SIZE, offset).await?;
        Ok(lessons)
    }

    /// # Errors
    ///
    /// Returns `CatalogServiceError::Lesson` for validation failures and
    /// `CatalogServiceError::CategoryNotFound` for an unknown category.
    pub async fn create_lesson(
        &self,
        _staff: &Staff,
        draft: LessonDraft,
    ) -> Result<LessonId, CatalogServiceError> {
        let lesson = draft.validate()?;
        let id = self
            .lessons
            .insert_lesson(&lesson, self.clock.now())
            .await
            .map_err(category_not_found)?;
        tracing::info!(lesson = id.value(), title = %lesson.title, "lesson created");
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns `CatalogServiceError::Lesson` for validation failures,
    /// `LessonNotFound` or `CategoryNotFound` for missing targets.
    pub async fn update_lesson(
        &self,
        _staff: &Staff,
        id: LessonId,
        draft: LessonDraft,
    ) -> Result<(), CatalogServiceError> {
        let lesson = draft.validate()?;
        if self.lessons.get_lesson(id).await?.is_none() {
            return Err(CatalogServiceError::LessonNotFound);
        }
        self.lessons
            .update_lesson(id, &lesson, self.clock.now())
            .await
            .map_err(category_not_found)?;
        tracing::info!(lesson = id.value(), active = lesson.is_active, "lesson updated");
        Ok(())
    }
}

fn category_not_found(e: StorageError) -> CatalogServiceError {
    match e {
        StorageError::NotFound => CatalogServiceError::CategoryNotFound,
        other => other.into(),
    }
}
