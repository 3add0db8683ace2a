use chrono::{DateTime, Utc};
use lessons_core::model::{Category, CategoryId, NewCategory};

use super::SqliteRepository;
use super::mapping::{category_id_from_i64, db_err, id_to_i64, map_category_row};
use crate::repository::{CategoryRepository, StorageError};

#[async_trait::async_trait]
impl CategoryRepository for SqliteRepository {
    async fn insert_category(
        &self,
        category: &NewCategory,
        created_at: DateTime<Utc>,
    ) -> Result<CategoryId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO categories (name, description, created_at)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(&category.name)
        .bind(&category.description)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        category_id_from_i64(res.last_insert_rowid())
    }

    async fn update_category(
        &self,
        id: CategoryId,
        category: &NewCategory,
    ) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE categories SET name = ?1, description = ?2 WHERE id = ?3")
            .bind(&category.name)
            .bind(&category.description)
            .bind(id_to_i64("category_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StorageError> {
        let row =
            sqlx::query("SELECT id, name, description, created_at FROM categories WHERE id = ?1")
                .bind(id_to_i64("category_id", id.value())?)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        row.as_ref().map(map_category_row).transpose()
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, name, description, created_at FROM categories ORDER BY name ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_category_row).collect()
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), StorageError> {
        // Lessons, their grants and their progress go with it via ON DELETE CASCADE.
        let res = sqlx::query("DELETE FROM categories WHERE id = ?1")
            .bind(id_to_i64("category_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
