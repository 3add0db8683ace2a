use chrono::{DateTime, Utc};
use lessons_core::model::{AccessGrant, GrantId, LessonId, NewGrant, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{db_err, grant_id_from_i64, id_to_i64, map_grant_row, ser};
use crate::repository::{GrantEntry, GrantRepository, StorageError};

const GRANT_COLUMNS: &str = "g.id, g.user_id, g.lesson_id, g.approved, g.is_active, \
     g.expires_at, g.granted_by, g.granted_at";

#[async_trait::async_trait]
impl GrantRepository for SqliteRepository {
    async fn insert_grant(&self, grant: &NewGrant) -> Result<GrantId, StorageError> {
        let lesson_id = grant
            .scope
            .lesson_id()
            .map(|l| id_to_i64("lesson_id", l.value()))
            .transpose()?;

        let res = sqlx::query(
            r"
            INSERT INTO access_grants (user_id, lesson_id, approved, is_active, expires_at, granted_by, granted_at)
            VALUES (?1, ?2, 1, 1, ?3, ?4, ?5)
            ",
        )
        .bind(id_to_i64("user_id", grant.user_id.value())?)
        .bind(lesson_id)
        .bind(grant.expires_at)
        .bind(id_to_i64("granted_by", grant.granted_by.value())?)
        .bind(grant.granted_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        grant_id_from_i64(res.last_insert_rowid())
    }

    async fn get_grant(&self, id: GrantId) -> Result<Option<AccessGrant>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {GRANT_COLUMNS} FROM access_grants g WHERE g.id = ?1"
        ))
        .bind(id_to_i64("grant_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_grant_row).transpose()
    }

    async fn grants_for_user(&self, user_id: UserId) -> Result<Vec<AccessGrant>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {GRANT_COLUMNS} FROM access_grants g WHERE g.user_id = ?1 ORDER BY g.id ASC"
        ))
        .bind(id_to_i64("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_grant_row).collect()
    }

    async fn grants_for_lesson(
        &self,
        lesson_id: LessonId,
    ) -> Result<Vec<GrantEntry>, StorageError> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {GRANT_COLUMNS}, u.username
            FROM access_grants g
            JOIN users u ON u.id = g.user_id
            WHERE g.lesson_id = ?1
            ORDER BY g.granted_at DESC, g.id DESC
            "
        ))
        .bind(id_to_i64("lesson_id", lesson_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_entry_row).collect()
    }

    async fn global_grants(&self) -> Result<Vec<GrantEntry>, StorageError> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {GRANT_COLUMNS}, u.username
            FROM access_grants g
            JOIN users u ON u.id = g.user_id
            WHERE g.lesson_id IS NULL
            ORDER BY g.granted_at DESC, g.id DESC
            "
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_entry_row).collect()
    }

    async fn set_grant_active(&self, id: GrantId, active: bool) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE access_grants SET is_active = ?1 WHERE id = ?2")
            .bind(i64::from(active))
            .bind(id_to_i64("grant_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn reactivate_grant(
        &self,
        id: GrantId,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            "UPDATE access_grants SET is_active = 1, expires_at = ?1 WHERE id = ?2",
        )
        .bind(expires_at)
        .bind(id_to_i64("grant_id", id.value())?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}

fn map_entry_row(row: &SqliteRow) -> Result<GrantEntry, StorageError> {
    Ok(GrantEntry {
        grant: map_grant_row(row)?,
        username: row.try_get("username").map_err(ser)?,
    })
}
