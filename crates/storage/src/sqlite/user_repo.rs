use lessons_core::model::{User, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{db_err, id_to_i64, map_user_row, ser, user_id_from_i64};
use crate::repository::{NewUserRecord, StorageError, UserCredentials, UserRepository};

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, is_staff, is_active, joined_at";

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn insert_user(&self, user: NewUserRecord) -> Result<UserId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO users (username, email, first_name, last_name, password_hash, is_staff, is_active, joined_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)
            ",
        )
        .bind(user.username)
        .bind(user.email)
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.password_hash)
        .bind(i64::from(user.is_staff))
        .bind(user.joined_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        user_id_from_i64(res.last_insert_rowid())
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .bind(id_to_i64("user_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(map_user_row).transpose()
    }

    async fn find_credentials(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE username = ?1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => Ok(Some(UserCredentials {
                user: map_user_row(&row)?,
                password_hash: row.try_get("password_hash").map_err(ser)?,
            })),
            None => Ok(None),
        }
    }

    async fn username_exists(&self, username: &str) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM users WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.is_some())
    }

    async fn email_exists(&self, email: &str) -> Result<bool, StorageError> {
        // The column collates NOCASE.
        let row = sqlx::query("SELECT 1 FROM users WHERE email = ?1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.is_some())
    }

    async fn search_users(
        &self,
        needle: Option<&str>,
        limit: u32,
    ) -> Result<Vec<User>, StorageError> {
        let pattern = needle.map(|n| format!("%{}%", escape_like(n)));
        let rows = sqlx::query(&format!(
            r"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE is_staff = 0
              AND (?1 IS NULL OR username LIKE ?1 ESCAPE '\' OR email LIKE ?1 ESCAPE '\')
            ORDER BY username ASC
            LIMIT ?2
            "
        ))
        .bind(pattern)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_user_row).collect()
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
