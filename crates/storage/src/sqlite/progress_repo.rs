use chrono::{DateTime, Utc};
use lessons_core::model::{LessonId, ProgressRecord, UserId};

use super::SqliteRepository;
use super::mapping::{db_err, id_to_i64, map_progress_row};
use crate::repository::{ProgressRepository, StorageError};

const PROGRESS_COLUMNS: &str =
    "id, user_id, lesson_id, watched_seconds, completed, last_watched_at";

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_or_create_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        now: DateTime<Utc>,
    ) -> Result<ProgressRecord, StorageError> {
        let user = id_to_i64("user_id", user_id.value())?;
        let lesson = id_to_i64("lesson_id", lesson_id.value())?;

        // Concurrent first views race on the unique pair; the loser's insert
        // is a no-op and both read the same row back.
        sqlx::query(
            r"
            INSERT INTO lesson_progress (user_id, lesson_id, watched_seconds, completed, last_watched_at)
            VALUES (?1, ?2, 0, 0, ?3)
            ON CONFLICT(user_id, lesson_id) DO NOTHING
            ",
        )
        .bind(user)
        .bind(lesson)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let row = sqlx::query(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM lesson_progress WHERE user_id = ?1 AND lesson_id = ?2"
        ))
        .bind(user)
        .bind(lesson)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        map_progress_row(&row)
    }

    async fn save_progress(&self, progress: &ProgressRecord) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE lesson_progress SET
                watched_seconds = ?1,
                completed = ?2,
                last_watched_at = ?3
            WHERE id = ?4
            ",
        )
        .bind(i64::from(progress.watched_seconds()))
        .bind(i64::from(progress.is_completed()))
        .bind(progress.last_watched_at())
        .bind(id_to_i64("progress_id", progress.id().value())?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn progress_for_lessons(
        &self,
        user_id: UserId,
        lessons: &[LessonId],
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        if lessons.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!(
            "SELECT {PROGRESS_COLUMNS} FROM lesson_progress WHERE user_id = ?1 AND lesson_id IN ("
        );
        for i in 0..lessons.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 2).to_string());
        }
        sql.push(')');

        let mut q = sqlx::query(&sql).bind(id_to_i64("user_id", user_id.value())?);
        for lesson in lessons {
            q = q.bind(id_to_i64("lesson_id", lesson.value())?);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(db_err)?;
        rows.iter().map(map_progress_row).collect()
    }
}
