use chrono::{DateTime, Utc};
use lessons_core::model::{Lesson, LessonId, NewLesson, Viewer};

use super::SqliteRepository;
use super::mapping::{db_err, id_to_i64, lesson_id_from_i64, map_lesson_row};
use crate::repository::{LessonQuery, LessonRepository, StorageError};

const LESSON_COLUMNS: &str = "l.id, l.category_id, l.title, l.description, l.video_ref, \
     l.thumbnail_ref, l.duration_secs, l.is_active, l.created_at, l.updated_at";

#[async_trait::async_trait]
impl LessonRepository for SqliteRepository {
    async fn insert_lesson(
        &self,
        lesson: &NewLesson,
        now: DateTime<Utc>,
    ) -> Result<LessonId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO lessons (
                category_id, title, description, video_ref, thumbnail_ref,
                duration_secs, is_active, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            ",
        )
        .bind(id_to_i64("category_id", lesson.category_id.value())?)
        .bind(&lesson.title)
        .bind(&lesson.description)
        .bind(&lesson.video_ref)
        .bind(lesson.thumbnail_ref.as_deref())
        .bind(i64::from(lesson.duration_secs))
        .bind(i64::from(lesson.is_active))
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        lesson_id_from_i64(res.last_insert_rowid())
    }

    async fn update_lesson(
        &self,
        id: LessonId,
        lesson: &NewLesson,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE lessons SET
                category_id = ?1,
                title = ?2,
                description = ?3,
                video_ref = ?4,
                thumbnail_ref = ?5,
                duration_secs = ?6,
                is_active = ?7,
                updated_at = ?8
            WHERE id = ?9
            ",
        )
        .bind(id_to_i64("category_id", lesson.category_id.value())?)
        .bind(&lesson.title)
        .bind(&lesson.description)
        .bind(&lesson.video_ref)
        .bind(lesson.thumbnail_ref.as_deref())
        .bind(i64::from(lesson.duration_secs))
        .bind(i64::from(lesson.is_active))
        .bind(now)
        .bind(id_to_i64("lesson_id", id.value())?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        let row = sqlx::query(&format!("SELECT {LESSON_COLUMNS} FROM lessons l WHERE l.id = ?1"))
            .bind(id_to_i64("lesson_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(map_lesson_row).transpose()
    }

    async fn list_lessons(&self, limit: u32, offset: u32) -> Result<Vec<Lesson>, StorageError> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {LESSON_COLUMNS}
            FROM lessons l
            ORDER BY l.created_at DESC, l.id DESC
            LIMIT ?1 OFFSET ?2
            "
        ))
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_lesson_row).collect()
    }

    async fn visible_lessons(
        &self,
        viewer: Viewer,
        now: DateTime<Utc>,
        query: LessonQuery,
    ) -> Result<Vec<Lesson>, StorageError> {
        // Mirrors `access::can_access`: staff, or an active unexpired grant
        // that is global or names the lesson.
        let rows = sqlx::query(&format!(
            r"
            SELECT {LESSON_COLUMNS}
            FROM lessons l
            WHERE l.is_active = 1
              AND (?1 IS NULL OR l.category_id = ?1)
              AND (
                ?2 = 1
                OR EXISTS (
                    SELECT 1 FROM access_grants g
                    WHERE g.user_id = ?3
                      AND (g.lesson_id IS NULL OR g.lesson_id = l.id)
                      AND g.is_active = 1
                      AND (g.expires_at IS NULL OR julianday(g.expires_at) > julianday(?4))
                )
              )
            ORDER BY l.created_at DESC, l.id DESC
            LIMIT ?5 OFFSET ?6
            "
        ))
        .bind(
            query
                .category
                .map(|c| id_to_i64("category_id", c.value()))
                .transpose()?,
        )
        .bind(i64::from(viewer.is_staff))
        .bind(id_to_i64("user_id", viewer.user_id.value())?)
        .bind(now)
        .bind(i64::from(query.limit))
        .bind(i64::from(query.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_lesson_row).collect()
    }
}
