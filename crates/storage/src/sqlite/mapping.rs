use lessons_core::model::{
    AccessGrant, Category, CategoryId, GrantId, GrantScope, Lesson, LessonId, ProgressId,
    ProgressRecord, User, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Map a driver error, surfacing constraint violations as domain errors.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StorageError::Conflict;
        }
        if db.is_foreign_key_violation() {
            return StorageError::NotFound;
        }
    }
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn user_id_from_i64(v: i64) -> Result<UserId, StorageError> {
    Ok(UserId::new(i64_to_u64("user_id", v)?))
}

pub(crate) fn category_id_from_i64(v: i64) -> Result<CategoryId, StorageError> {
    Ok(CategoryId::new(i64_to_u64("category_id", v)?))
}

pub(crate) fn lesson_id_from_i64(v: i64) -> Result<LessonId, StorageError> {
    Ok(LessonId::new(i64_to_u64("lesson_id", v)?))
}

pub(crate) fn grant_id_from_i64(v: i64) -> Result<GrantId, StorageError> {
    Ok(GrantId::new(i64_to_u64("grant_id", v)?))
}

pub(crate) fn progress_id_from_i64(v: i64) -> Result<ProgressId, StorageError> {
    Ok(ProgressId::new(i64_to_u64("progress_id", v)?))
}

fn u32_column(row: &SqliteRow, column: &'static str) -> Result<u32, StorageError> {
    let raw: i64 = row.try_get(column).map_err(ser)?;
    u32::try_from(raw).map_err(|_| StorageError::Serialization(format!("invalid {column}: {raw}")))
}

fn flag(row: &SqliteRow, column: &'static str) -> Result<bool, StorageError> {
    Ok(row.try_get::<i64, _>(column).map_err(ser)? != 0)
}

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<User, StorageError> {
    Ok(User {
        id: user_id_from_i64(row.try_get("id").map_err(ser)?)?,
        username: row.try_get("username").map_err(ser)?,
        email: row.try_get("email").map_err(ser)?,
        first_name: row.try_get("first_name").map_err(ser)?,
        last_name: row.try_get("last_name").map_err(ser)?,
        is_staff: flag(row, "is_staff")?,
        is_active: flag(row, "is_active")?,
        joined_at: row.try_get("joined_at").map_err(ser)?,
    })
}

pub(crate) fn map_category_row(row: &SqliteRow) -> Result<Category, StorageError> {
    Ok(Category {
        id: category_id_from_i64(row.try_get("id").map_err(ser)?)?,
        name: row.try_get("name").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_lesson_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    Ok(Lesson {
        id: lesson_id_from_i64(row.try_get("id").map_err(ser)?)?,
        category_id: category_id_from_i64(row.try_get("category_id").map_err(ser)?)?,
        title: row.try_get("title").map_err(ser)?,
        description: row.try_get("description").map_err(ser)?,
        video_ref: row.try_get("video_ref").map_err(ser)?,
        thumbnail_ref: row.try_get("thumbnail_ref").map_err(ser)?,
        duration_secs: u32_column(row, "duration_secs")?,
        is_active: flag(row, "is_active")?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_grant_row(row: &SqliteRow) -> Result<AccessGrant, StorageError> {
    let scope = match row.try_get::<Option<i64>, _>("lesson_id").map_err(ser)? {
        Some(lesson_id) => GrantScope::Lesson(lesson_id_from_i64(lesson_id)?),
        None => GrantScope::Global,
    };
    let granted_by = row
        .try_get::<Option<i64>, _>("granted_by")
        .map_err(ser)?
        .map(user_id_from_i64)
        .transpose()?;

    Ok(AccessGrant::from_persisted(
        grant_id_from_i64(row.try_get("id").map_err(ser)?)?,
        user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        scope,
        flag(row, "approved")?,
        flag(row, "is_active")?,
        row.try_get("expires_at").map_err(ser)?,
        granted_by,
        row.try_get("granted_at").map_err(ser)?,
    ))
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<ProgressRecord, StorageError> {
    Ok(ProgressRecord::from_persisted(
        progress_id_from_i64(row.try_get("id").map_err(ser)?)?,
        user_id_from_i64(row.try_get("user_id").map_err(ser)?)?,
        lesson_id_from_i64(row.try_get("lesson_id").map_err(ser)?)?,
        u32_column(row, "watched_seconds")?,
        flag(row, "completed")?,
        row.try_get("last_watched_at").map_err(ser)?,
    ))
}
