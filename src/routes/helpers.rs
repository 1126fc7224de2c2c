//! Shared helper functions for Rocket route handlers.

use crate::error::ApiError;
use crate::import::OwnerId;
use crate::import::postgres::STUDENT_COLUMNS;
use crate::models::Student;
use rocket_db_pools::sqlx::{self, PgPool};
use uuid::Uuid;

/// Load a student owned by `owner`.
///
/// Returns [`ApiError::NotFound`] when the id does not exist or belongs to
/// another teacher.
pub async fn load_owned_student(
    pool: &PgPool,
    owner: OwnerId,
    student_id: Uuid,
) -> Result<Student, ApiError> {
    let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = $1 AND teacher_id = $2");
    sqlx::query_as::<_, Student>(&sql)
        .bind(student_id)
        .bind(owner.0)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Student '{student_id}' not found")))
}

/// Check that every id in `question_ids` names a question owned by `owner`.
pub async fn ensure_questions_owned(
    pool: &PgPool,
    owner: OwnerId,
    question_ids: &[Uuid],
) -> Result<(), ApiError> {
    if question_ids.is_empty() {
        return Ok(());
    }

    let found: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM questions WHERE teacher_id = $1 AND id = ANY($2)",
    )
    .bind(owner.0)
    .bind(question_ids)
    .fetch_one(pool)
    .await?;

    if found as usize != question_ids.len() {
        return Err(ApiError::BadRequest(
            "one or more questions do not exist".to_string(),
        ));
    }

    Ok(())
}

/// Reject an empty value for a required text field, returning it trimmed.
pub fn required_text(field: &str, value: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}
