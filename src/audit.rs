//! Audit trail of teacher actions.
//!
//! Handlers write one entry after each completed mutation. Writing an entry
//! never fails the request that triggered it; failures are logged.

use crate::import::{ImportOutcome, OwnerId};
use rocket_db_pools::sqlx::{self, PgPool};
use serde_json::{Value, json};
use uuid::Uuid;

pub const ACTION_STUDENTS_IMPORTED: &str = "students.imported";
pub const ACTION_STUDENT_CREATED: &str = "student.created";
pub const ACTION_STUDENT_UPDATED: &str = "student.updated";
pub const ACTION_STUDENT_DEACTIVATED: &str = "student.deactivated";
pub const ACTION_QUESTIONS_GENERATED: &str = "questions.generated";
pub const ACTION_EXAM_CREATED: &str = "exam.created";

pub async fn record(
    pool: &PgPool,
    owner: OwnerId,
    action: &str,
    details: Value,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "INSERT INTO audit_logs (teacher_id, action, details) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(owner.0)
    .bind(action)
    .bind(details)
    .fetch_one(pool)
    .await
}

/// Record an entry, logging instead of propagating a failure.
pub async fn record_best_effort(pool: &PgPool, owner: OwnerId, action: &str, details: Value) {
    if let Err(err) = record(pool, owner, action, details).await {
        log::warn!(
            "failed to write audit entry '{}' for teacher {}: {}",
            action,
            owner,
            err
        );
    }
}

/// Summary stored for a completed import run.
pub fn import_details(file_name: Option<&str>, total_rows: usize, outcome: &ImportOutcome) -> Value {
    json!({
        "fileName": file_name,
        "totalRows": total_rows,
        "importedCount": outcome.imported_count,
        "skippedCount": outcome.skipped_count,
        "errorCount": outcome.errors.len(),
    })
}

pub fn student_details(student_id: Uuid, name: &str) -> Value {
    json!({ "studentId": student_id, "name": name })
}
