//! Postgres-backed [`StudentStore`].

use crate::import::store::{OwnerId, StoreError, StoreErrorKind, StudentStore};
use crate::models::{NewStudent, Student};
use rocket_db_pools::sqlx::{self, PgPool};
use uuid::Uuid;

pub(crate) const STUDENT_COLUMNS: &str = "id, teacher_id, name, email, major, academic_level, gpa, \
     career_interests, additional_info, active, created_at, updated_at";

#[derive(Clone)]
pub struct PgStudentStore {
    pool: PgPool,
}

impl PgStudentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl StudentStore for PgStudentStore {
    async fn find_active(
        &self,
        owner: OwnerId,
        name: &str,
        major: &str,
    ) -> Result<Option<Student>, StoreError> {
        let query = format!(
            "SELECT {STUDENT_COLUMNS} FROM students
             WHERE teacher_id = $1 AND name = $2 AND major = $3 AND active = TRUE
             LIMIT 1"
        );

        sqlx::query_as::<_, Student>(&query)
            .bind(owner.0)
            .bind(name)
            .bind(major)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)
    }

    async fn insert(&self, owner: OwnerId, student: NewStudent) -> Result<Student, StoreError> {
        let query = format!(
            "INSERT INTO students
                (id, teacher_id, name, email, major, academic_level, gpa, career_interests, additional_info)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {STUDENT_COLUMNS}"
        );

        let inserted = sqlx::query_as::<_, Student>(&query)
            .bind(Uuid::new_v4())
            .bind(owner.0)
            .bind(&student.name)
            .bind(&student.email)
            .bind(&student.major)
            .bind(student.academic_level)
            .bind(student.gpa)
            .bind(&student.career_interests)
            .bind(&student.additional_info)
            .fetch_one(&self.pool)
            .await?;

        log::trace!("inserted student {} for owner {}", inserted.id, owner);
        Ok(inserted)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let kind = classify(&err);
        let message = match &err {
            sqlx::Error::Database(db_err) => db_err.message().to_string(),
            other => other.to_string(),
        };
        StoreError::new(kind, message)
    }
}

fn classify(err: &sqlx::Error) -> StoreErrorKind {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code();
            classify_sqlstate(code.as_deref().unwrap_or_default())
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreErrorKind::Unavailable,
        sqlx::Error::Configuration(_) => StoreErrorKind::Unavailable,
        _ => StoreErrorKind::Internal,
    }
}

/// Map a Postgres SQLSTATE code onto a store error kind.
fn classify_sqlstate(code: &str) -> StoreErrorKind {
    match code {
        "23505" => StoreErrorKind::Conflict,
        "42501" => StoreErrorKind::Unauthorized,
        "57P01" | "57P02" | "57P03" => StoreErrorKind::Unavailable,
        _ if code.starts_with("23") => StoreErrorKind::Constraint,
        _ if code.starts_with("22") => StoreErrorKind::Validation,
        _ if code.starts_with("28") => StoreErrorKind::Unauthorized,
        _ if code.starts_with("08") => StoreErrorKind::Unavailable,
        _ => StoreErrorKind::Internal,
    }
}
