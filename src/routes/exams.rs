use crate::audit::{self, ACTION_EXAM_CREATED};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{DataResponse, Exam, ExamWithQuestions, PaginatedResponse};
use crate::routes::helpers::{ensure_questions_owned, required_text};
use crate::routes::params::PaginationParams;
use crate::routes::questions::load_questions_in_order;
use chrono::{DateTime, Utc};
use rocket::State;
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket_db_pools::sqlx;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::openapi;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use uuid::Uuid;

const EXAM_COLUMNS: &str =
    "id, teacher_id, title, description, scheduled_for, duration_minutes, created_at";

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateExamRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    /// Question ids in the order they appear on the exam.
    #[serde(default)]
    pub question_ids: Vec<Uuid>,
}

impl CreateExamRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if matches!(self.duration_minutes, Some(minutes) if minutes <= 0) {
            return Err(ApiError::BadRequest(
                "durationMinutes must be positive".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(self.question_ids.len());
        if let Some(duplicate) = self.question_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(ApiError::BadRequest(format!(
                "question '{duplicate}' is listed more than once"
            )));
        }

        Ok(())
    }
}

/// List the caller's exams
#[openapi(tag = "Exams")]
#[get("/exams?<params..>")]
pub async fn list_exams(
    user: AuthUser,
    params: PaginationParams,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<PaginatedResponse<Exam>>, ApiError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exams WHERE teacher_id = $1")
        .bind(user.id)
        .fetch_one(pool.inner())
        .await?;

    let sql = format!(
        "SELECT {EXAM_COLUMNS} FROM exams WHERE teacher_id = $1
         ORDER BY scheduled_for ASC NULLS LAST, created_at DESC
         LIMIT $2 OFFSET $3"
    );
    let exams: Vec<Exam> = sqlx::query_as(&sql)
        .bind(user.id)
        .bind(params.size())
        .bind(params.offset())
        .fetch_all(pool.inner())
        .await?;

    Ok(Json(PaginatedResponse::new(
        exams,
        params.page(),
        params.size(),
        total,
    )))
}

/// Create an exam from an ordered list of the caller's questions
#[openapi(tag = "Exams")]
#[post("/exams", data = "<payload>")]
pub async fn create_exam(
    user: AuthUser,
    payload: Json<CreateExamRequest>,
    pool: &State<sqlx::PgPool>,
) -> Result<status::Custom<Json<DataResponse<ExamWithQuestions>>>, ApiError> {
    let request = payload.into_inner();
    let title = required_text("title", &request.title)?;
    request.validate()?;

    let owner = user.owner();
    ensure_questions_owned(pool.inner(), owner, &request.question_ids).await?;

    let description = request
        .description
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let mut tx = pool.begin().await?;
    let sql = format!(
        "INSERT INTO exams (id, teacher_id, title, description, scheduled_for, duration_minutes)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {EXAM_COLUMNS}"
    );
    let exam: Exam = sqlx::query_as(&sql)
        .bind(Uuid::new_v4())
        .bind(owner.0)
        .bind(&title)
        .bind(description)
        .bind(request.scheduled_for)
        .bind(request.duration_minutes)
        .fetch_one(&mut *tx)
        .await?;

    for (position, question_id) in request.question_ids.iter().enumerate() {
        sqlx::query(
            "INSERT INTO exam_questions (exam_id, question_id, position) VALUES ($1, $2, $3)",
        )
        .bind(exam.id)
        .bind(question_id)
        .bind(position as i32)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    audit::record_best_effort(
        pool.inner(),
        owner,
        ACTION_EXAM_CREATED,
        json!({
            "examId": exam.id,
            "title": exam.title,
            "questionCount": request.question_ids.len(),
        }),
    )
    .await;

    let questions = load_questions_in_order(pool.inner(), exam.id).await?;
    Ok(status::Custom(
        Status::Created,
        Json(DataResponse {
            data: ExamWithQuestions { exam, questions },
        }),
    ))
}

/// Get an exam with its questions in order
#[openapi(tag = "Exams")]
#[get("/exams/<exam_id>")]
pub async fn get_exam(
    user: AuthUser,
    exam_id: Uuid,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<DataResponse<ExamWithQuestions>>, ApiError> {
    let sql = format!("SELECT {EXAM_COLUMNS} FROM exams WHERE id = $1 AND teacher_id = $2");
    let exam: Exam = sqlx::query_as(&sql)
        .bind(exam_id)
        .bind(user.id)
        .fetch_optional(pool.inner())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Exam '{exam_id}' not found")))?;

    let questions = load_questions_in_order(pool.inner(), exam.id).await?;
    Ok(Json(DataResponse {
        data: ExamWithQuestions { exam, questions },
    }))
}

/// Delete an exam
#[openapi(tag = "Exams")]
#[delete("/exams/<exam_id>")]
pub async fn delete_exam(
    user: AuthUser,
    exam_id: Uuid,
    pool: &State<sqlx::PgPool>,
) -> Result<Status, ApiError> {
    let result = sqlx::query("DELETE FROM exams WHERE id = $1 AND teacher_id = $2")
        .bind(exam_id)
        .bind(user.id)
        .execute(pool.inner())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!("Exam '{exam_id}' not found")));
    }

    Ok(Status::NoContent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(question_ids: Vec<Uuid>, duration_minutes: Option<i32>) -> CreateExamRequest {
        CreateExamRequest {
            title: "Midterm".to_string(),
            description: None,
            scheduled_for: None,
            duration_minutes,
            question_ids,
        }
    }

    #[test]
    fn rejects_repeated_questions() {
        let id = Uuid::new_v4();
        assert!(request(vec![id, Uuid::new_v4(), id], None).validate().is_err());
        assert!(request(vec![id, Uuid::new_v4()], Some(50)).validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_duration() {
        assert!(request(Vec::new(), Some(0)).validate().is_err());
        assert!(request(Vec::new(), None).validate().is_ok());
    }
}
