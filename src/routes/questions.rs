use crate::audit::{self, ACTION_QUESTIONS_GENERATED};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::generation::{GenerationClient, GenerationRequest};
use crate::import::OwnerId;
use crate::models::{DataResponse, NewQuestion, PaginatedResponse, Question};
use crate::routes::params::QuestionListParams;
use rocket::State;
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket_db_pools::sqlx::{self, PgPool, Postgres, Transaction};
use rocket_okapi::openapi;
use serde_json::json;
use uuid::Uuid;

const QUESTION_COLUMNS: &str =
    "id, teacher_id, prompt, kind, options, answer, topic, difficulty, created_at";

async fn insert_question(
    tx: &mut Transaction<'_, Postgres>,
    owner: OwnerId,
    question: &NewQuestion,
) -> Result<Question, sqlx::Error> {
    let sql = format!(
        "INSERT INTO questions (id, teacher_id, prompt, kind, options, answer, topic, difficulty)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {QUESTION_COLUMNS}"
    );
    sqlx::query_as(&sql)
        .bind(Uuid::new_v4())
        .bind(owner.0)
        .bind(&question.prompt)
        .bind(question.kind)
        .bind(&question.options)
        .bind(&question.answer)
        .bind(&question.topic)
        .bind(question.difficulty)
        .fetch_one(&mut **tx)
        .await
}

pub(crate) async fn load_questions_in_order(
    pool: &PgPool,
    exam_id: Uuid,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as(
        r#"SELECT q.id, q.teacher_id, q.prompt, q.kind, q.options, q.answer, q.topic,
                  q.difficulty, q.created_at
           FROM exam_questions eq
           JOIN questions q ON q.id = eq.question_id
           WHERE eq.exam_id = $1
           ORDER BY eq.position ASC"#,
    )
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

/// List the caller's questions
#[openapi(tag = "Questions")]
#[get("/questions?<params..>")]
pub async fn list_questions(
    user: AuthUser,
    params: QuestionListParams,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<PaginatedResponse<Question>>, ApiError> {
    let pagination = params.pagination();
    let topic = params.topic();

    let filter = "teacher_id = $1
           AND ($2::text IS NULL OR lower(topic) = lower($2))
           AND ($3::question_kind IS NULL OR kind = $3)
           AND ($4::question_difficulty IS NULL OR difficulty = $4)";

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM questions WHERE {filter}"))
        .bind(user.id)
        .bind(&topic)
        .bind(params.kind)
        .bind(params.difficulty)
        .fetch_one(pool.inner())
        .await?;

    let sql = format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE {filter}
         ORDER BY created_at DESC
         LIMIT $5 OFFSET $6"
    );
    let questions: Vec<Question> = sqlx::query_as(&sql)
        .bind(user.id)
        .bind(&topic)
        .bind(params.kind)
        .bind(params.difficulty)
        .bind(pagination.size())
        .bind(pagination.offset())
        .fetch_all(pool.inner())
        .await?;

    Ok(Json(PaginatedResponse::new(
        questions,
        pagination.page(),
        pagination.size(),
        total,
    )))
}

/// Create a question
#[openapi(tag = "Questions")]
#[post("/questions", data = "<payload>")]
pub async fn create_question(
    user: AuthUser,
    payload: Json<NewQuestion>,
    pool: &State<sqlx::PgPool>,
) -> Result<status::Custom<Json<DataResponse<Question>>>, ApiError> {
    let question = payload
        .into_inner()
        .normalized()
        .map_err(ApiError::BadRequest)?;

    let mut tx = pool.begin().await?;
    let created = insert_question(&mut tx, user.owner(), &question).await?;
    tx.commit().await?;

    Ok(status::Custom(
        Status::Created,
        Json(DataResponse { data: created }),
    ))
}

/// Delete a question
///
/// Exams that referenced the question lose it from their question list.
#[openapi(tag = "Questions")]
#[delete("/questions/<question_id>")]
pub async fn delete_question(
    user: AuthUser,
    question_id: Uuid,
    pool: &State<sqlx::PgPool>,
) -> Result<Status, ApiError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1 AND teacher_id = $2")
        .bind(question_id)
        .bind(user.id)
        .execute(pool.inner())
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!(
            "Question '{question_id}' not found"
        )));
    }

    Ok(Status::NoContent)
}

/// Generate questions with the configured generation API
///
/// Generated questions that fail validation are dropped; the rest are saved
/// and returned. Answers 503 when generation is not configured.
#[openapi(tag = "Questions")]
#[post("/questions/generate", data = "<request>")]
pub async fn generate_questions(
    user: AuthUser,
    request: Json<GenerationRequest>,
    client: &State<Option<GenerationClient>>,
    pool: &State<sqlx::PgPool>,
) -> Result<status::Custom<Json<DataResponse<Vec<Question>>>>, ApiError> {
    let client = client.inner().as_ref().ok_or_else(|| {
        ApiError::ServiceUnavailable("question generation is not configured".to_string())
    })?;

    let request = request.into_inner();
    if request.topic.trim().is_empty() {
        return Err(ApiError::BadRequest("topic is required".to_string()));
    }
    if request.count == 0 {
        return Err(ApiError::BadRequest("count must be at least 1".to_string()));
    }

    let generated = client.generate_questions(&request).await?;
    let received = generated.len();

    let mut valid = Vec::with_capacity(received);
    for question in generated {
        match question.into_new_question(&request).normalized() {
            Ok(question) => valid.push(question),
            Err(reason) => log::debug!("dropping generated question: {}", reason),
        }
    }

    if valid.is_empty() {
        return Err(ApiError::ServiceUnavailable(
            "generation service returned no usable questions".to_string(),
        ));
    }

    let owner = user.owner();
    let mut tx = pool.begin().await?;
    let mut saved = Vec::with_capacity(valid.len());
    for question in &valid {
        saved.push(insert_question(&mut tx, owner, question).await?);
    }
    tx.commit().await?;

    log::info!(
        "teacher {} generated {} questions on '{}' ({} dropped)",
        owner,
        saved.len(),
        request.topic,
        received - saved.len()
    );

    audit::record_best_effort(
        pool.inner(),
        owner,
        ACTION_QUESTIONS_GENERATED,
        json!({
            "topic": request.topic,
            "requested": request.count,
            "saved": saved.len(),
            "dropped": received - saved.len(),
        }),
    )
    .await;

    Ok(status::Custom(
        Status::Created,
        Json(DataResponse { data: saved }),
    ))
}
