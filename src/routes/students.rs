use crate::audit::{
    self, ACTION_STUDENT_CREATED, ACTION_STUDENT_DEACTIVATED, ACTION_STUDENT_UPDATED,
    ACTION_STUDENTS_IMPORTED,
};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::import::postgres::STUDENT_COLUMNS;
use crate::import::{
    DUPLICATE_STUDENT_MESSAGE, ImportOutcome, ImportPipeline, PgStudentStore, StudentFields,
    StudentStore, parse_students_csv,
};
use crate::models::{DataResponse, PaginatedResponse, Student};
use crate::routes::helpers::load_owned_student;
use crate::routes::params::StudentListParams;
use rocket::State;
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket_db_pools::sqlx;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::openapi;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

/// Body for creating or replacing a single student.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentPayload {
    #[serde(flatten)]
    pub fields: StudentFields,
    #[serde(default)]
    pub additional_info: Option<Value>,
}

/// Body for a CSV roster import.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    /// Original file name, recorded in the audit log.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Full CSV text including the header row.
    pub csv: String,
}

/// List the caller's students
#[openapi(tag = "Students")]
#[get("/students?<params..>")]
pub async fn list_students(
    user: AuthUser,
    params: StudentListParams,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<PaginatedResponse<Student>>, ApiError> {
    let pagination = params.pagination();
    let search = params.search_term().map(|term| format!("%{term}%"));
    let major = params.major();

    let filter = "teacher_id = $1
           AND ($2::text IS NULL OR lower(name) LIKE $2 OR lower(coalesce(email, '')) LIKE $2)
           AND ($3::text IS NULL OR lower(major) = lower($3))
           AND ($4 OR active = TRUE)";

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM students WHERE {filter}"))
        .bind(user.id)
        .bind(&search)
        .bind(&major)
        .bind(params.include_inactive)
        .fetch_one(pool.inner())
        .await?;

    let sql = format!(
        "SELECT {STUDENT_COLUMNS} FROM students WHERE {filter}
         ORDER BY name ASC, created_at ASC
         LIMIT $5 OFFSET $6"
    );
    let students: Vec<Student> = sqlx::query_as(&sql)
        .bind(user.id)
        .bind(&search)
        .bind(&major)
        .bind(params.include_inactive)
        .bind(pagination.size())
        .bind(pagination.offset())
        .fetch_all(pool.inner())
        .await?;

    Ok(Json(PaginatedResponse::new(
        students,
        pagination.page(),
        pagination.size(),
        total,
    )))
}

/// Get one student by id
#[openapi(tag = "Students")]
#[get("/students/<student_id>")]
pub async fn get_student(
    user: AuthUser,
    student_id: Uuid,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<DataResponse<Student>>, ApiError> {
    let student = load_owned_student(pool.inner(), user.owner(), student_id).await?;
    Ok(Json(DataResponse { data: student }))
}

/// Create a single student
///
/// Fails with 409 when an active student with the same name and major exists.
#[openapi(tag = "Students")]
#[post("/students", data = "<payload>")]
pub async fn create_student(
    user: AuthUser,
    payload: Json<StudentPayload>,
    pool: &State<sqlx::PgPool>,
) -> Result<status::Custom<Json<DataResponse<Student>>>, ApiError> {
    let StudentPayload {
        fields,
        additional_info,
    } = payload.into_inner();
    let candidate = fields
        .into_candidate(1)
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let owner = user.owner();
    let store = PgStudentStore::new(pool.inner().clone());
    if store
        .find_active(owner, candidate.name(), candidate.major())
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(DUPLICATE_STUDENT_MESSAGE.to_string()));
    }

    let mut new_student = candidate.into_new_student();
    new_student.additional_info = additional_info;
    let student = store.insert(owner, new_student).await?;

    audit::record_best_effort(
        pool.inner(),
        owner,
        ACTION_STUDENT_CREATED,
        audit::student_details(student.id, &student.name),
    )
    .await;

    Ok(status::Custom(
        Status::Created,
        Json(DataResponse { data: student }),
    ))
}

/// Replace the fields of an active student
#[openapi(tag = "Students")]
#[put("/students/<student_id>", data = "<payload>")]
pub async fn update_student(
    user: AuthUser,
    student_id: Uuid,
    payload: Json<StudentPayload>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<DataResponse<Student>>, ApiError> {
    let owner = user.owner();
    let existing = load_owned_student(pool.inner(), owner, student_id).await?;
    if !existing.active {
        return Err(ApiError::NotFound(format!("Student '{student_id}' not found")));
    }

    let StudentPayload {
        fields,
        additional_info,
    } = payload.into_inner();
    let candidate = fields
        .into_candidate(1)
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let store = PgStudentStore::new(pool.inner().clone());
    if let Some(other) = store
        .find_active(owner, candidate.name(), candidate.major())
        .await?
    {
        if other.id != student_id {
            return Err(ApiError::Conflict(DUPLICATE_STUDENT_MESSAGE.to_string()));
        }
    }

    let student = candidate.into_new_student();
    let sql = format!(
        "UPDATE students
         SET name = $3, email = $4, major = $5, academic_level = $6, gpa = $7,
             career_interests = $8, additional_info = $9, updated_at = NOW()
         WHERE id = $1 AND teacher_id = $2
         RETURNING {STUDENT_COLUMNS}"
    );
    let updated: Student = sqlx::query_as(&sql)
        .bind(student_id)
        .bind(owner.0)
        .bind(&student.name)
        .bind(&student.email)
        .bind(&student.major)
        .bind(student.academic_level)
        .bind(student.gpa)
        .bind(&student.career_interests)
        .bind(&additional_info)
        .fetch_one(pool.inner())
        .await?;

    audit::record_best_effort(
        pool.inner(),
        owner,
        ACTION_STUDENT_UPDATED,
        audit::student_details(updated.id, &updated.name),
    )
    .await;

    Ok(Json(DataResponse { data: updated }))
}

/// Deactivate a student
///
/// The row is kept with `active = false` so past imports and exams still
/// resolve; a deactivated student no longer blocks re-import.
#[openapi(tag = "Students")]
#[delete("/students/<student_id>")]
pub async fn delete_student(
    user: AuthUser,
    student_id: Uuid,
    pool: &State<sqlx::PgPool>,
) -> Result<Status, ApiError> {
    let owner = user.owner();
    let student = load_owned_student(pool.inner(), owner, student_id).await?;

    if student.active {
        sqlx::query(
            "UPDATE students SET active = FALSE, updated_at = NOW() WHERE id = $1 AND teacher_id = $2",
        )
        .bind(student_id)
        .bind(owner.0)
        .execute(pool.inner())
        .await?;

        audit::record_best_effort(
            pool.inner(),
            owner,
            ACTION_STUDENT_DEACTIVATED,
            audit::student_details(student.id, &student.name),
        )
        .await;
    }

    Ok(Status::NoContent)
}

/// Import students from a CSV roster
///
/// Rows are processed in batches of ten. A row that fails validation, a row
/// whose name and major match an active student and a row the database
/// rejects are all skipped and appear in `errors` with their 1-based row
/// number. A file that is not CSV or lacks a required column is rejected with
/// 400. The run aborts only when the database refuses access or cannot be
/// reached at all.
#[openapi(tag = "Students")]
#[post("/students/import", data = "<request>")]
pub async fn import_students(
    user: AuthUser,
    request: Json<ImportRequest>,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<DataResponse<ImportOutcome>>, ApiError> {
    let ImportRequest { file_name, csv } = request.into_inner();
    let roster = parse_students_csv(&csv)?;
    let total_rows = roster.row_count();
    let owner = user.owner();

    log::info!(
        "teacher {} importing {} students from {}",
        owner,
        total_rows,
        file_name.as_deref().unwrap_or("upload")
    );

    let pipeline = ImportPipeline::new(PgStudentStore::new(pool.inner().clone()));
    let outcome = pipeline.run_roster(owner, roster).await?;

    audit::record_best_effort(
        pool.inner(),
        owner,
        ACTION_STUDENTS_IMPORTED,
        audit::import_details(file_name.as_deref(), total_rows, &outcome),
    )
    .await;

    Ok(Json(DataResponse { data: outcome }))
}
