use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{AuditLogEntry, PaginatedResponse};
use crate::routes::params::PaginationParams;
use rocket::State;
use rocket::serde::json::Json;
use rocket_db_pools::sqlx;
use rocket_okapi::openapi;

/// List the caller's audit entries, newest first
#[openapi(tag = "Audit")]
#[get("/audit-logs?<params..>")]
pub async fn list_audit_logs(
    user: AuthUser,
    params: PaginationParams,
    pool: &State<sqlx::PgPool>,
) -> Result<Json<PaginatedResponse<AuditLogEntry>>, ApiError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs WHERE teacher_id = $1")
        .bind(user.id)
        .fetch_one(pool.inner())
        .await?;

    let entries: Vec<AuditLogEntry> = sqlx::query_as(
        r#"SELECT id, teacher_id, action, details, created_at
           FROM audit_logs
           WHERE teacher_id = $1
           ORDER BY created_at DESC, id DESC
           LIMIT $2 OFFSET $3"#,
    )
    .bind(user.id)
    .bind(params.size())
    .bind(params.offset())
    .fetch_all(pool.inner())
    .await?;

    Ok(Json(PaginatedResponse::new(
        entries,
        params.page(),
        params.size(),
        total,
    )))
}
