use std::ops::DerefMut;

use chrono::{DateTime, Duration, Utc};
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{State, get, post};
use rocket_db_pools::sqlx::{self, Row};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::openapi;

use crate::auth::guards::AuthUser;
use crate::auth::account::{LoginRequest, LoginResponse, TeacherProfile};
use crate::auth::{AuthError, AuthResult, AuthState, Role};

type AuthRouteResult<T> = Result<Json<T>, status::Custom<Json<AuthErrorResponse>>>;

#[derive(Debug, serde::Serialize, JsonSchema)]
pub struct AuthErrorResponse {
    pub status: u16,
    pub message: String,
}

/// Exchange teacher credentials for a bearer access token.
#[openapi(tag = "Auth")]
#[post("/auth/login", data = "<payload>")]
pub async fn login(
    state: &State<AuthState>,
    pool: &State<sqlx::PgPool>,
    payload: Json<LoginRequest>,
) -> AuthRouteResult<LoginResponse> {
    let email = payload.email.trim().to_lowercase();
    let password = payload.password.trim();

    if email.is_empty() || password.is_empty() {
        return Err(respond_message(
            Status::BadRequest,
            "Email and password are required",
        ));
    }

    let now = Utc::now();
    let mut tx = pool
        .begin()
        .await
        .map_err(|err| respond_error(AuthError::from(err)))?;

    let row = sqlx::query(
        r#"
        SELECT u.id, u.email, u.display_name, u.role, u.token_version, u.disabled,
               cred.password_hash, cred.failed_attempts, cred.locked_until
        FROM users u
        LEFT JOIN local_user_credentials cred ON cred.user_id = u.id
        WHERE lower(u.email) = $1
        FOR UPDATE OF u
        "#,
    )
    .bind(&email)
    .fetch_optional(tx.deref_mut())
    .await
    .map_err(|err| respond_error(AuthError::from(err)))?;

    let Some(row) = row else {
        return Err(respond_error(AuthError::InvalidCredentials));
    };

    let account = LoginAccount::from_row(&row).map_err(respond_error)?;

    let Some(password_hash) = account.password_hash.as_deref() else {
        return Err(respond_error(AuthError::InvalidCredentials));
    };

    if account.disabled {
        return Err(respond_error(AuthError::AccountDisabled));
    }

    if let Some(until) = account.locked_until.filter(|until| *until > now) {
        return Err(respond_error(AuthError::AccountLocked { until }));
    }

    let verified = state
        .password_service
        .verify_password(password, password_hash)
        .map_err(respond_error)?;

    if !verified {
        record_failed_attempt(&mut tx, &state.config, account.id, account.failed_attempts, now)
            .await
            .map_err(respond_error)?;
        tx.commit()
            .await
            .map_err(|err| respond_error(AuthError::from(err)))?;
        log::info!("failed login for teacher {}", account.id);
        return Err(respond_error(AuthError::InvalidCredentials));
    }

    sqlx::query(
        "UPDATE local_user_credentials SET failed_attempts = 0, locked_until = NULL WHERE user_id = $1",
    )
    .bind(account.id)
    .execute(tx.deref_mut())
    .await
    .map_err(|err| respond_error(AuthError::from(err)))?;

    if state.password_service.needs_rehash(password_hash) {
        match state.password_service.hash_password(password) {
            Ok(rehashed) => {
                sqlx::query("UPDATE local_user_credentials SET password_hash = $1 WHERE user_id = $2")
                    .bind(rehashed)
                    .bind(account.id)
                    .execute(tx.deref_mut())
                    .await
                    .map_err(|err| respond_error(AuthError::from(err)))?;
            }
            Err(err) => log::warn!(
                "could not upgrade password hash for teacher {}: {}",
                account.id,
                err
            ),
        }
    }

    sqlx::query("UPDATE users SET last_login_at = $1 WHERE id = $2")
        .bind(now)
        .bind(account.id)
        .execute(tx.deref_mut())
        .await
        .map_err(|err| respond_error(AuthError::from(err)))?;

    let role = Role::from_db(&account.role);
    let access_token = state
        .jwt_service
        .issue_access_token(account.id, &account.email, role.as_str(), account.token_version)
        .map_err(respond_error)?;

    tx.commit()
        .await
        .map_err(|err| respond_error(AuthError::from(err)))?;

    Ok(Json(LoginResponse {
        access_token: access_token.token,
        access_token_expires_at: access_token.expires_at,
        teacher: TeacherProfile {
            id: account.id,
            email: account.email,
            display_name: account.display_name,
            role,
        },
    }))
}

/// Return the teacher the bearer token belongs to.
#[openapi(tag = "Auth")]
#[get("/auth/me")]
pub async fn me(
    user: AuthUser,
    pool: &State<sqlx::PgPool>,
) -> AuthRouteResult<TeacherProfile> {
    let display_name: Option<String> =
        sqlx::query_scalar("SELECT display_name FROM users WHERE id = $1")
            .bind(user.id)
            .fetch_one(pool.inner())
            .await
            .map_err(|err| respond_error(AuthError::from(err)))?;

    Ok(Json(TeacherProfile {
        id: user.id,
        email: user.email,
        display_name,
        role: user.role,
    }))
}

struct LoginAccount {
    id: i32,
    email: String,
    display_name: Option<String>,
    role: String,
    token_version: i32,
    disabled: bool,
    password_hash: Option<String>,
    failed_attempts: i32,
    locked_until: Option<DateTime<Utc>>,
}

impl LoginAccount {
    fn from_row(row: &sqlx::postgres::PgRow) -> AuthResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
            role: row.try_get("role")?,
            token_version: row.try_get("token_version")?,
            disabled: row.try_get("disabled")?,
            password_hash: row.try_get("password_hash")?,
            failed_attempts: row
                .try_get::<Option<i32>, _>("failed_attempts")?
                .unwrap_or(0),
            locked_until: row.try_get("locked_until")?,
        })
    }
}

async fn record_failed_attempt(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    config: &crate::auth::AuthConfig,
    user_id: i32,
    failed_attempts: i32,
    now: DateTime<Utc>,
) -> AuthResult<()> {
    let new_attempts = failed_attempts + 1;
    let lock_until = if new_attempts >= config.max_failed_logins {
        Some(now + Duration::seconds(config.lockout_secs))
    } else {
        None
    };

    sqlx::query(
        "UPDATE local_user_credentials SET failed_attempts = $1, locked_until = $2 WHERE user_id = $3",
    )
    .bind(new_attempts)
    .bind(lock_until)
    .bind(user_id)
    .execute(tx.deref_mut())
    .await?;

    Ok(())
}

fn respond_error(err: AuthError) -> status::Custom<Json<AuthErrorResponse>> {
    let status = err.status();
    if err.is_server_fault() {
        log::error!("auth failure: {}", err);
    }
    status::Custom(
        status,
        Json(AuthErrorResponse {
            status: status.code,
            message: err.to_string(),
        }),
    )
}

fn respond_message(
    status: Status,
    message: impl Into<String>,
) -> status::Custom<Json<AuthErrorResponse>> {
    status::Custom(
        status,
        Json(AuthErrorResponse {
            status: status.code,
            message: message.into(),
        }),
    )
}
