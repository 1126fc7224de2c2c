use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use rocket::http::Status;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Why a teacher could not be authenticated, or why the auth layer itself
/// failed. Client-facing variants render their message verbatim.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("account locked until {until}")]
    AccountLocked { until: DateTime<Utc> },
    #[error("account disabled")]
    AccountDisabled,
    #[error("missing or malformed bearer token")]
    MissingToken,
    #[error("access token expired")]
    TokenExpired,
    #[error("access token invalid")]
    TokenInvalid,
    #[error("access token revoked")]
    TokenRevoked,
    #[error("teacher account no longer exists")]
    UnknownTeacher,
    #[error("password must be at least {min_len} characters")]
    WeakPassword { min_len: usize },
    #[error("{0} is not available")]
    MissingState(&'static str),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Database(#[from] rocket_db_pools::sqlx::Error),
    #[error("token signing error: {0}")]
    Signing(jsonwebtoken::errors::Error),
    #[error("password hashing error: {0}")]
    Hashing(String),
}

impl AuthError {
    pub fn status(&self) -> Status {
        match self {
            AuthError::InvalidCredentials
            | AuthError::MissingToken
            | AuthError::TokenExpired
            | AuthError::TokenInvalid
            | AuthError::TokenRevoked
            | AuthError::UnknownTeacher => Status::Unauthorized,
            AuthError::AccountLocked { .. } => Status::Locked,
            AuthError::AccountDisabled => Status::Forbidden,
            AuthError::WeakPassword { .. } => Status::BadRequest,
            AuthError::MissingState(_)
            | AuthError::Config(_)
            | AuthError::Database(_)
            | AuthError::Signing(_)
            | AuthError::Hashing(_) => Status::InternalServerError,
        }
    }

    /// Failures on our side rather than the caller's.
    pub fn is_server_fault(&self) -> bool {
        self.status().code >= 500
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        let rejected = match err.kind() {
            JwtErrorKind::ExpiredSignature => return AuthError::TokenExpired,
            JwtErrorKind::InvalidToken
            | JwtErrorKind::InvalidSignature
            | JwtErrorKind::InvalidAudience
            | JwtErrorKind::InvalidIssuer
            | JwtErrorKind::InvalidSubject
            | JwtErrorKind::ImmatureSignature
            | JwtErrorKind::InvalidAlgorithm
            | JwtErrorKind::MissingRequiredClaim(_)
            | JwtErrorKind::Base64(_)
            | JwtErrorKind::Json(_)
            | JwtErrorKind::Utf8(_) => true,
            _ => false,
        };
        if rejected {
            AuthError::TokenInvalid
        } else {
            AuthError::Signing(err)
        }
    }
}

impl From<argon2::Error> for AuthError {
    fn from(err: argon2::Error) -> Self {
        AuthError::Hashing(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::Hashing(err.to_string())
    }
}
