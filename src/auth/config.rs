use crate::auth::{AuthError, AuthResult};

/// Authentication configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub issuer: String,
    pub audience: String,
    pub access_token_ttl_secs: i64,
    pub max_failed_logins: i32,
    pub lockout_secs: i64,
    pub jwt_secret: String,
    pub jwt_kid: Option<String>,
}

impl AuthConfig {
    pub fn from_env() -> AuthResult<Self> {
        let issuer =
            std::env::var("CLASSROOM_JWT_ISSUER").unwrap_or_else(|_| "http://localhost".into());
        let audience =
            std::env::var("CLASSROOM_JWT_AUDIENCE").unwrap_or_else(|_| "classroom-api".into());
        let access_token_ttl_secs = std::env::var("CLASSROOM_ACCESS_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(8 * 60 * 60);
        let max_failed_logins = std::env::var("CLASSROOM_MAX_FAILED_LOGINS")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(5);
        let lockout_secs = std::env::var("CLASSROOM_LOCKOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(5 * 60);
        let jwt_secret = std::env::var("CLASSROOM_JWT_SECRET")
            .ok()
            .filter(|secret| !secret.trim().is_empty())
            .ok_or_else(|| AuthError::Config("CLASSROOM_JWT_SECRET is required".into()))?;
        let jwt_kid = std::env::var("CLASSROOM_JWT_KID").ok();

        Ok(Self {
            issuer,
            audience,
            access_token_ttl_secs,
            max_failed_logins,
            lockout_secs,
            jwt_secret,
            jwt_kid,
        })
    }
}
