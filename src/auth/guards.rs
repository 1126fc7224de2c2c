use rocket::Request;
use rocket::State;
use rocket::request::{FromRequest, Outcome};
use rocket_db_pools::sqlx::{self, Row};
use rocket_okapi::request::OpenApiFromRequest;

use crate::auth::{AuthError, AuthResult, AuthState, Role};
use crate::import::OwnerId;

/// Authenticated teacher resolved from the `Authorization: Bearer` header.
#[derive(Debug, Clone, OpenApiFromRequest)]
pub struct AuthUser {
    pub id: i32,
    pub email: String,
    pub role: Role,
    pub token_version: i32,
}

impl AuthUser {
    /// Owner identity used for every student, question and exam operation.
    pub fn owner(&self) -> OwnerId {
        OwnerId(self.id)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match extract_user(request).await {
            Ok(user) => Outcome::Success(user),
            Err(err) => {
                log::debug!("rejecting request to {}: {}", request.uri(), err);
                Outcome::Error((err.status(), err))
            }
        }
    }
}

async fn extract_user(request: &Request<'_>) -> AuthResult<AuthUser> {
    let token = bearer_token_from_request(request)?;

    let auth_state = request
        .guard::<&State<AuthState>>()
        .await
        .succeeded()
        .ok_or(AuthError::MissingState("auth state"))?;

    let pool = request
        .guard::<&State<sqlx::PgPool>>()
        .await
        .succeeded()
        .ok_or(AuthError::MissingState("database pool"))?;

    let claims = auth_state.jwt_service.decode_access_token(token)?;
    let user_id: i32 = claims.sub.parse().map_err(|_| AuthError::TokenInvalid)?;

    let row = sqlx::query("SELECT email, role, token_version, disabled FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool.inner())
        .await?;

    let row = row.ok_or(AuthError::UnknownTeacher)?;
    let email: String = row.try_get("email")?;
    let role_str: String = row.try_get("role")?;
    let token_version: i32 = row.try_get("token_version")?;
    let disabled: bool = row.try_get("disabled")?;

    if disabled {
        return Err(AuthError::AccountDisabled);
    }

    // Bumping token_version revokes every token issued before the bump.
    if token_version != claims.token_version {
        return Err(AuthError::TokenRevoked);
    }

    let role = Role::from_db(&role_str);
    if role.as_str() != claims.role {
        return Err(AuthError::TokenInvalid);
    }

    Ok(AuthUser {
        id: user_id,
        email,
        role,
        token_version,
    })
}

fn bearer_token_from_request<'a>(request: &'a Request<'_>) -> AuthResult<&'a str> {
    let header = request
        .headers()
        .get_one("Authorization")
        .ok_or(AuthError::MissingToken)?;
    parse_bearer(header).ok_or(AuthError::MissingToken)
}

fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("Bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::parse_bearer;

    #[test]
    fn parses_bearer_header() {
        assert_eq!(parse_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(parse_bearer("bearer  abc "), Some("abc"));
        assert_eq!(parse_bearer("Basic abc"), None);
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer("Bearer"), None);
    }
}
