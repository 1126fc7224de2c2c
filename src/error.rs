use crate::generation::GenerationError;
use crate::import::{CsvImportError, ImportError, StoreError, StoreErrorKind};
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::{Request, Response};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::response::OpenApiResponderInner;
use serde::Serialize;
use std::io::Cursor;

#[derive(Debug)]
pub enum ApiError {
    DatabaseError(sqlx::Error),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Unauthorized(String),
    ServiceUnavailable(String),
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let (status, error_type, message) = match self {
            ApiError::DatabaseError(e) => {
                log::error!("database error: {}", e);
                (Status::InternalServerError, "DatabaseError", e.to_string())
            }
            ApiError::NotFound(msg) => {
                log::debug!("not found: {}", msg);
                (Status::NotFound, "NotFound", msg)
            }
            ApiError::BadRequest(msg) => {
                log::debug!("bad request: {}", msg);
                (Status::BadRequest, "BadRequest", msg)
            }
            ApiError::Conflict(msg) => {
                log::debug!("conflict: {}", msg);
                (Status::Conflict, "Conflict", msg)
            }
            ApiError::Unauthorized(msg) => {
                log::info!("unauthorized: {}", msg);
                (Status::Unauthorized, "Unauthorized", msg)
            }
            ApiError::ServiceUnavailable(msg) => {
                log::warn!("service unavailable: {}", msg);
                (Status::ServiceUnavailable, "ServiceUnavailable", msg)
            }
            ApiError::InternalError(msg) => {
                log::error!("internal error: {}", msg);
                (Status::InternalServerError, "InternalError", msg)
            }
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        let json = serde_json::to_string(&error_response).unwrap_or_else(|_| {
            r#"{"error":"SerializationError","message":"Failed to serialize error"}"#.to_string()
        });

        Response::build()
            .status(status)
            .header(rocket::http::ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}

impl OpenApiResponderInner for ApiError {
    fn responses(_generator: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        Ok(Responses::default())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            _ => ApiError::DatabaseError(err),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err.kind {
            StoreErrorKind::Conflict => ApiError::Conflict(err.message),
            StoreErrorKind::Constraint | StoreErrorKind::Validation => {
                ApiError::BadRequest(err.message)
            }
            StoreErrorKind::Unauthorized => ApiError::Unauthorized(err.message),
            StoreErrorKind::Unavailable => ApiError::ServiceUnavailable(err.message),
            StoreErrorKind::Internal => ApiError::InternalError(err.message),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        let message = err.to_string();
        match err.store_error().kind {
            StoreErrorKind::Unauthorized => ApiError::Unauthorized(message),
            _ => ApiError::ServiceUnavailable(message),
        }
    }
}

impl From<CsvImportError> for ApiError {
    fn from(err: CsvImportError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        ApiError::ServiceUnavailable(err.to_string())
    }
}
