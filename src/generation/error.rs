use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur while calling the question generation API.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("question generation is not configured")]
    NotConfigured,
    #[error("generation HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("generation service returned status {status}: {body}")]
    Service { status: StatusCode, body: String },
    #[error("generation response did not include any questions")]
    Empty,
}
