use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced to callers of the funnel core.
///
/// Delegate failures (advisor outages, notification transport errors) are
/// recovered locally and never appear here; see the per-engine fallbacks.
#[derive(Debug, Error)]
pub enum FunnelError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("conflicting concurrent update on record {0}")]
    Conflict(Uuid),
    #[error("storage error: {0}")]
    Storage(String),
}

impl FunnelError {
    pub fn validation(message: impl Into<String>) -> Self {
        FunnelError::Validation(message.into())
    }
}

impl actix_web::ResponseError for FunnelError {
    fn status_code(&self) -> StatusCode {
        match self {
            FunnelError::NotFound(_) => StatusCode::NOT_FOUND,
            FunnelError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            FunnelError::Validation(_) => StatusCode::BAD_REQUEST,
            FunnelError::Conflict(_) => StatusCode::CONFLICT,
            FunnelError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "message": self.to_string(),
        }))
    }
}

pub type FunnelResult<T> = Result<T, FunnelError>;
