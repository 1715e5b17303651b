use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

/// Error kinds the core produces. `UnsupportedLanguage` and
/// malformed-request errors surface as 400; engine errors discovered
/// before any container was created surface as 500. Timeouts and
/// non-zero exits are never represented here. They are normal
/// `ExecutionResult` classifications, not exceptions.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Function not found: {0}")]
    NotFound(String),

    #[error("Function already exists: {0}")]
    NameInUse(String),

    #[error("Invalid request: {0}")]
    InvalidInput(String),

    #[error("Container engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Container engine I/O error: {0}")]
    EngineIo(String),

    #[error("Container exec error: {0}")]
    EngineExec(String),

    #[error("Rate limit exceeded, please try again later")]
    RateLimitExceeded,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for PlatformError {
    fn status_code(&self) -> StatusCode {
        match self {
            PlatformError::UnsupportedLanguage(_) => StatusCode::BAD_REQUEST,
            PlatformError::NotFound(_) => StatusCode::NOT_FOUND,
            PlatformError::NameInUse(_) => StatusCode::CONFLICT,
            PlatformError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            PlatformError::EngineUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            PlatformError::EngineIo(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PlatformError::EngineExec(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PlatformError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            PlatformError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PlatformError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": format!("{:?}", self),
            "message": self.to_string(),
        }))
    }
}

impl From<bollard::errors::Error> for PlatformError {
    fn from(err: bollard::errors::Error) -> Self {
        PlatformError::EngineIo(err.to_string())
    }
}

impl From<std::io::Error> for PlatformError {
    fn from(err: std::io::Error) -> Self {
        PlatformError::Internal(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for PlatformError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        PlatformError::EngineExec("execution timed out".to_string())
    }
}

pub type PlatformResult<T> = Result<T, PlatformError>;
