// src/errors.rs
use actix_web::{http::StatusCode, HttpResponse, ResponseError};

/// Errors raised by the evaluation core. Neither variant is used for a scan
/// that simply finds nothing; that is a regular `PatternResult`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl EngineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        EngineError::InvalidInput(msg.into())
    }

    pub fn insufficient(msg: impl Into<String>) -> Self {
        EngineError::InsufficientData(msg.into())
    }
}

/// Rejects NaN and infinities so they never reach a comparison.
pub fn ensure_finite(field: &str, value: f64) -> Result<f64, EngineError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EngineError::invalid(format!("{} is not a finite number ({})", field, value)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] std::env::VarError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Market data provider error: {0}")]
    Provider(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::BadRequest(_) | ServiceError::Engine(EngineError::InvalidInput(_)) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::Engine(EngineError::InsufficientData(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::ReqwestError(_) | ServiceError::Provider(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::BadRequest(msg) => {
                log::warn!("Rejected request: {}", msg);
                HttpResponse::BadRequest().json(serde_json::json!({ "error": msg }))
            }
            ServiceError::Engine(e) => {
                log::warn!("Evaluation failed: {}", e);
                HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": e.to_string() }))
            }
            ServiceError::ReqwestError(e) => {
                log::error!("HTTP client error: {}", e);
                HttpResponse::BadGateway().body("Error communicating with market data provider")
            }
            ServiceError::Provider(msg) => {
                log::error!("Provider error: {}", msg);
                HttpResponse::BadGateway().body("Market data provider returned an unusable response")
            }
            ServiceError::EnvVarError(_) | ServiceError::Config(_) => {
                log::error!("Configuration error: {}", self);
                HttpResponse::InternalServerError().body("Server configuration error")
            }
            other => {
                log::error!("Internal error: {}", other);
                HttpResponse::InternalServerError().finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_finite_rejects_nan_and_infinity() {
        assert!(ensure_finite("x", 1.5).is_ok());
        assert!(matches!(ensure_finite("x", f64::NAN), Err(EngineError::InvalidInput(_))));
        assert!(matches!(ensure_finite("x", f64::INFINITY), Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(ServiceError::BadRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ServiceError::Engine(EngineError::invalid("bad")).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ServiceError::Provider("down".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            ServiceError::Config("PORT".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
