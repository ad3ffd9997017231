use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

use crate::models::ApiResponse;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Delivery unavailable: {0}")]
    DeliveryUnavailable(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    /// Stable machine-readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "UNAUTHORIZED",
            AppError::AlreadyRegistered(_) => "ALREADY_REGISTERED",
            AppError::RateLimited(_) => "RATE_LIMIT_EXCEEDED",
            AppError::DeliveryUnavailable(_) => "DELIVERY_UNAVAILABLE",
            AppError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }

    /// Whether the same call may succeed if the client tries again later.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            AppError::ValidationError(_) | AppError::AlreadyRegistered(_) | AppError::AuthError(_)
        )
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::AlreadyRegistered(_) => StatusCode::CONFLICT,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::DeliveryUnavailable(_) | AppError::StoreUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::ValidationError(msg) => {
                log::warn!("Validation error: {msg}");
                msg.clone()
            }
            AppError::AuthError(msg) => {
                log::warn!("Authentication error: {msg}");
                msg.clone()
            }
            AppError::RateLimited(msg) => {
                log::warn!("Rate limited: {msg}");
                msg.clone()
            }
            AppError::AlreadyRegistered(msg) => msg.clone(),
            AppError::DeliveryUnavailable(msg) => {
                log::error!("Delivery unavailable: {msg}");
                "Failed to send OTP. Please try again.".to_string()
            }
            AppError::StoreUnavailable(msg) => {
                log::error!("Store unavailable: {msg}");
                "Service temporarily unavailable".to_string()
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                "Database error".to_string()
            }
            _ => {
                log::error!("Internal error: {self}");
                "Internal server error".to_string()
            }
        };

        HttpResponse::build(self.status_code())
            .json(ApiResponse::<()>::error(self.code(), message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_code_mapping() {
        let err = AppError::RateLimited("slow down".to_string());
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.code(), "RATE_LIMIT_EXCEEDED");

        let err = AppError::AlreadyRegistered("login instead".to_string());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(!err.is_retryable());

        let err = AppError::StoreUnavailable("timeout".to_string());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.is_retryable());
    }

    #[actix_web::test]
    async fn test_internal_detail_is_not_exposed() {
        let err = AppError::InternalError("secret stack detail".to_string());
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("secret stack detail"));

        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(json["error"]["message"], "Internal server error");
        assert!(json.get("data").is_none());
    }
}
