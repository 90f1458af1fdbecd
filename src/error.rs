// src/error.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::api::ai_client::AiError;
use crate::api::razorpay::RazorpayError;

/// Request-level error taxonomy. Every handler returns `Result<_, ApiError>`
/// and the mapping to an HTTP status plus a stable
/// `{"success": false, "message": ...}` body happens here, once.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid plan selected")]
    InvalidPlan,

    #[error("You already have an active subscription")]
    AlreadySubscribed,

    #[error("Invalid payment signature")]
    InvalidSignature,

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    NotFound(String),

    #[error("An active subscription is required for this feature")]
    SubscriptionRequired,

    #[error("{0}")]
    Unauthorized(String),

    #[error("Admin access required")]
    Forbidden,

    #[error("payment provider error: {0}")]
    PaymentProvider(#[from] RazorpayError),

    #[error("ai gateway error: {0}")]
    AiGateway(#[from] AiError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn is_server_side(&self) -> bool {
        matches!(
            self,
            ApiError::PaymentProvider(_)
                | ApiError::AiGateway(_)
                | ApiError::Database(_)
                | ApiError::Internal(_)
        )
    }

    /// Message safe to hand to clients. Server-side failures are logged with
    /// full detail and collapsed to a generic message.
    fn public_message(&self) -> String {
        match self {
            ApiError::PaymentProvider(_) => "Failed to reach the payment provider".to_string(),
            ApiError::AiGateway(_) => "AI service is temporarily unavailable".to_string(),
            ApiError::Database(_) | ApiError::Internal(_) => "Something went wrong!".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::InvalidPlan
            | ApiError::AlreadySubscribed
            | ApiError::InvalidSignature
            | ApiError::InvalidState(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden | ApiError::SubscriptionRequired => StatusCode::FORBIDDEN,
            ApiError::AiGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::PaymentProvider(_) | ApiError::Database(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.is_server_side() {
            log::error!("{self}");
        }

        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "message": self.public_message(),
        }))
    }
}

impl From<bcrypt::BcryptError> for ApiError {
    fn from(e: bcrypt::BcryptError) -> Self {
        ApiError::Internal(format!("bcrypt error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_precise_statuses() {
        assert_eq!(ApiError::InvalidPlan.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::AlreadySubscribed.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::InvalidSignature.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("Transaction not found".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::Forbidden.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn server_errors_hide_internal_detail() {
        let err = ApiError::Internal("secret connection string".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.public_message().contains("secret"));

        let err = ApiError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.public_message(), "Something went wrong!");
    }

    #[test]
    fn validation_message_is_passed_through() {
        let err = ApiError::Validation("Plan is required".into());
        assert_eq!(err.public_message(), "Plan is required");
    }
}
