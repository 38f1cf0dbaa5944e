use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::models::{CartError, MoneyError, TransitionError, WalletError};
use crate::pricing::PricingError;

/// Every failure a handler can return. Rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error(transparent)]
    Money(#[from] MoneyError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{what} not found"))
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::ItemNotFound(_) => AppError::NotFound(err.to_string()),
            CartError::InvalidQuantity => AppError::BadRequest(err.to_string()),
            CartError::Pricing(inner) => AppError::Pricing(inner),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Pricing(_) | AppError::Money(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Transition(TransitionError::NoteRequired(_)) => StatusCode::BAD_REQUEST,
            AppError::Transition(_) => StatusCode::CONFLICT,
            AppError::Wallet(WalletError::NonPositiveAmount) => StatusCode::BAD_REQUEST,
            AppError::Wallet(WalletError::InsufficientFunds { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = match self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "database query failed");
                "database query failed".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                "internal server error".to_string()
            }
            AppError::Token(e) => {
                tracing::debug!(error = %e, "rejected access token");
                "invalid or expired token".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(status).json(json!({ "error": message }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Money;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(AppError::not_found("product").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::from(TransitionError::NotAllowed { from: "denied", action: "accept" })
                .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(WalletError::InsufficientFunds {
                balance: Money::ZERO,
                requested: Money::rupees(1),
            })
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::from(CartError::ItemNotFound("p".into())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(MoneyError::OutOfRange(Money::rupees(1))).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn database_errors_hide_details() {
        let response = AppError::Database(sqlx::Error::RowNotFound).error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
