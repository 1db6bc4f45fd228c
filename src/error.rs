//! Application error type and its HTTP mapping.

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

use crate::domain::aggregates::{CartError, OrderError, ProductError};
use crate::payment::GatewayError;
use crate::repository::RepositoryError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid form: {0}")]
    InvalidForm(#[from] validator::ValidationErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Signature verification failed")]
    InvalidSignature,

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Product(#[from] ProductError),

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Product(_) => StatusCode::BAD_REQUEST,
            Self::InvalidForm(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) | Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::Cart(CartError::ItemNotFound) => StatusCode::NOT_FOUND,
            Self::Cart(CartError::InvalidQuantity) => StatusCode::BAD_REQUEST,
            Self::Cart(CartError::Full { .. }) => StatusCode::CONFLICT,
            Self::Order(OrderError::UnknownValue(_)) | Self::Order(OrderError::NoItems) => StatusCode::BAD_REQUEST,
            Self::Order(_) => StatusCode::CONFLICT,
            Self::Gateway(_) => StatusCode::BAD_GATEWAY,
            Self::Repository(RepositoryError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Repository(RepositoryError::InsufficientStock { .. }) => StatusCode::BAD_REQUEST,
            Self::Repository(RepositoryError::Duplicate(_)) => StatusCode::CONFLICT,
            Self::Repository(RepositoryError::Order(OrderError::NoItems)) => StatusCode::BAD_REQUEST,
            Self::Repository(RepositoryError::Order(OrderError::UnknownValue(_))) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Repository(RepositoryError::Order(_)) => StatusCode::CONFLICT,
            Self::Repository(_) | Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::InvalidForm(errors) => json!({"error": "Invalid form", "fields": errors}),
            // upstream details stay in the logs
            Self::Gateway(_) => json!({"error": "Payment provider error"}),
            _ if status.is_server_error() => json!({"error": "An internal error occurred"}),
            other => json!({"error": other.to_string()}),
        };
        if status.is_server_error() {
            tracing::error!(application_error = %self, "Responding with error");
        } else {
            tracing::warn!(application_error = %self, status = status.as_u16(), "Request rejected");
        }
        (status, Json(body)).into_response()
    }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
