//! Application-wide error types and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use deposit_pool::PoolError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

impl ServiceError {
    /// Stable error kind surfaced to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Database(_) | Self::Migrate(_) | Self::Json(_) | Self::Config(_) => "internal",
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Pool(e) => match e {
                PoolError::InvalidInput(_) => "invalid_input",
                PoolError::NotFound(_) => "not_found",
                PoolError::PoolNotOpen(_) => "pool_not_open",
                PoolError::AlreadyFilled(_) => "already_filled",
                PoolError::Overfunded { .. } => "overfunded",
                PoolError::UnknownContributor { .. } => "unknown_contributor",
                PoolError::AmountExceedsCommitment { .. } => "amount_exceeds_commitment",
                PoolError::PoolNotFilled(_) => "pool_not_filled",
                PoolError::RegistrarRejected(_) => "registrar_rejected",
                PoolError::Unauthorized(_) => "unauthorized",
                PoolError::UnknownOperation(_) => "unknown_operation",
                PoolError::DecodeError(_) => "decode_error",
                PoolError::IngressDisabled(_) => "ingress_disabled",
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Migrate(_) | Self::Json(_) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Pool(e) => match e {
                PoolError::NotFound(_) | PoolError::UnknownContributor { .. } => {
                    StatusCode::NOT_FOUND
                }
                PoolError::Unauthorized(_) => StatusCode::FORBIDDEN,
                PoolError::InvalidInput(_)
                | PoolError::UnknownOperation(_)
                | PoolError::DecodeError(_)
                | PoolError::IngressDisabled(_) => StatusCode::BAD_REQUEST,
                PoolError::PoolNotOpen(_)
                | PoolError::AlreadyFilled(_)
                | PoolError::Overfunded { .. }
                | PoolError::AmountExceedsCommitment { .. }
                | PoolError::PoolNotFilled(_) => StatusCode::CONFLICT,
                PoolError::RegistrarRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            },
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.to_string(),
            kind: self.kind(),
        };
        (status, Json(body)).into_response()
    }
}
