use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use sqlx::migrate::MigrateError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Store unreachable, misconfigured or credentials rejected.
    #[error("connection error: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("schema migration failed: {0}")]
    Migration(#[from] MigrateError),

    /// A single read or write failed.
    #[error("persistence error: {0}")]
    Persistence(#[source] sqlx::Error),

    #[error("request cancelled")]
    Cancelled,

    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

/// Coarse classification callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Persistence,
    Cancellation,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Connection(_) | StoreError::Migration(_) => ErrorKind::Connection,
            StoreError::Persistence(_) => ErrorKind::Persistence,
            StoreError::Cancelled | StoreError::DeadlineExceeded(_) => ErrorKind::Cancellation,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = match self {
            StoreError::Connection(_) | StoreError::Migration(_) => StatusCode::SERVICE_UNAVAILABLE,
            StoreError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            StoreError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            StoreError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
        };

        let body = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}
