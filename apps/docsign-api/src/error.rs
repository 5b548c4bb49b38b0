//! Error types for DocSign API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use docsign_core::{ErrorKind, StorageError, WorkflowError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Missing x-user-id header")]
    MissingIdentity,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        ApiError::Workflow(WorkflowError::Storage(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut extra = serde_json::Map::new();

        let (status, kind, message) = match &self {
            ApiError::Workflow(e) => {
                let status = match e.kind() {
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::NotAuthorized => StatusCode::FORBIDDEN,
                    ErrorKind::SequencingBlocked
                    | ErrorKind::AlreadySigned
                    | ErrorKind::RequestClosed => StatusCode::CONFLICT,
                    ErrorKind::InvalidPlacement | ErrorKind::MissingSignatureImage => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                    ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
                    ErrorKind::StorageFailure => StatusCode::SERVICE_UNAVAILABLE,
                };
                if let WorkflowError::SequencingBlocked { blocked_by, .. } = e {
                    extra.insert("requiresSequentialSigning".into(), json!(true));
                    extra.insert("blockedBy".into(), json!(blocked_by));
                }
                if e.kind() == ErrorKind::StorageFailure {
                    tracing::warn!("Storage failure: {}", e);
                    extra.insert("retryable".into(), json!(e.is_retryable()));
                }
                (status, e.kind().as_str(), e.to_string())
            }
            ApiError::MissingIdentity => (
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "Missing x-user-id header".to_string(),
            ),
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Not found: {}", what),
            ),
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg.clone()),
            ApiError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Database error".to_string(),
                )
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal error".to_string(),
                )
            }
        };

        let mut body = serde_json::Map::new();
        body.insert("error".into(), json!(message));
        body.insert("status".into(), json!(status.as_u16()));
        body.insert("kind".into(), json!(kind));
        body.extend(extra);

        (status, Json(serde_json::Value::Object(body))).into_response()
    }
}
