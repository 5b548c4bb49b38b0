//! Workflow error types

use shared_pdf::PdfError;
use thiserror::Error;

/// Failure of a collaborator: repository, file store or template store
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },

    #[error("Request {id} was modified concurrently (expected revision {expected})")]
    Conflict { id: String, expected: u64 },

    #[error("Request {0} already exists")]
    Duplicate(String),

    #[error("Stored file not found: {0}")]
    MissingFile(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Whether the same call could succeed if simply tried again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::Timeout { .. } | StorageError::Conflict { .. } | StorageError::Backend(_)
        )
    }
}

/// Semantic category of a [`WorkflowError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    NotAuthorized,
    SequencingBlocked,
    AlreadySigned,
    InvalidPlacement,
    MissingSignatureImage,
    InvalidRequest,
    RequestClosed,
    StorageFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::NotAuthorized => "not_authorized",
            ErrorKind::SequencingBlocked => "sequencing_blocked",
            ErrorKind::AlreadySigned => "already_signed",
            ErrorKind::InvalidPlacement => "invalid_placement",
            ErrorKind::MissingSignatureImage => "missing_signature_image",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::RequestClosed => "request_closed",
            ErrorKind::StorageFailure => "storage_failure",
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// What was not found, e.g. "signature request 42"
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("{message}")]
    SequencingBlocked {
        message: String,
        /// User id of the recipient who has to sign first
        blocked_by: String,
    },

    #[error("Recipient has already signed")]
    AlreadySigned,

    #[error("Invalid signature placement: {0}")]
    InvalidPlacement(String),

    #[error("Signature image is required")]
    MissingSignatureImage,

    #[error("Invalid signature image: {0}")]
    InvalidSignatureImage(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request is already {0}")]
    RequestClosed(crate::model::RequestStatus),

    #[error("Storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::NotFound(_) => ErrorKind::NotFound,
            WorkflowError::NotAuthorized(_) => ErrorKind::NotAuthorized,
            WorkflowError::SequencingBlocked { .. } => ErrorKind::SequencingBlocked,
            WorkflowError::AlreadySigned => ErrorKind::AlreadySigned,
            WorkflowError::InvalidPlacement(_) => ErrorKind::InvalidPlacement,
            WorkflowError::MissingSignatureImage | WorkflowError::InvalidSignatureImage(_) => {
                ErrorKind::MissingSignatureImage
            }
            WorkflowError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            WorkflowError::RequestClosed(_) => ErrorKind::RequestClosed,
            WorkflowError::Storage(_) => ErrorKind::StorageFailure,
            // unreadable or unstampable base document
            WorkflowError::Pdf(_) => ErrorKind::InvalidRequest,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            WorkflowError::Storage(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_are_retryable() {
        let err = WorkflowError::from(StorageError::Timeout { operation: "load" });
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_validation_errors_are_not_retryable() {
        assert!(!WorkflowError::AlreadySigned.is_retryable());
        assert!(!WorkflowError::InvalidPlacement("none applied".into()).is_retryable());
        assert!(!WorkflowError::from(StorageError::Duplicate("r".into())).is_retryable());
    }

    #[test]
    fn test_sequencing_message_is_display() {
        let err = WorkflowError::SequencingBlocked {
            message: "Waiting for Alice to sign first".to_string(),
            blocked_by: "alice".to_string(),
        };
        assert_eq!(err.to_string(), "Waiting for Alice to sign first");
        assert_eq!(err.kind().as_str(), "sequencing_blocked");
    }
}
