//! Collaborators the workflow depends on
//!
//! Every call may block on I/O; the workflow bounds each one with its
//! configured timeout.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::model::SignatureRequest;

/// Durable storage of request aggregates
#[async_trait]
pub trait RequestRepository: Send + Sync {
    /// Store a new request; fails with `Duplicate` if the id exists
    async fn insert(&self, request: &SignatureRequest) -> Result<(), StorageError>;

    async fn load(&self, id: &str) -> Result<Option<SignatureRequest>, StorageError>;

    /// Replace a stored request only if its stored revision is still
    /// `expected_revision`, otherwise fail with `Conflict`
    async fn save(
        &self,
        request: &SignatureRequest,
        expected_revision: u64,
    ) -> Result<(), StorageError>;

    /// Returns false when there was nothing to delete
    async fn delete(&self, id: &str) -> Result<bool, StorageError>;

    async fn list(&self) -> Result<Vec<SignatureRequest>, StorageError>;
}

/// Blob storage for templates and signed versions
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Write `bytes` under `key`, returning the path to read it back
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, StorageError>;

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    async fn remove(&self, path: &str) -> Result<(), StorageError>;
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// File store path of a template's PDF
    async fn template_file(&self, template_id: &str) -> Result<Option<String>, StorageError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn display_name(&self, user_id: &str) -> Result<Option<String>, StorageError>;
}
