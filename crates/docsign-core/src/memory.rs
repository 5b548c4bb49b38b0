//! In-process collaborators

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::model::SignatureRequest;
use crate::ports::{FileStore, RequestRepository, TemplateStore, UserDirectory};

#[derive(Debug, Default)]
pub struct MemoryRequests {
    requests: RwLock<HashMap<String, SignatureRequest>>,
}

impl MemoryRequests {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestRepository for MemoryRequests {
    async fn insert(&self, request: &SignatureRequest) -> Result<(), StorageError> {
        let mut requests = self.requests.write().await;
        if requests.contains_key(&request.id) {
            return Err(StorageError::Duplicate(request.id.clone()));
        }
        requests.insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<SignatureRequest>, StorageError> {
        Ok(self.requests.read().await.get(id).cloned())
    }

    async fn save(
        &self,
        request: &SignatureRequest,
        expected_revision: u64,
    ) -> Result<(), StorageError> {
        let mut requests = self.requests.write().await;
        let stored = requests
            .get_mut(&request.id)
            .ok_or_else(|| StorageError::Backend(format!("request {} vanished", request.id)))?;
        if stored.revision != expected_revision {
            return Err(StorageError::Conflict {
                id: request.id.clone(),
                expected: expected_revision,
            });
        }
        *stored = request.clone();
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.requests.write().await.remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<SignatureRequest>, StorageError> {
        Ok(self.requests.read().await.values().cloned().collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryFiles {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.files.read().await.contains_key(path)
    }
}

#[async_trait]
impl FileStore for MemoryFiles {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        self.files.write().await.insert(key.to_string(), bytes);
        Ok(key.to_string())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.files
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::MissingFile(path.to_string()))
    }

    async fn remove(&self, path: &str) -> Result<(), StorageError> {
        self.files.write().await.remove(path);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryTemplates {
    paths: RwLock<HashMap<String, String>>,
}

impl MemoryTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, template_id: impl Into<String>, path: impl Into<String>) {
        self.paths.write().await.insert(template_id.into(), path.into());
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplates {
    async fn template_file(&self, template_id: &str) -> Result<Option<String>, StorageError> {
        Ok(self.paths.read().await.get(template_id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct MemoryUsers {
    names: RwLock<HashMap<String, String>>,
}

impl MemoryUsers {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, user_id: impl Into<String>, name: impl Into<String>) {
        self.names.write().await.insert(user_id.into(), name.into());
    }
}

#[async_trait]
impl UserDirectory for MemoryUsers {
    async fn display_name(&self, user_id: &str) -> Result<Option<String>, StorageError> {
        Ok(self.names.read().await.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Recipient;
    use crate::test_support::request_with;

    #[tokio::test]
    async fn test_save_checks_revision() {
        let repo = MemoryRequests::new();
        let mut req = request_with(vec![Recipient::new("a")]);
        repo.insert(&req).await.unwrap();

        req.revision = 1;
        repo.save(&req, 0).await.unwrap();

        // a second writer still holding revision 0 loses
        let err = repo.save(&req, 0).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { expected: 0, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates() {
        let repo = MemoryRequests::new();
        let req = request_with(vec![Recipient::new("a")]);
        repo.insert(&req).await.unwrap();
        assert_eq!(
            repo.insert(&req).await.unwrap_err(),
            StorageError::Duplicate("req-1".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_file() {
        let files = MemoryFiles::new();
        assert!(matches!(
            files.get("nope.pdf").await,
            Err(StorageError::MissingFile(_))
        ));
        let path = files.put("a/v1.pdf", vec![1, 2]).await.unwrap();
        assert_eq!(files.get(&path).await.unwrap(), vec![1, 2]);
        files.remove(&path).await.unwrap();
        assert!(files.is_empty().await);
    }
}
