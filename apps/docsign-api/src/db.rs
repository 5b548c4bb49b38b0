//! SQLite-backed collaborators
//!
//! Requests are stored as JSON documents next to the columns needed for
//! lookups and the revision check.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docsign_core::{
    RequestRepository, SignatureRequest, StorageError, TemplateStore, UserDirectory,
};
use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;

fn backend(e: sqlx::Error) -> StorageError {
    tracing::error!("Database error: {}", e);
    StorageError::Backend(format!("database error: {}", e))
}

fn decode(id: &str, data: &str) -> Result<SignatureRequest, StorageError> {
    serde_json::from_str(data)
        .map_err(|e| StorageError::Backend(format!("corrupt request {}: {}", id, e)))
}

fn encode(request: &SignatureRequest) -> Result<String, StorageError> {
    serde_json::to_string(request).map_err(|e| StorageError::Backend(e.to_string()))
}

/// Signature request row
#[derive(Debug, Clone, FromRow)]
struct DbRequest {
    id: String,
    data: String,
}

#[derive(Debug, Clone)]
pub struct SqliteRequests {
    pool: SqlitePool,
}

impl SqliteRequests {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestRepository for SqliteRequests {
    async fn insert(&self, request: &SignatureRequest) -> Result<(), StorageError> {
        let data = encode(request)?;
        let result = sqlx::query(
            r#"
            INSERT INTO signature_requests (id, sender_id, status, revision, data, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&request.id)
        .bind(&request.sender_id)
        .bind(request.status.as_str())
        .bind(request.revision as i64)
        .bind(&data)
        .bind(request.created_at.to_rfc3339())
        .bind(request.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StorageError::Duplicate(request.id.clone()))
            }
            Err(e) => Err(backend(e)),
        }
    }

    async fn load(&self, id: &str) -> Result<Option<SignatureRequest>, StorageError> {
        let row: Option<DbRequest> =
            sqlx::query_as("SELECT id, data FROM signature_requests WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;
        row.map(|r| decode(&r.id, &r.data)).transpose()
    }

    async fn save(
        &self,
        request: &SignatureRequest,
        expected_revision: u64,
    ) -> Result<(), StorageError> {
        let data = encode(request)?;
        let result = sqlx::query(
            r#"
            UPDATE signature_requests
            SET status = ?, revision = ?, data = ?, updated_at = ?
            WHERE id = ? AND revision = ?
            "#,
        )
        .bind(request.status.as_str())
        .bind(request.revision as i64)
        .bind(&data)
        .bind(request.updated_at.to_rfc3339())
        .bind(&request.id)
        .bind(expected_revision as i64)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict {
                id: request.id.clone(),
                expected: expected_revision,
            });
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM signature_requests WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<SignatureRequest>, StorageError> {
        let rows: Vec<DbRequest> =
            sqlx::query_as("SELECT id, data FROM signature_requests ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;
        rows.iter().map(|r| decode(&r.id, &r.data)).collect()
    }
}

/// Registered template
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DbTemplate {
    pub id: String,
    pub name: String,
    pub file_path: String,
    pub document_hash: String,
    pub page_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SqliteTemplates {
    pool: SqlitePool,
}

impl SqliteTemplates {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn register(&self, template: &DbTemplate) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO templates (id, name, file_path, document_hash, page_count, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&template.id)
        .bind(&template.name)
        .bind(&template.file_path)
        .bind(&template.document_hash)
        .bind(template.page_count)
        .bind(template.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<DbTemplate>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT id, name, file_path, document_hash, page_count, created_at
            FROM templates
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[async_trait]
impl TemplateStore for SqliteTemplates {
    async fn template_file(&self, template_id: &str) -> Result<Option<String>, StorageError> {
        sqlx::query_scalar::<_, String>("SELECT file_path FROM templates WHERE id = ?")
            .bind(template_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)
    }
}

#[derive(Debug, Clone)]
pub struct SqliteUsers {
    pool: SqlitePool,
}

impl SqliteUsers {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or rename a user
    pub async fn upsert(&self, id: &str, name: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, created_at) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for SqliteUsers {
    async fn display_name(&self, user_id: &str) -> Result<Option<String>, StorageError> {
        sqlx::query_scalar::<_, String>("SELECT name FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)
    }
}
