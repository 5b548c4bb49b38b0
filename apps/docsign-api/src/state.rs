//! Application state for DocSign API

use anyhow::Result;
use docsign_core::{SigningWorkflow, WorkflowConfig};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::db::{SqliteRequests, SqliteTemplates, SqliteUsers};
use crate::storage::FsFileStore;

pub struct AppState {
    pub db: SqlitePool,
    pub workflow: SigningWorkflow,
    pub files: Arc<FsFileStore>,
    pub templates: Arc<SqliteTemplates>,
    pub users: Arc<SqliteUsers>,
    pub io_timeout: Duration,
}

impl AppState {
    pub async fn new(config: &ApiConfig) -> Result<Self> {
        tracing::info!("Connecting to database: {}", config.database_url);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await?;

        tokio::fs::create_dir_all(&config.storage_dir).await?;
        tracing::info!("Storing documents in {}", config.storage_dir.display());

        Self::with_pool(pool, config.storage_dir.clone(), config.io_timeout).await
    }

    /// Build state over an existing pool, running migrations first
    pub async fn with_pool(pool: SqlitePool, storage_dir: PathBuf, io_timeout: Duration) -> Result<Self> {
        run_migrations(&pool).await?;

        let files = Arc::new(FsFileStore::new(storage_dir));
        let templates = Arc::new(SqliteTemplates::new(pool.clone()));
        let users = Arc::new(SqliteUsers::new(pool.clone()));
        let workflow = SigningWorkflow::new(
            Arc::new(SqliteRequests::new(pool.clone())),
            files.clone(),
            templates.clone(),
            users.clone(),
            WorkflowConfig { io_timeout },
        );

        Ok(Self {
            db: pool,
            workflow,
            files,
            templates,
            users,
            io_timeout,
        })
    }
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS signature_requests (
            id TEXT PRIMARY KEY,
            sender_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            revision INTEGER NOT NULL DEFAULT 0,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Index for fast lookups
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_signature_requests_sender ON signature_requests(sender_id)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS templates (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            file_path TEXT NOT NULL,
            document_hash TEXT NOT NULL,
            page_count INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Migrations complete");
    Ok(())
}
