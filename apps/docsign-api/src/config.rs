//! Environment-driven configuration for DocSign API

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_IO_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub port: u16,
    pub database_url: String,
    /// Root directory for templates and signed versions
    pub storage_dir: PathBuf,
    pub io_timeout: Duration,
}

impl ApiConfig {
    /// Read `PORT`, `DATABASE_URL`, `STORAGE_DIR` and `IO_TIMEOUT_MS`
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(p) => p.parse().with_context(|| format!("Invalid PORT: {}", p))?,
            Err(_) => DEFAULT_PORT,
        };

        let app_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docsign-api");

        // Get database path from env or use default
        let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            std::fs::create_dir_all(&app_dir).ok();
            format!("sqlite:{}/docsign.db?mode=rwc", app_dir.display())
        });

        let storage_dir = std::env::var("STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| app_dir.join("files"));

        let io_timeout_ms = match std::env::var("IO_TIMEOUT_MS") {
            Ok(ms) => ms
                .parse()
                .with_context(|| format!("Invalid IO_TIMEOUT_MS: {}", ms))?,
            Err(_) => DEFAULT_IO_TIMEOUT_MS,
        };

        Ok(Self {
            port,
            database_url,
            storage_dir,
            io_timeout: Duration::from_millis(io_timeout_ms),
        })
    }
}

/// Get platform-specific data directory
mod dirs {
    use std::path::PathBuf;

    pub fn data_dir() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            None
        }
    }
}
