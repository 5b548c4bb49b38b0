//! Data models for DocSign API

use chrono::{DateTime, NaiveDate, Utc};
use docsign_core::workflow::NewRecipient;
use docsign_core::{Placement, RequestStatus};
use serde::{Deserialize, Serialize};

/// Request to register a template PDF
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub pdf_base64: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateResponse {
    pub id: String,
    pub name: String,
    pub document_hash: String,
    pub page_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Request to register or rename a user
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
}

/// Request to create a signature request; the sender is the caller
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSignatureRequest {
    pub title: String,
    pub email_subject: String,
    pub email_message: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub template_id: String,
    pub recipients: Vec<NewRecipient>,
}

/// Request to sign
#[derive(Debug, Clone, Deserialize)]
pub struct SignRequest {
    /// `data:image/png;base64,...` or bare base64 PNG
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub placements: Option<Vec<Placement>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignResponse {
    pub success: bool,
    pub request_id: String,
    pub version: u32,
    pub document_hash: String,
    pub status: RequestStatus,
    pub applied: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    /// Category label or snake_case name, e.g. "Due Today" or "due_today"
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsQuery {
    #[serde(default)]
    pub days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub id: String,
}
