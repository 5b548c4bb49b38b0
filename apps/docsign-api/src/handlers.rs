//! HTTP handlers for DocSign API

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{NaiveDate, Utc};
use docsign_core::compositor::page_sizes;
use docsign_core::{
    FileStore, NewRequest, RequestStats, RequestView, SignAttempt, SignCheck, SignatureImage,
    StatusCategory, StorageError,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::DbTemplate;
use crate::error::ApiError;
use crate::identity::Caller;
use crate::models::*;
use crate::state::AppState;

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// Register a template PDF
pub async fn create_template(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<TemplateResponse>), ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::InvalidRequest("Template name is required".to_string()));
    }

    // Decode PDF
    let pdf_data = BASE64
        .decode(req.pdf_base64.trim())
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid PDF base64: {}", e)))?;

    let pdf_copy = pdf_data.clone();
    let pages = tokio::task::spawn_blocking(move || page_sizes(&pdf_copy))
        .await
        .map_err(|e| ApiError::Internal(e.into()))?
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid PDF: {}", e)))?;
    if pages.is_empty() {
        return Err(ApiError::InvalidRequest("PDF has no pages".to_string()));
    }

    // Generate document hash
    let document_hash = hex::encode(Sha256::digest(&pdf_data));
    let id = Uuid::new_v4().to_string();

    let file_path = tokio::time::timeout(
        state.io_timeout,
        state.files.put(&format!("templates/{}.pdf", id), pdf_data),
    )
    .await
    .map_err(|_| StorageError::Timeout {
        operation: "store template",
    })??;

    let template = DbTemplate {
        id,
        name,
        file_path,
        document_hash,
        page_count: pages.len() as i64,
        created_at: Utc::now(),
    };
    if let Err(e) = state.templates.register(&template).await {
        if let Err(remove) = state.files.remove(&template.file_path).await {
            tracing::warn!("Failed to remove template file {}: {}", template.file_path, remove);
        }
        return Err(e.into());
    }

    tracing::info!("Registered template: {} ({} pages)", template.id, template.page_count);

    Ok((
        StatusCode::CREATED,
        Json(TemplateResponse {
            id: template.id,
            name: template.name,
            document_hash: template.document_hash,
            page_count: template.page_count,
            created_at: template.created_at,
        }),
    ))
}

/// Get template metadata by ID
pub async fn get_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TemplateResponse>, ApiError> {
    let template = state
        .templates
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("template {}", id)))?;

    Ok(Json(TemplateResponse {
        id: template.id,
        name: template.name,
        document_hash: template.document_hash,
        page_count: template.page_count,
        created_at: template.created_at,
    }))
}

/// Register or rename a user in the directory
pub async fn upsert_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::InvalidRequest("User name is required".to_string()));
    }
    let id = req
        .id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    state.users.upsert(&id, &name).await?;
    Ok(Json(UserResponse { id, name }))
}

/// Create a signature request sent by the caller
pub async fn create_request(
    State(state): State<Arc<AppState>>,
    Caller(sender_id): Caller,
    Json(req): Json<CreateSignatureRequest>,
) -> Result<(StatusCode, Json<RequestView>), ApiError> {
    let request = state
        .workflow
        .create_request(NewRequest {
            sender_id: sender_id.clone(),
            title: req.title,
            email_subject: req.email_subject,
            email_message: req.email_message,
            due_date: req.due_date,
            template_id: req.template_id,
            recipients: req.recipients,
        })
        .await?;

    let view = state
        .workflow
        .get_request_view(&request.id, &sender_id, today())
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// List requests the caller sent or has to sign
pub async fn list_requests(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<RequestView>>, ApiError> {
    let category = query
        .category
        .as_deref()
        .map(str::parse::<StatusCategory>)
        .transpose()
        .map_err(ApiError::InvalidRequest)?;

    let views = state
        .workflow
        .list_for_user(&user_id, today(), category)
        .await?;
    Ok(Json(views))
}

/// Get request by ID
pub async fn get_request(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> Result<Json<RequestView>, ApiError> {
    let view = state
        .workflow
        .get_request_view(&id, &user_id, today())
        .await?;
    Ok(Json(view))
}

/// Whether the caller may sign now
pub async fn can_sign(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> Result<Json<SignCheck>, ApiError> {
    Ok(Json(state.workflow.check_signing(&id, &user_id).await?))
}

/// Sign the current document version
pub async fn sign_request(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
    Json(req): Json<SignRequest>,
) -> Result<Json<SignResponse>, ApiError> {
    let signature = match req.signature.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(encoded) => {
            let encoded = encoded.to_string();
            let image = tokio::task::spawn_blocking(move || SignatureImage::from_encoded(&encoded))
                .await
                .map_err(|e| ApiError::Internal(e.into()))??;
            Some(image)
        }
    };

    let outcome = state
        .workflow
        .attempt_sign(SignAttempt {
            request_id: id.clone(),
            user_id,
            signature,
            placements: req.placements,
        })
        .await?;

    Ok(Json(SignResponse {
        success: true,
        request_id: id,
        version: outcome.version.version,
        document_hash: outcome.version.document_hash,
        status: outcome.status,
        applied: outcome.applied,
        skipped: outcome.skipped.len(),
    }))
}

/// Sender cancels a pending request
pub async fn cancel_request(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> Result<Json<RequestView>, ApiError> {
    state.workflow.cancel_request(&id, &user_id).await?;
    let view = state
        .workflow
        .get_request_view(&id, &user_id, today())
        .await?;
    Ok(Json(view))
}

/// Sender or an unsigned recipient declines a pending request
pub async fn reject_request(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
    body: Option<Json<RejectRequest>>,
) -> Result<Json<RequestView>, ApiError> {
    let reason = body.and_then(|Json(b)| b.reason);
    state.workflow.reject_request(&id, &user_id, reason).await?;
    let view = state
        .workflow
        .get_request_view(&id, &user_id, today())
        .await?;
    Ok(Json(view))
}

/// Sender deletes a request and its signed versions
pub async fn delete_request(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.workflow.delete_request(&id, &user_id).await?;
    Ok(Json(DeleteResponse { success: true, id }))
}

/// Get the current PDF for a request
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> Result<(StatusCode, [(header::HeaderName, String); 2], Vec<u8>), ApiError> {
    let document = state.workflow.current_document(&id, &user_id).await?;
    let filename = match document.version {
        Some(v) => format!("{}-v{}.pdf", id, v),
        None => format!("{}.pdf", id),
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", filename),
            ),
        ],
        document.bytes,
    ))
}

/// Dashboard statistics over the caller's recently created requests
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Query(query): Query<StatsQuery>,
) -> Result<Json<RequestStats>, ApiError> {
    let days = query.days.unwrap_or(docsign_core::stats::DEFAULT_WINDOW_DAYS);
    let stats = state.workflow.stats(&user_id, today(), days).await?;
    Ok(Json(stats))
}
