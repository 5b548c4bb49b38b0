//! The signing workflow service
//!
//! Every mutation of a request runs under that request's lock and commits
//! through an optimistic revision check, so the gate decision, the new PDF
//! version and the signed flag are written together or not at all.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use shared_pdf::PdfError;
use tracing::{debug, info, warn};

use crate::category::StatusCategory;
use crate::compositor::{self, SkippedPlacement};
use crate::error::{StorageError, WorkflowError};
use crate::gate::{self, Eligibility, SignCheck};
use crate::lifecycle;
use crate::locks::RequestLocks;
use crate::model::{PdfVersion, Placement, Recipient, RequestStatus, SignatureRequest};
use crate::placement::{self, PageSize};
use crate::ports::{FileStore, RequestRepository, TemplateStore, UserDirectory};
use crate::signature::SignatureImage;
use crate::stats::RequestStats;
use crate::view::RequestView;

const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
pub struct WorkflowConfig {
    /// Upper bound for each storage call
    pub io_timeout: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRecipient {
    pub user_id: String,
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(default)]
    pub placements: Vec<Placement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRequest {
    pub sender_id: String,
    pub title: String,
    pub email_subject: String,
    pub email_message: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub template_id: String,
    pub recipients: Vec<NewRecipient>,
}

#[derive(Debug, Clone)]
pub struct SignAttempt {
    pub request_id: String,
    pub user_id: String,
    pub signature: Option<SignatureImage>,
    /// Placements chosen at signing time; the stored ones are used if absent
    pub placements: Option<Vec<Placement>>,
}

#[derive(Debug, Clone)]
pub struct SignOutcome {
    pub version: PdfVersion,
    pub status: RequestStatus,
    pub applied: usize,
    pub skipped: Vec<SkippedPlacement>,
}

/// The document a participant currently sees
#[derive(Debug, Clone)]
pub struct CurrentDocument {
    /// `None` while no one has signed and the template is shown
    pub version: Option<u32>,
    pub bytes: Vec<u8>,
}

pub struct SigningWorkflow {
    requests: Arc<dyn RequestRepository>,
    files: Arc<dyn FileStore>,
    templates: Arc<dyn TemplateStore>,
    users: Arc<dyn UserDirectory>,
    locks: RequestLocks,
    config: WorkflowConfig,
}

impl SigningWorkflow {
    pub fn new(
        requests: Arc<dyn RequestRepository>,
        files: Arc<dyn FileStore>,
        templates: Arc<dyn TemplateStore>,
        users: Arc<dyn UserDirectory>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            requests,
            files,
            templates,
            users,
            locks: RequestLocks::new(),
            config,
        }
    }

    pub fn config(&self) -> WorkflowConfig {
        self.config
    }

    /// Validate and persist a new pending request.
    ///
    /// Placements are converted to page ratios against the template's page
    /// sizes.
    pub async fn create_request(&self, new: NewRequest) -> Result<SignatureRequest, WorkflowError> {
        let sender_id = required("sender_id", &new.sender_id)?;
        let title = required("title", &new.title)?;
        let email_subject = required("email_subject", &new.email_subject)?;
        let email_message = required("email_message", &new.email_message)?;
        let template_id = required("template_id", &new.template_id)?;

        if new.recipients.is_empty() {
            return Err(WorkflowError::InvalidRequest(
                "at least one recipient is required".to_string(),
            ));
        }
        for (i, r) in new.recipients.iter().enumerate() {
            if r.user_id.trim().is_empty() {
                return Err(WorkflowError::InvalidRequest(format!(
                    "recipient {} has no user id",
                    i + 1
                )));
            }
            if new.recipients[..i].iter().any(|o| o.user_id.trim() == r.user_id.trim()) {
                return Err(WorkflowError::InvalidRequest(format!(
                    "recipient {} is listed more than once",
                    r.user_id
                )));
            }
        }

        let template_path = self.template_path(&template_id).await?;
        let template = self
            .io("read template", self.files.get(&template_path))
            .await?;
        let sizes = tokio::task::spawn_blocking(move || compositor::page_sizes(&template))
            .await
            .map_err(|e| PdfError::Operation(format!("Page size task failed: {}", e)))??;

        let mut recipients = Vec::with_capacity(new.recipients.len());
        for r in new.recipients {
            let positions = r
                .placements
                .iter()
                .map(|p| canonical_placement(p, &sizes))
                .collect::<Result<Vec<_>, _>>()?;
            let mut recipient = Recipient::new(r.user_id.trim()).with_positions(positions);
            recipient.order = r.order;
            recipients.push(recipient);
        }

        let now = Utc::now();
        let request = SignatureRequest {
            id: uuid::Uuid::new_v4().to_string(),
            sender_id,
            title,
            email_subject,
            email_message,
            status: RequestStatus::Pending,
            due_date: new.due_date,
            template_id,
            recipients,
            pdf_versions: Vec::new(),
            rejection: None,
            revision: 0,
            created_at: now,
            updated_at: now,
        };

        self.io("insert request", self.requests.insert(&request))
            .await?;
        info!(
            request_id = %request.id,
            recipients = request.recipients.len(),
            "Created signature request"
        );
        Ok(request)
    }

    /// Gate, composite and commit one recipient's signature
    pub async fn attempt_sign(&self, attempt: SignAttempt) -> Result<SignOutcome, WorkflowError> {
        let SignAttempt {
            request_id,
            user_id,
            signature,
            placements,
        } = attempt;

        let _guard = self.locks.acquire(&request_id).await;
        let mut request = self.load_existing(&request_id).await?;
        lifecycle::ensure_pending(&request)?;

        match gate::check_eligibility(&request, &user_id) {
            Eligibility::Allowed => {}
            Eligibility::NotRecipient => {
                return Err(WorkflowError::NotAuthorized(
                    "not a recipient of this request".to_string(),
                ))
            }
            Eligibility::AlreadySigned => return Err(WorkflowError::AlreadySigned),
            Eligibility::Waiting { blocker, order } => {
                let name = self.lookup_name(&blocker).await;
                debug!(request_id = %request_id, user_id = %user_id, blocked_by = %blocker, "Signing blocked by order");
                return Err(WorkflowError::SequencingBlocked {
                    message: gate::waiting_message(name.as_deref(), order),
                    blocked_by: blocker,
                });
            }
        }
        let signature = signature.ok_or(WorkflowError::MissingSignatureImage)?;

        let supplied = placements.filter(|p| !p.is_empty());
        let to_draw = match &supplied {
            Some(p) => p.clone(),
            None => request
                .recipient(&user_id)
                .map(|r| r.signature_positions.clone())
                .unwrap_or_default(),
        };
        if to_draw.is_empty() {
            return Err(WorkflowError::InvalidPlacement(
                "no signature placements for this recipient".to_string(),
            ));
        }

        let base_path = match request.latest_version() {
            Some(v) => v.file_path.clone(),
            None => self.template_path(&request.template_id).await?,
        };
        let base = self.io("read base document", self.files.get(&base_path)).await?;

        let output = tokio::task::spawn_blocking(move || {
            compositor::composite(&base, &signature, &to_draw)
        })
        .await
        .map_err(|e| PdfError::Operation(format!("Compositing task failed: {}", e)))??;

        let version_number = request.next_version_number();
        // unique per attempt so a rollback never touches a file another writer committed
        let key = format!(
            "{}/v{}-{}.pdf",
            request.id,
            version_number,
            uuid::Uuid::new_v4().simple()
        );
        let document_hash = hex::encode(Sha256::digest(&output.pdf));
        let path = self.io("store version", self.files.put(&key, output.pdf)).await?;

        let expected = request.revision;
        if let Some(positions) = supplied {
            if let Some(r) = request.recipients.iter_mut().find(|r| r.user_id == user_id) {
                r.signature_positions = positions;
            }
        }
        let committed = match lifecycle::record_signature(
            &mut request,
            &user_id,
            path.clone(),
            document_hash,
            Utc::now(),
        ) {
            Ok(version) => self
                .io("save request", self.requests.save(&request, expected))
                .await
                .map(|_| version),
            Err(e) => Err(e),
        };

        let version = match committed {
            Ok(version) => version,
            // a timed-out save may still have committed, so its file stays
            Err(e @ WorkflowError::Storage(StorageError::Timeout { .. })) => {
                warn!(path = %path, "Keeping stored version after save timeout");
                return Err(e);
            }
            Err(e) => {
                self.discard_file(&path).await;
                return Err(e);
            }
        };

        info!(
            request_id = %request.id,
            user_id = %user_id,
            version = version.version,
            applied = output.applied,
            status = %request.status,
            "Recorded signature"
        );
        Ok(SignOutcome {
            version,
            status: request.status,
            applied: output.applied,
            skipped: output.skipped,
        })
    }

    /// Request view for its sender or one of its recipients
    pub async fn get_request_view(
        &self,
        request_id: &str,
        viewer_id: &str,
        today: NaiveDate,
    ) -> Result<RequestView, WorkflowError> {
        let request = self.load_existing(request_id).await?;
        if !request.is_participant(viewer_id) {
            return Err(WorkflowError::NotAuthorized(
                "only the sender and recipients can view this request".to_string(),
            ));
        }
        let names = self.names_for(std::slice::from_ref(&request)).await;
        Ok(RequestView::build(&request, &names, today))
    }

    /// Whether `user_id` may sign right now, with the reason if not
    pub async fn check_signing(
        &self,
        request_id: &str,
        user_id: &str,
    ) -> Result<SignCheck, WorkflowError> {
        let request = self.load_existing(request_id).await?;
        if request.status.is_terminal() {
            return Ok(SignCheck {
                allowed: false,
                reason: Some(format!("request is {}", request.status)),
            });
        }
        let names = self.names_for(std::slice::from_ref(&request)).await;
        Ok(gate::can_sign(&request, user_id, &names))
    }

    /// Sender withdraws a pending request
    pub async fn cancel_request(
        &self,
        request_id: &str,
        by_user: &str,
    ) -> Result<SignatureRequest, WorkflowError> {
        self.close_request(request_id, |request| {
            lifecycle::cancel(request, by_user, Utc::now())
        })
        .await
    }

    /// Sender or an unsigned recipient declines a pending request
    pub async fn reject_request(
        &self,
        request_id: &str,
        by_user: &str,
        reason: Option<String>,
    ) -> Result<SignatureRequest, WorkflowError> {
        self.close_request(request_id, |request| {
            lifecycle::reject(request, by_user, reason, Utc::now())
        })
        .await
    }

    /// Sender removes a request together with its signed versions
    pub async fn delete_request(&self, request_id: &str, by_user: &str) -> Result<(), WorkflowError> {
        let _guard = self.locks.acquire(request_id).await;
        let request = self.load_existing(request_id).await?;
        if request.sender_id != by_user {
            return Err(WorkflowError::NotAuthorized(
                "only the sender can delete a request".to_string(),
            ));
        }

        if !self.io("delete request", self.requests.delete(request_id)).await? {
            return Err(WorkflowError::NotFound(format!("signature request {}", request_id)));
        }
        for version in &request.pdf_versions {
            self.discard_file(&version.file_path).await;
        }
        info!(request_id = %request_id, "Deleted signature request");
        Ok(())
    }

    /// Requests the user sent or was asked to sign, newest first
    pub async fn list_for_user(
        &self,
        user_id: &str,
        today: NaiveDate,
        category: Option<StatusCategory>,
    ) -> Result<Vec<RequestView>, WorkflowError> {
        let mut requests: Vec<SignatureRequest> = self
            .io("list requests", self.requests.list())
            .await?
            .into_iter()
            .filter(|r| r.is_participant(user_id))
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let names = self.names_for(&requests).await;
        Ok(requests
            .iter()
            .map(|r| RequestView::build(r, &names, today))
            .filter(|v| category.map_or(true, |c| v.category == c))
            .collect())
    }

    /// Dashboard statistics over the requests `viewer_id` sent or has to sign
    pub async fn stats(
        &self,
        viewer_id: &str,
        today: NaiveDate,
        last_days: i64,
    ) -> Result<RequestStats, WorkflowError> {
        let requests: Vec<SignatureRequest> = self
            .io("list requests", self.requests.list())
            .await?
            .into_iter()
            .filter(|r| r.is_participant(viewer_id))
            .collect();
        let names = self.names_for(&requests).await;
        Ok(RequestStats::compute(&requests, &names, today, last_days))
    }

    /// Latest signed version, or the template before anyone signed
    pub async fn current_document(
        &self,
        request_id: &str,
        viewer_id: &str,
    ) -> Result<CurrentDocument, WorkflowError> {
        let request = self.load_existing(request_id).await?;
        if !request.is_participant(viewer_id) {
            return Err(WorkflowError::NotAuthorized(
                "only the sender and recipients can download this document".to_string(),
            ));
        }
        let (version, path) = match request.latest_version() {
            Some(v) => (Some(v.version), v.file_path.clone()),
            None => (None, self.template_path(&request.template_id).await?),
        };
        let bytes = self.io("read document", self.files.get(&path)).await?;
        Ok(CurrentDocument { version, bytes })
    }

    async fn close_request<F>(&self, request_id: &str, transition: F) -> Result<SignatureRequest, WorkflowError>
    where
        F: FnOnce(&mut SignatureRequest) -> Result<(), WorkflowError>,
    {
        let _guard = self.locks.acquire(request_id).await;
        let mut request = self.load_existing(request_id).await?;
        let expected = request.revision;
        transition(&mut request)?;
        self.io("save request", self.requests.save(&request, expected))
            .await?;
        info!(request_id = %request_id, status = %request.status, "Closed signature request");
        Ok(request)
    }

    async fn load_existing(&self, request_id: &str) -> Result<SignatureRequest, WorkflowError> {
        self.io("load request", self.requests.load(request_id))
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("signature request {}", request_id)))
    }

    async fn template_path(&self, template_id: &str) -> Result<String, WorkflowError> {
        self.io("look up template", self.templates.template_file(template_id))
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("template {}", template_id)))
    }

    /// Display name for one user; lookup failures fall back to no name
    async fn lookup_name(&self, user_id: &str) -> Option<String> {
        match self.io("look up user", self.users.display_name(user_id)).await {
            Ok(name) => name,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "User lookup failed");
                None
            }
        }
    }

    async fn names_for(&self, requests: &[SignatureRequest]) -> HashMap<String, String> {
        let mut names = HashMap::new();
        let ids = requests
            .iter()
            .flat_map(|r| std::iter::once(&r.sender_id).chain(r.recipients.iter().map(|rc| &rc.user_id)))
            .collect::<Vec<_>>();
        for id in ids {
            if names.contains_key(id) {
                continue;
            }
            if let Some(name) = self.lookup_name(id).await {
                names.insert(id.clone(), name);
            }
        }
        names
    }

    async fn discard_file(&self, path: &str) {
        if let Err(e) = self.io("remove file", self.files.remove(path)).await {
            warn!(path = %path, error = %e, "Failed to remove stored file");
        }
    }

    /// Run a storage call under the configured timeout
    async fn io<T, F>(&self, operation: &'static str, call: F) -> Result<T, WorkflowError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        match tokio::time::timeout(self.config.io_timeout, call).await {
            Ok(result) => result.map_err(WorkflowError::from),
            Err(_) => {
                warn!(operation, "Storage call timed out");
                Err(StorageError::Timeout { operation }.into())
            }
        }
    }
}

fn required(field: &str, value: &str) -> Result<String, WorkflowError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(WorkflowError::InvalidRequest(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn canonical_placement(p: &Placement, sizes: &[PageSize]) -> Result<Placement, WorkflowError> {
    let size = p
        .page
        .checked_sub(1)
        .and_then(|i| sizes.get(i as usize))
        .ok_or_else(|| {
            WorkflowError::InvalidPlacement(format!(
                "page {} does not exist (template has {} pages)",
                p.page,
                sizes.len()
            ))
        })?;
    if !p.x.is_finite() || !p.y.is_finite() {
        return Err(WorkflowError::InvalidPlacement(
            "placement position must be a number".to_string(),
        ));
    }
    Ok(placement::normalize_for_page(p, *size).into_placement(p.page))
}
