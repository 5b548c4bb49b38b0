//! Status transitions of a signature request
//!
//! ```text
//! pending --(last recipient signs)--> approved
//! pending --(cancel / reject)-------> rejected
//! ```
//!
//! Approved and rejected are terminal. All functions here mutate the
//! aggregate in memory only; the caller persists the result.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::WorkflowError;
use crate::gate::{self, Eligibility};
use crate::model::{PdfVersion, Rejection, RequestStatus, SignatureRequest, SignedBy};

/// Fail unless the request still accepts changes
pub fn ensure_pending(request: &SignatureRequest) -> Result<(), WorkflowError> {
    if request.status.is_terminal() {
        return Err(WorkflowError::RequestClosed(request.status));
    }
    Ok(())
}

/// Mark a change: new `updated_at`, next revision
pub fn touch(request: &mut SignatureRequest, now: DateTime<Utc>) {
    request.updated_at = now;
    request.revision += 1;
}

/// Credit `user_id` with a new document version and mark them signed.
///
/// The gate is re-checked; callers are expected to have run it already
/// (with display names) so a failure here means a stale aggregate.
pub fn record_signature(
    request: &mut SignatureRequest,
    user_id: &str,
    file_path: String,
    document_hash: String,
    now: DateTime<Utc>,
) -> Result<PdfVersion, WorkflowError> {
    ensure_pending(request)?;
    match gate::check_eligibility(request, user_id) {
        Eligibility::Allowed => {}
        Eligibility::NotRecipient => {
            return Err(WorkflowError::NotAuthorized(
                "not a recipient of this request".to_string(),
            ))
        }
        Eligibility::AlreadySigned => return Err(WorkflowError::AlreadySigned),
        Eligibility::Waiting { blocker, order } => {
            return Err(WorkflowError::SequencingBlocked {
                message: gate::waiting_message(None, order),
                blocked_by: blocker,
            })
        }
    }

    let version = PdfVersion {
        version: request.next_version_number(),
        file_path,
        document_hash,
        signed_by: SignedBy {
            user_id: user_id.to_string(),
            signed_at: now,
        },
    };
    request.pdf_versions.push(version.clone());

    if let Some(r) = request.recipients.iter_mut().find(|r| r.user_id == user_id) {
        r.signed = true;
        r.signed_at = Some(now);
    }

    refresh_status(request);
    touch(request, now);
    Ok(version)
}

/// Approve a pending request once every recipient has signed.
/// Returns true when the status changed.
pub fn refresh_status(request: &mut SignatureRequest) -> bool {
    if request.status == RequestStatus::Pending && request.all_signed() {
        request.status = RequestStatus::Approved;
        info!(request_id = %request.id, "All recipients signed, request approved");
        return true;
    }
    false
}

/// Sender withdraws the request
pub fn cancel(
    request: &mut SignatureRequest,
    by_user: &str,
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    if request.sender_id != by_user {
        return Err(WorkflowError::NotAuthorized(
            "only the sender can cancel a request".to_string(),
        ));
    }
    ensure_pending(request)?;
    close(request, by_user, None, now);
    Ok(())
}

/// Sender, or a recipient who has not signed yet, declines the request
pub fn reject(
    request: &mut SignatureRequest,
    by_user: &str,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), WorkflowError> {
    let allowed = request.sender_id == by_user
        || request.recipient(by_user).is_some_and(|r| !r.signed);
    if !allowed {
        let message = if request.recipient(by_user).is_some() {
            "recipients who already signed cannot reject"
        } else {
            "only the sender or a recipient can reject a request"
        };
        return Err(WorkflowError::NotAuthorized(message.to_string()));
    }
    ensure_pending(request)?;

    let reason = reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    close(request, by_user, reason, now);
    Ok(())
}

fn close(request: &mut SignatureRequest, by_user: &str, reason: Option<String>, now: DateTime<Utc>) {
    request.status = RequestStatus::Rejected;
    request.rejection = Some(Rejection {
        user_id: by_user.to_string(),
        reason,
        rejected_at: now,
    });
    touch(request, now);
}
