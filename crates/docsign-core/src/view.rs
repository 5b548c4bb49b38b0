//! Read model of a request for the sender and recipients

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::category::{categorize, StatusCategory};
use crate::gate;
use crate::model::{PdfVersion, Placement, Rejection, RequestStatus, SignatureRequest};

/// Shown when the user directory has no name for an id
pub const UNKNOWN_NAME: &str = "Unknown";

pub(crate) fn display_name(names: &HashMap<String, String>, user_id: &str) -> String {
    names
        .get(user_id)
        .cloned()
        .unwrap_or_else(|| UNKNOWN_NAME.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipientView {
    pub user_id: String,
    pub name: String,
    pub order: Option<u32>,
    pub signed: bool,
    pub signed_at: Option<DateTime<Utc>>,
    /// Whether the gate would let this recipient sign right now
    pub can_sign: bool,
    pub placements: Vec<Placement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestView {
    pub id: String,
    pub title: String,
    pub email_subject: String,
    pub email_message: String,
    pub sender_id: String,
    pub sender_name: String,
    pub status: RequestStatus,
    pub category: StatusCategory,
    pub due_date: Option<NaiveDate>,
    pub template_id: String,
    pub recipients: Vec<RecipientView>,
    /// Highest version number, `None` while the template is still current
    pub current_version: Option<u32>,
    pub versions: Vec<PdfVersion>,
    pub fully_signed: bool,
    /// Names of the recipients the request is waiting on
    pub waiting_on: Vec<String>,
    pub rejection: Option<Rejection>,
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RequestView {
    pub fn build(
        request: &SignatureRequest,
        names: &HashMap<String, String>,
        today: NaiveDate,
    ) -> Self {
        let eligible: Vec<&str> = gate::next_signers(request)
            .into_iter()
            .map(|r| r.user_id.as_str())
            .collect();

        let recipients = request
            .recipients
            .iter()
            .map(|r| RecipientView {
                user_id: r.user_id.clone(),
                name: display_name(names, &r.user_id),
                order: r.sequence(),
                signed: r.signed,
                signed_at: r.signed_at,
                can_sign: request.status == RequestStatus::Pending
                    && eligible.contains(&r.user_id.as_str()),
                placements: r.signature_positions.clone(),
            })
            .collect();

        let waiting_on = if request.status == RequestStatus::Pending {
            eligible.iter().map(|id| display_name(names, id)).collect()
        } else {
            Vec::new()
        };

        let mut versions = request.pdf_versions.clone();
        versions.sort_by_key(|v| v.version);

        Self {
            id: request.id.clone(),
            title: request.title.clone(),
            email_subject: request.email_subject.clone(),
            email_message: request.email_message.clone(),
            sender_id: request.sender_id.clone(),
            sender_name: display_name(names, &request.sender_id),
            status: request.status,
            category: categorize(request, today),
            due_date: request.due_date,
            template_id: request.template_id.clone(),
            recipients,
            current_version: request.latest_version().map(|v| v.version),
            versions,
            fully_signed: request.all_signed(),
            waiting_on,
            rejection: request.rejection.clone(),
            revision: request.revision,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}
