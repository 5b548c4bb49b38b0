//! Signature request aggregate and its owned records

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Request status as stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    /// Approved and rejected requests accept no further signatures
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(format!("unknown request status: {}", other)),
        }
    }
}

/// One signature-box location on a page.
///
/// Geometry is either canonical (ratios of the page size) or legacy absolute
/// values; see [`crate::placement`] for how the two are told apart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// 1-based page number
    pub page: u32,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl Placement {
    pub fn new(page: u32, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            page,
            x,
            y,
            width: Some(width),
            height: Some(height),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub user_id: String,
    /// Position in the signing order; `None` or 0 means unordered
    #[serde(default)]
    pub order: Option<u32>,
    #[serde(default)]
    pub signed: bool,
    #[serde(default)]
    pub signed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub signature_positions: Vec<Placement>,
}

impl Recipient {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            order: None,
            signed: false,
            signed_at: None,
            signature_positions: Vec::new(),
        }
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_positions(mut self, positions: Vec<Placement>) -> Self {
        self.signature_positions = positions;
        self
    }

    /// The effective sequencing position, treating 0 as unset
    pub fn sequence(&self) -> Option<u32> {
        self.order.filter(|o| *o > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBy {
    pub user_id: String,
    pub signed_at: DateTime<Utc>,
}

/// An immutable snapshot of the document after one recipient signed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfVersion {
    pub version: u32,
    pub file_path: String,
    /// Hex SHA-256 of the stored file
    pub document_hash: String,
    pub signed_by: SignedBy,
}

/// Who closed a request without completing it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub user_id: String,
    #[serde(default)]
    pub reason: Option<String>,
    pub rejected_at: DateTime<Utc>,
}

/// A signature workflow instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRequest {
    pub id: String,
    pub sender_id: String,
    pub title: String,
    pub email_subject: String,
    pub email_message: String,
    pub status: RequestStatus,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub template_id: String,
    pub recipients: Vec<Recipient>,
    #[serde(default)]
    pub pdf_versions: Vec<PdfVersion>,
    #[serde(default)]
    pub rejection: Option<Rejection>,
    /// Bumped on every committed change; used for optimistic concurrency
    #[serde(default)]
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SignatureRequest {
    pub fn recipient(&self, user_id: &str) -> Option<&Recipient> {
        self.recipients.iter().find(|r| r.user_id == user_id)
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.sender_id == user_id || self.recipient(user_id).is_some()
    }

    pub fn all_signed(&self) -> bool {
        !self.recipients.is_empty() && self.recipients.iter().all(|r| r.signed)
    }

    /// The version with the highest number, if any recipient has signed
    pub fn latest_version(&self) -> Option<&PdfVersion> {
        self.pdf_versions.iter().max_by_key(|v| v.version)
    }

    pub fn next_version_number(&self) -> u32 {
        self.latest_version().map_or(1, |v| v.version + 1)
    }

    /// Check the aggregate's structural invariants
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.recipients.is_empty() {
            return Err("request has no recipients".to_string());
        }

        for (i, r) in self.recipients.iter().enumerate() {
            if self.recipients[..i].iter().any(|o| o.user_id == r.user_id) {
                return Err(format!("recipient {} is listed twice", r.user_id));
            }
            if r.signed != r.signed_at.is_some() {
                return Err(format!(
                    "recipient {} has inconsistent signed state",
                    r.user_id
                ));
            }
            let credited = self
                .pdf_versions
                .iter()
                .any(|v| v.signed_by.user_id == r.user_id);
            if r.signed && !credited {
                return Err(format!("recipient {} signed without a version", r.user_id));
            }
            if credited && !r.signed {
                return Err(format!(
                    "version credits {} who has not signed",
                    r.user_id
                ));
            }
        }

        let mut numbers: Vec<u32> = self.pdf_versions.iter().map(|v| v.version).collect();
        numbers.sort_unstable();
        if numbers.iter().enumerate().any(|(i, n)| *n != i as u32 + 1) {
            return Err("pdf versions are not numbered 1..N".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::request_with;

    #[test]
    fn test_zero_order_is_unordered() {
        assert_eq!(Recipient::new("a").with_order(0).sequence(), None);
        assert_eq!(Recipient::new("a").with_order(3).sequence(), Some(3));
    }

    #[test]
    fn test_next_version_number() {
        let mut req = request_with(vec![Recipient::new("a")]);
        assert_eq!(req.next_version_number(), 1);
        req.pdf_versions.push(PdfVersion {
            version: 1,
            file_path: "v1.pdf".to_string(),
            document_hash: String::new(),
            signed_by: SignedBy {
                user_id: "a".to_string(),
                signed_at: Utc::now(),
            },
        });
        assert_eq!(req.next_version_number(), 2);
    }

    #[test]
    fn test_invariants_reject_duplicates() {
        let req = request_with(vec![Recipient::new("a"), Recipient::new("a")]);
        assert!(req.check_invariants().is_err());
    }

    #[test]
    fn test_invariants_reject_signed_without_version() {
        let mut req = request_with(vec![Recipient::new("a")]);
        req.recipients[0].signed = true;
        req.recipients[0].signed_at = Some(Utc::now());
        assert!(req.check_invariants().is_err());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Approved,
            RequestStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<RequestStatus>(), Ok(status));
        }
        assert!("expired".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn test_legacy_placement_without_size_deserializes() {
        let p: Placement = serde_json::from_str(r#"{"page":1,"x":120,"y":300}"#).unwrap();
        assert_eq!(p.width, None);
        assert_eq!(p.x, 120.0);
    }
}
