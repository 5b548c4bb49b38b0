//! Due-date urgency of a request, derived on every read

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{RequestStatus, SignatureRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Cancelled,
    Overdue,
    DueToday,
    Open,
}

impl StatusCategory {
    pub fn label(&self) -> &'static str {
        match self {
            StatusCategory::Cancelled => "Cancelled",
            StatusCategory::Overdue => "Overdue",
            StatusCategory::DueToday => "Due Today",
            StatusCategory::Open => "Open",
        }
    }
}

impl std::fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for StatusCategory {
    type Err = String;

    /// Accepts the display label or its snake_case form
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(' ', "_").as_str() {
            "cancelled" => Ok(StatusCategory::Cancelled),
            "overdue" => Ok(StatusCategory::Overdue),
            "due_today" => Ok(StatusCategory::DueToday),
            "open" => Ok(StatusCategory::Open),
            _ => Err(format!("unknown status category: {}", s)),
        }
    }
}

pub fn categorize(request: &SignatureRequest, today: NaiveDate) -> StatusCategory {
    match request.status {
        RequestStatus::Rejected => return StatusCategory::Cancelled,
        RequestStatus::Approved => return StatusCategory::Open,
        RequestStatus::Pending => {}
    }
    if request.all_signed() {
        return StatusCategory::Open;
    }
    match request.due_date {
        Some(due) if due == today => StatusCategory::DueToday,
        Some(due) if due < today => StatusCategory::Overdue,
        _ => StatusCategory::Open,
    }
}
