//! Dashboard statistics over recently created requests

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::model::{RequestStatus, SignatureRequest};
use crate::view::display_name;

pub const DEFAULT_WINDOW_DAYS: i64 = 7;
/// Longest window a caller may ask for
pub const MAX_WINDOW_DAYS: i64 = 366;
const RECENT_LIMIT: usize = 10;
const UNTITLED: &str = "Untitled Request";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: RequestStatus,
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    /// e.g. "Jun 04"
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentRecipient {
    pub user_id: String,
    pub name: String,
    pub signed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentRequest {
    pub id: String,
    pub title: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub sender: String,
    pub recipients: Vec<RecentRecipient>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestStats {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub total_requests: usize,
    /// Percentage of requests in the window that were approved
    pub fulfillment_rate: u32,
    pub status_breakdown: Vec<StatusCount>,
    pub daily_trend: Vec<DailyCount>,
    pub recent_requests: Vec<RecentRequest>,
}

impl RequestStats {
    /// Aggregate requests created in the `last_days` days ending `today`.
    /// A non-positive window falls back to [`DEFAULT_WINDOW_DAYS`]; longer
    /// windows are capped at [`MAX_WINDOW_DAYS`].
    pub fn compute(
        requests: &[SignatureRequest],
        names: &HashMap<String, String>,
        today: NaiveDate,
        last_days: i64,
    ) -> Self {
        let days = if last_days > 0 {
            last_days.min(MAX_WINDOW_DAYS)
        } else {
            DEFAULT_WINDOW_DAYS
        };
        let window_start = today
            .checked_sub_signed(Duration::days(days - 1))
            .unwrap_or(NaiveDate::MIN);

        let in_window: Vec<&SignatureRequest> = requests
            .iter()
            .filter(|r| {
                let created = r.created_at.date_naive();
                created >= window_start && created <= today
            })
            .collect();

        let total_requests = in_window.len();
        let approved = count_status(&in_window, RequestStatus::Approved);
        let fulfillment_rate = if total_requests == 0 {
            0
        } else {
            (approved as f64 / total_requests as f64 * 100.0).round() as u32
        };

        let status_breakdown = [
            RequestStatus::Pending,
            RequestStatus::Approved,
            RequestStatus::Rejected,
        ]
        .into_iter()
        .map(|status| StatusCount {
            status,
            label: capitalize(status.as_str()),
            count: count_status(&in_window, status),
        })
        .filter(|c| c.count > 0)
        .collect();

        let mut per_day: HashMap<NaiveDate, usize> = HashMap::new();
        for r in &in_window {
            *per_day.entry(r.created_at.date_naive()).or_default() += 1;
        }
        let daily_trend = window_start
            .iter_days()
            .take_while(|d| *d <= today)
            .map(|date| DailyCount {
                date,
                label: date.format("%b %d").to_string(),
                count: per_day.get(&date).copied().unwrap_or(0),
            })
            .collect();

        let mut newest = in_window.clone();
        newest.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let recent_requests = newest
            .into_iter()
            .take(RECENT_LIMIT)
            .map(|r| RecentRequest {
                id: r.id.clone(),
                title: if r.title.trim().is_empty() {
                    UNTITLED.to_string()
                } else {
                    r.title.clone()
                },
                status: r.status,
                created_at: r.created_at,
                sender: display_name(names, &r.sender_id),
                recipients: r
                    .recipients
                    .iter()
                    .map(|rc| RecentRecipient {
                        user_id: rc.user_id.clone(),
                        name: display_name(names, &rc.user_id),
                        signed: rc.signed,
                    })
                    .collect(),
            })
            .collect();

        Self {
            window_start,
            window_end: today,
            total_requests,
            fulfillment_rate,
            status_breakdown,
            daily_trend,
            recent_requests,
        }
    }
}

fn count_status(requests: &[&SignatureRequest], status: RequestStatus) -> usize {
    requests.iter().filter(|r| r.status == status).count()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
