//! Signing order gate
//!
//! A recipient with an order value may sign only once every recipient with
//! a lower order value has signed. Recipients without an order (or order 0)
//! are never blocked, and recipients sharing an order value sign in parallel.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{Recipient, SignatureRequest};

/// Outcome of the gate for one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Allowed,
    NotRecipient,
    AlreadySigned,
    /// `blocker` is the lowest-ordered unsigned recipient ahead of the caller
    Waiting { blocker: String, order: u32 },
}

impl Eligibility {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Eligibility::Allowed)
    }
}

/// Gate result with a human readable reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignCheck {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub fn check_eligibility(request: &SignatureRequest, user_id: &str) -> Eligibility {
    let Some(recipient) = request.recipient(user_id) else {
        return Eligibility::NotRecipient;
    };
    if recipient.signed {
        return Eligibility::AlreadySigned;
    }
    let Some(own_order) = recipient.sequence() else {
        return Eligibility::Allowed;
    };

    let blocker = request
        .recipients
        .iter()
        .filter(|r| !r.signed)
        .filter_map(|r| r.sequence().map(|o| (o, r)))
        .filter(|(o, _)| *o < own_order)
        .min_by_key(|(o, _)| *o);

    match blocker {
        Some((order, r)) => Eligibility::Waiting {
            blocker: r.user_id.clone(),
            order,
        },
        None => Eligibility::Allowed,
    }
}

/// Message shown to a recipient who has to wait
pub fn waiting_message(blocker_name: Option<&str>, order: u32) -> String {
    match blocker_name {
        Some(name) => format!("Waiting for {} to sign first", name),
        None => format!("Waiting for Approver #{} to sign first", order),
    }
}

/// Gate check resolving the blocker's display name through `names`
pub fn can_sign(
    request: &SignatureRequest,
    user_id: &str,
    names: &HashMap<String, String>,
) -> SignCheck {
    let denied = |reason: String| SignCheck {
        allowed: false,
        reason: Some(reason),
    };
    match check_eligibility(request, user_id) {
        Eligibility::Allowed => SignCheck {
            allowed: true,
            reason: None,
        },
        Eligibility::NotRecipient => denied("not a recipient of this request".to_string()),
        Eligibility::AlreadySigned => denied("already signed".to_string()),
        Eligibility::Waiting { blocker, order } => denied(waiting_message(
            names.get(&blocker).map(String::as_str),
            order,
        )),
    }
}

/// Recipients who could sign right now
pub fn next_signers(request: &SignatureRequest) -> Vec<&Recipient> {
    request
        .recipients
        .iter()
        .filter(|r| check_eligibility(request, &r.user_id).is_allowed())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::request_with;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn sign(request: &mut SignatureRequest, user_id: &str) {
        let r = request
            .recipients
            .iter_mut()
            .find(|r| r.user_id == user_id)
            .unwrap();
        r.signed = true;
        r.signed_at = Some(Utc::now());
    }

    fn names() -> HashMap<String, String> {
        HashMap::from([("a".to_string(), "Alice".to_string())])
    }

    #[test]
    fn test_unordered_recipients_sign_freely() {
        let req = request_with(vec![Recipient::new("a"), Recipient::new("b")]);
        assert_eq!(check_eligibility(&req, "a"), Eligibility::Allowed);
        assert_eq!(check_eligibility(&req, "b"), Eligibility::Allowed);
    }

    #[test]
    fn test_second_in_order_waits_for_first() {
        let mut req = request_with(vec![
            Recipient::new("a").with_order(1),
            Recipient::new("b").with_order(2),
        ]);
        assert_eq!(
            check_eligibility(&req, "b"),
            Eligibility::Waiting {
                blocker: "a".to_string(),
                order: 1
            }
        );
        assert_eq!(
            can_sign(&req, "b", &names()).reason.as_deref(),
            Some("Waiting for Alice to sign first")
        );

        sign(&mut req, "a");
        assert_eq!(check_eligibility(&req, "b"), Eligibility::Allowed);
    }

    #[test]
    fn test_lowest_unsigned_blocker_is_reported() {
        let req = request_with(vec![
            Recipient::new("c").with_order(3),
            Recipient::new("b").with_order(2),
            Recipient::new("a").with_order(1),
        ]);
        let check = can_sign(&req, "c", &HashMap::new());
        assert!(!check.allowed);
        assert_eq!(
            check.reason.as_deref(),
            Some("Waiting for Approver #1 to sign first")
        );
    }

    #[test]
    fn test_unordered_recipient_is_never_blocked() {
        let req = request_with(vec![
            Recipient::new("a").with_order(1),
            Recipient::new("b").with_order(0),
        ]);
        assert_eq!(check_eligibility(&req, "b"), Eligibility::Allowed);
    }

    #[test]
    fn test_unordered_recipient_does_not_block_ordered() {
        let req = request_with(vec![Recipient::new("a"), Recipient::new("b").with_order(1)]);
        assert_eq!(check_eligibility(&req, "b"), Eligibility::Allowed);
    }

    #[test]
    fn test_shared_order_signs_in_parallel() {
        let req = request_with(vec![
            Recipient::new("a").with_order(1),
            Recipient::new("b").with_order(1),
            Recipient::new("c").with_order(2),
        ]);
        assert_eq!(check_eligibility(&req, "a"), Eligibility::Allowed);
        assert_eq!(check_eligibility(&req, "b"), Eligibility::Allowed);
        assert!(!check_eligibility(&req, "c").is_allowed());
    }

    #[test]
    fn test_non_recipient_and_already_signed() {
        let mut req = request_with(vec![Recipient::new("a")]);
        assert_eq!(
            can_sign(&req, "mallory", &names()).reason.as_deref(),
            Some("not a recipient of this request")
        );
        sign(&mut req, "a");
        assert_eq!(
            can_sign(&req, "a", &names()),
            SignCheck {
                allowed: false,
                reason: Some("already signed".to_string())
            }
        );
    }

    #[test]
    fn test_next_signers() {
        let mut req = request_with(vec![
            Recipient::new("a").with_order(1),
            Recipient::new("b").with_order(2),
            Recipient::new("c"),
        ]);
        let ids = |req: &SignatureRequest| {
            next_signers(req)
                .into_iter()
                .map(|r| r.user_id.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(&req), vec!["a", "c"]);
        sign(&mut req, "a");
        assert_eq!(ids(&req), vec!["b", "c"]);
    }
}
