//! HTTP-level tests for the signing API
//!
//! Each test runs the full router over an in-memory SQLite database and a
//! temporary storage directory.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use shared_pdf::testing::{pdf_with_pages, solid_png};
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::TempDir;
use tower::ServiceExt;

use docsign_api::{app, identity::USER_ID_HEADER, state::AppState};

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    dir: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let dir = TempDir::new().unwrap();
        let state = AppState::with_pool(pool, dir.path().to_path_buf(), Duration::from_secs(5))
            .await
            .unwrap();
        let state = Arc::new(state);
        Self {
            router: app(state.clone()),
            state,
            dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    async fn json(&self, method: &str, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let (status, bytes) = self.send(request).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Register sam, alice and bob plus a two-page template; returns the template id
    async fn seed(&self) -> String {
        for (id, name) in [("sam", "Sam Sender"), ("alice", "Alice"), ("bob", "Bob")] {
            let (status, _) = self
                .json("POST", "/api/users", None, Some(json!({ "id": id, "name": name })))
                .await;
            assert_eq!(status, StatusCode::OK);
        }

        let pdf = pdf_with_pages(&[[0, 0, 612, 792], [0, 0, 612, 792]]);
        let (status, body) = self
            .json(
                "POST",
                "/api/templates",
                None,
                Some(json!({ "name": "NDA", "pdf_base64": BASE64.encode(&pdf) })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["page_count"], 2);
        body["id"].as_str().unwrap().to_string()
    }

    async fn create_request(&self, template_id: &str) -> String {
        let (status, body) = self
            .json(
                "POST",
                "/api/requests",
                Some("sam"),
                Some(json!({
                    "title": "Mutual NDA",
                    "email_subject": "Please sign",
                    "email_message": "Alice first, then Bob",
                    "template_id": template_id,
                    "recipients": [
                        {
                            "user_id": "alice",
                            "order": 1,
                            "placements": [{ "page": 1, "x": 0.1, "y": 0.7, "width": 0.25, "height": 0.08 }]
                        },
                        {
                            "user_id": "bob",
                            "order": 2,
                            "placements": [{ "page": 2, "x": 0.5, "y": 0.7, "width": 0.25, "height": 0.08 }]
                        }
                    ]
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["status"], "pending");
        assert_eq!(body["sender_name"], "Sam Sender");
        body["id"].as_str().unwrap().to_string()
    }
}

fn signature_data_url() -> String {
    format!(
        "data:image/png;base64,{}",
        BASE64.encode(solid_png(40, 16, [0, 0, 128, 255]))
    )
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK".to_vec());
}

#[tokio::test]
async fn test_sequential_signing_flow() {
    let app = TestApp::new().await;
    let template_id = app.seed().await;
    let id = app.create_request(&template_id).await;

    // Bob is second in line
    let (status, check) = app
        .json("GET", &format!("/api/requests/{}/can-sign", id), Some("bob"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(check["allowed"], false);
    assert!(check["reason"].as_str().unwrap().contains("Alice"));

    let (status, body) = app
        .json(
            "POST",
            &format!("/api/requests/{}/sign", id),
            Some("bob"),
            Some(json!({ "signature": signature_data_url() })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "sequencing_blocked");
    assert_eq!(body["requiresSequentialSigning"], true);
    assert_eq!(body["blockedBy"], "alice");

    let (status, body) = app
        .json(
            "POST",
            &format!("/api/requests/{}/sign", id),
            Some("alice"),
            Some(json!({ "signature": signature_data_url() })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["version"], 1);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["applied"], 1);

    // Alice cannot sign twice
    let (status, body) = app
        .json(
            "POST",
            &format!("/api/requests/{}/sign", id),
            Some("alice"),
            Some(json!({ "signature": signature_data_url() })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "already_signed");

    let (status, body) = app
        .json(
            "POST",
            &format!("/api/requests/{}/sign", id),
            Some("bob"),
            Some(json!({ "signature": signature_data_url() })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["version"], 2);
    assert_eq!(body["status"], "approved");

    let (status, view) = app
        .json("GET", &format!("/api/requests/{}", id), Some("sam"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["current_version"], 2);
    assert_eq!(view["fully_signed"], true);
    assert_eq!(view["versions"].as_array().unwrap().len(), 2);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get(format!("/api/requests/{}/document", id))
                .header(USER_ID_HEADER, "sam")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.contains("-v2.pdf"));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.starts_with(b"%PDF-"));
}

#[tokio::test]
async fn test_identity_required() {
    let app = TestApp::new().await;
    let (status, body) = app.json("GET", "/api/requests", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthenticated");
}

#[tokio::test]
async fn test_sign_without_image() {
    let app = TestApp::new().await;
    let template_id = app.seed().await;
    let id = app.create_request(&template_id).await;

    let (status, body) = app
        .json("POST", &format!("/api/requests/{}/sign", id), Some("alice"), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "missing_signature_image");
}

#[tokio::test]
async fn test_outsider_cannot_view() {
    let app = TestApp::new().await;
    let template_id = app.seed().await;
    let id = app.create_request(&template_id).await;

    let (status, _) = app
        .json("GET", &format!("/api/requests/{}", id), Some("mallory"), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .json("GET", "/api/requests/does-not-exist", Some("sam"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reject_closes_request() {
    let app = TestApp::new().await;
    let template_id = app.seed().await;
    let id = app.create_request(&template_id).await;

    // Only the sender may cancel
    let (status, _) = app
        .json("POST", &format!("/api/requests/{}/cancel", id), Some("alice"), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, view) = app
        .json(
            "POST",
            &format!("/api/requests/{}/reject", id),
            Some("alice"),
            Some(json!({ "reason": "  wrong counterparty  " })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", view);
    assert_eq!(view["status"], "rejected");
    assert_eq!(view["category"], "cancelled");
    assert_eq!(view["rejection"]["reason"], "wrong counterparty");

    let (status, body) = app
        .json(
            "POST",
            &format!("/api/requests/{}/sign", id),
            Some("alice"),
            Some(json!({ "signature": signature_data_url() })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "request_closed");

    let (status, list) = app
        .json("GET", "/api/requests?category=Cancelled", Some("bob"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_rejects_unknown_category() {
    let app = TestApp::new().await;
    let (status, body) = app
        .json("GET", "/api/requests?category=archived", Some("sam"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "invalid_request");
}

#[tokio::test]
async fn test_delete_and_stats() {
    let app = TestApp::new().await;
    let template_id = app.seed().await;
    let first = app.create_request(&template_id).await;
    let _second = app.create_request(&template_id).await;

    let (status, _) = app.json("GET", "/api/stats", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, stats) = app.json("GET", "/api/stats?days=7", Some("mallory"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_requests"], 0);
    assert!(stats["recent_requests"].as_array().unwrap().is_empty());

    let (status, stats) = app.json("GET", "/api/stats?days=7", Some("sam"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_requests"], 2);
    assert_eq!(stats["daily_trend"].as_array().unwrap().len(), 7);
    assert_eq!(stats["recent_requests"][0]["sender"], "Sam Sender");

    let (status, _) = app
        .json("DELETE", &format!("/api/requests/{}", first), Some("bob"), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .json("DELETE", &format!("/api/requests/{}", first), Some("sam"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, stats) = app.json("GET", "/api/stats", Some("alice"), None).await;
    assert_eq!(stats["total_requests"], 1);

    // oversized windows are capped rather than rejected
    let (status, stats) = app
        .json("GET", "/api/stats?days=1000000000000", Some("sam"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["daily_trend"].as_array().unwrap().len(), 366);
}

#[tokio::test]
async fn test_template_validation() {
    let app = TestApp::new().await;
    let (status, _) = app
        .json(
            "POST",
            "/api/templates",
            None,
            Some(json!({ "name": "Broken", "pdf_base64": BASE64.encode(b"not a pdf") })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.json("GET", "/api/templates/missing", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_template_insert_removes_file() {
    let app = TestApp::new().await;
    sqlx::query("DROP TABLE templates")
        .execute(&app.state.db)
        .await
        .unwrap();

    let pdf = pdf_with_pages(&[[0, 0, 612, 792]]);
    let (status, _) = app
        .json(
            "POST",
            "/api/templates",
            None,
            Some(json!({ "name": "NDA", "pdf_base64": BASE64.encode(&pdf) })),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let stored = std::fs::read_dir(app.dir.path().join("templates"))
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(stored, 0);
}

#[tokio::test]
async fn test_undecodable_signature_is_rejected() {
    let app = TestApp::new().await;
    let template_id = app.seed().await;
    let id = app.create_request(&template_id).await;

    let (status, body) = app
        .json(
            "POST",
            &format!("/api/requests/{}/sign", id),
            Some("alice"),
            Some(json!({ "signature": "data:image/png;base64,AAAA" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "missing_signature_image");

    let (_, view) = app
        .json("GET", &format!("/api/requests/{}", id), Some("alice"), None)
        .await;
    assert_eq!(view["current_version"], Value::Null);
}
