//! DocSign API - sequential multi-party signing over HTTP
//!
//! Provides REST endpoints for:
//! - Template and user registration
//! - Signature request creation, listing and lifecycle
//! - Signing the current document version
//! - Document delivery and dashboard statistics

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod models;
pub mod state;
pub mod storage;

use state::AppState;

/// Build the application router
pub fn app(state: Arc<AppState>) -> Router {
    // CORS configuration for web clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Templates and users
        .route("/api/templates", post(handlers::create_template))
        .route("/api/templates/:id", get(handlers::get_template))
        .route("/api/users", post(handlers::upsert_user))
        // Signature requests
        .route(
            "/api/requests",
            post(handlers::create_request).get(handlers::list_requests),
        )
        .route(
            "/api/requests/:id",
            get(handlers::get_request).delete(handlers::delete_request),
        )
        .route("/api/requests/:id/can-sign", get(handlers::can_sign))
        .route("/api/requests/:id/sign", post(handlers::sign_request))
        .route("/api/requests/:id/cancel", post(handlers::cancel_request))
        .route("/api/requests/:id/reject", post(handlers::reject_request))
        // Document delivery
        .route("/api/requests/:id/document", get(handlers::get_document))
        .route("/api/stats", get(handlers::get_stats))
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
