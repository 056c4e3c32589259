//! Thin HTTP surface over `cirrus-execution`'s tool invocation and approval
//! plumbing: an axum router, handler, and state split in the usual
//! workflow-automation-service shape. Deliberately thin: just the four tool
//! and approval endpoints, with `CirrusError` mapped to a status code at
//! this boundary and nowhere else.

mod error;
mod handlers;
mod headers;
mod state;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

pub use state::AppState;

#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/tools/execute", get(handlers::tools::get_tool_metadata).post(handlers::tools::post_execute_tool))
        .route("/tools/approve", get(handlers::approvals::get_pending_approvals).post(handlers::approvals::post_approve))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
