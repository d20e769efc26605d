//! HTTP surface for the courier scheduler.
//!
//! Deliberately thin: handlers translate between JSON and engine calls and
//! own nothing. All scheduling state lives behind [`AppState`].

#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use courier_scheduler::Scheduler;
use courier_store::StateStore;

pub use error::ApiError;

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The scheduling engine.
    pub scheduler: Arc<Scheduler>,
    /// The state store, probed by the health endpoint.
    pub store: Arc<dyn StateStore>,
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/send", post(handlers::send))
        .route("/api/send-bulk", post(handlers::send_bulk))
        .route("/api/stats", get(handlers::stats))
        .route("/health", get(handlers::health))
        .with_state(state)
}
