#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **orch-ingress** – HTTP ingress for the agent pipeline orchestrator
//! (spec §4.3, §6).
//!
//! Exposes `POST /messages`, `GET /conversations/{id}`, `GET /health` behind
//! an `axum::Router`, built the way `toka-orchestration-service::create_app`
//! wires its state and tracing layer.

mod config;
mod handlers;

pub use config::Config;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use orch_bus::EventBus;
use orch_store::DocumentStore;
use tower_http::trace::TraceLayer;

/// Shared application state injected into every handler (spec §9
/// re-architecture guidance: "inject both [store, bus] as explicit handles
/// into each handler").
#[derive(Clone)]
pub struct AppState {
    /// Document store handle.
    pub store: Arc<dyn DocumentStore>,
    /// Bus adapter handle.
    pub bus: Arc<dyn EventBus>,
    /// Ingress configuration.
    pub config: Arc<Config>,
}

/// Build the ingress router over the three endpoints spec §6 names.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/messages", post(handlers::post_messages))
        .route("/conversations/:id", get(handlers::get_conversation))
        .route("/health", get(handlers::get_health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
