//! HTTP surface: the three update endpoints and the liveness probe

pub mod health;
pub mod update;

use axum::{Router, routing};

use crate::SharedState;

pub use health::health;
pub use update::{backend_update, frontend_update, webhooks_update};

pub const API_PREFIX: &str = "/api/v1";

/// Builds the application router.
///
/// Update handlers are nested under [`API_PREFIX`], so the `request` field
/// of their envelopes carries the path relative to it (`/backend`, ...).
pub fn build_router(state: SharedState) -> Router {
    let updates = Router::new()
        .route("/backend", routing::post(backend_update))
        .route("/frontend", routing::post(frontend_update))
        .route("/webhooks", routing::post(webhooks_update));

    Router::new()
        .nest(API_PREFIX, updates)
        .route("/health", routing::get(health))
        .with_state(state)
}
