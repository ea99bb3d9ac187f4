// --- File: crates/courier_webhooks/src/routes.rs ---
//! Route definitions for the webhook surface.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::handlers::{receive_events, verify_subscription, WebhookState};

/// Build the webhook router.
///
/// Every channel shares one handshake and one ingestion handler; the
/// channel path segment is carried through for logging.
pub fn routes(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(
            "/webhooks/{channel}",
            get(verify_subscription).post(receive_events),
        )
        .with_state(state)
}
