// --- File: crates/courier_notify/src/routes.rs ---
//! Route definitions for the notification facade.

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::handlers::{self, NotifyState};

pub fn routes(state: Arc<NotifyState>) -> Router {
    Router::new()
        // Sends
        .route("/notifications/email", post(handlers::send_email))
        .route("/notifications/email/bulk", post(handlers::send_bulk_emails))
        .route(
            "/notifications/email/template",
            post(handlers::send_templated_email),
        )
        .route("/notifications/sms", post(handlers::send_sms))
        .route(
            "/notifications/sms/template",
            post(handlers::send_templated_sms),
        )
        .route("/notifications/whatsapp", post(handlers::send_whatsapp))
        .route(
            "/notifications/whatsapp/template",
            post(handlers::send_templated_whatsapp),
        )
        .route("/notifications/push/{user_id}", post(handlers::send_push))
        // Template lifecycle
        .route(
            "/templates",
            post(handlers::create_template).get(handlers::list_templates),
        )
        .route(
            "/templates/{id}",
            get(handlers::get_template).put(handlers::update_template),
        )
        .route(
            "/templates/{id}/versions",
            post(handlers::create_template_version),
        )
        .route("/templates/{id}/submit", post(handlers::submit_template))
        .route("/templates/{id}/approve", post(handlers::approve_template))
        .route("/templates/{id}/reject", post(handlers::reject_template))
        .route("/templates/{id}/activate", post(handlers::activate_template))
        .route("/templates/{id}/archive", post(handlers::archive_template))
        .route(
            "/templates/{id}/analytics",
            get(handlers::template_analytics),
        )
        // Device tokens
        .route("/devices", post(handlers::register_device))
        .route("/devices/{token}", delete(handlers::unregister_device))
        .route(
            "/devices/{token}/topics/{topic}",
            put(handlers::subscribe_topic).delete(handlers::unsubscribe_topic),
        )
        .with_state(state)
}
