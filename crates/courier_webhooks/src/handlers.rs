// --- File: crates/courier_webhooks/src/handlers.rs ---
//! Axum handlers for the webhook surface.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;
use tracing::{info, warn};

use crate::ingest::{parse_events, DeliveryTracker};
use crate::signature::verify_signature;

const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Shared state for the webhook routes.
pub struct WebhookState {
    pub tracker: Arc<DeliveryTracker>,
    /// Token the provider must echo back during the GET handshake.
    pub verify_token: String,
    /// App secret for payload signing. When absent, signatures are not
    /// checked.
    pub app_secret: Option<String>,
}

/// Query parameters of the subscription handshake.
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// GET handshake: echo the challenge when mode and token match.
///
/// The configured token is compared but never written to the response, so
/// a failed handshake leaks nothing.
pub async fn verify_subscription(
    State(state): State<Arc<WebhookState>>,
    Path(channel): Path<String>,
    Query(params): Query<VerifyParams>,
) -> (StatusCode, String) {
    let mode_ok = params.mode.as_deref() == Some("subscribe");
    let token_ok = params.verify_token.as_deref() == Some(state.verify_token.as_str());

    match (mode_ok && token_ok, params.challenge) {
        (true, Some(challenge)) => {
            info!(%channel, "Webhook subscription verified");
            (StatusCode::OK, challenge)
        }
        _ => {
            warn!(%channel, "Webhook verification rejected");
            (StatusCode::FORBIDDEN, "Forbidden".to_string())
        }
    }
}

/// POST ingestion: parse status events and apply them.
///
/// Always acknowledges with 200 so the provider does not retry a batch we
/// already saw; bad signatures and unparseable bodies are logged and the
/// batch is skipped.
pub async fn receive_events(
    State(state): State<Arc<WebhookState>>,
    Path(channel): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    if let Some(secret) = &state.app_secret {
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !verify_signature(secret, &body, header) {
            warn!(%channel, "Webhook signature verification failed; batch skipped");
            return (StatusCode::OK, "EVENT_RECEIVED");
        }
    }

    let parsed: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => {
            warn!(%channel, error = %err, "Webhook body is not valid JSON");
            return (StatusCode::OK, "EVENT_RECEIVED");
        }
    };

    match parse_events(&parsed) {
        Ok(events) => {
            for event in events {
                if let Err(err) = state.tracker.apply(event).await {
                    warn!(%channel, error = %err, "Failed to apply status event");
                }
            }
        }
        Err(err) => {
            warn!(%channel, error = %err, "Unrecognized webhook payload shape");
        }
    }

    (StatusCode::OK, "EVENT_RECEIVED")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{StatusEvent, WebhookStatus};
    use courier_common::services::Channel;
    use courier_templates::usage::{InMemoryUsageLog, UsageLog, UsageRecord, UsageStatus};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    fn test_state(log: Arc<InMemoryUsageLog>, secret: Option<&str>) -> Arc<WebhookState> {
        Arc::new(WebhookState {
            tracker: Arc::new(DeliveryTracker::new(log)),
            verify_token: "expected-token".to_string(),
            app_secret: secret.map(str::to_string),
        })
    }

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[tokio::test]
    async fn handshake_echoes_challenge_on_match() {
        let state = test_state(Arc::new(InMemoryUsageLog::new()), None);
        let (status, body) = verify_subscription(
            State(state),
            Path("whatsapp".to_string()),
            Query(VerifyParams {
                mode: Some("subscribe".into()),
                verify_token: Some("expected-token".into()),
                challenge: Some("1158201444".into()),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "1158201444");
    }

    #[tokio::test]
    async fn handshake_rejects_wrong_token_without_leaking_it() {
        let state = test_state(Arc::new(InMemoryUsageLog::new()), None);
        let (status, body) = verify_subscription(
            State(state),
            Path("whatsapp".to_string()),
            Query(VerifyParams {
                mode: Some("subscribe".into()),
                verify_token: Some("wrong".into()),
                challenge: Some("1158201444".into()),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(!body.contains("expected-token"));
        assert!(!body.contains("1158201444"));
    }

    #[tokio::test]
    async fn handshake_rejects_missing_mode() {
        let state = test_state(Arc::new(InMemoryUsageLog::new()), None);
        let (status, _) = verify_subscription(
            State(state),
            Path("whatsapp".to_string()),
            Query(VerifyParams {
                mode: None,
                verify_token: Some("expected-token".into()),
                challenge: Some("42".into()),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn post_applies_events_and_acknowledges() {
        let log = Arc::new(InMemoryUsageLog::new());
        log.record(UsageRecord::dispatched(
            Channel::Email,
            "user@example.com",
            Some("msg-9".into()),
        ))
        .await
        .unwrap();

        let state = test_state(log.clone(), None);
        let body = serde_json::to_vec(&serde_json::json!({
            "events": [{ "messageId": "msg-9", "status": "delivered" }]
        }))
        .unwrap();

        let (status, _) = receive_events(
            State(state),
            Path("email".to_string()),
            HeaderMap::new(),
            Bytes::from(body),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let row = log.find_by_provider_message_id("msg-9").await.unwrap().unwrap();
        assert_eq!(row.status, UsageStatus::Delivered);
    }

    #[tokio::test]
    async fn post_with_bad_signature_acknowledges_but_skips() {
        let log = Arc::new(InMemoryUsageLog::new());
        log.record(UsageRecord::dispatched(
            Channel::Email,
            "user@example.com",
            Some("msg-10".into()),
        ))
        .await
        .unwrap();

        let state = test_state(log.clone(), Some("app-secret"));
        let body = serde_json::to_vec(&serde_json::json!({
            "events": [{ "messageId": "msg-10", "status": "delivered" }]
        }))
        .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, "sha256=deadbeef".parse().unwrap());

        let (status, _) = receive_events(
            State(state),
            Path("email".to_string()),
            headers,
            Bytes::from(body),
        )
        .await;

        // Acknowledged so the provider stops retrying, but nothing applied.
        assert_eq!(status, StatusCode::OK);
        let row = log.find_by_provider_message_id("msg-10").await.unwrap().unwrap();
        assert_eq!(row.status, UsageStatus::Sent);
    }

    #[tokio::test]
    async fn post_with_good_signature_applies() {
        let log = Arc::new(InMemoryUsageLog::new());
        log.record(UsageRecord::dispatched(
            Channel::Sms,
            "+41790000000",
            Some("msg-11".into()),
        ))
        .await
        .unwrap();

        let state = test_state(log.clone(), Some("app-secret"));
        let body = serde_json::to_vec(&serde_json::json!({
            "events": [{ "messageId": "msg-11", "status": "failed", "error": "undeliverable" }]
        }))
        .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            SIGNATURE_HEADER,
            sign("app-secret", &body).parse().unwrap(),
        );

        let (status, _) = receive_events(
            State(state),
            Path("sms".to_string()),
            headers,
            Bytes::from(body),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let row = log.find_by_provider_message_id("msg-11").await.unwrap().unwrap();
        assert_eq!(row.status, UsageStatus::Failed);
        assert_eq!(row.error.as_deref(), Some("undeliverable"));
    }

    #[tokio::test]
    async fn duplicate_delivered_applies_once() {
        let log = Arc::new(InMemoryUsageLog::new());
        log.record(UsageRecord::dispatched(
            Channel::Email,
            "user@example.com",
            Some("msg-12".into()),
        ))
        .await
        .unwrap();

        let tracker = DeliveryTracker::new(log.clone());
        let event = StatusEvent {
            provider_message_id: "msg-12".into(),
            status: WebhookStatus::Delivered,
            error: None,
            timestamp: None,
        };
        tracker.apply(event.clone()).await.unwrap();
        let first = log
            .find_by_provider_message_id("msg-12")
            .await
            .unwrap()
            .unwrap()
            .delivered_at;

        tracker.apply(event).await.unwrap();
        let row = log.find_by_provider_message_id("msg-12").await.unwrap().unwrap();
        assert_eq!(row.status, UsageStatus::Delivered);
        assert_eq!(row.delivered_at, first);
    }
}
