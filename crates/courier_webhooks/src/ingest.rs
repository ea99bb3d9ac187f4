// --- File: crates/courier_webhooks/src/ingest.rs ---
//! Status-event parsing and delivery-status correlation.
//!
//! Providers report delivery progress asynchronously, keyed by the message
//! id they returned at dispatch. Events can race the local `sent` write,
//! arrive twice, or never arrive; correlation therefore applies each event
//! as a monotonic upgrade and buffers events that have no matching usage
//! row yet instead of discarding them.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use courier_common::error::CourierError;
use courier_templates::usage::{ApplyOutcome, UsageLog, UsageStatus};

/// Status vocabulary used by provider callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookStatus {
    Sent,
    Delivered,
    Read,
    Failed,
}

impl WebhookStatus {
    /// Map the provider vocabulary onto the usage-log lifecycle.
    pub fn as_usage_status(&self) -> UsageStatus {
        match self {
            WebhookStatus::Sent => UsageStatus::Sent,
            WebhookStatus::Delivered => UsageStatus::Delivered,
            WebhookStatus::Read => UsageStatus::Opened,
            WebhookStatus::Failed => UsageStatus::Failed,
        }
    }
}

/// One status entry from a provider callback batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub provider_message_id: String,
    pub status: WebhookStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

// Flat batch shape: {"events": [{"messageId": ..., "status": ...}, ...]}
#[derive(Debug, Deserialize)]
struct FlatBatch {
    events: Vec<FlatEvent>,
}

#[derive(Debug, Deserialize)]
struct FlatEvent {
    #[serde(alias = "messageId", alias = "provider_message_id")]
    message_id: String,
    status: WebhookStatus,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

// Meta Graph envelope: entry[].changes[].value.statuses[]
#[derive(Debug, Deserialize)]
struct MetaEnvelope {
    entry: Vec<MetaEntry>,
}

#[derive(Debug, Deserialize)]
struct MetaEntry {
    changes: Vec<MetaChange>,
}

#[derive(Debug, Deserialize)]
struct MetaChange {
    value: MetaValue,
}

#[derive(Debug, Deserialize)]
struct MetaValue {
    #[serde(default)]
    statuses: Vec<MetaStatus>,
}

#[derive(Debug, Deserialize)]
struct MetaStatus {
    id: String,
    status: WebhookStatus,
    /// Unix seconds, sent as a string.
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    errors: Vec<MetaError>,
}

#[derive(Debug, Deserialize)]
struct MetaError {
    title: String,
}

/// Parse a callback body into status events.
///
/// Both the flat `{"events": [...]}` batch and the Meta
/// `entry/changes/value/statuses` envelope are accepted; entries that fit
/// neither shape produce a parse error.
pub fn parse_events(body: &serde_json::Value) -> Result<Vec<StatusEvent>, CourierError> {
    if body.get("events").is_some() {
        let batch: FlatBatch = serde_json::from_value(body.clone())
            .map_err(|e| CourierError::ParseError(format!("bad event batch: {e}")))?;
        return Ok(batch
            .events
            .into_iter()
            .map(|e| StatusEvent {
                provider_message_id: e.message_id,
                status: e.status,
                error: e.error,
                timestamp: e.timestamp,
            })
            .collect());
    }

    if body.get("entry").is_some() {
        let envelope: MetaEnvelope = serde_json::from_value(body.clone())
            .map_err(|e| CourierError::ParseError(format!("bad webhook envelope: {e}")))?;
        let mut events = Vec::new();
        for entry in envelope.entry {
            for change in entry.changes {
                for status in change.value.statuses {
                    let timestamp = status
                        .timestamp
                        .as_deref()
                        .and_then(|s| s.parse::<i64>().ok())
                        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
                    let error = status.errors.first().map(|e| e.title.clone());
                    events.push(StatusEvent {
                        provider_message_id: status.id,
                        status: status.status,
                        error,
                        timestamp,
                    });
                }
            }
        }
        return Ok(events);
    }

    Err(CourierError::ParseError(
        "callback body is neither an event batch nor a status envelope".into(),
    ))
}

struct PendingEvent {
    event: StatusEvent,
    buffered_at: DateTime<Utc>,
}

/// Correlates status events with usage rows, buffering early arrivals.
///
/// An event whose usage row does not exist yet (the callback raced the
/// local `sent` write) is held in a bounded buffer and replayed when the
/// dispatch path reports the row committed, or dropped once its TTL
/// expires.
pub struct DeliveryTracker {
    usage_log: Arc<dyn UsageLog>,
    pending: Mutex<VecDeque<PendingEvent>>,
    capacity: usize,
    ttl: Duration,
}

impl DeliveryTracker {
    pub fn new(usage_log: Arc<dyn UsageLog>) -> Self {
        Self::with_buffer(usage_log, 1024, Duration::minutes(5))
    }

    pub fn with_buffer(usage_log: Arc<dyn UsageLog>, capacity: usize, ttl: Duration) -> Self {
        Self {
            usage_log,
            pending: Mutex::new(VecDeque::new()),
            capacity,
            ttl,
        }
    }

    /// Apply one event against the usage log, buffering on no match.
    pub async fn apply(&self, event: StatusEvent) -> Result<ApplyOutcome, CourierError> {
        let at = event.timestamp.unwrap_or_else(Utc::now);
        let outcome = self
            .usage_log
            .apply_status(
                &event.provider_message_id,
                event.status.as_usage_status(),
                event.error.clone(),
                at,
            )
            .await?;

        match outcome {
            ApplyOutcome::Applied => {
                info!(
                    provider_message_id = %event.provider_message_id,
                    status = ?event.status,
                    "Delivery status applied"
                );
            }
            ApplyOutcome::Duplicate => {
                debug!(
                    provider_message_id = %event.provider_message_id,
                    status = ?event.status,
                    "Duplicate or out-of-order status event ignored"
                );
            }
            ApplyOutcome::NoMatch => {
                self.buffer(event).await;
            }
        }
        Ok(outcome)
    }

    async fn buffer(&self, event: StatusEvent) {
        let mut pending = self.pending.lock().await;
        if pending.len() >= self.capacity {
            // Oldest entry pays for the newcomer.
            pending.pop_front();
            warn!("Pending webhook buffer full; dropped oldest event");
        }
        debug!(
            provider_message_id = %event.provider_message_id,
            "Buffering status event that arrived before its usage row"
        );
        pending.push_back(PendingEvent {
            event,
            buffered_at: Utc::now(),
        });
    }

    /// Replay buffered events for a message id whose usage row just
    /// committed. Called by the dispatch path after recording a send.
    pub async fn notify_dispatched(&self, provider_message_id: &str) {
        let now = Utc::now();
        let matching: Vec<StatusEvent> = {
            let mut pending = self.pending.lock().await;
            pending.retain(|p| now - p.buffered_at <= self.ttl);
            let (matched, kept): (VecDeque<_>, VecDeque<_>) = pending
                .drain(..)
                .partition(|p| p.event.provider_message_id == provider_message_id);
            *pending = kept;
            matched.into_iter().map(|p| p.event).collect()
        };

        for event in matching {
            if let Err(err) = self.apply(event).await {
                warn!(error = %err, "Replaying buffered status event failed");
            }
        }
    }

    /// Number of buffered events, for diagnostics.
    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_common::services::Channel;
    use courier_templates::usage::{InMemoryUsageLog, UsageRecord};
    use serde_json::json;

    fn delivered(pmid: &str) -> StatusEvent {
        StatusEvent {
            provider_message_id: pmid.to_string(),
            status: WebhookStatus::Delivered,
            error: None,
            timestamp: None,
        }
    }

    #[test]
    fn parses_flat_batch() {
        let body = json!({
            "events": [
                { "messageId": "m-1", "status": "delivered" },
                { "messageId": "m-2", "status": "failed", "error": "mailbox full" }
            ]
        });
        let events = parse_events(&body).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].provider_message_id, "m-1");
        assert_eq!(events[1].status, WebhookStatus::Failed);
        assert_eq!(events[1].error.as_deref(), Some("mailbox full"));
    }

    #[test]
    fn parses_meta_status_envelope() {
        let body = json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "102",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "statuses": [{
                            "id": "wamid.abc",
                            "status": "read",
                            "timestamp": "1700000000",
                            "recipient_id": "41790000000"
                        }]
                    }
                }]
            }]
        });
        let events = parse_events(&body).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].provider_message_id, "wamid.abc");
        assert_eq!(events[0].status, WebhookStatus::Read);
        assert!(events[0].timestamp.is_some());
    }

    #[test]
    fn unknown_shape_is_a_parse_error() {
        let err = parse_events(&json!({ "hello": "world" })).unwrap_err();
        assert!(matches!(err, CourierError::ParseError(_)));
    }

    #[tokio::test]
    async fn early_event_is_buffered_and_replayed_after_dispatch() {
        let log = Arc::new(InMemoryUsageLog::new());
        let tracker = DeliveryTracker::new(log.clone());

        // Callback arrives before the local sent row commits.
        let outcome = tracker.apply(delivered("m-race")).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::NoMatch);
        assert_eq!(tracker.pending_len().await, 1);

        log.record(UsageRecord::dispatched(
            Channel::Sms,
            "+41790000000",
            Some("m-race".into()),
        ))
        .await
        .unwrap();
        tracker.notify_dispatched("m-race").await;

        assert_eq!(tracker.pending_len().await, 0);
        let row = log.find_by_provider_message_id("m-race").await.unwrap().unwrap();
        assert_eq!(row.status, UsageStatus::Delivered);
    }

    #[tokio::test]
    async fn read_maps_to_opened() {
        let log = Arc::new(InMemoryUsageLog::new());
        log.record(UsageRecord::dispatched(
            Channel::WhatsApp,
            "41790000000",
            Some("wamid.1".into()),
        ))
        .await
        .unwrap();

        let tracker = DeliveryTracker::new(log.clone());
        let mut event = delivered("wamid.1");
        event.status = WebhookStatus::Read;
        tracker.apply(event).await.unwrap();

        let row = log.find_by_provider_message_id("wamid.1").await.unwrap().unwrap();
        assert_eq!(row.status, UsageStatus::Opened);
    }

    #[tokio::test]
    async fn buffer_is_bounded() {
        let log = Arc::new(InMemoryUsageLog::new());
        let tracker = DeliveryTracker::with_buffer(log, 2, Duration::minutes(5));
        for i in 0..3 {
            tracker.apply(delivered(&format!("m-{i}"))).await.unwrap();
        }
        assert_eq!(tracker.pending_len().await, 2);
    }
}
