// --- File: crates/courier_templates/src/usage.rs ---
//! Usage/analytics log.
//!
//! One row per send attempt, created at dispatch with status `sent` and
//! mutated only by monotonic status upgrades driven by provider webhooks.
//! Rows are never deleted or re-inserted; the provider message id is the
//! correlation key for asynchronous events.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use courier_common::error::{internal_error, CourierError};
use courier_common::services::{BoxFuture, Channel};

/// Delivery-lifecycle status of one send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageStatus {
    Sent,
    Delivered,
    Opened,
    Clicked,
    Failed,
    Bounced,
}

impl UsageStatus {
    /// Position in the forward-only upgrade order. Failure states sit just
    /// above `sent`, so a message already confirmed delivered can no longer
    /// be marked failed by a late event.
    fn rank(&self) -> u8 {
        match self {
            UsageStatus::Sent => 0,
            UsageStatus::Failed | UsageStatus::Bounced => 1,
            UsageStatus::Delivered => 2,
            UsageStatus::Opened => 3,
            UsageStatus::Clicked => 4,
        }
    }

    /// Failure states accept no further upgrades.
    fn is_terminal_failure(&self) -> bool {
        matches!(self, UsageStatus::Failed | UsageStatus::Bounced)
    }

    /// Whether a row currently at `self` may move to `next`.
    pub fn allows_upgrade_to(&self, next: UsageStatus) -> bool {
        !self.is_terminal_failure() && next.rank() > self.rank()
    }

    /// Whether this status implies the message reached the recipient.
    pub fn reached_delivered(&self) -> bool {
        matches!(self, UsageStatus::Delivered | UsageStatus::Opened | UsageStatus::Clicked)
    }

    pub fn reached_opened(&self) -> bool {
        matches!(self, UsageStatus::Opened | UsageStatus::Clicked)
    }
}

/// One send attempt and the statuses it has reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: Uuid,
    #[serde(default)]
    pub template_id: Option<Uuid>,
    #[serde(default)]
    pub template_version: Option<u32>,
    pub channel: Channel,
    pub recipient: String,
    /// Populated on successful dispatch; key for webhook correlation.
    #[serde(default)]
    pub provider_message_id: Option<String>,
    pub status: UsageStatus,
    /// Snapshot of the variables the message was rendered with.
    #[serde(default)]
    pub variables: HashMap<String, String>,
    #[serde(default)]
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub opened_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub clicked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failed_at: Option<DateTime<Utc>>,
}

impl UsageRecord {
    /// A fresh `sent` row for a dispatch that just succeeded.
    pub fn dispatched(
        channel: Channel,
        recipient: impl Into<String>,
        provider_message_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            template_id: None,
            template_version: None,
            channel,
            recipient: recipient.into(),
            provider_message_id,
            status: UsageStatus::Sent,
            variables: HashMap::new(),
            error: None,
            sent_at: Utc::now(),
            delivered_at: None,
            opened_at: None,
            clicked_at: None,
            failed_at: None,
        }
    }

    pub fn with_template(mut self, template_id: Uuid, version: u32) -> Self {
        self.template_id = Some(template_id);
        self.template_version = Some(version);
        self
    }

    pub fn with_variables(mut self, variables: HashMap<String, String>) -> Self {
        self.variables = variables;
        self
    }
}

/// Outcome of applying one status event against the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The row was upgraded to the event's status.
    Applied,
    /// The row already carries this status or a later one.
    Duplicate,
    /// No row carries the given provider message id (yet).
    NoMatch,
}

/// Aggregated metrics over a trailing window for one template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateAnalytics {
    pub total: u64,
    pub sent: u64,
    pub delivered: u64,
    pub opened: u64,
    pub clicked: u64,
    pub failed: u64,
    pub bounced: u64,
    pub delivery_rate: f64,
    pub open_rate: f64,
    pub click_rate: f64,
    pub bounce_rate: f64,
}

pub trait UsageLog: Send + Sync {
    /// Append one row. Rows are never deleted afterwards.
    fn record(&self, record: UsageRecord) -> BoxFuture<'_, UsageRecord, CourierError>;

    fn get(&self, id: Uuid) -> BoxFuture<'_, Option<UsageRecord>, CourierError>;

    fn find_by_provider_message_id(
        &self,
        provider_message_id: &str,
    ) -> BoxFuture<'_, Option<UsageRecord>, CourierError>;

    /// Apply a status event as a monotonic upgrade. A duplicate or an
    /// out-of-order earlier status is a no-op, and a missing row is
    /// reported rather than treated as an error so callers can buffer.
    fn apply_status(
        &self,
        provider_message_id: &str,
        status: UsageStatus,
        error: Option<String>,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, ApplyOutcome, CourierError>;

    /// Aggregate rows for a template over the trailing `window`.
    fn analytics(
        &self,
        template_id: Uuid,
        window: Duration,
    ) -> BoxFuture<'_, TemplateAnalytics, CourierError>;
}

#[derive(Default)]
struct LogInner {
    rows: HashMap<Uuid, UsageRecord>,
    by_provider_message_id: HashMap<String, Uuid>,
}

/// In-memory usage log with a secondary index by provider message id.
#[derive(Default)]
pub struct InMemoryUsageLog {
    inner: RwLock<LogInner>,
}

impl InMemoryUsageLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_guard(&self) -> Result<std::sync::RwLockReadGuard<'_, LogInner>, CourierError> {
        self.inner
            .read()
            .map_err(|_| internal_error("usage log lock poisoned"))
    }

    fn write_guard(&self) -> Result<std::sync::RwLockWriteGuard<'_, LogInner>, CourierError> {
        self.inner
            .write()
            .map_err(|_| internal_error("usage log lock poisoned"))
    }
}

impl UsageLog for InMemoryUsageLog {
    fn record(&self, record: UsageRecord) -> BoxFuture<'_, UsageRecord, CourierError> {
        Box::pin(async move {
            let mut inner = self.write_guard()?;
            if let Some(pmid) = &record.provider_message_id {
                inner.by_provider_message_id.insert(pmid.clone(), record.id);
            }
            inner.rows.insert(record.id, record.clone());
            Ok(record)
        })
    }

    fn get(&self, id: Uuid) -> BoxFuture<'_, Option<UsageRecord>, CourierError> {
        Box::pin(async move { Ok(self.read_guard()?.rows.get(&id).cloned()) })
    }

    fn find_by_provider_message_id(
        &self,
        provider_message_id: &str,
    ) -> BoxFuture<'_, Option<UsageRecord>, CourierError> {
        let pmid = provider_message_id.to_string();
        Box::pin(async move {
            let inner = self.read_guard()?;
            Ok(inner
                .by_provider_message_id
                .get(&pmid)
                .and_then(|id| inner.rows.get(id))
                .cloned())
        })
    }

    fn apply_status(
        &self,
        provider_message_id: &str,
        status: UsageStatus,
        error: Option<String>,
        at: DateTime<Utc>,
    ) -> BoxFuture<'_, ApplyOutcome, CourierError> {
        let pmid = provider_message_id.to_string();
        Box::pin(async move {
            let mut inner = self.write_guard()?;
            let Some(id) = inner.by_provider_message_id.get(&pmid).copied() else {
                return Ok(ApplyOutcome::NoMatch);
            };
            let Some(row) = inner.rows.get_mut(&id) else {
                return Ok(ApplyOutcome::NoMatch);
            };

            if !row.status.allows_upgrade_to(status) {
                debug!(%pmid, current = ?row.status, event = ?status, "Status event ignored");
                return Ok(ApplyOutcome::Duplicate);
            }

            row.status = status;
            match status {
                UsageStatus::Delivered => row.delivered_at = Some(at),
                UsageStatus::Opened => {
                    row.opened_at = Some(at);
                    row.delivered_at.get_or_insert(at);
                }
                UsageStatus::Clicked => {
                    row.clicked_at = Some(at);
                    row.delivered_at.get_or_insert(at);
                    row.opened_at.get_or_insert(at);
                }
                UsageStatus::Failed | UsageStatus::Bounced => {
                    row.failed_at = Some(at);
                    if error.is_some() {
                        row.error = error;
                    }
                }
                UsageStatus::Sent => {}
            }
            Ok(ApplyOutcome::Applied)
        })
    }

    fn analytics(
        &self,
        template_id: Uuid,
        window: Duration,
    ) -> BoxFuture<'_, TemplateAnalytics, CourierError> {
        Box::pin(async move {
            let cutoff = Utc::now() - window;
            let inner = self.read_guard()?;
            let rows: Vec<&UsageRecord> = inner
                .rows
                .values()
                .filter(|r| r.template_id == Some(template_id) && r.sent_at >= cutoff)
                .collect();

            let total = rows.len() as u64;
            let delivered = rows.iter().filter(|r| r.status.reached_delivered()).count() as u64;
            let opened = rows.iter().filter(|r| r.status.reached_opened()).count() as u64;
            let clicked = rows.iter().filter(|r| r.status == UsageStatus::Clicked).count() as u64;
            let failed = rows.iter().filter(|r| r.status == UsageStatus::Failed).count() as u64;
            let bounced = rows.iter().filter(|r| r.status == UsageStatus::Bounced).count() as u64;
            let sent = rows.iter().filter(|r| r.status == UsageStatus::Sent).count() as u64;

            Ok(TemplateAnalytics {
                total,
                sent,
                delivered,
                opened,
                clicked,
                failed,
                bounced,
                delivery_rate: ratio(delivered, total),
                open_rate: ratio(opened, delivered),
                click_rate: ratio(clicked, opened),
                bounce_rate: ratio(bounced, total),
            })
        })
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn log_with_row(pmid: &str) -> (InMemoryUsageLog, UsageRecord) {
        let log = InMemoryUsageLog::new();
        let record =
            UsageRecord::dispatched(Channel::Email, "user@example.com", Some(pmid.to_string()));
        let stored = log.record(record).await.unwrap();
        (log, stored)
    }

    #[tokio::test]
    async fn delivered_event_applies_exactly_once() {
        let (log, _) = log_with_row("msg-1").await;
        let at = Utc::now();

        let first = log
            .apply_status("msg-1", UsageStatus::Delivered, None, at)
            .await
            .unwrap();
        assert_eq!(first, ApplyOutcome::Applied);
        let row = log.find_by_provider_message_id("msg-1").await.unwrap().unwrap();
        assert_eq!(row.status, UsageStatus::Delivered);
        assert_eq!(row.delivered_at, Some(at));

        // Second application is a no-op: status and timestamp unchanged.
        let later = at + Duration::seconds(30);
        let second = log
            .apply_status("msg-1", UsageStatus::Delivered, None, later)
            .await
            .unwrap();
        assert_eq!(second, ApplyOutcome::Duplicate);
        let row = log.find_by_provider_message_id("msg-1").await.unwrap().unwrap();
        assert_eq!(row.status, UsageStatus::Delivered);
        assert_eq!(row.delivered_at, Some(at));
    }

    #[tokio::test]
    async fn earlier_status_never_overwrites_later() {
        let (log, _) = log_with_row("msg-2").await;
        log.apply_status("msg-2", UsageStatus::Opened, None, Utc::now())
            .await
            .unwrap();
        let outcome = log
            .apply_status("msg-2", UsageStatus::Delivered, None, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Duplicate);
        let row = log.find_by_provider_message_id("msg-2").await.unwrap().unwrap();
        assert_eq!(row.status, UsageStatus::Opened);
    }

    #[tokio::test]
    async fn delivered_row_cannot_fail_later() {
        let (log, _) = log_with_row("msg-3").await;
        log.apply_status("msg-3", UsageStatus::Delivered, None, Utc::now())
            .await
            .unwrap();
        let outcome = log
            .apply_status(
                "msg-3",
                UsageStatus::Failed,
                Some("bounced at edge".into()),
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Duplicate);
    }

    #[tokio::test]
    async fn unknown_message_id_reports_no_match() {
        let log = InMemoryUsageLog::new();
        let outcome = log
            .apply_status("ghost", UsageStatus::Delivered, None, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::NoMatch);
    }

    #[tokio::test]
    async fn analytics_rates_are_zero_guarded() {
        let log = InMemoryUsageLog::new();
        let template_id = Uuid::new_v4();
        let empty = log.analytics(template_id, Duration::days(30)).await.unwrap();
        assert_eq!(empty.total, 0);
        assert_eq!(empty.delivery_rate, 0.0);
        assert_eq!(empty.open_rate, 0.0);

        for (i, status) in [
            UsageStatus::Delivered,
            UsageStatus::Opened,
            UsageStatus::Bounced,
            UsageStatus::Sent,
        ]
        .iter()
        .enumerate()
        {
            let pmid = format!("m-{i}");
            let record = UsageRecord::dispatched(Channel::Email, "user@example.com", Some(pmid.clone()))
                .with_template(template_id, 1);
            log.record(record).await.unwrap();
            if *status != UsageStatus::Sent {
                log.apply_status(&pmid, *status, None, Utc::now()).await.unwrap();
            }
        }

        let stats = log.analytics(template_id, Duration::days(30)).await.unwrap();
        assert_eq!(stats.total, 4);
        // Opened implies delivered, so two rows reached delivery.
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.opened, 1);
        assert_eq!(stats.bounced, 1);
        assert!((stats.delivery_rate - 0.5).abs() < f64::EPSILON);
        assert!((stats.open_rate - 0.5).abs() < f64::EPSILON);
        assert!((stats.bounce_rate - 0.25).abs() < f64::EPSILON);
    }
}
