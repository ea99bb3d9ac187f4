// --- File: crates/courier_db/src/repositories/device_tokens.rs ---
//! Device token registry: model and repository trait.
//!
//! A device token is the per-device push target owned by a user. Tokens are
//! unique by token string; registration is an upsert that reassigns the
//! owning user when a device changes hands. Dead tokens reported by the
//! push backend are marked invalid and swept by the periodic cleanup.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use courier_common::services::BoxFuture;

use crate::error::DbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Active,
    Inactive,
    Invalid,
}

impl TokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Active => "active",
            TokenStatus::Inactive => "inactive",
            TokenStatus::Invalid => "invalid",
        }
    }

    pub fn parse(value: &str) -> Result<Self, DbError> {
        match value {
            "active" => Ok(TokenStatus::Active),
            "inactive" => Ok(TokenStatus::Inactive),
            "invalid" => Ok(TokenStatus::Invalid),
            other => Err(DbError::QueryError(format!("unknown token status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceToken {
    pub id: Uuid,
    pub user_id: String,
    pub token: String,
    pub platform: String,
    pub status: TokenStatus,
    pub topics: Vec<String>,
    pub sent_count: u64,
    pub opened_count: u64,
    pub last_active_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeviceToken {
    pub fn new(user_id: &str, token: &str, platform: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            token: token.to_string(),
            platform: platform.to_string(),
            status: TokenStatus::Active,
            topics: Vec::new(),
            sent_count: 0,
            opened_count: 0,
            last_active_at: now,
            created_at: now,
            updated_at: now,
        }
    }
}

pub trait DeviceTokenRepository: Send + Sync {
    /// Create the backing table(s) if they don't already exist.
    fn init_schema(&self) -> BoxFuture<'_, (), DbError>;

    /// Upsert by unique token string. An existing token is reassigned to
    /// the given user, refreshed and reactivated; counters and topics are
    /// preserved. A new token starts active with empty counters.
    fn register(
        &self,
        user_id: &str,
        token: &str,
        platform: &str,
    ) -> BoxFuture<'_, DeviceToken, DbError>;

    /// Mark a token inactive. Returns false when the token is unknown.
    fn unregister(&self, token: &str) -> BoxFuture<'_, bool, DbError>;

    /// Mark a token invalid after the push backend reported it dead.
    fn mark_invalid(&self, token: &str) -> BoxFuture<'_, bool, DbError>;

    fn find_by_token(&self, token: &str) -> BoxFuture<'_, Option<DeviceToken>, DbError>;

    /// All active tokens owned by a user.
    fn find_active_by_user(&self, user_id: &str) -> BoxFuture<'_, Vec<DeviceToken>, DbError>;

    fn subscribe_topic(&self, token: &str, topic: &str) -> BoxFuture<'_, DeviceToken, DbError>;

    fn unsubscribe_topic(&self, token: &str, topic: &str) -> BoxFuture<'_, DeviceToken, DbError>;

    /// Distinct user ids across all active tokens subscribed to a topic.
    fn users_for_topic(&self, topic: &str) -> BoxFuture<'_, Vec<String>, DbError>;

    /// Atomic send-counter increment, also refreshing `last_active_at`.
    fn record_sent(&self, token: &str) -> BoxFuture<'_, (), DbError>;

    /// Atomic open-counter increment, also refreshing `last_active_at`.
    fn record_opened(&self, token: &str) -> BoxFuture<'_, (), DbError>;

    /// Remove tokens idle for longer than `max_idle` or marked invalid.
    /// Returns the number of rows removed.
    fn cleanup(&self, max_idle: Duration) -> BoxFuture<'_, u64, DbError>;
}
