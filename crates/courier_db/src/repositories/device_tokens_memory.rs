// --- File: crates/courier_db/src/repositories/device_tokens_memory.rs ---
//! In-memory device token repository for tests and database-less setups.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{Duration, Utc};

use courier_common::services::BoxFuture;

use crate::error::DbError;
use crate::repositories::device_tokens::{DeviceToken, DeviceTokenRepository, TokenStatus};

#[derive(Default)]
pub struct InMemoryDeviceTokenRepository {
    // Keyed by the unique token string.
    rows: RwLock<HashMap<String, DeviceToken>>,
}

impl InMemoryDeviceTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_guard(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, DeviceToken>>, DbError> {
        self.rows
            .read()
            .map_err(|_| DbError::QueryError("device token lock poisoned".into()))
    }

    fn write_guard(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, DeviceToken>>, DbError> {
        self.rows
            .write()
            .map_err(|_| DbError::QueryError("device token lock poisoned".into()))
    }
}

impl DeviceTokenRepository for InMemoryDeviceTokenRepository {
    fn init_schema(&self) -> BoxFuture<'_, (), DbError> {
        Box::pin(async move { Ok(()) })
    }

    fn register(
        &self,
        user_id: &str,
        token: &str,
        platform: &str,
    ) -> BoxFuture<'_, DeviceToken, DbError> {
        let user_id = user_id.to_string();
        let token = token.to_string();
        let platform = platform.to_string();
        Box::pin(async move {
            let mut rows = self.write_guard()?;
            let now = Utc::now();
            let entry = rows
                .entry(token.clone())
                .and_modify(|existing| {
                    existing.user_id = user_id.clone();
                    existing.platform = platform.clone();
                    existing.status = TokenStatus::Active;
                    existing.last_active_at = now;
                    existing.updated_at = now;
                })
                .or_insert_with(|| DeviceToken::new(&user_id, &token, &platform));
            Ok(entry.clone())
        })
    }

    fn unregister(&self, token: &str) -> BoxFuture<'_, bool, DbError> {
        let token = token.to_string();
        Box::pin(async move {
            let mut rows = self.write_guard()?;
            match rows.get_mut(&token) {
                Some(row) => {
                    row.status = TokenStatus::Inactive;
                    row.updated_at = Utc::now();
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn mark_invalid(&self, token: &str) -> BoxFuture<'_, bool, DbError> {
        let token = token.to_string();
        Box::pin(async move {
            let mut rows = self.write_guard()?;
            match rows.get_mut(&token) {
                Some(row) => {
                    row.status = TokenStatus::Invalid;
                    row.updated_at = Utc::now();
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn find_by_token(&self, token: &str) -> BoxFuture<'_, Option<DeviceToken>, DbError> {
        let token = token.to_string();
        Box::pin(async move { Ok(self.read_guard()?.get(&token).cloned()) })
    }

    fn find_active_by_user(&self, user_id: &str) -> BoxFuture<'_, Vec<DeviceToken>, DbError> {
        let user_id = user_id.to_string();
        Box::pin(async move {
            Ok(self
                .read_guard()?
                .values()
                .filter(|t| t.user_id == user_id && t.status == TokenStatus::Active)
                .cloned()
                .collect())
        })
    }

    fn subscribe_topic(&self, token: &str, topic: &str) -> BoxFuture<'_, DeviceToken, DbError> {
        let token = token.to_string();
        let topic = topic.to_string();
        Box::pin(async move {
            let mut rows = self.write_guard()?;
            let row = rows
                .get_mut(&token)
                .ok_or_else(|| DbError::NotFound(format!("device token '{token}'")))?;
            if !row.topics.contains(&topic) {
                row.topics.push(topic);
                row.updated_at = Utc::now();
            }
            Ok(row.clone())
        })
    }

    fn unsubscribe_topic(&self, token: &str, topic: &str) -> BoxFuture<'_, DeviceToken, DbError> {
        let token = token.to_string();
        let topic = topic.to_string();
        Box::pin(async move {
            let mut rows = self.write_guard()?;
            let row = rows
                .get_mut(&token)
                .ok_or_else(|| DbError::NotFound(format!("device token '{token}'")))?;
            row.topics.retain(|t| t != &topic);
            row.updated_at = Utc::now();
            Ok(row.clone())
        })
    }

    fn users_for_topic(&self, topic: &str) -> BoxFuture<'_, Vec<String>, DbError> {
        let topic = topic.to_string();
        Box::pin(async move {
            let rows = self.read_guard()?;
            let mut users: Vec<String> = Vec::new();
            for row in rows.values() {
                if row.status == TokenStatus::Active
                    && row.topics.iter().any(|t| t == &topic)
                    && !users.contains(&row.user_id)
                {
                    users.push(row.user_id.clone());
                }
            }
            Ok(users)
        })
    }

    fn record_sent(&self, token: &str) -> BoxFuture<'_, (), DbError> {
        let token = token.to_string();
        Box::pin(async move {
            let mut rows = self.write_guard()?;
            if let Some(row) = rows.get_mut(&token) {
                row.sent_count += 1;
                row.last_active_at = Utc::now();
            }
            Ok(())
        })
    }

    fn record_opened(&self, token: &str) -> BoxFuture<'_, (), DbError> {
        let token = token.to_string();
        Box::pin(async move {
            let mut rows = self.write_guard()?;
            if let Some(row) = rows.get_mut(&token) {
                row.opened_count += 1;
                row.last_active_at = Utc::now();
            }
            Ok(())
        })
    }

    fn cleanup(&self, max_idle: Duration) -> BoxFuture<'_, u64, DbError> {
        Box::pin(async move {
            let cutoff = Utc::now() - max_idle;
            let mut rows = self.write_guard()?;
            let before = rows.len();
            rows.retain(|_, row| row.status != TokenStatus::Invalid && row.last_active_at >= cutoff);
            Ok((before - rows.len()) as u64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_upserts_by_token_and_reassigns_user() {
        let repo = InMemoryDeviceTokenRepository::new();
        let first = repo.register("user-1", "tok-a", "ios").await.unwrap();
        assert_eq!(first.status, TokenStatus::Active);

        repo.subscribe_topic("tok-a", "invoices").await.unwrap();
        repo.record_sent("tok-a").await.unwrap();

        // Device changes hands: same token, new owner; topics and counters survive.
        let reassigned = repo.register("user-2", "tok-a", "ios").await.unwrap();
        assert_eq!(reassigned.user_id, "user-2");
        assert_eq!(reassigned.topics, vec!["invoices".to_string()]);
        assert_eq!(reassigned.sent_count, 1);
        assert_eq!(reassigned.id, first.id);
    }

    #[tokio::test]
    async fn unregister_marks_inactive_not_deleted() {
        let repo = InMemoryDeviceTokenRepository::new();
        repo.register("user-1", "tok-a", "android").await.unwrap();
        assert!(repo.unregister("tok-a").await.unwrap());
        let row = repo.find_by_token("tok-a").await.unwrap().unwrap();
        assert_eq!(row.status, TokenStatus::Inactive);
        assert!(repo.find_active_by_user("user-1").await.unwrap().is_empty());
        assert!(!repo.unregister("unknown").await.unwrap());
    }

    #[tokio::test]
    async fn users_for_topic_is_distinct_over_active_tokens() {
        let repo = InMemoryDeviceTokenRepository::new();
        repo.register("user-1", "tok-a", "ios").await.unwrap();
        repo.register("user-1", "tok-b", "android").await.unwrap();
        repo.register("user-2", "tok-c", "ios").await.unwrap();
        repo.register("user-3", "tok-d", "ios").await.unwrap();

        for token in ["tok-a", "tok-b", "tok-c", "tok-d"] {
            repo.subscribe_topic(token, "payments").await.unwrap();
        }
        // user-3's only token is invalid, so they drop out of the fan-out.
        repo.mark_invalid("tok-d").await.unwrap();

        let mut users = repo.users_for_topic("payments").await.unwrap();
        users.sort();
        assert_eq!(users, vec!["user-1".to_string(), "user-2".to_string()]);
    }

    #[tokio::test]
    async fn cleanup_removes_invalid_and_stale_tokens() {
        let repo = InMemoryDeviceTokenRepository::new();
        repo.register("user-1", "tok-live", "ios").await.unwrap();
        repo.register("user-1", "tok-dead", "ios").await.unwrap();
        repo.mark_invalid("tok-dead").await.unwrap();

        let removed = repo.cleanup(Duration::days(90)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(repo.find_by_token("tok-dead").await.unwrap().is_none());
        assert!(repo.find_by_token("tok-live").await.unwrap().is_some());
    }
}
