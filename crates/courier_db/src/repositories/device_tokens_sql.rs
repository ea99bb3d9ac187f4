// --- File: crates/courier_db/src/repositories/device_tokens_sql.rs ---
//! SQL implementation of the device token repository.
//!
//! Uses runtime queries through the `Any` driver. Timestamps are stored as
//! RFC 3339 text (lexicographic order matches chronological order for UTC
//! timestamps, which the cleanup query relies on) and the topic set as a
//! JSON text column, filtered in Rust since JSON functions are not portable
//! across drivers.

use chrono::{DateTime, Duration, Utc};
use sqlx::Row;
use tracing::{debug, error, info};
use uuid::Uuid;

use courier_common::services::BoxFuture;

use crate::error::DbError;
use crate::repositories::device_tokens::{DeviceToken, DeviceTokenRepository, TokenStatus};
use crate::DbClient;

#[derive(Debug, Clone)]
pub struct SqlDeviceTokenRepository {
    db_client: DbClient,
}

impl SqlDeviceTokenRepository {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }
}

fn parse_timestamp(value: String) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::QueryError(format!("bad timestamp '{value}': {e}")))
}

fn parse_topics(value: String) -> Result<Vec<String>, DbError> {
    serde_json::from_str(&value)
        .map_err(|e| DbError::QueryError(format!("bad topics column '{value}': {e}")))
}

fn row_to_token(row: &sqlx::any::AnyRow) -> Result<DeviceToken, DbError> {
    let id: String = row
        .try_get("id")
        .map_err(|e| DbError::QueryError(e.to_string()))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| DbError::QueryError(e.to_string()))?;
    Ok(DeviceToken {
        id: Uuid::parse_str(&id).map_err(|e| DbError::QueryError(format!("bad id '{id}': {e}")))?,
        user_id: row
            .try_get("user_id")
            .map_err(|e| DbError::QueryError(e.to_string()))?,
        token: row
            .try_get("token")
            .map_err(|e| DbError::QueryError(e.to_string()))?,
        platform: row
            .try_get("platform")
            .map_err(|e| DbError::QueryError(e.to_string()))?,
        status: TokenStatus::parse(&status)?,
        topics: parse_topics(
            row.try_get("topics")
                .map_err(|e| DbError::QueryError(e.to_string()))?,
        )?,
        sent_count: row.try_get::<i64, _>("sent_count").unwrap_or(0) as u64,
        opened_count: row.try_get::<i64, _>("opened_count").unwrap_or(0) as u64,
        last_active_at: parse_timestamp(
            row.try_get("last_active_at")
                .map_err(|e| DbError::QueryError(e.to_string()))?,
        )?,
        created_at: parse_timestamp(
            row.try_get("created_at")
                .map_err(|e| DbError::QueryError(e.to_string()))?,
        )?,
        updated_at: parse_timestamp(
            row.try_get("updated_at")
                .map_err(|e| DbError::QueryError(e.to_string()))?,
        )?,
    })
}

impl SqlDeviceTokenRepository {
    async fn fetch_by_token(&self, token: &str) -> Result<Option<DeviceToken>, DbError> {
        let query = r#"
            SELECT id, user_id, token, platform, status, topics,
                   sent_count, opened_count, last_active_at, created_at, updated_at
            FROM device_tokens
            WHERE token = $1
        "#;
        let row = sqlx::query(query)
            .bind(token)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| {
                error!("Failed to find device token: {}", e);
                DbError::QueryError(e.to_string())
            })?;
        row.as_ref().map(row_to_token).transpose()
    }

    async fn set_status(&self, token: &str, status: TokenStatus) -> Result<bool, DbError> {
        let query = r#"
            UPDATE device_tokens
            SET status = $1, updated_at = $2
            WHERE token = $3
        "#;
        let result = sqlx::query(query)
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(token)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn write_topics(&self, token: &str, topics: &[String]) -> Result<(), DbError> {
        let encoded = serde_json::to_string(topics)
            .map_err(|e| DbError::QueryError(format!("could not encode topics: {e}")))?;
        let query = r#"
            UPDATE device_tokens
            SET topics = $1, updated_at = $2
            WHERE token = $3
        "#;
        sqlx::query(query)
            .bind(&encoded)
            .bind(Utc::now().to_rfc3339())
            .bind(token)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;
        Ok(())
    }

    async fn bump_counter(&self, token: &str, column: &str) -> Result<(), DbError> {
        // Increment happens inside the database, not read-modify-write.
        let query = format!(
            "UPDATE device_tokens SET {column} = {column} + 1, last_active_at = $1, updated_at = $1 WHERE token = $2"
        );
        sqlx::query(&query)
            .bind(Utc::now().to_rfc3339())
            .bind(token)
            .execute(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;
        Ok(())
    }
}

impl DeviceTokenRepository for SqlDeviceTokenRepository {
    fn init_schema(&self) -> BoxFuture<'_, (), DbError> {
        Box::pin(async move {
            debug!("Initializing device token schema");
            let table = r#"
                CREATE TABLE IF NOT EXISTS device_tokens (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    token TEXT NOT NULL UNIQUE,
                    platform TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'active',
                    topics TEXT NOT NULL DEFAULT '[]',
                    sent_count INTEGER NOT NULL DEFAULT 0,
                    opened_count INTEGER NOT NULL DEFAULT 0,
                    last_active_at TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )
            "#;
            self.db_client.execute(table).await?;
            self.db_client
                .execute(
                    "CREATE INDEX IF NOT EXISTS idx_device_tokens_user ON device_tokens(user_id, platform, status)",
                )
                .await?;
            info!("Device token schema initialized successfully");
            Ok(())
        })
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
            if let Some(existing) = self.fetch_by_token(&token).await? {
                debug!(token = %token, "Updating existing device token");
                let query = r#"
                    UPDATE device_tokens
                    SET user_id = $1, platform = $2, status = 'active',
                        last_active_at = $3, updated_at = $3
                    WHERE token = $4
                "#;
                let now = Utc::now();
                sqlx::query(query)
                    .bind(&user_id)
                    .bind(&platform)
                    .bind(now.to_rfc3339())
                    .bind(&token)
                    .execute(self.db_client.pool())
                    .await
                    .map_err(|e| {
                        error!("Failed to update device token: {}", e);
                        DbError::QueryError(e.to_string())
                    })?;
                Ok(DeviceToken {
                    user_id,
                    platform,
                    status: TokenStatus::Active,
                    last_active_at: now,
                    updated_at: now,
                    ..existing
                })
            } else {
                debug!(token = %token, "Creating new device token");
                let fresh = DeviceToken::new(&user_id, &token, &platform);
                let query = r#"
                    INSERT INTO device_tokens
                        (id, user_id, token, platform, status, topics,
                         sent_count, opened_count, last_active_at, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#;
                sqlx::query(query)
                    .bind(fresh.id.to_string())
                    .bind(&fresh.user_id)
                    .bind(&fresh.token)
                    .bind(&fresh.platform)
                    .bind(fresh.status.as_str())
                    .bind("[]")
                    .bind(0i64)
                    .bind(0i64)
                    .bind(fresh.last_active_at.to_rfc3339())
                    .bind(fresh.created_at.to_rfc3339())
                    .bind(fresh.updated_at.to_rfc3339())
                    .execute(self.db_client.pool())
                    .await
                    .map_err(|e| {
                        error!("Failed to insert device token: {}", e);
                        DbError::QueryError(e.to_string())
                    })?;
                Ok(fresh)
            }
        })
    }

    fn unregister(&self, token: &str) -> BoxFuture<'_, bool, DbError> {
        let token = token.to_string();
        Box::pin(async move { self.set_status(&token, TokenStatus::Inactive).await })
    }

    fn mark_invalid(&self, token: &str) -> BoxFuture<'_, bool, DbError> {
        let token = token.to_string();
        Box::pin(async move { self.set_status(&token, TokenStatus::Invalid).await })
    }

    fn find_by_token(&self, token: &str) -> BoxFuture<'_, Option<DeviceToken>, DbError> {
        let token = token.to_string();
        Box::pin(async move { self.fetch_by_token(&token).await })
    }

    fn find_active_by_user(&self, user_id: &str) -> BoxFuture<'_, Vec<DeviceToken>, DbError> {
        let user_id = user_id.to_string();
        Box::pin(async move {
            let query = r#"
                SELECT id, user_id, token, platform, status, topics,
                       sent_count, opened_count, last_active_at, created_at, updated_at
                FROM device_tokens
                WHERE user_id = $1 AND status = 'active'
            "#;
            let rows = sqlx::query(query)
                .bind(&user_id)
                .fetch_all(self.db_client.pool())
                .await
                .map_err(|e| DbError::QueryError(e.to_string()))?;
            rows.iter().map(row_to_token).collect()
        })
    }

    fn subscribe_topic(&self, token: &str, topic: &str) -> BoxFuture<'_, DeviceToken, DbError> {
        let token = token.to_string();
        let topic = topic.to_string();
        Box::pin(async move {
            let mut device = self
                .fetch_by_token(&token)
                .await?
                .ok_or_else(|| DbError::NotFound(format!("device token '{token}'")))?;
            if !device.topics.contains(&topic) {
                device.topics.push(topic);
                self.write_topics(&token, &device.topics).await?;
            }
            Ok(device)
        })
    }

    fn unsubscribe_topic(&self, token: &str, topic: &str) -> BoxFuture<'_, DeviceToken, DbError> {
        let token = token.to_string();
        let topic = topic.to_string();
        Box::pin(async move {
            let mut device = self
                .fetch_by_token(&token)
                .await?
                .ok_or_else(|| DbError::NotFound(format!("device token '{token}'")))?;
            if device.topics.iter().any(|t| t == &topic) {
                device.topics.retain(|t| t != &topic);
                self.write_topics(&token, &device.topics).await?;
            }
            Ok(device)
        })
    }

    fn users_for_topic(&self, topic: &str) -> BoxFuture<'_, Vec<String>, DbError> {
        let topic = topic.to_string();
        Box::pin(async move {
            let query = r#"
                SELECT user_id, topics FROM device_tokens WHERE status = 'active'
            "#;
            let rows = sqlx::query(query)
                .fetch_all(self.db_client.pool())
                .await
                .map_err(|e| DbError::QueryError(e.to_string()))?;

            let mut users: Vec<String> = Vec::new();
            for row in &rows {
                let topics = parse_topics(
                    row.try_get("topics")
                        .map_err(|e| DbError::QueryError(e.to_string()))?,
                )?;
                if topics.iter().any(|t| t == &topic) {
                    let user_id: String = row
                        .try_get("user_id")
                        .map_err(|e| DbError::QueryError(e.to_string()))?;
                    if !users.contains(&user_id) {
                        users.push(user_id);
                    }
                }
            }
            Ok(users)
        })
    }

    fn record_sent(&self, token: &str) -> BoxFuture<'_, (), DbError> {
        let token = token.to_string();
        Box::pin(async move { self.bump_counter(&token, "sent_count").await })
    }

    fn record_opened(&self, token: &str) -> BoxFuture<'_, (), DbError> {
        let token = token.to_string();
        Box::pin(async move { self.bump_counter(&token, "opened_count").await })
    }

    fn cleanup(&self, max_idle: Duration) -> BoxFuture<'_, u64, DbError> {
        Box::pin(async move {
            let cutoff = (Utc::now() - max_idle).to_rfc3339();
            let query = r#"
                DELETE FROM device_tokens
                WHERE status = 'invalid' OR last_active_at < $1
            "#;
            let result = sqlx::query(query)
                .bind(&cutoff)
                .execute(self.db_client.pool())
                .await
                .map_err(|e| DbError::QueryError(e.to_string()))?;
            let removed = result.rows_affected();
            if removed > 0 {
                info!(removed, "Cleaned up device tokens");
            }
            Ok(removed)
        })
    }
}
