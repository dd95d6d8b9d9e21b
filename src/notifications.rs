use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Most recent notifications kept per recipient.
const MAX_NOTIFICATIONS_PER_USER: isize = 1000;

/// A user-facing message, stored as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(recipient: Uuid, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Fire-and-forget delivery of user notifications. Callers log failures and
/// carry on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: Uuid, message: &str) -> Result<(), NotificationError>;
}

/// Keeps each user's notifications in a redis sorted set scored by creation
/// time.
#[derive(Clone)]
pub struct RedisNotifier {
    redis: Arc<Client>,
}

impl RedisNotifier {
    pub fn new(redis_url: &str) -> Result<Self, NotificationError> {
        let redis = Client::open(redis_url)?;
        Ok(Self {
            redis: Arc::new(redis),
        })
    }

    fn user_key(recipient: Uuid) -> String {
        format!("notifications:user:{}", recipient)
    }
}

#[async_trait]
impl Notifier for RedisNotifier {
    #[instrument(skip(self, message))]
    async fn notify(&self, recipient: Uuid, message: &str) -> Result<(), NotificationError> {
        let notification = Notification::new(recipient, message);
        let json = serde_json::to_string(&notification)?;
        let key = Self::user_key(recipient);

        let mut conn = self.redis.get_async_connection().await?;
        redis::pipe()
            .atomic()
            .zadd(&key, json, notification.created_at.timestamp_millis())
            .ignore()
            .zremrangebyrank(&key, 0, -(MAX_NOTIFICATIONS_PER_USER + 1))
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        debug!(notification_id = %notification.id, "Notification stored");
        Ok(())
    }
}

/// Drops every notification. Used when notifications are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, recipient: Uuid, _message: &str) -> Result<(), NotificationError> {
        debug!(%recipient, "Notifications disabled, dropping message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_key_is_per_recipient() {
        let id = Uuid::nil();
        assert_eq!(
            RedisNotifier::user_key(id),
            "notifications:user:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn notification_serializes_expected_fields() {
        let n = Notification::new(Uuid::new_v4(), "hello");
        let value = serde_json::to_value(&n).unwrap();
        for field in ["id", "recipient", "message", "created_at"] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
    }

    #[tokio::test]
    async fn noop_notifier_accepts_everything() {
        assert!(NoopNotifier.notify(Uuid::new_v4(), "ignored").await.is_ok());
    }
}
