/*!
 * # Message Queue
 *
 * Topic-based queue abstraction the consumers poll. Messages are routed by
 * `topic` and dispatched by `key`. A message taken with `subscribe` stays in
 * flight until it is acked, or nacked back onto its topic for another
 * attempt.
 */

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

const DEFAULT_MAX_RETRIES: u32 = 3;

/// Message queue errors
#[derive(Error, Debug)]
pub enum MessageQueueError {
    #[error("Queue is full")]
    QueueFull,
    #[error("Unknown message: {0}")]
    UnknownMessage(Uuid),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Connection error: {0}")]
    ConnectionError(String),
}

impl From<redis::RedisError> for MessageQueueError {
    fn from(err: redis::RedisError) -> Self {
        MessageQueueError::ConnectionError(err.to_string())
    }
}

/// Message envelope for queue items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub topic: String,
    pub key: String,
    pub payload: serde_json::Value,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl Message {
    pub fn new(topic: impl Into<String>, key: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            key: key.into(),
            payload,
            timestamp: chrono::Utc::now(),
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// The same message scheduled for another attempt, or `None` once its
    /// retries are used up.
    fn retried(mut self) -> Option<Self> {
        if self.retry_count >= self.max_retries {
            return None;
        }
        self.retry_count += 1;
        Some(self)
    }
}

/// Message queue trait for different implementations
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn publish(&self, message: Message) -> Result<(), MessageQueueError>;
    /// Takes the oldest message of `topic`, if any.
    async fn subscribe(&self, topic: &str) -> Result<Option<Message>, MessageQueueError>;
    async fn ack(&self, message_id: &Uuid) -> Result<(), MessageQueueError>;
    /// Re-queues the message, or drops it when it has no retries left.
    async fn nack(&self, message_id: &Uuid) -> Result<(), MessageQueueError>;
}

/// Messages handed out but not yet acked or nacked.
#[derive(Debug, Default)]
struct InFlight(Mutex<HashMap<Uuid, Message>>);

impl InFlight {
    fn guard(&self) -> Result<MutexGuard<'_, HashMap<Uuid, Message>>, MessageQueueError> {
        self.0
            .lock()
            .map_err(|_| MessageQueueError::ConnectionError("in-flight lock poisoned".into()))
    }

    fn track(&self, message: &Message) -> Result<(), MessageQueueError> {
        self.guard()?.insert(message.id, message.clone());
        Ok(())
    }

    fn take(&self, message_id: &Uuid) -> Result<Message, MessageQueueError> {
        self.guard()?
            .remove(message_id)
            .ok_or(MessageQueueError::UnknownMessage(*message_id))
    }
}

fn log_exhausted(message_id: &Uuid) {
    error!(%message_id, "Message exhausted its retries, dropping");
}

/// In-memory message queue implementation
#[derive(Debug)]
pub struct InMemoryMessageQueue {
    queues: Arc<Mutex<HashMap<String, VecDeque<Message>>>>,
    in_flight: InFlight,
    max_size: usize,
}

impl Default for InMemoryMessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMessageQueue {
    pub fn new() -> Self {
        Self::with_max_size(1000)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            queues: Arc::new(Mutex::new(HashMap::new())),
            in_flight: InFlight::default(),
            max_size,
        }
    }

    fn queues(&self) -> Result<MutexGuard<'_, HashMap<String, VecDeque<Message>>>, MessageQueueError> {
        self.queues
            .lock()
            .map_err(|_| MessageQueueError::ConnectionError("queue lock poisoned".into()))
    }

    /// Messages waiting on `topic`, in-flight ones excluded.
    pub fn pending(&self, topic: &str) -> usize {
        self.queues()
            .map(|queues| queues.get(topic).map_or(0, VecDeque::len))
            .unwrap_or(0)
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn publish(&self, message: Message) -> Result<(), MessageQueueError> {
        let mut queues = self.queues()?;
        let queue = queues.entry(message.topic.clone()).or_default();

        if queue.len() >= self.max_size {
            return Err(MessageQueueError::QueueFull);
        }

        queue.push_back(message);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Option<Message>, MessageQueueError> {
        let message = self.queues()?.get_mut(topic).and_then(VecDeque::pop_front);
        if let Some(message) = &message {
            self.in_flight.track(message)?;
        }
        Ok(message)
    }

    async fn ack(&self, message_id: &Uuid) -> Result<(), MessageQueueError> {
        self.in_flight.take(message_id).map(|_| ())
    }

    async fn nack(&self, message_id: &Uuid) -> Result<(), MessageQueueError> {
        match self.in_flight.take(message_id)?.retried() {
            Some(message) => self.publish(message).await,
            None => {
                log_exhausted(message_id);
                Ok(())
            }
        }
    }
}

/// Redis-backed queue: one list per topic, `LPUSH` to publish and `RPOP` to
/// take, so each topic is FIFO. In-flight bookkeeping is local to this
/// process.
#[derive(Clone)]
pub struct RedisMessageQueue {
    conn: ConnectionManager,
    in_flight: Arc<InFlight>,
}

impl RedisMessageQueue {
    pub async fn connect(redis_url: &str) -> Result<Self, MessageQueueError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            in_flight: Arc::new(InFlight::default()),
        })
    }

    fn topic_key(topic: &str) -> String {
        format!("queue:{}", topic)
    }
}

#[async_trait]
impl MessageQueue for RedisMessageQueue {
    async fn publish(&self, message: Message) -> Result<(), MessageQueueError> {
        let json = serde_json::to_string(&message)?;
        let mut conn = self.conn.clone();
        redis::cmd("LPUSH")
            .arg(Self::topic_key(&message.topic))
            .arg(json)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Option<Message>, MessageQueueError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("RPOP")
            .arg(Self::topic_key(topic))
            .query_async(&mut conn)
            .await?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        match serde_json::from_str::<Message>(&raw) {
            Ok(message) => {
                self.in_flight.track(&message)?;
                Ok(Some(message))
            }
            Err(err) => {
                warn!(topic, error = %err, "Dropping undecodable queue entry");
                Ok(None)
            }
        }
    }

    async fn ack(&self, message_id: &Uuid) -> Result<(), MessageQueueError> {
        self.in_flight.take(message_id).map(|_| ())
    }

    async fn nack(&self, message_id: &Uuid) -> Result<(), MessageQueueError> {
        match self.in_flight.take(message_id)?.retried() {
            Some(message) => self.publish(message).await,
            None => {
                log_exhausted(message_id);
                Ok(())
            }
        }
    }
}
