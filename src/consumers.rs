use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::message_queue::{Message, MessageQueue, MessageQueueError};
use crate::services::{BasketItemService, ConvertBasketRequest, CreateBasketItemRequest, OrderItemService};
use crate::AppServices;

pub const CREATE_BASKET_ITEM_KEY: &str = "basket_item.create";
pub const CONVERT_BASKET_KEY: &str = "basket.convert_to_order";

/// Handles the messages of one key.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    fn key(&self) -> &'static str;

    /// `SerializationError` means the payload cannot ever be handled and the
    /// message is dropped. Any other error is retried.
    async fn handle(&self, payload: serde_json::Value) -> Result<(), ServiceError>;
}

fn decode<T: DeserializeOwned>(payload: serde_json::Value) -> Result<T, ServiceError> {
    Ok(serde_json::from_value(payload)?)
}

pub struct CreateBasketItemHandler {
    service: BasketItemService,
}

impl CreateBasketItemHandler {
    pub fn new(service: BasketItemService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl MessageHandler for CreateBasketItemHandler {
    fn key(&self) -> &'static str {
        CREATE_BASKET_ITEM_KEY
    }

    async fn handle(&self, payload: serde_json::Value) -> Result<(), ServiceError> {
        let request: CreateBasketItemRequest = decode(payload)?;
        self.service.create_basket_item(request).await.map(|_| ())
    }
}

pub struct ConvertBasketHandler {
    service: OrderItemService,
}

impl ConvertBasketHandler {
    pub fn new(service: OrderItemService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl MessageHandler for ConvertBasketHandler {
    fn key(&self) -> &'static str {
        CONVERT_BASKET_KEY
    }

    async fn handle(&self, payload: serde_json::Value) -> Result<(), ServiceError> {
        let request: ConvertBasketRequest = decode(payload)?;
        self.service
            .convert_basket_to_order_items(request.basket_id, request.order_id)
            .await
            .map(|_| ())
    }
}

/// Polls one topic and dispatches each message to the handler registered for
/// its key.
pub struct Consumer {
    queue: Arc<dyn MessageQueue>,
    topic: String,
    handlers: HashMap<&'static str, Arc<dyn MessageHandler>>,
    poll_interval: Duration,
}

impl Consumer {
    pub fn new(queue: Arc<dyn MessageQueue>, topic: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            queue,
            topic: topic.into(),
            handlers: HashMap::new(),
            poll_interval,
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handlers.insert(handler.key(), handler);
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Handles at most one message. Returns false when the topic was empty.
    pub async fn poll_once(&self) -> Result<bool, MessageQueueError> {
        let Some(message) = self.queue.subscribe(&self.topic).await? else {
            return Ok(false);
        };
        self.dispatch(message).await?;
        Ok(true)
    }

    async fn dispatch(&self, message: Message) -> Result<(), MessageQueueError> {
        let Some(handler) = self.handlers.get(message.key.as_str()) else {
            warn!(topic = %self.topic, key = %message.key, message_id = %message.id, "Unknown message key, dropping");
            return self.queue.ack(&message.id).await;
        };

        match handler.handle(message.payload).await {
            Ok(()) => {
                debug!(key = %message.key, message_id = %message.id, "Message handled");
                self.queue.ack(&message.id).await
            }
            Err(ServiceError::SerializationError(reason)) => {
                warn!(key = %message.key, message_id = %message.id, %reason, "Undecodable payload, dropping");
                self.queue.ack(&message.id).await
            }
            Err(err) => {
                error!(
                    key = %message.key,
                    message_id = %message.id,
                    retry_count = message.retry_count,
                    error = %err,
                    "Message handler failed"
                );
                self.queue.nack(&message.id).await
            }
        }
    }

    /// Polls until `shutdown` turns true or its sender goes away.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(topic = %self.topic, keys = ?self.handlers.keys().collect::<Vec<_>>(), "Consumer started");

        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }

            let idle = match self.poll_once().await {
                Ok(handled) => !handled,
                Err(err) => {
                    error!(topic = %self.topic, error = %err, "Queue poll failed");
                    true
                }
            };
            if !idle {
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(topic = %self.topic, "Consumer stopped");
    }
}

/// Starts the basket-item and basket-to-order consumers as tokio tasks.
pub fn spawn_consumers(
    queue: Arc<dyn MessageQueue>,
    services: &AppServices,
    config: &AppConfig,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let poll_interval = config.consumer_poll_interval();

    let basket_items = Consumer::new(queue.clone(), config.basket_item_topic.clone(), poll_interval)
        .with_handler(Arc::new(CreateBasketItemHandler::new(
            services.basket_items.clone(),
        )));
    let conversions = Consumer::new(queue, config.basket_to_order_topic.clone(), poll_interval)
        .with_handler(Arc::new(ConvertBasketHandler::new(
            services.order_items.clone(),
        )));

    vec![
        tokio::spawn(basket_items.run(shutdown.clone())),
        tokio::spawn(conversions.run(shutdown)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message_queue::InMemoryMessageQueue;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl MessageHandler for CountingHandler {
        fn key(&self) -> &'static str {
            "count"
        }

        async fn handle(&self, payload: serde_json::Value) -> Result<(), ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _: u32 = decode(payload)?;
            if self.fail {
                return Err(ServiceError::InternalError("boom".into()));
            }
            Ok(())
        }
    }

    fn consumer(queue: Arc<InMemoryMessageQueue>, fail: bool) -> (Consumer, Arc<CountingHandler>) {
        let handler = Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
            fail,
        });
        let consumer = Consumer::new(queue, "topic", Duration::from_millis(5))
            .with_handler(handler.clone());
        (consumer, handler)
    }

    #[tokio::test]
    async fn unknown_keys_and_bad_payloads_are_dropped() {
        let queue = Arc::new(InMemoryMessageQueue::new());
        let (consumer, handler) = consumer(queue.clone(), false);

        queue.publish(Message::new("topic", "other", serde_json::json!(1))).await.unwrap();
        queue.publish(Message::new("topic", "count", serde_json::json!("nope"))).await.unwrap();

        assert!(consumer.poll_once().await.unwrap());
        assert!(consumer.poll_once().await.unwrap());
        assert!(!consumer.poll_once().await.unwrap());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_handler_is_retried_then_dropped() {
        let queue = Arc::new(InMemoryMessageQueue::new());
        let (consumer, handler) = consumer(queue.clone(), true);

        queue.publish(Message::new("topic", "count", serde_json::json!(7))).await.unwrap();
        while consumer.poll_once().await.unwrap() {}

        assert_eq!(handler.calls.load(Ordering::SeqCst), 4);
        assert_eq!(queue.pending("topic"), 0);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let queue = Arc::new(InMemoryMessageQueue::new());
        let (consumer, handler) = consumer(queue.clone(), false);
        let (tx, rx) = watch::channel(false);

        queue.publish(Message::new("topic", "count", serde_json::json!(1))).await.unwrap();
        let task = tokio::spawn(consumer.run(rx));

        while handler.calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    }
}
