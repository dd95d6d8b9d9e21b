use chrono::Utc;
use metrics::{counter, histogram};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::entities::order_item;
use crate::errors::ServiceError;
use crate::notifications::Notifier;
use crate::repositories::{OrderItemRepository, OrderRepository, SqlStore};
use crate::services::conversion::{BasketConversion, ConversionOutcome};
use crate::services::reconciler::reconcile_order_total;
use crate::services::ServiceSettings;

/// Payload of the basket-to-order trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertBasketRequest {
    pub basket_id: Uuid,
    pub order_id: Uuid,
}

/// Order item operations, including checkout conversion.
#[derive(Clone)]
pub struct OrderItemService {
    db: Arc<DatabaseConnection>,
    notifier: Arc<dyn Notifier>,
    settings: ServiceSettings,
}

impl OrderItemService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        notifier: Arc<dyn Notifier>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            db,
            notifier,
            settings,
        }
    }

    /// Converts the basket into order items of `order_id` and reconciles the
    /// order total, all in one transaction bounded by the conversion timeout.
    /// Returns the order id.
    #[instrument(skip(self))]
    pub async fn convert_basket_to_order_items(
        &self,
        basket_id: Uuid,
        order_id: Uuid,
    ) -> Result<Uuid, ServiceError> {
        let started = Instant::now();
        let result = match timeout(
            self.settings.conversion_timeout,
            self.convert_in_transaction(basket_id, order_id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout(format!(
                "basket {} conversion exceeded {:?}",
                basket_id, self.settings.conversion_timeout
            ))),
        };
        histogram!(
            "flash_sale_orders.conversion.duration",
            started.elapsed().as_secs_f64()
        );

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                counter!("flash_sale_orders.conversion.failed", 1);
                error!(%basket_id, %order_id, error = %err, code = err.error_code(), "Basket conversion failed");
                return Err(err);
            }
        };

        counter!("flash_sale_orders.conversion.completed", 1);
        info!(
            %basket_id,
            %order_id,
            items = outcome.items.len(),
            total_price = %outcome.total_price,
            "Basket converted to order"
        );

        self.notify_order_prepared(order_id).await;
        Ok(outcome.order_id)
    }

    async fn convert_in_transaction(
        &self,
        basket_id: Uuid,
        order_id: Uuid,
    ) -> Result<ConversionOutcome, ServiceError> {
        let txn = self.db.begin().await?;
        let store = SqlStore::new(&txn);

        if store.lock_order(order_id).await?.is_none() {
            return Err(ServiceError::not_found("Order", order_id));
        }

        let outcome = BasketConversion::new(&store).convert(basket_id, order_id).await?;
        txn.commit().await?;
        Ok(outcome)
    }

    async fn notify_order_prepared(&self, order_id: Uuid) {
        let store = SqlStore::new(self.db.as_ref());
        let order = match store.get_order(order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                warn!(%order_id, "Order vanished before notification");
                return;
            }
            Err(err) => {
                warn!(%order_id, error = %err, "Could not load order for notification");
                return;
            }
        };

        let message = format!(
            "Your order #{} is being prepared! We'll notify you when it's ready for pickup.",
            order.id
        );
        if let Err(err) = self.notifier.notify(order.client_id, &message).await {
            counter!("flash_sale_orders.notification.failed", 1);
            warn!(%order_id, error = %err, "Failed to send order notification");
        }
    }

    /// Soft-deletes one order item and reconciles its order. Returns the
    /// affected order id.
    #[instrument(skip(self))]
    pub async fn delete_order_item(&self, id: Uuid) -> Result<Uuid, ServiceError> {
        let txn = self.db.begin().await?;
        let store = SqlStore::new(&txn);

        let item = store
            .get_order_item(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order item", id))?;
        let order_id = item.order_id;

        store.lock_order(order_id).await?;
        if !store.soft_delete_order_item(id, Utc::now().timestamp()).await? {
            return Err(ServiceError::not_found("Order item", id));
        }
        let total = reconcile_order_total(&store, order_id).await?;
        txn.commit().await?;

        info!(order_item_id = %id, %order_id, %total, "Order item deleted");
        Ok(order_id)
    }

    #[instrument(skip(self))]
    pub async fn get_order_item(&self, id: Uuid) -> Result<order_item::Model, ServiceError> {
        SqlStore::new(self.db.as_ref())
            .get_order_item(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order item", id))
    }

    /// One page of the order's live items with the total item count.
    #[instrument(skip(self))]
    pub async fn list_order_items(
        &self,
        order_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<order_item::Model>, u64), ServiceError> {
        let (page, limit) = self.settings.page_bounds(page, limit);
        SqlStore::new(self.db.as_ref())
            .list_order_items_page(order_id, page, limit)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::{MockNotifier, NotificationError};
    use crate::services::testing::{seed_regular_basket, sqlite_db};
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn notification_failure_does_not_fail_conversion() {
        let (_dir, db) = sqlite_db().await;
        let (basket_id, order_id) = seed_regular_basket(&db, dec!(10.0), 2).await;

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|_, message| message.contains("is being prepared"))
            .times(1)
            .returning(|_, _| {
                Err(NotificationError::Redis(redis::RedisError::from((
                    redis::ErrorKind::IoError,
                    "connection refused",
                ))))
            });

        let db = Arc::new(db);
        let service =
            OrderItemService::new(db.clone(), Arc::new(notifier), ServiceSettings::default());

        let converted = service
            .convert_basket_to_order_items(basket_id, order_id)
            .await
            .unwrap();
        assert_eq!(converted, order_id);

        let order = SqlStore::new(db.as_ref())
            .get_order(order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.total_price, dec!(20.0));
    }

    #[tokio::test]
    async fn unknown_order_is_not_found_and_sends_nothing() {
        let (_dir, db) = sqlite_db().await;
        let (basket_id, _) = seed_regular_basket(&db, dec!(10.0), 1).await;

        let mut notifier = MockNotifier::new();
        notifier.expect_notify().never();

        let service =
            OrderItemService::new(Arc::new(db), Arc::new(notifier), ServiceSettings::default());
        let err = service
            .convert_basket_to_order_items(basket_id, Uuid::new_v4())
            .await
            .unwrap_err();

        assert_matches!(err, ServiceError::NotFound(_));
    }
}
