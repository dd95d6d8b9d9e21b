use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::entities::order::{self, OrderStatus};
use crate::entities::NOT_DELETED;
use crate::errors::ServiceError;
use crate::notifications::Notifier;
use crate::repositories::{OrderItemRepository, OrderRepository, OrderUpdate, SqlStore};
use crate::services::ServiceSettings;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub client_id: Uuid,
    #[validate(custom = "validate_latitude")]
    pub delivery_latitude: f64,
    #[validate(custom = "validate_longitude")]
    pub delivery_longitude: f64,
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

fn coordinate_in_range(value: f64, bound: f64, field: &'static str) -> Result<(), ValidationError> {
    if (-bound..=bound).contains(&value) {
        return Ok(());
    }
    let mut err = ValidationError::new(field);
    err.message = Some(format!("Must be between -{bound} and {bound}").into());
    Err(err)
}

fn validate_latitude(value: f64) -> Result<(), ValidationError> {
    coordinate_in_range(value, 90.0, "delivery_latitude")
}

fn validate_longitude(value: f64) -> Result<(), ValidationError> {
    coordinate_in_range(value, 180.0, "delivery_longitude")
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    notifier: Arc<dyn Notifier>,
    settings: ServiceSettings,
}

impl OrderService {
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

    /// Creates an order with a zero total. The total only changes through
    /// reconciliation after its items change.
    #[instrument(skip(self, request), fields(client_id = %request.client_id))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<order::Model, ServiceError> {
        request.validate()?;

        let now = Utc::now();
        let order = SqlStore::new(self.db.as_ref())
            .create_order(order::Model {
                id: Uuid::new_v4(),
                client_id: request.client_id,
                delivery_latitude: request.delivery_latitude,
                delivery_longitude: request.delivery_longitude,
                total_price: Decimal::ZERO,
                status: request.status.unwrap_or(OrderStatus::Pending),
                created_at: now,
                updated_at: now,
                deleted_at: NOT_DELETED,
            })
            .await?;

        info!(order_id = %order.id, "Order created");
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, id: Uuid) -> Result<order::Model, ServiceError> {
        SqlStore::new(self.db.as_ref())
            .get_order(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", id))
    }

    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        client_id: Option<Uuid>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let (page, limit) = self.settings.page_bounds(page, limit);
        SqlStore::new(self.db.as_ref())
            .list_orders(client_id, page, limit)
            .await
    }

    /// Applies the given changes. When the status changes the client is
    /// told; a failed notification is logged only.
    #[instrument(skip(self))]
    pub async fn update_order(
        &self,
        id: Uuid,
        changes: OrderUpdate,
    ) -> Result<order::Model, ServiceError> {
        if let Some(latitude) = changes.delivery_latitude {
            validate_latitude(latitude).map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        }
        if let Some(longitude) = changes.delivery_longitude {
            validate_longitude(longitude).map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        }

        let status_changed = changes.status.is_some();
        let order = SqlStore::new(self.db.as_ref())
            .update_order(id, changes)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", id))?;
        info!(order_id = %id, status = %order.status, "Order updated");

        if status_changed {
            self.notify_status(&order).await;
        }
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        self.update_order(
            id,
            OrderUpdate {
                status: Some(status),
                ..OrderUpdate::default()
            },
        )
        .await
    }

    /// Soft-deletes the order together with its live items, stamping both
    /// with the same `deleted_at`.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let store = SqlStore::new(&txn);

        store
            .lock_order(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", id))?;

        let deleted_at = Utc::now().timestamp();
        let items = store.soft_delete_order_items(id, deleted_at).await?;
        if !store.soft_delete_order(id, deleted_at).await? {
            return Err(ServiceError::not_found("Order", id));
        }
        txn.commit().await?;

        info!(order_id = %id, items, "Order deleted");
        Ok(())
    }

    async fn notify_status(&self, order: &order::Model) {
        let message = format!("Your order status has been updated to {}.", order.status);
        if let Err(err) = self.notifier.notify(order.client_id, &message).await {
            counter!("flash_sale_orders.notification.failed", 1);
            warn!(order_id = %order.id, error = %err, "Failed to send order notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_coordinates() {
        let request = CreateOrderRequest {
            client_id: Uuid::new_v4(),
            delivery_latitude: 95.0,
            delivery_longitude: -200.0,
            status: None,
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("delivery_latitude"));
        assert!(errors.field_errors().contains_key("delivery_longitude"));
    }
}
