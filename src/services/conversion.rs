use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::entities::{basket_item, order_item, NOT_DELETED};
use crate::errors::ServiceError;
use crate::repositories::ConversionStore;
use crate::services::pricing::PricingResolver;
use crate::services::reconciler::reconcile_order_total;

/// Result of a successful basket conversion.
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub order_id: Uuid,
    pub items: Vec<order_item::Model>,
    pub total_price: Decimal,
}

/// Turns the live items of a basket into order items and reconciles the
/// order total.
///
/// The conversion writes through whatever store it is given. Atomicity comes
/// from the caller handing it a store bound to an open transaction.
pub struct BasketConversion<'a, S: ?Sized> {
    store: &'a S,
    now: DateTime<Utc>,
}

impl<'a, S> BasketConversion<'a, S>
where
    S: ConversionStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self::at(store, Utc::now())
    }

    /// Pins the clock used for promotion validity and timestamps.
    pub fn at(store: &'a S, now: DateTime<Utc>) -> Self {
        Self { store, now }
    }

    #[instrument(skip(self))]
    pub async fn convert(
        &self,
        basket_id: Uuid,
        order_id: Uuid,
    ) -> Result<ConversionOutcome, ServiceError> {
        let basket_items = self.store.list_basket_items(basket_id).await?;
        let total = basket_items.len();
        if total == 0 {
            info!(%basket_id, %order_id, "Basket has no live items");
        }

        let mut resolver = PricingResolver::new(self.store, self.now);
        let mut created = Vec::with_capacity(total);

        for item in &basket_items {
            match self.convert_item(&mut resolver, item, order_id).await {
                Ok(order_item) => created.push(order_item),
                Err(err) if created.is_empty() => return Err(err),
                Err(err) => {
                    warn!(
                        %basket_id,
                        basket_item_id = %item.id,
                        processed = created.len(),
                        total,
                        error = %err,
                        "Basket conversion aborted mid-basket"
                    );
                    return Err(ServiceError::PartialFailure {
                        processed: created.len(),
                        total,
                        source: Box::new(err),
                    });
                }
            }
        }

        let total_price = reconcile_order_total(self.store, order_id).await?;
        counter!("flash_sale_orders.order_items.created", created.len() as u64);

        Ok(ConversionOutcome {
            order_id,
            items: created,
            total_price,
        })
    }

    async fn convert_item(
        &self,
        resolver: &mut PricingResolver<'a, S>,
        item: &basket_item::Model,
        order_id: Uuid,
    ) -> Result<order_item::Model, ServiceError> {
        let price = resolver.resolve(item).await?;
        let total_price = price.unit_price * Decimal::from(item.quantity);

        let order_item = order_item::Model {
            id: Uuid::new_v4(),
            order_id,
            product_id: item.product_id,
            flash_sale_event_product_id: item.flash_sale_event_product_id,
            discount_product_id: item.discount_product_id,
            quantity: item.quantity,
            unit_price: price.unit_price,
            total_price,
            discount_applied: price.discount_applied,
            product_type: item.product_type,
            created_at: self.now,
            updated_at: self.now,
            deleted_at: NOT_DELETED,
        };

        let saved = self.store.create_order_item(order_item).await?;
        debug!(order_item_id = %saved.id, basket_item_id = %item.id, "Order item created");
        Ok(saved)
    }
}
