use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::repositories::{OrderItemRepository, OrderRepository};

/// Recomputes `order.total_price` as the sum of its live order items (zero
/// when none remain) and writes it back. Running it twice without an
/// intervening mutation yields the same total.
pub async fn reconcile_order_total<S>(store: &S, order_id: Uuid) -> Result<Decimal, ServiceError>
where
    S: OrderItemRepository + OrderRepository + ?Sized,
{
    let total = store.sum_order_item_totals(order_id).await?;
    store.update_order_total(order_id, total).await?;
    debug!(%order_id, %total, "Order total reconciled");
    Ok(total)
}
