use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use super::SqlStore;
use crate::entities::order::{self, OrderStatus};
use crate::entities::{order_item, NOT_DELETED};
use crate::errors::ServiceError;

/// Mutable order fields. `None` leaves a field untouched; the total is not
/// here because only the reconciler writes it.
#[derive(Debug, Clone, Default)]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    pub delivery_latitude: Option<f64>,
    pub delivery_longitude: Option<f64>,
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create_order(&self, order: order::Model) -> Result<order::Model, ServiceError>;

    async fn get_order(&self, id: Uuid) -> Result<Option<order::Model>, ServiceError>;

    /// Fetches the order and, where the backend supports it, holds a row lock
    /// on it until the surrounding transaction ends.
    async fn lock_order(&self, id: Uuid) -> Result<Option<order::Model>, ServiceError>;

    /// Newest first. `client_id` narrows to one client.
    async fn list_orders(
        &self,
        client_id: Option<Uuid>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError>;

    async fn update_order(
        &self,
        id: Uuid,
        changes: OrderUpdate,
    ) -> Result<Option<order::Model>, ServiceError>;

    /// Fails with NotFound when the order does not exist.
    async fn update_order_total(&self, id: Uuid, total: Decimal) -> Result<(), ServiceError>;

    async fn soft_delete_order(&self, id: Uuid, deleted_at: i64) -> Result<bool, ServiceError>;
}

#[async_trait]
pub trait OrderItemRepository: Send + Sync {
    async fn create_order_item(
        &self,
        item: order_item::Model,
    ) -> Result<order_item::Model, ServiceError>;

    async fn get_order_item(&self, id: Uuid) -> Result<Option<order_item::Model>, ServiceError>;

    async fn list_order_items_page(
        &self,
        order_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<order_item::Model>, u64), ServiceError>;

    /// Sum of `total_price` over the live items of the order, zero when none.
    async fn sum_order_item_totals(&self, order_id: Uuid) -> Result<Decimal, ServiceError>;

    async fn soft_delete_order_item(&self, id: Uuid, deleted_at: i64)
        -> Result<bool, ServiceError>;

    /// Soft-deletes every live item of the order. Returns how many changed.
    async fn soft_delete_order_items(
        &self,
        order_id: Uuid,
        deleted_at: i64,
    ) -> Result<u64, ServiceError>;
}

#[async_trait]
impl<'c, C> OrderRepository for SqlStore<'c, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn create_order(&self, order: order::Model) -> Result<order::Model, ServiceError> {
        let active = order::ActiveModel {
            id: Set(order.id),
            client_id: Set(order.client_id),
            delivery_latitude: Set(order.delivery_latitude),
            delivery_longitude: Set(order.delivery_longitude),
            total_price: Set(order.total_price),
            status: Set(order.status),
            created_at: Set(order.created_at),
            updated_at: Set(order.updated_at),
            deleted_at: Set(NOT_DELETED),
        };
        Ok(active.insert(self.conn).await?)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<order::Model>, ServiceError> {
        Ok(order::Entity::find_by_id(id)
            .filter(order::Column::DeletedAt.eq(NOT_DELETED))
            .one(self.conn)
            .await?)
    }

    async fn lock_order(&self, id: Uuid) -> Result<Option<order::Model>, ServiceError> {
        let mut query = order::Entity::find_by_id(id).filter(order::Column::DeletedAt.eq(NOT_DELETED));
        // SQLite has no row locks; its single writer already serializes.
        if self.conn.get_database_backend() == DbBackend::Postgres {
            query = query.lock_exclusive();
        }
        Ok(query.one(self.conn).await?)
    }

    async fn list_orders(
        &self,
        client_id: Option<Uuid>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let mut query = order::Entity::find().filter(order::Column::DeletedAt.eq(NOT_DELETED));
        if let Some(client_id) = client_id {
            query = query.filter(order::Column::ClientId.eq(client_id));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(self.conn, limit);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((orders, total))
    }

    async fn update_order(
        &self,
        id: Uuid,
        changes: OrderUpdate,
    ) -> Result<Option<order::Model>, ServiceError> {
        let Some(existing) = self.get_order(id).await? else {
            return Ok(None);
        };

        let mut active: order::ActiveModel = existing.into();
        if let Some(status) = changes.status {
            active.status = Set(status);
        }
        if let Some(latitude) = changes.delivery_latitude {
            active.delivery_latitude = Set(latitude);
        }
        if let Some(longitude) = changes.delivery_longitude {
            active.delivery_longitude = Set(longitude);
        }
        Ok(Some(active.update(self.conn).await?))
    }

    async fn update_order_total(&self, id: Uuid, total: Decimal) -> Result<(), ServiceError> {
        let result = order::Entity::update_many()
            .col_expr(order::Column::TotalPrice, Expr::value(total))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(id))
            .filter(order::Column::DeletedAt.eq(NOT_DELETED))
            .exec(self.conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Order", id));
        }
        Ok(())
    }

    async fn soft_delete_order(&self, id: Uuid, deleted_at: i64) -> Result<bool, ServiceError> {
        let result = order::Entity::update_many()
            .col_expr(order::Column::DeletedAt, Expr::value(deleted_at))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(id))
            .filter(order::Column::DeletedAt.eq(NOT_DELETED))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }
}

#[async_trait]
impl<'c, C> OrderItemRepository for SqlStore<'c, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn create_order_item(
        &self,
        item: order_item::Model,
    ) -> Result<order_item::Model, ServiceError> {
        let active = order_item::ActiveModel {
            id: Set(item.id),
            order_id: Set(item.order_id),
            product_id: Set(item.product_id),
            flash_sale_event_product_id: Set(item.flash_sale_event_product_id),
            discount_product_id: Set(item.discount_product_id),
            quantity: Set(item.quantity),
            unit_price: Set(item.unit_price),
            total_price: Set(item.total_price),
            discount_applied: Set(item.discount_applied),
            product_type: Set(item.product_type),
            created_at: Set(item.created_at),
            updated_at: Set(item.updated_at),
            deleted_at: Set(NOT_DELETED),
        };
        Ok(active.insert(self.conn).await?)
    }

    async fn get_order_item(&self, id: Uuid) -> Result<Option<order_item::Model>, ServiceError> {
        Ok(order_item::Entity::find_by_id(id)
            .filter(order_item::Column::DeletedAt.eq(NOT_DELETED))
            .one(self.conn)
            .await?)
    }

    async fn list_order_items_page(
        &self,
        order_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<order_item::Model>, u64), ServiceError> {
        let paginator = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .filter(order_item::Column::DeletedAt.eq(NOT_DELETED))
            .order_by_asc(order_item::Column::CreatedAt)
            .order_by_asc(order_item::Column::Id)
            .paginate(self.conn, limit);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items, total))
    }

    async fn sum_order_item_totals(&self, order_id: Uuid) -> Result<Decimal, ServiceError> {
        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .filter(order_item::Column::DeletedAt.eq(NOT_DELETED))
            .all(self.conn)
            .await?;

        Ok(items.iter().map(|item| item.total_price).sum())
    }

    async fn soft_delete_order_item(
        &self,
        id: Uuid,
        deleted_at: i64,
    ) -> Result<bool, ServiceError> {
        let result = order_item::Entity::update_many()
            .col_expr(order_item::Column::DeletedAt, Expr::value(deleted_at))
            .col_expr(order_item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order_item::Column::Id.eq(id))
            .filter(order_item::Column::DeletedAt.eq(NOT_DELETED))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn soft_delete_order_items(
        &self,
        order_id: Uuid,
        deleted_at: i64,
    ) -> Result<u64, ServiceError> {
        let result = order_item::Entity::update_many()
            .col_expr(order_item::Column::DeletedAt, Expr::value(deleted_at))
            .col_expr(order_item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order_item::Column::OrderId.eq(order_id))
            .filter(order_item::Column::DeletedAt.eq(NOT_DELETED))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected)
    }
}
