use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use super::{SqlStore, LIST_CHUNK_SIZE};
use crate::entities::basket::{self, BasketStatus};
use crate::entities::{basket_item, NOT_DELETED};
use crate::errors::ServiceError;

#[async_trait]
pub trait BasketRepository: Send + Sync {
    async fn create_basket(&self, basket: basket::Model) -> Result<basket::Model, ServiceError>;

    async fn get_basket(&self, id: Uuid) -> Result<Option<basket::Model>, ServiceError>;

    /// Newest first. `user_id` narrows to one owner.
    async fn list_baskets(
        &self,
        user_id: Option<Uuid>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<basket::Model>, u64), ServiceError>;

    async fn update_basket_status(
        &self,
        id: Uuid,
        status: BasketStatus,
    ) -> Result<Option<basket::Model>, ServiceError>;

    /// Returns false when no live basket matched.
    async fn soft_delete_basket(&self, id: Uuid, deleted_at: i64) -> Result<bool, ServiceError>;
}

#[async_trait]
pub trait BasketItemRepository: Send + Sync {
    async fn create_basket_item(
        &self,
        item: basket_item::Model,
    ) -> Result<basket_item::Model, ServiceError>;

    async fn get_basket_item(&self, id: Uuid) -> Result<Option<basket_item::Model>, ServiceError>;

    /// Every live item of the basket in insertion order.
    async fn list_basket_items(
        &self,
        basket_id: Uuid,
    ) -> Result<Vec<basket_item::Model>, ServiceError>;

    async fn list_basket_items_page(
        &self,
        basket_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<basket_item::Model>, u64), ServiceError>;

    /// Returns false when no live item matched.
    async fn soft_delete_basket_item(
        &self,
        id: Uuid,
        deleted_at: i64,
    ) -> Result<bool, ServiceError>;
}

#[async_trait]
impl<'c, C> BasketRepository for SqlStore<'c, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn create_basket(&self, basket: basket::Model) -> Result<basket::Model, ServiceError> {
        let active = basket::ActiveModel {
            id: Set(basket.id),
            user_id: Set(basket.user_id),
            status: Set(basket.status),
            created_at: Set(basket.created_at),
            updated_at: Set(basket.updated_at),
            deleted_at: Set(NOT_DELETED),
        };
        Ok(active.insert(self.conn).await?)
    }

    async fn get_basket(&self, id: Uuid) -> Result<Option<basket::Model>, ServiceError> {
        Ok(basket::Entity::find_by_id(id)
            .filter(basket::Column::DeletedAt.eq(NOT_DELETED))
            .one(self.conn)
            .await?)
    }

    async fn list_baskets(
        &self,
        user_id: Option<Uuid>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<basket::Model>, u64), ServiceError> {
        let mut query = basket::Entity::find().filter(basket::Column::DeletedAt.eq(NOT_DELETED));
        if let Some(user_id) = user_id {
            query = query.filter(basket::Column::UserId.eq(user_id));
        }

        let paginator = query
            .order_by_desc(basket::Column::CreatedAt)
            .paginate(self.conn, limit);

        let total = paginator.num_items().await?;
        let baskets = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((baskets, total))
    }

    async fn update_basket_status(
        &self,
        id: Uuid,
        status: BasketStatus,
    ) -> Result<Option<basket::Model>, ServiceError> {
        let Some(existing) = self.get_basket(id).await? else {
            return Ok(None);
        };

        let mut active: basket::ActiveModel = existing.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        Ok(Some(active.update(self.conn).await?))
    }

    async fn soft_delete_basket(&self, id: Uuid, deleted_at: i64) -> Result<bool, ServiceError> {
        let result = basket::Entity::update_many()
            .col_expr(basket::Column::DeletedAt, Expr::value(deleted_at))
            .col_expr(basket::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(basket::Column::Id.eq(id))
            .filter(basket::Column::DeletedAt.eq(NOT_DELETED))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }
}

#[async_trait]
impl<'c, C> BasketItemRepository for SqlStore<'c, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn create_basket_item(
        &self,
        item: basket_item::Model,
    ) -> Result<basket_item::Model, ServiceError> {
        let active = basket_item::ActiveModel {
            id: Set(item.id),
            basket_id: Set(item.basket_id),
            product_id: Set(item.product_id),
            flash_sale_event_product_id: Set(item.flash_sale_event_product_id),
            discount_product_id: Set(item.discount_product_id),
            quantity: Set(item.quantity),
            unit_price: Set(item.unit_price),
            total_price: Set(item.total_price),
            product_type: Set(item.product_type),
            created_at: Set(item.created_at),
            updated_at: Set(item.updated_at),
            deleted_at: Set(NOT_DELETED),
        };
        Ok(active.insert(self.conn).await?)
    }

    async fn get_basket_item(&self, id: Uuid) -> Result<Option<basket_item::Model>, ServiceError> {
        Ok(basket_item::Entity::find_by_id(id)
            .filter(basket_item::Column::DeletedAt.eq(NOT_DELETED))
            .one(self.conn)
            .await?)
    }

    async fn list_basket_items(
        &self,
        basket_id: Uuid,
    ) -> Result<Vec<basket_item::Model>, ServiceError> {
        let mut pages = basket_item::Entity::find()
            .filter(basket_item::Column::BasketId.eq(basket_id))
            .filter(basket_item::Column::DeletedAt.eq(NOT_DELETED))
            .order_by_asc(basket_item::Column::CreatedAt)
            .order_by_asc(basket_item::Column::Id)
            .paginate(self.conn, LIST_CHUNK_SIZE);

        let mut items = Vec::new();
        while let Some(batch) = pages.fetch_and_next().await? {
            items.extend(batch);
        }
        Ok(items)
    }

    async fn list_basket_items_page(
        &self,
        basket_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<basket_item::Model>, u64), ServiceError> {
        let paginator = basket_item::Entity::find()
            .filter(basket_item::Column::BasketId.eq(basket_id))
            .filter(basket_item::Column::DeletedAt.eq(NOT_DELETED))
            .order_by_asc(basket_item::Column::CreatedAt)
            .order_by_asc(basket_item::Column::Id)
            .paginate(self.conn, limit);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items, total))
    }

    async fn soft_delete_basket_item(
        &self,
        id: Uuid,
        deleted_at: i64,
    ) -> Result<bool, ServiceError> {
        let result = basket_item::Entity::update_many()
            .col_expr(basket_item::Column::DeletedAt, Expr::value(deleted_at))
            .col_expr(basket_item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(basket_item::Column::Id.eq(id))
            .filter(basket_item::Column::DeletedAt.eq(NOT_DELETED))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }
}
