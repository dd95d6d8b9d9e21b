use async_trait::async_trait;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use super::SqlStore;
use crate::entities::{discount, flash_sale_event, flash_sale_event_product, product, NOT_DELETED};
use crate::errors::ServiceError;

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn get_product(&self, id: Uuid) -> Result<Option<product::Model>, ServiceError>;
}

#[async_trait]
pub trait DiscountRepository: Send + Sync {
    async fn get_discount(&self, id: Uuid) -> Result<Option<discount::Model>, ServiceError>;
}

#[async_trait]
pub trait FlashSaleRepository: Send + Sync {
    /// Flash-sale product together with the event it belongs to. Either row
    /// being soft-deleted reads as not found.
    async fn get_flash_sale_event_product(
        &self,
        id: Uuid,
    ) -> Result<Option<(flash_sale_event_product::Model, flash_sale_event::Model)>, ServiceError>;
}

#[async_trait]
impl<'c, C> ProductRepository for SqlStore<'c, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn get_product(&self, id: Uuid) -> Result<Option<product::Model>, ServiceError> {
        Ok(product::Entity::find_by_id(id)
            .filter(product::Column::DeletedAt.eq(NOT_DELETED))
            .one(self.conn)
            .await?)
    }
}

#[async_trait]
impl<'c, C> DiscountRepository for SqlStore<'c, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn get_discount(&self, id: Uuid) -> Result<Option<discount::Model>, ServiceError> {
        Ok(discount::Entity::find_by_id(id)
            .filter(discount::Column::DeletedAt.eq(NOT_DELETED))
            .one(self.conn)
            .await?)
    }
}

#[async_trait]
impl<'c, C> FlashSaleRepository for SqlStore<'c, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn get_flash_sale_event_product(
        &self,
        id: Uuid,
    ) -> Result<Option<(flash_sale_event_product::Model, flash_sale_event::Model)>, ServiceError>
    {
        let found = flash_sale_event_product::Entity::find_by_id(id)
            .filter(flash_sale_event_product::Column::DeletedAt.eq(NOT_DELETED))
            .find_also_related(flash_sale_event::Entity)
            .one(self.conn)
            .await?;

        Ok(found.and_then(|(sale_product, event)| {
            event
                .filter(|event| event.deleted_at == NOT_DELETED)
                .map(|event| (sale_product, event))
        }))
    }
}
