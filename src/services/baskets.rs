use chrono::Utc;
use metrics::counter;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::basket::{self, BasketStatus};
use crate::entities::NOT_DELETED;
use crate::errors::ServiceError;
use crate::notifications::Notifier;
use crate::repositories::{BasketRepository, SqlStore};
use crate::services::ServiceSettings;

#[derive(Clone)]
pub struct BasketService {
    db: Arc<DatabaseConnection>,
    notifier: Arc<dyn Notifier>,
    settings: ServiceSettings,
}

impl BasketService {
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

    /// Opens an empty basket for `user_id`.
    #[instrument(skip(self))]
    pub async fn create_basket(&self, user_id: Uuid) -> Result<basket::Model, ServiceError> {
        let now = Utc::now();
        let basket = SqlStore::new(self.db.as_ref())
            .create_basket(basket::Model {
                id: Uuid::new_v4(),
                user_id,
                status: BasketStatus::Open,
                created_at: now,
                updated_at: now,
                deleted_at: NOT_DELETED,
            })
            .await?;
        info!(basket_id = %basket.id, "Basket created");
        Ok(basket)
    }

    #[instrument(skip(self))]
    pub async fn get_basket(&self, id: Uuid) -> Result<basket::Model, ServiceError> {
        SqlStore::new(self.db.as_ref())
            .get_basket(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Basket", id))
    }

    #[instrument(skip(self))]
    pub async fn list_baskets(
        &self,
        user_id: Option<Uuid>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<basket::Model>, u64), ServiceError> {
        let (page, limit) = self.settings.page_bounds(page, limit);
        SqlStore::new(self.db.as_ref())
            .list_baskets(user_id, page, limit)
            .await
    }

    /// Changes the basket status and tells the owner. A failed notification
    /// is logged only.
    #[instrument(skip(self))]
    pub async fn update_basket_status(
        &self,
        id: Uuid,
        status: BasketStatus,
    ) -> Result<basket::Model, ServiceError> {
        let basket = SqlStore::new(self.db.as_ref())
            .update_basket_status(id, status)
            .await?
            .ok_or_else(|| ServiceError::not_found("Basket", id))?;
        info!(basket_id = %id, %status, "Basket status updated");

        let message = format!("Your basket status has been updated to {}.", basket.status);
        if let Err(err) = self.notifier.notify(basket.user_id, &message).await {
            counter!("flash_sale_orders.notification.failed", 1);
            warn!(basket_id = %id, error = %err, "Failed to send basket notification");
        }
        Ok(basket)
    }

    #[instrument(skip(self))]
    pub async fn delete_basket(&self, id: Uuid) -> Result<(), ServiceError> {
        let deleted = SqlStore::new(self.db.as_ref())
            .soft_delete_basket(id, Utc::now().timestamp())
            .await?;
        if !deleted {
            return Err(ServiceError::not_found("Basket", id));
        }
        info!(basket_id = %id, "Basket deleted");
        Ok(())
    }
}
