use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::entities::basket::BasketStatus;
use crate::entities::{basket_item, ProductType, NOT_DELETED};
use crate::errors::ServiceError;
use crate::repositories::{BasketItemRepository, BasketRepository, SqlStore};
use crate::services::pricing::round_money;
use crate::services::ServiceSettings;

/// New basket line, as received from the queue or the gRPC surface.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateBasketItemRequest {
    pub basket_id: Uuid,
    pub product_id: Uuid,
    #[serde(default)]
    pub flash_sale_event_product_id: Option<Uuid>,
    #[serde(default)]
    pub discount_product_id: Option<Uuid>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(custom = "validate_non_negative")]
    pub unit_price: Decimal,
    /// `REGULAR`, `FLASH_SALE` or `DISCOUNT`
    pub product_type: String,
}

fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        let mut err = ValidationError::new("unit_price");
        err.message = Some("Unit price must not be negative".into());
        return Err(err);
    }
    Ok(())
}

impl CreateBasketItemRequest {
    fn product_type(&self) -> Result<ProductType, ServiceError> {
        let product_type = ProductType::from_str(&self.product_type).map_err(|_| {
            ServiceError::ValidationError(format!("Unknown product type '{}'", self.product_type))
        })?;

        match product_type {
            ProductType::FlashSale if self.flash_sale_event_product_id.is_none() => {
                Err(ServiceError::ValidationError(
                    "FLASH_SALE items require flash_sale_event_product_id".into(),
                ))
            }
            ProductType::Discount if self.discount_product_id.is_none() => {
                Err(ServiceError::ValidationError(
                    "DISCOUNT items require discount_product_id".into(),
                ))
            }
            other => Ok(other),
        }
    }
}

#[derive(Clone)]
pub struct BasketItemService {
    db: Arc<DatabaseConnection>,
    settings: ServiceSettings,
}

impl BasketItemService {
    pub fn new(db: Arc<DatabaseConnection>, settings: ServiceSettings) -> Self {
        Self { db, settings }
    }

    /// Adds a line to an open basket. The stored price is what the client
    /// saw; conversion re-prices every line.
    #[instrument(skip(self, request), fields(basket_id = %request.basket_id, product_id = %request.product_id))]
    pub async fn create_basket_item(
        &self,
        request: CreateBasketItemRequest,
    ) -> Result<basket_item::Model, ServiceError> {
        request.validate()?;
        let product_type = request.product_type()?;

        let store = SqlStore::new(self.db.as_ref());
        let basket = store
            .get_basket(request.basket_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Basket", request.basket_id))?;
        if basket.status != BasketStatus::Open {
            return Err(ServiceError::ValidationError(format!(
                "Basket {} is {}",
                basket.id, basket.status
            )));
        }

        let now = Utc::now();
        let unit_price = round_money(request.unit_price);
        let item = store
            .create_basket_item(basket_item::Model {
                id: Uuid::new_v4(),
                basket_id: basket.id,
                product_id: request.product_id,
                flash_sale_event_product_id: request.flash_sale_event_product_id,
                discount_product_id: request.discount_product_id,
                quantity: request.quantity,
                unit_price,
                total_price: unit_price * Decimal::from(request.quantity),
                product_type,
                created_at: now,
                updated_at: now,
                deleted_at: NOT_DELETED,
            })
            .await?;

        info!(basket_item_id = %item.id, "Basket item created");
        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn get_basket_item(&self, id: Uuid) -> Result<basket_item::Model, ServiceError> {
        SqlStore::new(self.db.as_ref())
            .get_basket_item(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Basket item", id))
    }

    #[instrument(skip(self))]
    pub async fn list_basket_items(
        &self,
        basket_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<basket_item::Model>, u64), ServiceError> {
        let (page, limit) = self.settings.page_bounds(page, limit);
        SqlStore::new(self.db.as_ref())
            .list_basket_items_page(basket_id, page, limit)
            .await
    }

    /// Soft-deletes the item and returns the id of its basket.
    #[instrument(skip(self))]
    pub async fn delete_basket_item(&self, id: Uuid) -> Result<Uuid, ServiceError> {
        let store = SqlStore::new(self.db.as_ref());
        let item = store
            .get_basket_item(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Basket item", id))?;

        if !store.soft_delete_basket_item(id, Utc::now().timestamp()).await? {
            return Err(ServiceError::not_found("Basket item", id));
        }
        info!(basket_item_id = %id, basket_id = %item.basket_id, "Basket item deleted");
        Ok(item.basket_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn request(product_type: &str) -> CreateBasketItemRequest {
        CreateBasketItemRequest {
            basket_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            flash_sale_event_product_id: None,
            discount_product_id: None,
            quantity: 1,
            unit_price: dec!(4.50),
            product_type: product_type.into(),
        }
    }

    #[rstest]
    #[case("REGULAR", ProductType::Regular)]
    #[case("FLASH_SALE", ProductType::FlashSale)]
    #[case("DISCOUNT", ProductType::Discount)]
    fn parses_product_type_with_required_reference(
        #[case] raw: &str,
        #[case] expected: ProductType,
    ) {
        let mut req = request(raw);
        req.flash_sale_event_product_id = Some(Uuid::new_v4());
        req.discount_product_id = Some(Uuid::new_v4());
        assert_eq!(req.product_type().unwrap(), expected);
    }

    #[rstest]
    #[case::unknown("BUNDLE")]
    #[case::flash_sale_without_reference("FLASH_SALE")]
    #[case::discount_without_reference("DISCOUNT")]
    fn rejects_bad_product_type(#[case] raw: &str) {
        assert_matches!(request(raw).product_type(), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn quantity_and_price_are_validated() {
        let mut req = request("REGULAR");
        req.quantity = 0;
        req.unit_price = dec!(-1);
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("quantity"));
        assert!(errors.field_errors().contains_key("unit_price"));

        let mut free = request("REGULAR");
        free.unit_price = Decimal::ZERO;
        assert!(free.validate().is_ok());
    }
}
