use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;
use uuid::Uuid;

use crate::entities::discount::{self, DiscountType};
use crate::entities::{basket_item, product, ProductType, MONEY_SCALE};
use crate::errors::ServiceError;
use crate::repositories::{DiscountRepository, FlashSaleRepository, ProductRepository};
use crate::services::validity_cache::ValidityCache;

const ONE_HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Rounds to the scale of the money columns, half away from zero like
/// Postgres `NUMERIC` does on insert.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Price of one basket line after promotions. Prices are rounded to
/// [`MONEY_SCALE`] so `unit_price * quantity` is exactly what gets stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPrice {
    pub base_price: Decimal,
    pub unit_price: Decimal,
    /// `base_price - unit_price`
    pub discount_applied: Decimal,
}

impl ResolvedPrice {
    fn base(base_price: Decimal) -> Self {
        let base_price = round_money(base_price);
        Self {
            base_price,
            unit_price: base_price,
            discount_applied: Decimal::ZERO,
        }
    }

    fn promoted(base_price: Decimal, unit_price: Decimal) -> Self {
        let base_price = round_money(base_price);
        let unit_price = round_money(unit_price);
        Self {
            base_price,
            unit_price,
            discount_applied: base_price - unit_price,
        }
    }
}

/// Applies a discount to `base`. The result is not clamped, so a fixed
/// amount larger than the base price yields a negative price.
pub fn discounted_price(base: Decimal, discount: &discount::Model) -> Decimal {
    match discount.discount_type {
        DiscountType::Percentage => {
            base * (Decimal::ONE - discount.discount_value / ONE_HUNDRED)
        }
        DiscountType::FixedAmount => base - discount.discount_value,
    }
}

/// Resolves authoritative unit prices for basket items.
///
/// One resolver is built per conversion: it pins the clock at `now` and owns
/// the [`ValidityCache`] for that conversion. Expired, inactive or missing
/// promotions fall back to the product base price without an error.
pub struct PricingResolver<'a, S: ?Sized> {
    store: &'a S,
    cache: ValidityCache,
    now: DateTime<Utc>,
}

impl<'a, S> PricingResolver<'a, S>
where
    S: ProductRepository + DiscountRepository + FlashSaleRepository + ?Sized,
{
    pub fn new(store: &'a S, now: DateTime<Utc>) -> Self {
        Self {
            store,
            cache: ValidityCache::new(),
            now,
        }
    }

    /// Fetches the referenced product and resolves the item's price.
    pub async fn resolve(
        &mut self,
        item: &basket_item::Model,
    ) -> Result<ResolvedPrice, ServiceError> {
        let product = self
            .store
            .get_product(item.product_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", item.product_id))?;

        self.resolve_with_product(item, &product).await
    }

    pub async fn resolve_with_product(
        &mut self,
        item: &basket_item::Model,
        product: &product::Model,
    ) -> Result<ResolvedPrice, ServiceError> {
        let base_price = product.base_price;

        let resolved = match item.product_type {
            ProductType::Regular => None,
            ProductType::FlashSale => match item.flash_sale_event_product_id {
                Some(id) => self.flash_sale_price(id).await?,
                None => None,
            },
            ProductType::Discount => match item.discount_product_id {
                Some(id) => self.discount_price(id, base_price).await?,
                None => None,
            },
        };

        let price = match resolved {
            Some(unit_price) => ResolvedPrice::promoted(base_price, unit_price),
            None => {
                if item.product_type != ProductType::Regular {
                    debug!(
                        basket_item_id = %item.id,
                        product_type = %item.product_type,
                        "Promotion not applicable, using base price"
                    );
                }
                ResolvedPrice::base(base_price)
            }
        };
        Ok(price)
    }

    pub fn cache(&self) -> &ValidityCache {
        &self.cache
    }

    async fn flash_sale_price(&mut self, id: Uuid) -> Result<Option<Decimal>, ServiceError> {
        self.cache
            .valid_flash_sale_price(self.store, id, self.now)
            .await
    }

    async fn discount_price(
        &mut self,
        id: Uuid,
        base_price: Decimal,
    ) -> Result<Option<Decimal>, ServiceError> {
        Ok(self
            .cache
            .valid_discount(self.store, id, self.now)
            .await?
            .map(|discount| discounted_price(base_price, &discount)))
    }
}
