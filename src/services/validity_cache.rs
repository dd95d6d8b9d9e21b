use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

use crate::entities::discount;
use crate::errors::ServiceError;
use crate::repositories::{DiscountRepository, FlashSaleRepository};

/// Memo of promotion validity for the lifetime of one basket conversion.
///
/// Entries are filled on first reference and never invalidated, so every
/// item of a conversion sees the same snapshot even if a promotion ends
/// while the basket is being processed. A valid promotion keeps the data
/// needed to price it; an invalid or missing one is stored as `None`.
#[derive(Debug, Default)]
pub struct ValidityCache {
    discounts: HashMap<Uuid, Option<discount::Model>>,
    /// Sale price of each valid flash sale event product.
    flash_sales: HashMap<Uuid, Option<Decimal>>,
}

impl ValidityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the discount if it is valid at `now`, fetching it at most once.
    pub async fn valid_discount<S>(
        &mut self,
        store: &S,
        discount_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<discount::Model>, ServiceError>
    where
        S: DiscountRepository + ?Sized,
    {
        if let Some(entry) = self.discounts.get(&discount_id) {
            return Ok(entry.clone());
        }

        let entry = store
            .get_discount(discount_id)
            .await?
            .filter(|discount| discount.is_valid_at(now));
        self.discounts.insert(discount_id, entry.clone());
        Ok(entry)
    }

    /// Returns the sale price if the flash sale is running at `now`,
    /// fetching it at most once.
    pub async fn valid_flash_sale_price<S>(
        &mut self,
        store: &S,
        flash_sale_event_product_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Decimal>, ServiceError>
    where
        S: FlashSaleRepository + ?Sized,
    {
        if let Some(entry) = self.flash_sales.get(&flash_sale_event_product_id) {
            return Ok(*entry);
        }

        let entry = store
            .get_flash_sale_event_product(flash_sale_event_product_id)
            .await?
            .filter(|(_, event)| event.is_running_at(now))
            .map(|(sale_product, _)| sale_product.sale_price);
        self.flash_sales.insert(flash_sale_event_product_id, entry);
        Ok(entry)
    }

    pub async fn is_discount_valid<S>(
        &mut self,
        store: &S,
        discount_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError>
    where
        S: DiscountRepository + ?Sized,
    {
        Ok(self.valid_discount(store, discount_id, now).await?.is_some())
    }

    pub async fn is_flash_sale_valid<S>(
        &mut self,
        store: &S,
        flash_sale_event_product_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError>
    where
        S: FlashSaleRepository + ?Sized,
    {
        Ok(self
            .valid_flash_sale_price(store, flash_sale_event_product_id, now)
            .await?
            .is_some())
    }

    pub fn cached_discounts(&self) -> usize {
        self.discounts.len()
    }

    pub fn cached_flash_sales(&self) -> usize {
        self.flash_sales.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::discount::DiscountType;
    use crate::entities::flash_sale_event::FlashSaleStatus;
    use crate::services::testing::FakeCatalog;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn snapshot_survives_promotion_expiry() {
        let mut catalog = FakeCatalog::default();
        let now = Utc::now();
        let id = catalog.add_discount(DiscountType::Percentage, dec!(5), true, now + Duration::minutes(1));
        let mut cache = ValidityCache::new();

        assert!(cache.is_discount_valid(&catalog, id, now).await.unwrap());
        // Later in the same conversion the discount has ended, but the first
        // answer stands.
        let later = now + Duration::minutes(5);
        assert!(cache.is_discount_valid(&catalog, id, later).await.unwrap());
        assert_eq!(catalog.discount_lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_rows_are_cached_as_invalid() {
        let catalog = FakeCatalog::default();
        let mut cache = ValidityCache::new();
        let missing = Uuid::new_v4();

        for _ in 0..2 {
            assert!(!cache.is_flash_sale_valid(&catalog, missing, Utc::now()).await.unwrap());
            assert!(!cache.is_discount_valid(&catalog, missing, Utc::now()).await.unwrap());
        }
        assert_eq!(cache.cached_flash_sales(), 1);
        assert_eq!(cache.cached_discounts(), 1);
        assert_eq!(catalog.flash_sale_lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn valid_flash_sale_keeps_its_sale_price() {
        let mut catalog = FakeCatalog::default();
        let product_id = catalog.add_product(dec!(20));
        let now = Utc::now();
        let fsep = catalog.add_flash_sale(product_id, dec!(12.5), FlashSaleStatus::Active, now + Duration::hours(1));
        let mut cache = ValidityCache::new();

        for _ in 0..3 {
            let price = cache.valid_flash_sale_price(&catalog, fsep, now).await.unwrap();
            assert_eq!(price, Some(dec!(12.5)));
        }
        assert!(cache.is_flash_sale_valid(&catalog, fsep, now).await.unwrap());
        assert_eq!(catalog.flash_sale_lookups.load(Ordering::SeqCst), 1);
    }
}
