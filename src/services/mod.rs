pub mod basket_items;
pub mod baskets;
pub mod conversion;
pub mod order_items;
pub mod orders;
pub mod pricing;
pub mod reconciler;
pub mod validity_cache;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use crate::config::AppConfig;

pub use basket_items::{BasketItemService, CreateBasketItemRequest};
pub use baskets::BasketService;
pub use conversion::{BasketConversion, ConversionOutcome};
pub use order_items::{ConvertBasketRequest, OrderItemService};
pub use orders::{CreateOrderRequest, OrderService};
pub use pricing::{discounted_price, PricingResolver, ResolvedPrice};
pub use reconciler::reconcile_order_total;
pub use validity_cache::ValidityCache;

const DEFAULT_PAGE_LIMIT: u64 = 10;

/// Tunables shared by the service layer.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub conversion_timeout: Duration,
    pub max_page_size: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            conversion_timeout: Duration::from_secs(30),
            max_page_size: 100,
        }
    }
}

impl From<&AppConfig> for ServiceSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            conversion_timeout: cfg.conversion_timeout(),
            max_page_size: cfg.max_page_size,
        }
    }
}

impl ServiceSettings {
    /// Normalizes a list request: pages are 1-based, a zero limit means the
    /// default page size and limits are capped at `max_page_size`.
    pub fn page_bounds(&self, page: u64, limit: u64) -> (u64, u64) {
        let limit = if limit == 0 { DEFAULT_PAGE_LIMIT } else { limit };
        (page.max(1), limit.min(self.max_page_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_bounds_apply_defaults_and_cap() {
        let settings = ServiceSettings::default();
        assert_eq!(settings.page_bounds(0, 0), (1, 10));
        assert_eq!(settings.page_bounds(3, 25), (3, 25));
        assert_eq!(settings.page_bounds(1, 5_000), (1, 100));
    }
}
