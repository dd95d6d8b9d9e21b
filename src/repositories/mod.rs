use sea_orm::ConnectionTrait;

pub mod basket_repository;
pub mod catalog_repository;
pub mod order_repository;

pub use basket_repository::{BasketItemRepository, BasketRepository};
pub use catalog_repository::{DiscountRepository, FlashSaleRepository, ProductRepository};
pub use order_repository::{OrderItemRepository, OrderRepository, OrderUpdate};

/// Rows fetched per round trip when a listing has to return every match.
pub(crate) const LIST_CHUNK_SIZE: u64 = 100;

/// Concrete adapter implementing every repository trait on top of sea-orm.
///
/// Borrows either a pooled `DatabaseConnection` or an open
/// `DatabaseTransaction`, so the same code serves plain reads and the
/// transactional basket conversion.
#[derive(Debug)]
pub struct SqlStore<'c, C> {
    conn: &'c C,
}

impl<'c, C> SqlStore<'c, C>
where
    C: ConnectionTrait,
{
    pub fn new(conn: &'c C) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &'c C {
        self.conn
    }
}

/// Everything basket conversion reads and writes.
pub trait ConversionStore:
    ProductRepository
    + DiscountRepository
    + FlashSaleRepository
    + BasketItemRepository
    + OrderItemRepository
    + OrderRepository
{
}

impl<T> ConversionStore for T where
    T: ProductRepository
        + DiscountRepository
        + FlashSaleRepository
        + BasketItemRepository
        + OrderItemRepository
        + OrderRepository
{
}
