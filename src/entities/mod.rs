pub mod basket;
pub mod basket_item;
pub mod discount;
pub mod flash_sale_event;
pub mod flash_sale_event_product;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_type;

pub use product_type::ProductType;

/// Sentinel stored in `deleted_at` for rows that have not been soft-deleted.
pub const NOT_DELETED: i64 = 0;

/// Decimal places kept for every money column.
pub const MONEY_SCALE: u32 = 4;
