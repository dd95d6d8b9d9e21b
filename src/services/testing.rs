use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

use crate::entities::discount::{self, DiscountType};
use crate::entities::flash_sale_event::{self, FlashSaleStatus};
use crate::entities::{basket_item, flash_sale_event_product, product, ProductType, NOT_DELETED};
use crate::errors::ServiceError;
use crate::repositories::{DiscountRepository, FlashSaleRepository, ProductRepository};

/// In-memory catalog that counts promotion lookups.
#[derive(Default)]
pub struct FakeCatalog {
    pub products: HashMap<Uuid, product::Model>,
    pub discounts: HashMap<Uuid, discount::Model>,
    pub flash_sales: HashMap<Uuid, (flash_sale_event_product::Model, flash_sale_event::Model)>,
    pub failing_discounts: bool,
    pub discount_lookups: AtomicUsize,
    pub flash_sale_lookups: AtomicUsize,
}

impl FakeCatalog {
    pub fn add_product(&mut self, base_price: Decimal) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        self.products.insert(
            id,
            product::Model {
                id,
                name: "Widget".into(),
                description: None,
                base_price,
                current_price: base_price,
                image_url: None,
                stock_quantity: 100,
                created_at: now,
                updated_at: now,
                deleted_at: NOT_DELETED,
            },
        );
        id
    }

    pub fn add_discount(
        &mut self,
        discount_type: DiscountType,
        value: Decimal,
        is_active: bool,
        end_date: DateTime<Utc>,
    ) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        self.discounts.insert(
            id,
            discount::Model {
                id,
                name: "Promo".into(),
                description: None,
                discount_type,
                discount_value: value,
                start_date: now - Duration::days(1),
                end_date,
                is_active,
                created_at: now,
                updated_at: now,
                deleted_at: NOT_DELETED,
            },
        );
        id
    }

    pub fn add_flash_sale(
        &mut self,
        product_id: Uuid,
        sale_price: Decimal,
        status: FlashSaleStatus,
        end_time: DateTime<Utc>,
    ) -> Uuid {
        let now = Utc::now();
        let event_id = Uuid::new_v4();
        let id = Uuid::new_v4();
        let event = flash_sale_event::Model {
            id: event_id,
            name: "Midnight sale".into(),
            description: None,
            start_time: now - Duration::hours(1),
            end_time,
            status,
            event_type: "FLASH".into(),
            created_at: now,
            updated_at: now,
            deleted_at: NOT_DELETED,
        };
        let sale_product = flash_sale_event_product::Model {
            id,
            event_id,
            product_id,
            discount_percentage: Decimal::ZERO,
            sale_price,
            available_quantity: 10,
            original_stock: 10,
            created_at: now,
            updated_at: now,
            deleted_at: NOT_DELETED,
        };
        self.flash_sales.insert(id, (sale_product, event));
        id
    }
}

#[async_trait]
impl ProductRepository for FakeCatalog {
    async fn get_product(&self, id: Uuid) -> Result<Option<product::Model>, ServiceError> {
        Ok(self.products.get(&id).cloned())
    }
}

#[async_trait]
impl DiscountRepository for FakeCatalog {
    async fn get_discount(&self, id: Uuid) -> Result<Option<discount::Model>, ServiceError> {
        self.discount_lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing_discounts {
            return Err(ServiceError::DatabaseError(sea_orm::DbErr::Custom(
                "connection reset".into(),
            )));
        }
        Ok(self.discounts.get(&id).cloned())
    }
}

#[async_trait]
impl FlashSaleRepository for FakeCatalog {
    async fn get_flash_sale_event_product(
        &self,
        id: Uuid,
    ) -> Result<Option<(flash_sale_event_product::Model, flash_sale_event::Model)>, ServiceError>
    {
        self.flash_sale_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.flash_sales.get(&id).cloned())
    }
}

pub fn basket_line(
    product_id: Uuid,
    product_type: ProductType,
    quantity: i32,
) -> basket_item::Model {
    let now = Utc::now();
    basket_item::Model {
        id: Uuid::new_v4(),
        basket_id: Uuid::new_v4(),
        product_id,
        flash_sale_event_product_id: None,
        discount_product_id: None,
        quantity,
        unit_price: Decimal::ZERO,
        total_price: Decimal::ZERO,
        product_type,
        created_at: now,
        updated_at: now,
        deleted_at: NOT_DELETED,
    }
}

/// Fresh migrated SQLite database in a temporary directory. Keep the
/// `TempDir` alive for as long as the connection is used.
pub async fn sqlite_db() -> (tempfile::TempDir, sea_orm::DatabaseConnection) {
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};

    let dir = tempfile::TempDir::new().unwrap();
    let config = DbConfig {
        url: format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display()),
        max_connections: 1,
        min_connections: 1,
        ..DbConfig::default()
    };
    let db = establish_connection_with_config(&config).await.unwrap();
    run_migrations(&db).await.unwrap();
    (dir, db)
}

/// Seeds a product, an empty order and an open basket holding one regular
/// item of that product. Returns `(basket_id, order_id)`.
pub async fn seed_regular_basket(
    db: &sea_orm::DatabaseConnection,
    base_price: Decimal,
    quantity: i32,
) -> (Uuid, Uuid) {
    use crate::entities::basket::{self, BasketStatus};
    use crate::entities::order::{self, OrderStatus};
    use crate::repositories::{BasketItemRepository, BasketRepository, OrderRepository, SqlStore};
    use sea_orm::{ActiveModelTrait, IntoActiveModel};

    let mut catalog = FakeCatalog::default();
    let product_id = catalog.add_product(base_price);
    let product = catalog.products.remove(&product_id).unwrap();
    product.into_active_model().insert(db).await.unwrap();

    let store = SqlStore::new(db);
    let now = Utc::now();
    let order = store
        .create_order(order::Model {
            id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            delivery_latitude: 52.52,
            delivery_longitude: 13.40,
            total_price: Decimal::ZERO,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            deleted_at: NOT_DELETED,
        })
        .await
        .unwrap();
    let basket = store
        .create_basket(basket::Model {
            id: Uuid::new_v4(),
            user_id: order.client_id,
            status: BasketStatus::Open,
            created_at: now,
            updated_at: now,
            deleted_at: NOT_DELETED,
        })
        .await
        .unwrap();

    let mut item = basket_line(product_id, ProductType::Regular, quantity);
    item.basket_id = basket.id;
    item.unit_price = base_price;
    item.total_price = base_price * Decimal::from(quantity);
    store.create_basket_item(item).await.unwrap();

    (basket.id, order.id)
}
