#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use tempfile::TempDir;
use uuid::Uuid;

use flash_sale_orders::{
    db::{self, DbConfig},
    entities::{
        basket::{self, BasketStatus},
        basket_item,
        discount::{self, DiscountType},
        flash_sale_event::{self, FlashSaleStatus},
        flash_sale_event_product,
        order::{self, OrderStatus},
        product, ProductType, NOT_DELETED,
    },
    notifications::{NotificationError, Notifier},
    repositories::{BasketItemRepository, BasketRepository, OrderRepository, SqlStore},
    services::ServiceSettings,
    AppServices,
};

/// Notifier that remembers what it was asked to send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(Uuid, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(Uuid, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, recipient: Uuid, message: &str) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push((recipient, message.to_string()));
        Ok(())
    }
}

/// Services over a fresh migrated SQLite database in a temporary directory.
pub struct TestApp {
    _dir: TempDir,
    pub db: Arc<DatabaseConnection>,
    pub services: AppServices,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_settings(ServiceSettings::default()).await
    }

    pub async fn with_settings(settings: ServiceSettings) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let config = DbConfig {
            url: format!("sqlite://{}?mode=rwc", dir.path().join("orders.db").display()),
            max_connections: 1,
            min_connections: 1,
            ..DbConfig::default()
        };
        let pool = db::establish_connection_with_config(&config)
            .await
            .expect("connect sqlite");
        db::run_migrations(&pool).await.expect("migrations");

        let db = Arc::new(pool);
        let notifier = Arc::new(RecordingNotifier::default());
        let services = AppServices::new(db.clone(), notifier.clone(), settings);

        Self {
            _dir: dir,
            db,
            services,
            notifier,
        }
    }

    pub fn store(&self) -> SqlStore<'_, DatabaseConnection> {
        SqlStore::new(self.db.as_ref())
    }

    pub async fn seed_product(&self, base_price: Decimal) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        product::ActiveModel {
            id: Set(id),
            name: Set("Sneakers".into()),
            description: Set(None),
            base_price: Set(base_price),
            current_price: Set(base_price),
            image_url: Set(None),
            stock_quantity: Set(50),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(NOT_DELETED),
        }
        .insert(self.db.as_ref())
        .await
        .expect("insert product");
        id
    }

    pub async fn seed_discount(
        &self,
        discount_type: DiscountType,
        value: Decimal,
        is_active: bool,
        end_date: DateTime<Utc>,
    ) -> Uuid {
        let now = Utc::now();
        let id = Uuid::new_v4();
        discount::ActiveModel {
            id: Set(id),
            name: Set("Weekend promo".into()),
            description: Set(None),
            discount_type: Set(discount_type),
            discount_value: Set(value),
            start_date: Set(now - Duration::days(1)),
            end_date: Set(end_date),
            is_active: Set(is_active),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(NOT_DELETED),
        }
        .insert(self.db.as_ref())
        .await
        .expect("insert discount");
        id
    }

    /// Seeds an event and one of its products. Returns the event product id.
    pub async fn seed_flash_sale(
        &self,
        product_id: Uuid,
        sale_price: Decimal,
        status: FlashSaleStatus,
        end_time: DateTime<Utc>,
    ) -> Uuid {
        let now = Utc::now();
        let event_id = Uuid::new_v4();
        flash_sale_event::ActiveModel {
            id: Set(event_id),
            name: Set("Midnight drop".into()),
            description: Set(None),
            start_time: Set(now - Duration::hours(1)),
            end_time: Set(end_time),
            status: Set(status),
            event_type: Set("FLASH".into()),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(NOT_DELETED),
        }
        .insert(self.db.as_ref())
        .await
        .expect("insert event");

        let id = Uuid::new_v4();
        flash_sale_event_product::ActiveModel {
            id: Set(id),
            event_id: Set(event_id),
            product_id: Set(product_id),
            discount_percentage: Set(Decimal::ZERO),
            sale_price: Set(sale_price),
            available_quantity: Set(10),
            original_stock: Set(10),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(NOT_DELETED),
        }
        .insert(self.db.as_ref())
        .await
        .expect("insert event product");
        id
    }

    pub async fn seed_order(&self) -> order::Model {
        let now = Utc::now();
        self.store()
            .create_order(order::Model {
                id: Uuid::new_v4(),
                client_id: Uuid::new_v4(),
                delivery_latitude: 41.31,
                delivery_longitude: 69.24,
                total_price: Decimal::ZERO,
                status: OrderStatus::Pending,
                created_at: now,
                updated_at: now,
                deleted_at: NOT_DELETED,
            })
            .await
            .expect("insert order")
    }

    pub async fn seed_basket(&self, user_id: Uuid) -> basket::Model {
        let now = Utc::now();
        self.store()
            .create_basket(basket::Model {
                id: Uuid::new_v4(),
                user_id,
                status: BasketStatus::Open,
                created_at: now,
                updated_at: now,
                deleted_at: NOT_DELETED,
            })
            .await
            .expect("insert basket")
    }

    /// Inserts a basket line directly, skipping request validation. Each
    /// call is stamped one second after the previous so listing order is
    /// insertion order.
    pub async fn add_basket_item(&self, item: BasketLine) -> basket_item::Model {
        let created_at = Utc::now() + Duration::seconds(item.sequence);
        self.store()
            .create_basket_item(basket_item::Model {
                id: Uuid::new_v4(),
                basket_id: item.basket_id,
                product_id: item.product_id,
                flash_sale_event_product_id: item.flash_sale_event_product_id,
                discount_product_id: item.discount_product_id,
                quantity: item.quantity,
                unit_price: Decimal::ZERO,
                total_price: Decimal::ZERO,
                product_type: item.product_type,
                created_at,
                updated_at: created_at,
                deleted_at: NOT_DELETED,
            })
            .await
            .expect("insert basket item")
    }

    pub async fn order_total(&self, order_id: Uuid) -> Decimal {
        self.store()
            .get_order(order_id)
            .await
            .expect("load order")
            .expect("order exists")
            .total_price
    }
}

pub struct BasketLine {
    pub basket_id: Uuid,
    pub product_id: Uuid,
    pub product_type: ProductType,
    pub quantity: i32,
    pub flash_sale_event_product_id: Option<Uuid>,
    pub discount_product_id: Option<Uuid>,
    pub sequence: i64,
}

impl BasketLine {
    pub fn regular(basket_id: Uuid, product_id: Uuid, quantity: i32) -> Self {
        Self {
            basket_id,
            product_id,
            product_type: ProductType::Regular,
            quantity,
            flash_sale_event_product_id: None,
            discount_product_id: None,
            sequence: 0,
        }
    }

    pub fn flash_sale(basket_id: Uuid, product_id: Uuid, fsep_id: Uuid, quantity: i32) -> Self {
        Self {
            product_type: ProductType::FlashSale,
            flash_sale_event_product_id: Some(fsep_id),
            ..Self::regular(basket_id, product_id, quantity)
        }
    }

    pub fn discounted(basket_id: Uuid, product_id: Uuid, discount_id: Uuid, quantity: i32) -> Self {
        Self {
            product_type: ProductType::Discount,
            discount_product_id: Some(discount_id),
            ..Self::regular(basket_id, product_id, quantity)
        }
    }

    pub fn at(mut self, sequence: i64) -> Self {
        self.sequence = sequence;
        self
    }
}
