mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use uuid::Uuid;

use common::TestApp;
use flash_sale_orders::entities::basket::BasketStatus;
use flash_sale_orders::entities::order::OrderStatus;
use flash_sale_orders::entities::ProductType;
use flash_sale_orders::errors::ServiceError;
use flash_sale_orders::repositories::OrderUpdate;
use flash_sale_orders::services::{CreateBasketItemRequest, CreateOrderRequest};

fn item_request(basket_id: Uuid, product_type: &str) -> CreateBasketItemRequest {
    CreateBasketItemRequest {
        basket_id,
        product_id: Uuid::new_v4(),
        flash_sale_event_product_id: None,
        discount_product_id: None,
        quantity: 3,
        unit_price: dec!(2.50),
        product_type: product_type.into(),
    }
}

#[tokio::test]
async fn create_basket_item_computes_total() {
    let app = TestApp::new().await;
    let basket = app.services.baskets.create_basket(Uuid::new_v4()).await.unwrap();

    let item = app
        .services
        .basket_items
        .create_basket_item(item_request(basket.id, "REGULAR"))
        .await
        .unwrap();

    assert_eq!(item.total_price, dec!(7.50));
    assert_eq!(item.product_type, ProductType::Regular);

    let fetched = app.services.basket_items.get_basket_item(item.id).await.unwrap();
    assert_eq!(fetched.id, item.id);
}

#[tokio::test]
async fn create_basket_item_rejects_bad_input() {
    let app = TestApp::new().await;
    let basket = app.services.baskets.create_basket(Uuid::new_v4()).await.unwrap();

    let unknown_type = app
        .services
        .basket_items
        .create_basket_item(item_request(basket.id, "BUNDLE"))
        .await;
    assert_matches!(unknown_type, Err(ServiceError::ValidationError(_)));

    let mut zero_quantity = item_request(basket.id, "REGULAR");
    zero_quantity.quantity = 0;
    assert_matches!(
        app.services.basket_items.create_basket_item(zero_quantity).await,
        Err(ServiceError::ValidationError(_))
    );

    let missing_basket = app
        .services
        .basket_items
        .create_basket_item(item_request(Uuid::new_v4(), "REGULAR"))
        .await;
    assert_matches!(missing_basket, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn checked_out_basket_accepts_no_items() {
    let app = TestApp::new().await;
    let basket = app.services.baskets.create_basket(Uuid::new_v4()).await.unwrap();
    app.services
        .baskets
        .update_basket_status(basket.id, BasketStatus::CheckedOut)
        .await
        .unwrap();

    let result = app
        .services
        .basket_items
        .create_basket_item(item_request(basket.id, "REGULAR"))
        .await;

    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn status_update_notifies_owner() {
    let app = TestApp::new().await;
    let owner = Uuid::new_v4();
    let basket = app.services.baskets.create_basket(owner).await.unwrap();

    let updated = app
        .services
        .baskets
        .update_basket_status(basket.id, BasketStatus::CheckedOut)
        .await
        .unwrap();

    assert_eq!(updated.status, BasketStatus::CheckedOut);
    assert_eq!(
        app.notifier.sent(),
        vec![(owner, "Your basket status has been updated to CHECKED_OUT.".to_string())]
    );
}

#[tokio::test]
async fn listing_pages_and_deletes() {
    let app = TestApp::new().await;
    let basket = app.services.baskets.create_basket(Uuid::new_v4()).await.unwrap();
    for _ in 0..3 {
        app.services
            .basket_items
            .create_basket_item(item_request(basket.id, "REGULAR"))
            .await
            .unwrap();
    }

    let (page, total) = app
        .services
        .basket_items
        .list_basket_items(basket.id, 1, 2)
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(total, 3);

    let basket_id = app
        .services
        .basket_items
        .delete_basket_item(page[0].id)
        .await
        .unwrap();
    assert_eq!(basket_id, basket.id);

    let (_, total) = app
        .services
        .basket_items
        .list_basket_items(basket.id, 0, 0)
        .await
        .unwrap();
    assert_eq!(total, 2);

    app.services.baskets.delete_basket(basket.id).await.unwrap();
    assert_matches!(
        app.services.baskets.get_basket(basket.id).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn orders_start_pending_with_zero_total() {
    let app = TestApp::new().await;
    let client_id = Uuid::new_v4();

    let order = app
        .services
        .orders
        .create_order(CreateOrderRequest {
            client_id,
            delivery_latitude: 41.3,
            delivery_longitude: 69.2,
            status: None,
        })
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_price, dec!(0));

    let updated = app
        .services
        .orders
        .update_order(
            order.id,
            OrderUpdate {
                status: Some(OrderStatus::Processing),
                ..OrderUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.status, OrderStatus::Processing);

    let (orders, total) = app
        .services
        .orders
        .list_orders(Some(client_id), 1, 10)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(orders[0].id, order.id);

    app.services.orders.delete_order(order.id).await.unwrap();
    assert_matches!(
        app.services.orders.delete_order(order.id).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn order_status_update_notifies_client() {
    let app = TestApp::new().await;
    let order = app.seed_order().await;

    app.services
        .orders
        .update_order(
            order.id,
            OrderUpdate {
                delivery_latitude: Some(40.0),
                ..OrderUpdate::default()
            },
        )
        .await
        .unwrap();
    assert!(app.notifier.sent().is_empty());

    let updated = app
        .services
        .orders
        .update_order_status(order.id, OrderStatus::Shipped)
        .await
        .unwrap();

    assert_eq!(updated.status, OrderStatus::Shipped);
    assert_eq!(updated.delivery_latitude, 40.0);
    assert_eq!(
        app.notifier.sent(),
        vec![(order.client_id, "Your order status has been updated to SHIPPED.".to_string())]
    );
}

#[tokio::test]
async fn updating_unknown_order_sends_nothing() {
    let app = TestApp::new().await;

    let err = app
        .services
        .orders
        .update_order_status(Uuid::new_v4(), OrderStatus::Cancelled)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::NotFound(_));
    assert!(app.notifier.sent().is_empty());
}
