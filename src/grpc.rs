use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::future::Future;
use std::net::SocketAddr;
use std::str::FromStr;
use tonic::{transport::Server, Request, Response, Status};
use tracing::info;
use uuid::Uuid;

use crate::entities::{basket, basket_item, order, order_item};
use crate::errors::grpc::map_service_error;
use crate::proto::basket_item_service_server::{BasketItemService, BasketItemServiceServer};
use crate::proto::basket_service_server::{BasketService, BasketServiceServer};
use crate::proto::order_item_service_server::{OrderItemService, OrderItemServiceServer};
use crate::proto::order_service as pb;
use crate::proto::order_service_server::{OrderService, OrderServiceServer};
use crate::repositories::OrderUpdate;
use crate::services;
use crate::AppServices;

fn parse_uuid(raw: &str, field: &str) -> Result<Uuid, Status> {
    Uuid::parse_str(raw).map_err(|_| Status::invalid_argument(format!("invalid {}", field)))
}

/// Empty strings stand for an absent optional id.
fn parse_optional_uuid(raw: &str, field: &str) -> Result<Option<Uuid>, Status> {
    if raw.is_empty() {
        Ok(None)
    } else {
        parse_uuid(raw, field).map(Some)
    }
}

fn parse_decimal(raw: &str, field: &str) -> Result<Decimal, Status> {
    Decimal::from_str(raw).map_err(|_| Status::invalid_argument(format!("invalid {}", field)))
}

/// Statuses travel as their SCREAMING_SNAKE_CASE names.
fn parse_status<T: FromStr>(raw: &str, field: &str) -> Result<T, Status> {
    T::from_str(raw).map_err(|_| Status::invalid_argument(format!("invalid {}", field)))
}

fn timestamp(at: DateTime<Utc>) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: at.timestamp(),
        nanos: at.timestamp_subsec_nanos() as i32,
    }
}

fn optional_id(id: Option<Uuid>) -> String {
    id.map(|id| id.to_string()).unwrap_or_default()
}

impl From<order_item::Model> for pb::OrderItem {
    fn from(item: order_item::Model) -> Self {
        Self {
            id: item.id.to_string(),
            order_id: item.order_id.to_string(),
            product_id: item.product_id.to_string(),
            flash_sale_event_product_id: optional_id(item.flash_sale_event_product_id),
            discount_product_id: optional_id(item.discount_product_id),
            quantity: item.quantity,
            unit_price: item.unit_price.to_string(),
            total_price: item.total_price.to_string(),
            discount_applied: item.discount_applied.to_string(),
            product_type: item.product_type.to_string(),
            created_at: Some(timestamp(item.created_at)),
            updated_at: Some(timestamp(item.updated_at)),
        }
    }
}

impl From<basket_item::Model> for pb::BasketItem {
    fn from(item: basket_item::Model) -> Self {
        Self {
            id: item.id.to_string(),
            basket_id: item.basket_id.to_string(),
            product_id: item.product_id.to_string(),
            flash_sale_event_product_id: optional_id(item.flash_sale_event_product_id),
            discount_product_id: optional_id(item.discount_product_id),
            quantity: item.quantity,
            unit_price: item.unit_price.to_string(),
            total_price: item.total_price.to_string(),
            product_type: item.product_type.to_string(),
            created_at: Some(timestamp(item.created_at)),
            updated_at: Some(timestamp(item.updated_at)),
        }
    }
}

impl From<basket::Model> for pb::Basket {
    fn from(basket: basket::Model) -> Self {
        Self {
            id: basket.id.to_string(),
            user_id: basket.user_id.to_string(),
            status: basket.status.to_string(),
            created_at: Some(timestamp(basket.created_at)),
            updated_at: Some(timestamp(basket.updated_at)),
        }
    }
}

impl From<order::Model> for pb::Order {
    fn from(order: order::Model) -> Self {
        Self {
            id: order.id.to_string(),
            client_id: order.client_id.to_string(),
            delivery_latitude: order.delivery_latitude,
            delivery_longitude: order.delivery_longitude,
            total_price: order.total_price.to_string(),
            status: order.status.to_string(),
            created_at: Some(timestamp(order.created_at)),
            updated_at: Some(timestamp(order.updated_at)),
        }
    }
}

pub struct OrderItemGrpcService {
    pub svc: services::OrderItemService,
}

#[tonic::async_trait]
impl OrderItemService for OrderItemGrpcService {
    async fn get_order_item(
        &self,
        request: Request<pb::GetOrderItemRequest>,
    ) -> Result<Response<pb::GetOrderItemResponse>, Status> {
        let id = parse_uuid(&request.into_inner().id, "id")?;
        let item = map_service_error(self.svc.get_order_item(id).await)?;
        Ok(Response::new(pb::GetOrderItemResponse {
            order_item: Some(item.into()),
        }))
    }

    async fn list_order_items(
        &self,
        request: Request<pb::ListOrderItemsRequest>,
    ) -> Result<Response<pb::ListOrderItemsResponse>, Status> {
        let req = request.into_inner();
        let order_id = parse_uuid(&req.order_id, "order_id")?;
        let (items, total_count) =
            map_service_error(self.svc.list_order_items(order_id, req.page, req.limit).await)?;
        Ok(Response::new(pb::ListOrderItemsResponse {
            order_items: items.into_iter().map(Into::into).collect(),
            total_count,
        }))
    }

    async fn convert_basket_to_order_items(
        &self,
        request: Request<pb::ConvertBasketToOrderItemsRequest>,
    ) -> Result<Response<pb::ConvertBasketToOrderItemsResponse>, Status> {
        let req = request.into_inner();
        let basket_id = parse_uuid(&req.basket_id, "basket_id")?;
        let order_id = parse_uuid(&req.order_id, "order_id")?;
        let id = map_service_error(
            self.svc
                .convert_basket_to_order_items(basket_id, order_id)
                .await,
        )?;
        Ok(Response::new(pb::ConvertBasketToOrderItemsResponse {
            id: id.to_string(),
        }))
    }

    async fn delete_order_item(
        &self,
        request: Request<pb::DeleteOrderItemRequest>,
    ) -> Result<Response<pb::DeleteOrderItemResponse>, Status> {
        let id = parse_uuid(&request.into_inner().id, "id")?;
        let order_id = map_service_error(self.svc.delete_order_item(id).await)?;
        Ok(Response::new(pb::DeleteOrderItemResponse {
            order_id: order_id.to_string(),
        }))
    }
}

pub struct BasketItemGrpcService {
    pub svc: services::BasketItemService,
}

#[tonic::async_trait]
impl BasketItemService for BasketItemGrpcService {
    async fn create_basket_item(
        &self,
        request: Request<pb::CreateBasketItemRequest>,
    ) -> Result<Response<pb::CreateBasketItemResponse>, Status> {
        let req = request.into_inner();
        let create = services::CreateBasketItemRequest {
            basket_id: parse_uuid(&req.basket_id, "basket_id")?,
            product_id: parse_uuid(&req.product_id, "product_id")?,
            flash_sale_event_product_id: parse_optional_uuid(
                &req.flash_sale_event_product_id,
                "flash_sale_event_product_id",
            )?,
            discount_product_id: parse_optional_uuid(&req.discount_product_id, "discount_product_id")?,
            quantity: req.quantity,
            unit_price: parse_decimal(&req.unit_price, "unit_price")?,
            product_type: req.product_type,
        };
        let item = map_service_error(self.svc.create_basket_item(create).await)?;
        Ok(Response::new(pb::CreateBasketItemResponse {
            basket_item: Some(item.into()),
        }))
    }

    async fn get_basket_item(
        &self,
        request: Request<pb::GetBasketItemRequest>,
    ) -> Result<Response<pb::GetBasketItemResponse>, Status> {
        let id = parse_uuid(&request.into_inner().id, "id")?;
        let item = map_service_error(self.svc.get_basket_item(id).await)?;
        Ok(Response::new(pb::GetBasketItemResponse {
            basket_item: Some(item.into()),
        }))
    }

    async fn list_basket_items(
        &self,
        request: Request<pb::ListBasketItemsRequest>,
    ) -> Result<Response<pb::ListBasketItemsResponse>, Status> {
        let req = request.into_inner();
        let basket_id = parse_uuid(&req.basket_id, "basket_id")?;
        let (items, total_count) =
            map_service_error(self.svc.list_basket_items(basket_id, req.page, req.limit).await)?;
        Ok(Response::new(pb::ListBasketItemsResponse {
            basket_items: items.into_iter().map(Into::into).collect(),
            total_count,
        }))
    }

    async fn delete_basket_item(
        &self,
        request: Request<pb::DeleteBasketItemRequest>,
    ) -> Result<Response<pb::DeleteBasketItemResponse>, Status> {
        let id = parse_uuid(&request.into_inner().id, "id")?;
        map_service_error(self.svc.delete_basket_item(id).await)?;
        Ok(Response::new(pb::DeleteBasketItemResponse {}))
    }
}

pub struct BasketGrpcService {
    pub svc: services::BasketService,
}

#[tonic::async_trait]
impl BasketService for BasketGrpcService {
    async fn create_basket(
        &self,
        request: Request<pb::CreateBasketRequest>,
    ) -> Result<Response<pb::CreateBasketResponse>, Status> {
        let user_id = parse_uuid(&request.into_inner().user_id, "user_id")?;
        let basket = map_service_error(self.svc.create_basket(user_id).await)?;
        Ok(Response::new(pb::CreateBasketResponse {
            basket: Some(basket.into()),
        }))
    }

    async fn get_basket(
        &self,
        request: Request<pb::GetBasketRequest>,
    ) -> Result<Response<pb::GetBasketResponse>, Status> {
        let id = parse_uuid(&request.into_inner().id, "id")?;
        let basket = map_service_error(self.svc.get_basket(id).await)?;
        Ok(Response::new(pb::GetBasketResponse {
            basket: Some(basket.into()),
        }))
    }

    async fn list_baskets(
        &self,
        request: Request<pb::ListBasketsRequest>,
    ) -> Result<Response<pb::ListBasketsResponse>, Status> {
        let req = request.into_inner();
        let user_id = parse_optional_uuid(&req.user_id, "user_id")?;
        let (baskets, total_count) =
            map_service_error(self.svc.list_baskets(user_id, req.page, req.limit).await)?;
        Ok(Response::new(pb::ListBasketsResponse {
            baskets: baskets.into_iter().map(Into::into).collect(),
            total_count,
        }))
    }

    async fn update_basket_status(
        &self,
        request: Request<pb::UpdateBasketStatusRequest>,
    ) -> Result<Response<pb::UpdateBasketStatusResponse>, Status> {
        let req = request.into_inner();
        let id = parse_uuid(&req.id, "id")?;
        let status = parse_status(&req.status, "status")?;
        let basket = map_service_error(self.svc.update_basket_status(id, status).await)?;
        Ok(Response::new(pb::UpdateBasketStatusResponse {
            basket: Some(basket.into()),
        }))
    }

    async fn delete_basket(
        &self,
        request: Request<pb::DeleteBasketRequest>,
    ) -> Result<Response<pb::DeleteBasketResponse>, Status> {
        let id = parse_uuid(&request.into_inner().id, "id")?;
        map_service_error(self.svc.delete_basket(id).await)?;
        Ok(Response::new(pb::DeleteBasketResponse {}))
    }
}

pub struct OrderGrpcService {
    pub svc: services::OrderService,
}

#[tonic::async_trait]
impl OrderService for OrderGrpcService {
    async fn create_order(
        &self,
        request: Request<pb::CreateOrderRequest>,
    ) -> Result<Response<pb::CreateOrderResponse>, Status> {
        let req = request.into_inner();
        let status = if req.status.is_empty() {
            None
        } else {
            Some(parse_status(&req.status, "status")?)
        };
        let create = services::CreateOrderRequest {
            client_id: parse_uuid(&req.client_id, "client_id")?,
            delivery_latitude: req.delivery_latitude,
            delivery_longitude: req.delivery_longitude,
            status,
        };
        let order = map_service_error(self.svc.create_order(create).await)?;
        Ok(Response::new(pb::CreateOrderResponse {
            order: Some(order.into()),
        }))
    }

    async fn get_order(
        &self,
        request: Request<pb::GetOrderRequest>,
    ) -> Result<Response<pb::GetOrderResponse>, Status> {
        let id = parse_uuid(&request.into_inner().id, "id")?;
        let order = map_service_error(self.svc.get_order(id).await)?;
        Ok(Response::new(pb::GetOrderResponse {
            order: Some(order.into()),
        }))
    }

    async fn list_orders(
        &self,
        request: Request<pb::ListOrdersRequest>,
    ) -> Result<Response<pb::ListOrdersResponse>, Status> {
        let req = request.into_inner();
        let client_id = parse_optional_uuid(&req.client_id, "client_id")?;
        let (orders, total_count) =
            map_service_error(self.svc.list_orders(client_id, req.page, req.limit).await)?;
        Ok(Response::new(pb::ListOrdersResponse {
            orders: orders.into_iter().map(Into::into).collect(),
            total_count,
        }))
    }

    async fn update_order(
        &self,
        request: Request<pb::UpdateOrderRequest>,
    ) -> Result<Response<pb::UpdateOrderResponse>, Status> {
        let req = request.into_inner();
        let id = parse_uuid(&req.id, "id")?;
        let changes = OrderUpdate {
            status: req
                .status
                .as_deref()
                .map(|raw| parse_status(raw, "status"))
                .transpose()?,
            delivery_latitude: req.delivery_latitude,
            delivery_longitude: req.delivery_longitude,
        };
        let order = map_service_error(self.svc.update_order(id, changes).await)?;
        Ok(Response::new(pb::UpdateOrderResponse {
            order: Some(order.into()),
        }))
    }

    async fn update_order_status(
        &self,
        request: Request<pb::UpdateOrderStatusRequest>,
    ) -> Result<Response<pb::UpdateOrderStatusResponse>, Status> {
        let req = request.into_inner();
        let id = parse_uuid(&req.id, "id")?;
        let status = parse_status(&req.status, "status")?;
        let order = map_service_error(self.svc.update_order_status(id, status).await)?;
        Ok(Response::new(pb::UpdateOrderStatusResponse {
            order: Some(order.into()),
        }))
    }

    async fn delete_order(
        &self,
        request: Request<pb::DeleteOrderRequest>,
    ) -> Result<Response<pb::DeleteOrderResponse>, Status> {
        let id = parse_uuid(&request.into_inner().id, "id")?;
        map_service_error(self.svc.delete_order(id).await)?;
        Ok(Response::new(pb::DeleteOrderResponse {}))
    }
}

/// Serves every service until `shutdown` resolves.
pub async fn serve<F>(
    services: AppServices,
    addr: SocketAddr,
    shutdown: F,
) -> Result<(), tonic::transport::Error>
where
    F: Future<Output = ()> + Send,
{
    info!(%addr, "gRPC server listening");

    Server::builder()
        .add_service(OrderServiceServer::new(OrderGrpcService {
            svc: services.orders,
        }))
        .add_service(OrderItemServiceServer::new(OrderItemGrpcService {
            svc: services.order_items,
        }))
        .add_service(BasketServiceServer::new(BasketGrpcService {
            svc: services.baskets,
        }))
        .add_service(BasketItemServiceServer::new(BasketItemGrpcService {
            svc: services.basket_items,
        }))
        .serve_with_shutdown(addr, shutdown)
        .await
}
