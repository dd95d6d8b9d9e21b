//! Flash Sale Orders
//!
//! Basket-to-order conversion and pricing for a flash-sale storefront,
//! with its storage, queue and gRPC plumbing.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod consumers;
pub mod db;
pub mod entities;
pub mod errors;
#[cfg(feature = "grpc")]
pub mod grpc;
pub mod message_queue;
pub mod migrator;
pub mod notifications;
#[cfg(feature = "grpc")]
pub mod proto;
pub mod repositories;
pub mod services;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use notifications::Notifier;
use services::{BasketItemService, BasketService, OrderItemService, OrderService, ServiceSettings};

/// Every service, wired to one connection pool and notifier.
#[derive(Clone)]
pub struct AppServices {
    pub orders: OrderService,
    pub order_items: OrderItemService,
    pub baskets: BasketService,
    pub basket_items: BasketItemService,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        notifier: Arc<dyn Notifier>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            orders: OrderService::new(db.clone(), notifier.clone(), settings.clone()),
            order_items: OrderItemService::new(db.clone(), notifier.clone(), settings.clone()),
            baskets: BasketService::new(db.clone(), notifier, settings.clone()),
            basket_items: BasketItemService::new(db, settings),
        }
    }
}
