//! Generated protobuf types and tonic service traits.

pub mod order_service {
    include!(concat!(env!("OUT_DIR"), "/order_service.rs"));
}

pub use order_service::basket_item_service_server;
pub use order_service::basket_service_server;
pub use order_service::order_item_service_server;
pub use order_service::order_service_server;
