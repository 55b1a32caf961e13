//! Client for the payment gateway's hosted payment page ("snap") and core status APIs.
//!
//! The crate only knows the wire format. Domain rules (which status means what for an order, how amounts are
//! reconciled) live in the payment engine.
mod api;
mod config;
mod error;

pub mod data_objects;
pub mod helpers;

pub use api::GatewayApi;
pub use config::GatewayConfig;
pub use error::GatewayApiError;
