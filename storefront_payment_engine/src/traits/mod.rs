//! # Backend contracts
//!
//! This module defines the seams between the payment engine and the outside world.
//!
//! * [`PaymentGatewayDatabase`] is the order store. Every write goes through a conditional update keyed on the order's
//!   `version`, so that webhook deliveries, payment retries and admin updates that race on the same order never
//!   blind-overwrite each other.
//! * [`OrderManagement`] provides read-only queries for orders, notifications and the audit trail.
//! * [`PaymentGateway`] is the engine's view of the external payment gateway: open a hosted payment session, and poll
//!   the status of a transaction. The concrete client lives outside the engine.
mod order_management;
mod payment_gateway;
mod payment_gateway_database;

pub use order_management::OrderManagement;
pub use payment_gateway::{GatewayError, GatewaySession, GatewayTransactionStatus, PaymentGateway};
pub use payment_gateway_database::{PaymentGatewayDatabase, PaymentGatewayError};
