//! Storefront Payment Engine
//!
//! The storefront payment engine manages the payment lifecycle of storefront orders that are paid through an external
//! hosted-payment gateway (or cash on delivery). It is provider-agnostic: the gateway is reached through the
//! [`traits::PaymentGateway`] trait, and the concrete client lives in the server.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). You should never need to access the database directly.
//!    Instead, use the public API provided by the payment engine. The exception is the data types used in the
//!    database. These are defined in the [`db_types`] module and are public.
//! 2. The backend contracts ([`traits`]). Backends implement these in order to act as the order store, and the server
//!    implements [`traits::PaymentGateway`] for the gateway it talks to.
//! 3. The payment engine public API ([`mod@spe_api`]). This provides checkout, payment retries, notification
//!    reconciliation, manual status changes and order queries.
//!
//! The engine also provides a set of events that can be subscribed to. These events are emitted when an order's status
//! changes. For example, when an order is first paid for, an `OrderPaidEvent` is emitted.
//! A simple Actor framework is used so that you can easily hook into these events and perform custom actions.
pub mod db_types;
pub mod events;
pub mod helpers;
mod spe_api;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use spe_api::{
    amount_adjuster,
    errors::OrderFlowError,
    order_flow_api::OrderFlowApi,
    order_objects,
    order_query_api::OrderQueryApi,
    order_state_machine,
    payment_objects,
    payment_session_api::PaymentSessionApi,
    reconciliation_api::ReconciliationApi,
    session_objects,
    MAX_UPDATE_ATTEMPTS,
};
pub use traits::{OrderManagement, PaymentGateway, PaymentGatewayDatabase};
