//! # Storefront payment engine public API
//!
//! The `spe_api` module exposes the programmatic API for the payment engine. The API is split by concern, so that the
//! server only wires up what each route needs.
//!
//! * [`order_flow_api`] moves orders through the manual transitions and the audited status override.
//! * [`payment_session_api`] handles checkout and payment retries. It is the only part of the engine that talks to the
//!   payment gateway.
//! * [`reconciliation_api`] applies the gateway's payment notifications to orders.
//! * [`order_query_api`] answers read-only questions about orders, with the caller's access rights applied.
//!
//! The other submodules are support types and the pure pieces of logic (the [`amount_adjuster`] and the
//! [`order_state_machine`]) that the APIs are built from.
//!
//! # API usage
//!
//! Every API is created by supplying a backend that implements the traits it needs:
//!
//! ```rust,ignore
//! use storefront_payment_engine::{OrderQueryApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements OrderManagement
//! let api = OrderQueryApi::new(db);
//! let order = api.order_by_id(&order_id, &requester).await?;
//! ```
//!
//! # Concurrency
//!
//! Payment notifications, customer retries and admin updates can all race on the same order. Every write is a
//! conditional update on the order's `version`. When the version has moved on, the writer re-reads the order, makes its
//! decision again, and tries again up to [`MAX_UPDATE_ATTEMPTS`] times.
pub mod amount_adjuster;
pub mod errors;
pub mod order_flow_api;
pub mod order_objects;
pub mod order_query_api;
pub mod order_state_machine;
pub mod payment_objects;
pub mod payment_session_api;
pub mod reconciliation_api;
pub mod session_objects;

pub const MAX_UPDATE_ATTEMPTS: usize = 3;
