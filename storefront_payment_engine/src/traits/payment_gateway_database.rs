use thiserror::Error;

use crate::db_types::{NewAuditEntry, NewNotification, NewOrder, Order, OrderId, OrderUpdate, Product};

/// The order store.
///
/// Orders are only ever inserted and updated, never deleted. All updates are compare-and-swap on the order's `version`
/// column: the backend applies the update only if the stored version still matches the one the caller read, and bumps
/// the version as part of the same write.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a brand-new order. Fails with [`PaymentGatewayError::OrderAlreadyExists`] if the order id is taken.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError>;

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError>;

    /// Conditionally applies `update` to the order.
    ///
    /// If the stored version is no longer `expected_version`, nothing is written and `Ok(None)` is returned; the caller
    /// should re-read the order and decide again. On success the updated order is returned.
    ///
    /// If `audit` is provided, the audit entry is written in the same transaction as the update.
    async fn update_order(
        &self,
        order_id: &OrderId,
        expected_version: i64,
        update: OrderUpdate,
        audit: Option<NewAuditEntry>,
    ) -> Result<Option<Order>, PaymentGatewayError>;

    /// [`Self::update_order`] for a gateway notification: when the update wins, `notification` is appended to the
    /// notification log in the same transaction. When it loses, neither is written.
    async fn reconcile_order(
        &self,
        order_id: &OrderId,
        expected_version: i64,
        update: OrderUpdate,
        notification: NewNotification,
    ) -> Result<Option<Order>, PaymentGatewayError>;

    /// Appends a gateway notification to the notification log. Returns `false` if an identical notification (same
    /// transaction id, transaction status and fraud status) was already recorded.
    async fn record_notification(&self, notification: NewNotification) -> Result<bool, PaymentGatewayError>;

    /// Catalog lookup used to price checkout items.
    async fn fetch_product(&self, product_id: &str) -> Result<Option<Product>, PaymentGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentGatewayError>;
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Cannot insert order, since it already exists with id {0}")]
    OrderAlreadyExists(OrderId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Stored data could not be decoded: {0}")]
    CorruptData(String),
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => Self::CorruptData(e.to_string()),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}
