use crate::{
    db_types::{AuditEntry, NotificationRecord, Order, OrderId},
    order_objects::OrderQueryFilter,
    traits::PaymentGatewayError,
};

/// The `OrderManagement` trait defines the behaviour for querying information about orders in the database backend.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError>;

    /// All orders placed by `user_id`, newest first.
    async fn orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, PaymentGatewayError>;

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, PaymentGatewayError>;

    /// The gateway notifications recorded against an order, in the order they were received.
    async fn notifications_for_order(&self, order_id: &OrderId) -> Result<Vec<NotificationRecord>, PaymentGatewayError>;

    /// The manual status changes and overrides made to an order, oldest first.
    async fn audit_log_for_order(&self, order_id: &OrderId) -> Result<Vec<AuditEntry>, PaymentGatewayError>;
}
