use mockall::mock;
use storefront_payment_engine::{
    db_types::{AuditEntry, NotificationRecord, Order, OrderId},
    order_objects::OrderQueryFilter,
    session_objects::SessionRequest,
    traits::{
        GatewayError,
        GatewaySession,
        GatewayTransactionStatus,
        OrderManagement,
        PaymentGateway,
        PaymentGatewayError,
    },
};

mock! {
    pub OrderManager {}
    impl OrderManagement for OrderManager {
        async fn order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError>;
        async fn orders_for_user(&self, user_id: &str) -> Result<Vec<Order>, PaymentGatewayError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, PaymentGatewayError>;
        async fn notifications_for_order(&self, order_id: &OrderId) -> Result<Vec<NotificationRecord>, PaymentGatewayError>;
        async fn audit_log_for_order(&self, order_id: &OrderId) -> Result<Vec<AuditEntry>, PaymentGatewayError>;
    }
}

mock! {
    pub Gateway {}
    impl PaymentGateway for Gateway {
        async fn create_session(&self, request: &SessionRequest) -> Result<GatewaySession, GatewayError>;
        async fn query_status(&self, transaction_id: &str) -> Result<Option<GatewayTransactionStatus>, GatewayError>;
    }
}
