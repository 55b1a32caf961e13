use mockall::mock;
use storefront_payment_engine::{
    session_objects::SessionRequest,
    traits::{GatewayError, GatewaySession, GatewayTransactionStatus, PaymentGateway},
};

mock! {
    pub Gateway {}
    impl PaymentGateway for Gateway {
        async fn create_session(&self, request: &SessionRequest) -> Result<GatewaySession, GatewayError>;
        async fn query_status(&self, transaction_id: &str) -> Result<Option<GatewayTransactionStatus>, GatewayError>;
    }
}
