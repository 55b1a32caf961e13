use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    db_types::{FraudStatus, MinorUnits, TransactionStatus},
    session_objects::SessionRequest,
};

/// A hosted payment session, as returned by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewaySession {
    pub token: String,
    pub redirect_url: String,
    /// Some gateways only assign a transaction id once the customer submits the payment page.
    pub transaction_id: Option<String>,
    pub gross_amount: MinorUnits,
}

/// The gateway's view of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayTransactionStatus {
    pub transaction_id: String,
    pub status: TransactionStatus,
    pub fraud_status: Option<FraudStatus>,
    pub transaction_time: Option<DateTime<Utc>>,
    pub gross_amount: Option<MinorUnits>,
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Could not reach the payment gateway: {0}")]
    Transport(String),
    #[error("The payment gateway did not respond in time")]
    Timeout,
    #[error("The payment gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("The payment gateway sent a response we do not understand: {0}")]
    Protocol(String),
}

impl GatewayError {
    /// Transport failures, timeouts and server-side errors at the gateway are worth trying again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Rejected { status, .. } => *status >= 500,
            Self::Protocol(_) => false,
        }
    }
}

/// The engine's view of the payment gateway. Both calls are plain request/response and never touch the order store.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// Opens a hosted payment session for the request. The request's order id is the gateway's idempotency key.
    async fn create_session(&self, request: &SessionRequest) -> Result<GatewaySession, GatewayError>;

    /// Read-only status poll. Returns `None` if the gateway has no transaction with this id, which happens when a
    /// session was opened but the customer never started paying.
    async fn query_status(&self, transaction_id: &str) -> Result<Option<GatewayTransactionStatus>, GatewayError>;
}
