use thiserror::Error;

use crate::{
    db_types::{MinorUnits, OrderId, OrderStatusType},
    traits::{GatewayError, PaymentGatewayError},
};

#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("Not allowed. {0}")]
    AuthorizationError(String),
    #[error("Order {0} does not exist")]
    NotFound(OrderId),
    #[error("Order {order_id} is {status}. {reason}")]
    StateConflict { order_id: OrderId, status: OrderStatusType, reason: String },
    #[error("Item totals ({calculated}) cannot be reconciled with the gross amount ({expected}). {reason}")]
    AmountMismatch { expected: MinorUnits, calculated: MinorUnits, reason: String },
    #[error("{0}")]
    Gateway(#[from] GatewayError),
    #[error("Order {0} has already been paid")]
    AlreadyPaid(OrderId),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} was modified by another request. Try again.")]
    ConcurrentModification(OrderId),
}

impl OrderFlowError {
    pub fn state_conflict<S: Into<String>>(order_id: &OrderId, status: OrderStatusType, reason: S) -> Self {
        Self::StateConflict { order_id: order_id.clone(), status, reason: reason.into() }
    }

    /// Whether the caller can expect a different result by trying again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Gateway(e) => e.is_retryable(),
            Self::ConcurrentModification(_) => true,
            _ => false,
        }
    }
}

impl From<PaymentGatewayError> for OrderFlowError {
    fn from(e: PaymentGatewayError) -> Self {
        match e {
            PaymentGatewayError::OrderNotFound(id) => Self::NotFound(id),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}
