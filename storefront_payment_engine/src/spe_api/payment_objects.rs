use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{FraudStatus, GatewayEvent, Order, OrderId, OrderStatusType, TransactionStatus},
    traits::GatewaySession,
};

/// A payment notification from the gateway, after its signature has been checked and its payload parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayNotification {
    pub order_id: OrderId,
    pub transaction_id: String,
    pub transaction_status: TransactionStatus,
    pub fraud_status: Option<FraudStatus>,
    pub transaction_time: Option<DateTime<Utc>>,
}

impl GatewayNotification {
    pub fn event(&self) -> GatewayEvent {
        GatewayEvent::from_statuses(self.transaction_status, self.fraud_status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ReconciliationOutcome {
    /// The notification moved the order.
    Applied { from: OrderStatusType, to: OrderStatusType },
    /// The notification was recorded, but did not change the order's status.
    Unchanged,
    /// The same notification has already been applied.
    Duplicate,
    /// The order has already moved past this notification.
    Stale,
}

impl Display for ReconciliationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Applied { from, to } => write!(f, "applied ({from} -> {to})"),
            Self::Unchanged => write!(f, "unchanged"),
            Self::Duplicate => write!(f, "duplicate"),
            Self::Stale => write!(f, "stale"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    #[serde(flatten)]
    pub outcome: ReconciliationOutcome,
    pub order: Order,
}

/// How a payment retry was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionSource {
    /// The order's existing session is still live and was handed back.
    Reused,
    /// A new session was opened with the gateway.
    Created,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSessionResult {
    pub source: SessionSource,
    pub session: GatewaySession,
    pub order: Order,
}
