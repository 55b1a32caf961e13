use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType};

/// Emitted once per order, on the write that first moves it into a paid status. `payment_id` is the gateway
/// transaction that paid for it, or `None` for cash on delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub payment_id: Option<String>,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        let payment_id = order.payment_id.clone();
        Self { order, payment_id }
    }
}

/// The order was cancelled, by the gateway (deny, cancel, expire) or by an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    /// The status the order had before it was cancelled
    pub previous_status: OrderStatusType,
}

impl OrderAnnulledEvent {
    pub fn new(previous_status: OrderStatusType, order: Order) -> Self {
        Self { order, previous_status }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderModifiedEvent {
    pub old_order: Order,
    pub new_order: Order,
}

impl OrderModifiedEvent {
    pub fn new(old_order: Order, new_order: Order) -> Self {
        Self { old_order, new_order }
    }
}
