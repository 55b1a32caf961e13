//! The authoritative mapping from (current status, event) to the next order and payment status.
//!
//! Gateway-driven transitions:
//!
//! | Current          | Event                          | Next                         |
//! |------------------|--------------------------------|------------------------------|
//! | awaiting_payment | accepted (capture/settlement)  | processing, paid             |
//! | awaiting_payment | challenged (capture+challenge) | pending, unpaid              |
//! | awaiting_payment | failed (deny/cancel/expire)    | cancelled, unpaid            |
//! | awaiting_payment | pending                        | unchanged                    |
//! | pending (held)   | accepted                       | processing, paid             |
//! | pending (held)   | failed                         | cancelled, unpaid            |
//! | paid statuses    | anything                       | stale                        |
//! | cancelled        | accepted                       | conflict (needs a refund)    |
//! | cancelled        | anything else                  | stale                        |
//!
//! Manual transitions only move forward:
//!
//! | Current          | Allowed next                                         |
//! |------------------|------------------------------------------------------|
//! | pending          | processing, completed, shipped, delivered, cancelled |
//! | processing       | completed, shipped, delivered, cancelled             |
//! | shipped          | delivered, cancelled                                 |
//! | awaiting_payment | cancelled                                            |
//!
//! Terminal orders (`completed`, `delivered`, `cancelled`) cannot be transitioned at all, except through
//! [`apply_override`], which requires an explicit flag to do so.
use log::*;

use crate::{
    db_types::{GatewayEvent, Order, OrderStatusType, PaymentStatus},
    order_objects::StatusOverride,
    OrderFlowError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEvent {
    Gateway(GatewayEvent),
    Manual(OrderStatusType),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderState {
    pub status: OrderStatusType,
    pub payment_status: PaymentStatus,
}

impl OrderState {
    pub fn of(order: &Order) -> Self {
        Self { status: order.status, payment_status: order.payment_status }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved { from: OrderState, to: OrderState },
    /// The event is legitimate, but leaves the order where it is.
    Unchanged,
    /// The order has already moved past the point where this event matters.
    Stale,
}

impl Transition {
    pub fn target(&self) -> Option<OrderState> {
        match self {
            Self::Moved { to, .. } => Some(*to),
            _ => None,
        }
    }
}

/// Payment status implied by moving into `status`.
pub fn payment_status_for(status: OrderStatusType, current: PaymentStatus) -> PaymentStatus {
    match status {
        s if s.implies_paid() => PaymentStatus::Paid,
        OrderStatusType::Cancelled if current == PaymentStatus::Refunded => PaymentStatus::Refunded,
        OrderStatusType::Cancelled => PaymentStatus::Unpaid,
        _ => current,
    }
}

pub fn apply(order: &Order, event: OrderEvent) -> Result<Transition, OrderFlowError> {
    match event {
        OrderEvent::Gateway(e) => apply_gateway_event(order, e),
        OrderEvent::Manual(status) => apply_manual_transition(order, status),
    }
}

fn moved(order: &Order, status: OrderStatusType) -> Transition {
    let from = OrderState::of(order);
    let to = OrderState { status, payment_status: payment_status_for(status, order.payment_status) };
    Transition::Moved { from, to }
}

fn apply_gateway_event(order: &Order, event: GatewayEvent) -> Result<Transition, OrderFlowError> {
    use GatewayEvent::*;
    use OrderStatusType::*;
    let result = match (order.status, event) {
        (AwaitingPayment, Accepted) => moved(order, Processing),
        (AwaitingPayment, Challenged) => moved(order, OrderStatusType::Pending),
        (AwaitingPayment, Failed) => moved(order, Cancelled),
        (AwaitingPayment, GatewayEvent::Pending) => Transition::Unchanged,
        // Held for fraud review. The gateway's final verdict settles it.
        (OrderStatusType::Pending, Accepted) => moved(order, Processing),
        (OrderStatusType::Pending, Failed) => moved(order, Cancelled),
        (OrderStatusType::Pending, Challenged) => Transition::Unchanged,
        (OrderStatusType::Pending, GatewayEvent::Pending) => Transition::Stale,
        (Cancelled, Accepted) => {
            return Err(OrderFlowError::state_conflict(
                &order.order_id,
                order.status,
                "The gateway reports a successful payment for a cancelled order. It must be refunded manually.",
            ));
        },
        (Processing | Completed | Shipped | Delivered | Cancelled, _) => Transition::Stale,
    };
    trace!("🧾️ {} + {event} => {result:?}", order.status);
    Ok(result)
}

fn manual_transition_allowed(from: OrderStatusType, to: OrderStatusType) -> bool {
    use OrderStatusType::*;
    matches!(
        (from, to),
        (Pending, Processing | Completed | Shipped | Delivered | Cancelled) |
            (Processing, Completed | Shipped | Delivered | Cancelled) |
            (Shipped, Delivered | Cancelled) |
            (AwaitingPayment, Cancelled)
    )
}

fn apply_manual_transition(order: &Order, status: OrderStatusType) -> Result<Transition, OrderFlowError> {
    if order.status.is_terminal() {
        return Err(OrderFlowError::state_conflict(
            &order.order_id,
            order.status,
            "Orders in a terminal state cannot change status.",
        ));
    }
    if order.status == status {
        return Err(OrderFlowError::state_conflict(&order.order_id, order.status, "The order already has this status."));
    }
    if !manual_transition_allowed(order.status, status) {
        return Err(OrderFlowError::state_conflict(
            &order.order_id,
            order.status,
            format!("An order cannot move from {} to {status}.", order.status),
        ));
    }
    Ok(moved(order, status))
}

/// The audited escape hatch. Sets any status, and optionally any payment status, bypassing the transition table.
/// Leaving a terminal state still needs `allow_terminal` to be set on the request.
pub fn apply_override(order: &Order, request: &StatusOverride) -> Result<Transition, OrderFlowError> {
    if request.reason.trim().is_empty() {
        return Err(OrderFlowError::ValidationError("An override must give a reason.".into()));
    }
    if order.status.is_terminal() && !request.allow_terminal {
        return Err(OrderFlowError::state_conflict(
            &order.order_id,
            order.status,
            "Overriding a terminal order requires allow_terminal to be set.",
        ));
    }
    let from = OrderState::of(order);
    let to = OrderState {
        status: request.status,
        payment_status: request
            .payment_status
            .unwrap_or_else(|| payment_status_for(request.status, order.payment_status)),
    };
    if from == to {
        return Err(OrderFlowError::state_conflict(&order.order_id, order.status, "The override changes nothing."));
    }
    Ok(Transition::Moved { from, to })
}
