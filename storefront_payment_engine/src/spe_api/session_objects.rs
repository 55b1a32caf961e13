use chrono::Duration;
use log::*;
use serde::{Deserialize, Serialize};
use spg_common::DEFAULT_CURRENCY_CODE;

use crate::{
    amount_adjuster::{gross_total, AdjustableLine, AmountAdjuster},
    db_types::{CustomerDetails, MinorUnits, Order, OrderId},
    OrderFlowError,
};

pub const SHIPPING_ITEM_ID: &str = "shipping";
pub const DEFAULT_STALE_SESSION_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionItem {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub price: MinorUnits,
    pub quantity: i64,
}

/// Where the gateway sends the customer's browser once they are done on the payment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCallbacks {
    pub finish: String,
    pub error: String,
    pub pending: String,
}

/// Everything the gateway needs to open a payment session for an order. The item prices have been through the
/// [`AmountAdjuster`], so the items (including the shipping line) always add up to exactly `gross_amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub order_id: OrderId,
    pub gross_amount: MinorUnits,
    pub items: Vec<SessionItem>,
    pub customer: CustomerDetails,
    pub callbacks: Option<SessionCallbacks>,
}

impl SessionRequest {
    pub fn for_order(
        order: &Order,
        adjuster: &AmountAdjuster,
        callbacks: Option<SessionCallbacks>,
    ) -> Result<Self, OrderFlowError> {
        let lines = order.items.iter().map(|i| AdjustableLine::new(i.unit_price, i.quantity)).collect::<Vec<_>>();
        let adjusted = adjuster.reconcile(&lines, order.shipping_fee, order.total_price).map_err(|e| {
            let (expected, calculated) = e.totals();
            error!("⚖️ Cannot open a payment session for order {}. {e}", order.order_id);
            OrderFlowError::AmountMismatch { expected, calculated, reason: e.to_string() }
        })?;
        // The gateway rejects the session outright if these differ
        let total = gross_total(&adjusted, order.shipping_fee);
        if total != Some(order.total_price) {
            return Err(OrderFlowError::AmountMismatch {
                expected: order.total_price,
                calculated: total.unwrap_or_default(),
                reason: "Adjusted items do not add up to the gross amount".into(),
            });
        }
        let mut items = adjusted
            .into_iter()
            .map(|line| {
                let item = &order.items[line.source];
                SessionItem {
                    id: item.product_id.clone(),
                    name: item.name.clone(),
                    category: item.category.clone(),
                    price: line.price,
                    quantity: line.quantity,
                }
            })
            .collect::<Vec<_>>();
        if order.shipping_fee.is_positive() {
            items.push(SessionItem {
                id: SHIPPING_ITEM_ID.into(),
                name: "Shipping".into(),
                category: None,
                price: order.shipping_fee,
                quantity: 1,
            });
        }
        Ok(Self {
            order_id: order.order_id.clone(),
            gross_amount: order.total_price,
            items,
            customer: order.customer.clone(),
            callbacks,
        })
    }
}

/// Tunables for opening and retrying payment sessions.
#[derive(Debug, Clone)]
pub struct PaymentSessionOptions {
    pub callbacks: Option<SessionCallbacks>,
    pub amount_tolerance: MinorUnits,
    /// A pending gateway transaction older than this is abandoned and replaced with a new session on retry.
    pub stale_after: Duration,
    pub currency: String,
}

impl Default for PaymentSessionOptions {
    fn default() -> Self {
        Self {
            callbacks: None,
            amount_tolerance: MinorUnits::from(crate::amount_adjuster::DEFAULT_AMOUNT_TOLERANCE),
            stale_after: Duration::hours(DEFAULT_STALE_SESSION_HOURS),
            currency: DEFAULT_CURRENCY_CODE.to_string(),
        }
    }
}

impl PaymentSessionOptions {
    pub fn with_callbacks(mut self, callbacks: SessionCallbacks) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    pub fn with_amount_tolerance(mut self, tolerance: MinorUnits) -> Self {
        self.amount_tolerance = tolerance;
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into();
        self
    }
}
