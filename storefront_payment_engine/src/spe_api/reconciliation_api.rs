use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewNotification, Order, OrderStatusType, OrderUpdate},
    events::EventProducers,
    order_state_machine::{apply, OrderEvent, Transition},
    payment_objects::{GatewayNotification, ReconciliationOutcome, ReconciliationResult},
    spe_api::MAX_UPDATE_ATTEMPTS,
    traits::PaymentGatewayDatabase,
    OrderFlowError,
};

/// `ReconciliationApi` applies the payment gateway's notifications to orders.
///
/// The gateway delivers notifications at least once, and not necessarily in order. Every notification is ranked by
/// where it sits in a transaction's lifecycle (pending, then challenged, then the final verdict), and a notification
/// that ranks below what has already been applied for the same transaction is ignored. Redeliveries of the notification
/// that was applied last are reported as duplicates and change nothing.
///
/// Every notification that passes validation is appended to the notification log, whatever its outcome. When the
/// notification changes the order, the log row is written in the same database transaction as the change.
pub struct ReconciliationApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> ReconciliationApi<B>
where B: PaymentGatewayDatabase
{
    /// Applies an authenticated gateway notification to its order.
    ///
    /// The signature must already have been verified; this method trusts the payload.
    pub async fn handle_notification(
        &self,
        notification: GatewayNotification,
    ) -> Result<ReconciliationResult, OrderFlowError> {
        validate(&notification)?;
        let order_id = &notification.order_id;
        let event = notification.event();
        info!(
            "🧾️ Notification for order {order_id}: transaction {} is {} ({event})",
            notification.transaction_id, notification.transaction_status
        );
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let order = self
                .db
                .fetch_order_by_order_id(order_id)
                .await?
                .ok_or_else(|| OrderFlowError::NotFound(order_id.clone()))?;
            if !order.payment_method.uses_gateway() {
                warn!("🧾️ Received a gateway notification for cash-on-delivery order {order_id}. Ignoring it.");
                return Err(OrderFlowError::state_conflict(
                    order_id,
                    order.status,
                    "Cash-on-delivery orders do not take gateway payments.",
                ));
            }
            if let Some(outcome) = superseded(&order, &notification) {
                debug!("🧾️ Notification for order {order_id} is {outcome}. Nothing to do.");
                self.record(&notification, outcome).await?;
                return Ok(ReconciliationResult { outcome, order });
            }
            let transition = match apply(&order, OrderEvent::Gateway(event)) {
                Ok(t) => t,
                Err(e) => {
                    error!("🧾️ Notification for order {order_id} cannot be applied. {e}");
                    self.record_conflict(&notification).await?;
                    return Err(e);
                },
            };
            let (update, outcome) = match transition {
                Transition::Stale => {
                    debug!("🧾️ Order {order_id} is already {}. The notification is stale.", order.status);
                    self.record(&notification, ReconciliationOutcome::Stale).await?;
                    return Ok(ReconciliationResult { outcome: ReconciliationOutcome::Stale, order });
                },
                // Still worth remembering which transaction the customer is paying with
                Transition::Unchanged => (gateway_update(&notification), ReconciliationOutcome::Unchanged),
                Transition::Moved { from, to } => {
                    let mut update = gateway_update(&notification)
                        .with_status(to.status)
                        .with_payment_status(to.payment_status);
                    if to.status != OrderStatusType::AwaitingPayment {
                        update = update.clear_session();
                    }
                    (update, ReconciliationOutcome::Applied { from: from.status, to: to.status })
                },
            };
            let record = log_entry(&notification, outcome.to_string());
            match self.db.reconcile_order(order_id, order.version, update, record).await? {
                Some(updated) => {
                    info!("🧾️ Order {order_id} reconciled: {outcome}");
                    self.producers.publish_status_change(&order, &updated).await;
                    return Ok(ReconciliationResult { outcome, order: updated });
                },
                None => {
                    debug!("🧾️ Order {order_id} changed while reconciling (attempt {attempt}). Re-reading it.");
                },
            }
        }
        warn!("🧾️ Gave up reconciling order {order_id} after {MAX_UPDATE_ATTEMPTS} attempts");
        Err(OrderFlowError::ConcurrentModification(order_id.clone()))
    }

    async fn record(
        &self,
        notification: &GatewayNotification,
        outcome: ReconciliationOutcome,
    ) -> Result<(), OrderFlowError> {
        self.log_notification(notification, outcome.to_string()).await
    }

    async fn record_conflict(&self, notification: &GatewayNotification) -> Result<(), OrderFlowError> {
        self.log_notification(notification, "conflict".to_string()).await
    }

    async fn log_notification(&self, notification: &GatewayNotification, outcome: String) -> Result<(), OrderFlowError> {
        if !self.db.record_notification(log_entry(notification, outcome)).await? {
            trace!("🧾️ Notification {} was already in the log", notification.transaction_id);
        }
        Ok(())
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

fn validate(notification: &GatewayNotification) -> Result<(), OrderFlowError> {
    if notification.order_id.as_str().trim().is_empty() {
        return Err(OrderFlowError::ValidationError("The notification has no order id".into()));
    }
    if notification.transaction_id.trim().is_empty() {
        return Err(OrderFlowError::ValidationError("The notification has no transaction id".into()));
    }
    Ok(())
}

/// Decides whether the order has already moved past this notification, before the state machine gets involved.
fn superseded(order: &Order, notification: &GatewayNotification) -> Option<ReconciliationOutcome> {
    let transaction_id = notification.transaction_id.as_str();
    if order.payment_id.as_deref() == Some(transaction_id) {
        let applied = order.gateway_event?;
        let event = notification.event();
        if event.rank() < applied.rank() {
            return Some(ReconciliationOutcome::Stale);
        }
        if event == applied {
            return Some(ReconciliationOutcome::Duplicate);
        }
        return None;
    }
    if order.replaced_transaction(transaction_id) {
        return Some(ReconciliationOutcome::Stale);
    }
    // A different transaction that started before the current session, or before the transaction we already know
    // about, belongs to an abandoned session.
    let current_since = order.last_replacement().into_iter().chain(order.gateway_transaction_time).max();
    match (notification.transaction_time, current_since) {
        (Some(theirs), Some(ours)) if theirs < ours => Some(ReconciliationOutcome::Stale),
        _ => None,
    }
}

fn log_entry(notification: &GatewayNotification, outcome: String) -> NewNotification {
    NewNotification {
        order_id: notification.order_id.clone(),
        transaction_id: notification.transaction_id.clone(),
        transaction_status: notification.transaction_status,
        fraud_status: notification.fraud_status,
        transaction_time: notification.transaction_time,
        outcome,
    }
}

fn gateway_update(notification: &GatewayNotification) -> OrderUpdate {
    OrderUpdate::default()
        .with_payment_id(notification.transaction_id.clone())
        .with_gateway_event(notification.event(), notification.transaction_time)
}
