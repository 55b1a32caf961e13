use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewAuditEntry, Order, OrderId, OrderStatusType, OrderUpdate, Requester},
    events::EventProducers,
    order_objects::StatusOverride,
    order_state_machine::{apply, apply_override, OrderEvent, OrderState, Transition},
    spe_api::MAX_UPDATE_ATTEMPTS,
    traits::PaymentGatewayDatabase,
    OrderFlowError,
};

/// `OrderFlowApi` handles the status changes made by people rather than the gateway: the forward-only manual
/// transitions, and the super-admin override.
///
/// Both paths write an audit entry in the same transaction as the status change.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> OrderFlowApi<B>
where B: PaymentGatewayDatabase
{
    /// Moves an order to `new_status` through the manual transition table.
    ///
    /// Requires the `Write` or `SuperAdmin` role. Terminal orders, backward moves and same-status requests are
    /// rejected with [`OrderFlowError::StateConflict`].
    pub async fn update_order_status(
        &self,
        order_id: &OrderId,
        new_status: OrderStatusType,
        reason: Option<String>,
        requester: &Requester,
    ) -> Result<Order, OrderFlowError> {
        if !requester.is_admin() {
            return Err(OrderFlowError::AuthorizationError(format!(
                "{} may not change the status of orders",
                requester.user_id
            )));
        }
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let order = self.fetch_order(order_id).await?;
            let transition = apply(&order, OrderEvent::Manual(new_status))?;
            let Some(to) = transition.target() else {
                return Ok(order);
            };
            let audit = NewAuditEntry {
                actor: requester.user_id.clone(),
                old_status: order.status,
                new_status: to.status,
                reason: reason.clone(),
            };
            if let Some(updated) = self.write_transition(&order, to, audit).await? {
                info!("🔄️ {} moved order {order_id} from {} to {}", requester.user_id, order.status, updated.status);
                self.producers.publish_status_change(&order, &updated).await;
                return Ok(updated);
            }
            debug!("🔄️ Order {order_id} changed underneath status update (attempt {attempt}). Retrying.");
        }
        Err(OrderFlowError::ConcurrentModification(order_id.clone()))
    }

    /// The audited escape hatch. Sets the order's status (and optionally its payment status) regardless of the
    /// transition table. Only super admins may do this, and a reason is mandatory.
    pub async fn override_status(
        &self,
        order_id: &OrderId,
        request: StatusOverride,
        requester: &Requester,
    ) -> Result<Order, OrderFlowError> {
        if !requester.is_super_admin() {
            return Err(OrderFlowError::AuthorizationError(format!(
                "{} may not override the status of orders",
                requester.user_id
            )));
        }
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let order = self.fetch_order(order_id).await?;
            let Transition::Moved { from, to } = apply_override(&order, &request)? else {
                return Ok(order);
            };
            let audit = NewAuditEntry {
                actor: requester.user_id.clone(),
                old_status: from.status,
                new_status: to.status,
                reason: Some(request.reason.clone()),
            };
            if let Some(updated) = self.write_transition(&order, to, audit).await? {
                warn!(
                    "🔄️ STATUS OVERRIDE: {} set order {order_id} from {}/{} to {}/{}. Reason: {}",
                    requester.user_id,
                    from.status,
                    from.payment_status,
                    to.status,
                    to.payment_status,
                    request.reason
                );
                self.producers.publish_status_change(&order, &updated).await;
                return Ok(updated);
            }
            debug!("🔄️ Order {order_id} changed underneath status override (attempt {attempt}). Retrying.");
        }
        Err(OrderFlowError::ConcurrentModification(order_id.clone()))
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        self.db.fetch_order_by_order_id(order_id).await?.ok_or_else(|| OrderFlowError::NotFound(order_id.clone()))
    }

    async fn write_transition(
        &self,
        order: &Order,
        to: OrderState,
        audit: NewAuditEntry,
    ) -> Result<Option<Order>, OrderFlowError> {
        let mut update = OrderUpdate::default().with_status(to.status).with_payment_status(to.payment_status);
        if to.status != OrderStatusType::AwaitingPayment {
            update = update.clear_session();
        }
        let updated = self.db.update_order(&order.order_id, order.version, update, Some(audit)).await?;
        Ok(updated)
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
