use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{AuditEntry, NotificationRecord, Order, OrderId, Requester},
    order_objects::OrderQueryFilter,
    traits::OrderManagement,
    OrderFlowError,
};

/// Read-only access to orders, with the caller's access rights applied.
///
/// Customers see their own orders. `ReadAll` (and the admin roles) see everything, and only they can search across
/// users or look at an order's notification log and audit trail.
pub struct OrderQueryApi<B> {
    db: B,
}

impl<B> Debug for OrderQueryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderQueryApi")
    }
}

impl<B> OrderQueryApi<B>
where B: OrderManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn order_by_id(&self, order_id: &OrderId, requester: &Requester) -> Result<Order, OrderFlowError> {
        let order = self.db.order_by_id(order_id).await?.ok_or_else(|| OrderFlowError::NotFound(order_id.clone()))?;
        if order.is_owned_by(&requester.user_id) || requester.can_read_all() {
            Ok(order)
        } else {
            debug!("💻️ {} tried to read order {order_id}, which belongs to someone else", requester.user_id);
            Err(OrderFlowError::AuthorizationError(format!("{} may not view order {order_id}", requester.user_id)))
        }
    }

    pub async fn my_orders(&self, requester: &Requester) -> Result<Vec<Order>, OrderFlowError> {
        let orders = self.db.orders_for_user(&requester.user_id).await?;
        Ok(orders)
    }

    pub async fn search_orders(
        &self,
        query: OrderQueryFilter,
        requester: &Requester,
    ) -> Result<Vec<Order>, OrderFlowError> {
        self.require_read_all(requester)?;
        let orders = self.db.search_orders(query).await?;
        Ok(orders)
    }

    pub async fn notifications_for_order(
        &self,
        order_id: &OrderId,
        requester: &Requester,
    ) -> Result<Vec<NotificationRecord>, OrderFlowError> {
        self.require_read_all(requester)?;
        let records = self.db.notifications_for_order(order_id).await?;
        Ok(records)
    }

    pub async fn audit_log_for_order(
        &self,
        order_id: &OrderId,
        requester: &Requester,
    ) -> Result<Vec<AuditEntry>, OrderFlowError> {
        self.require_read_all(requester)?;
        let entries = self.db.audit_log_for_order(order_id).await?;
        Ok(entries)
    }

    fn require_read_all(&self, requester: &Requester) -> Result<(), OrderFlowError> {
        if requester.can_read_all() {
            Ok(())
        } else {
            Err(OrderFlowError::AuthorizationError(format!("{} may not read other users' orders", requester.user_id)))
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
