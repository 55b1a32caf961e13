use futures::future::BoxFuture;
use log::*;
use storefront_payment_engine::events::{
    EventHandlers,
    EventHooks,
    OrderAnnulledEvent,
    OrderModifiedEvent,
    OrderPaidEvent,
};

pub const ORDER_EVENT_BUFFER_SIZE: usize = 25;

/// Registers hooks that write order lifecycle events to the log.
///
/// 1. OrderPaidEvent - the order moved into a paid status for the first time.
/// 2. OrderAnnulledEvent - the order was cancelled, by the gateway or by an admin.
/// 3. OrderModifiedEvent - any status change, including the two above.
///
/// The hooks run on their own tasks, so a slow log sink never holds up a webhook or checkout request.
pub fn create_order_log_handlers(buffer_size: usize) -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_order_paid(|ev: OrderPaidEvent| {
        let OrderPaidEvent { order, payment_id } = ev;
        info!(
            "📬️ Order {} for {} has been paid. {} {} via {}. Payment id: {}",
            order.order_id,
            order.user_id,
            order.total_price,
            order.currency,
            order.payment_method,
            payment_id.as_deref().unwrap_or("none")
        );
        no_op()
    });
    hooks.on_order_annulled(|ev: OrderAnnulledEvent| {
        let OrderAnnulledEvent { order, previous_status } = ev;
        info!(
            "📬️ Order {} has been annulled. It was {previous_status}. Payment status: {}",
            order.order_id, order.payment_status
        );
        no_op()
    });
    hooks.on_order_modified(|ev: OrderModifiedEvent| {
        let OrderModifiedEvent { old_order, new_order } = ev;
        debug!(
            "📬️ Order {} changed from {}/{} to {}/{} (version {})",
            new_order.order_id,
            old_order.status,
            old_order.payment_status,
            new_order.status,
            new_order.payment_status,
            new_order.version
        );
        no_op()
    });
    EventHandlers::new(buffer_size, hooks)
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}
