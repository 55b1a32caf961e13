use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::{
    db_types::{Order, OrderStatusType},
    events::{EventProducer, Handler, HookQueue, OrderAnnulledEvent, OrderModifiedEvent, OrderPaidEvent},
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_paid_producer: Vec<EventProducer<OrderPaidEvent>>,
    pub order_annulled_producer: Vec<EventProducer<OrderAnnulledEvent>>,
    pub order_modified_producer: Vec<EventProducer<OrderModifiedEvent>>,
}

impl EventProducers {
    /// Publishes the events that a status change from `old_order` to `new_order` implies. Nothing is published if
    /// the status did not change.
    pub async fn publish_status_change(&self, old_order: &Order, new_order: &Order) {
        if old_order.status == new_order.status {
            return;
        }
        if new_order.status.implies_paid() && !old_order.status.implies_paid() {
            for emitter in &self.order_paid_producer {
                debug!("📬️ Notifying order paid hook subscribers");
                emitter.publish_event(OrderPaidEvent::new(new_order.clone())).await;
            }
        }
        if new_order.status == OrderStatusType::Cancelled {
            for emitter in &self.order_annulled_producer {
                debug!("📬️ Notifying order annulled hook subscribers");
                emitter.publish_event(OrderAnnulledEvent::new(old_order.status, new_order.clone())).await;
            }
        }
        for emitter in &self.order_modified_producer {
            debug!("📬️ Notifying order modified hook subscribers");
            emitter.publish_event(OrderModifiedEvent::new(old_order.clone(), new_order.clone())).await;
        }
    }
}

pub struct EventHandlers {
    pub on_order_paid: Option<HookQueue<OrderPaidEvent>>,
    pub on_order_annulled: Option<HookQueue<OrderAnnulledEvent>>,
    pub on_order_modified: Option<HookQueue<OrderModifiedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_paid = hooks.on_order_paid.map(|f| HookQueue::new(buffer_size, f));
        let on_order_annulled = hooks.on_order_annulled.map(|f| HookQueue::new(buffer_size, f));
        let on_order_modified = hooks.on_order_modified.map(|f| HookQueue::new(buffer_size, f));
        Self { on_order_paid, on_order_annulled, on_order_modified }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_paid {
            result.order_paid_producer.push(handler.producer());
        }
        if let Some(handler) = &self.on_order_annulled {
            result.order_annulled_producer.push(handler.producer());
        }
        if let Some(handler) = &self.on_order_modified {
            result.order_modified_producer.push(handler.producer());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_paid {
            tokio::spawn(async move {
                handler.run().await;
            });
        }
        if let Some(handler) = self.on_order_annulled {
            tokio::spawn(async move {
                handler.run().await;
            });
        }
        if let Some(handler) = self.on_order_modified {
            tokio::spawn(async move {
                handler.run().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_paid: Option<Handler<OrderPaidEvent>>,
    pub on_order_annulled: Option<Handler<OrderAnnulledEvent>>,
    pub on_order_modified: Option<Handler<OrderModifiedEvent>>,
}

impl EventHooks {
    pub fn on_order_paid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderPaidEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_paid = Some(Arc::new(f));
        self
    }

    pub fn on_order_annulled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderAnnulledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_annulled = Some(Arc::new(f));
        self
    }

    pub fn on_order_modified<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderModifiedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_modified = Some(Arc::new(f));
        self
    }
}
