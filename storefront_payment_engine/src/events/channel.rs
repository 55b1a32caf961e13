//! Per-hook event queues.
//!
//! Every registered hook owns a bounded queue. The order APIs push events into it through an [`EventProducer`] after
//! a change has been committed, and [`HookQueue::run`] drains it on a background task, starting one task per event so
//! that a slow hook never holds up the next event. Hooks see the event and nothing else.
//!
//! A queue stops once every producer has been dropped and the last hook call it started has returned.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{
    sync::mpsc,
    task::{JoinError, JoinSet},
};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct HookQueue<E: Send + 'static> {
    events: mpsc::Receiver<E>,
    // Kept only to mint producers. Dropped when the queue starts running
    intake: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + 'static> HookQueue<E> {
    pub fn new(capacity: usize, handler: Handler<E>) -> Self {
        let (intake, events) = mpsc::channel(capacity);
        Self { events, intake, handler }
    }

    pub fn producer(&self) -> EventProducer<E> {
        EventProducer { sender: self.intake.clone() }
    }

    pub async fn run(self) {
        let Self { mut events, intake, handler } = self;
        drop(intake);
        debug!("📬️ Hook queue is running");
        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                Some(event) = events.recv() => {
                    trace!("📬️ Dispatching event ({} hook calls in flight)", in_flight.len());
                    in_flight.spawn(handler(event));
                },
                Some(done) = in_flight.join_next(), if !in_flight.is_empty() => report(done),
                else => break,
            }
        }
        debug!("📬️ Hook queue has drained and stopped");
    }
}

fn report(done: Result<(), JoinError>) {
    match done {
        Ok(()) => trace!("📬️ Hook call finished"),
        Err(e) => warn!("📬️ A hook call did not finish. {e}"),
    }
}

/// The sending half of a [`HookQueue`]. Publishing waits while the queue is full.
#[derive(Clone)]
pub struct EventProducer<E: Send> {
    sender: mpsc::Sender<E>,
}

impl<E: Send> EventProducer<E> {
    pub async fn publish_event(&self, event: E) {
        if self.sender.send(event).await.is_err() {
            error!("📬️ The hook queue has stopped. An order event was dropped.");
        }
    }
}
