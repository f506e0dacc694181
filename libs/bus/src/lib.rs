//! Synchronous FIFO topic bus
//!
//! Single-threaded publish/subscribe transport. An injected event is
//! delivered to every subscriber of its topic, in subscription order,
//! before the injecting call returns. Handlers may publish from inside
//! `receive`; nested publishes are queued and delivered once the current
//! delivery completes, so handler chains (engine → ledger → strategy →
//! engine) can never re-enter a subscriber that is still running. FIFO
//! draining preserves per-order ordering: an order's NEW is observed by
//! all subscribers strictly before any of its fills, and fills arrive in
//! the order they were computed.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use tracing::trace;
use types::events::{Event, Topic};

/// A bus participant. `receive` may publish further events via `bus`.
pub trait Subscriber {
    fn receive(&mut self, event: &Event, bus: &Bus);
}

/// Shared handle to a subscriber
pub type SubscriberRef = Rc<RefCell<dyn Subscriber>>;

/// Synchronous topic bus with iterative work-queue dispatch
#[derive(Default)]
pub struct Bus {
    subscribers: RefCell<HashMap<Topic, Vec<SubscriberRef>>>,
    queue: RefCell<VecDeque<Event>>,
    dispatching: Cell<bool>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for one topic. A subscriber may be registered
    /// for any number of topics; delivery order within a topic follows
    /// subscription order.
    pub fn subscribe(&self, topic: Topic, subscriber: SubscriberRef) {
        self.subscribers
            .borrow_mut()
            .entry(topic)
            .or_default()
            .push(subscriber);
    }

    /// Number of subscribers on a topic
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.subscribers
            .borrow()
            .get(topic)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Inject an event. The outermost call drains the queue: this event and
    /// every event published from handlers are all delivered before it
    /// returns. Nested calls only enqueue.
    pub fn publish(&self, event: Event) {
        self.queue.borrow_mut().push_back(event);

        if self.dispatching.get() {
            return;
        }

        self.dispatching.set(true);
        while let Some(next) = {
            let mut queue = self.queue.borrow_mut();
            queue.pop_front()
        } {
            self.deliver(&next);
        }
        self.dispatching.set(false);
    }

    fn deliver(&self, event: &Event) {
        // Snapshot the list so handlers may subscribe during dispatch.
        let targets: Vec<SubscriberRef> = self
            .subscribers
            .borrow()
            .get(&event.topic)
            .map(|subs| subs.to_vec())
            .unwrap_or_default();

        trace!(
            topic = %event.topic,
            partition = event.payload.partition(),
            subscribers = targets.len(),
            "deliver"
        );

        for subscriber in targets {
            subscriber.borrow_mut().receive(event, self);
        }
    }
}
