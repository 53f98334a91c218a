// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Topic-keyed publish/subscribe fan-out for one server's events.
//!
//! Console streams are fast and a stalled downstream consumer (a slow
//! websocket client, typically) must never wedge state processing, so
//! buffering is strictly per-subscriber: each subscriber owns a bounded
//! queue that drops its oldest entries once full, and publishing never
//! blocks. Within one subscriber, delivery order equals publish order per
//! topic; there is no cross-topic ordering.

use parking_lot::Mutex;
use roost_core::Event;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::sync::Notify;

/// Per-subscriber buffer bound; oldest events are discarded beyond this.
pub const SUBSCRIBER_BUFFER: usize = 1024;

/// Errors from bus operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("event bus has been destroyed")]
    Closed,
}

/// A per-server event bus. Cheap to clone; all clones share state.
///
/// The bus lives exactly as long as its server: after [`EventBus::destroy`]
/// publishing is a no-op and subscribing fails, while existing subscribers
/// may still drain what they already buffered.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    topics: Mutex<HashMap<String, Vec<Slot>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

struct Slot {
    id: u64,
    queue: Arc<SubscriberQueue>,
}

struct SubscriberQueue {
    events: Mutex<VecDeque<Event>>,
    notify: Notify,
    dropped: AtomicU64,
    closed: AtomicBool,
}

impl SubscriberQueue {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }

    fn push(&self, event: Event) {
        let mut events = self.events.lock();
        if events.len() >= SUBSCRIBER_BUFFER {
            events.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        events.push_back(event);
        drop(events);
        self.notify.notify_one();
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for `topic`.
    ///
    /// The subscription receives every event published to the topic from
    /// this point on, in publish order, subject to the drop-oldest buffer
    /// policy.
    pub fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let queue = SubscriberQueue::new();
        self.inner
            .topics
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push(Slot {
                id,
                queue: Arc::clone(&queue),
            });
        Ok(Subscription {
            bus: Arc::downgrade(&self.inner),
            topic: topic.to_string(),
            id,
            queue,
        })
    }

    /// Deliver `payload` to every subscriber of `topic`. Never blocks; a
    /// no-op once the bus is destroyed or when nobody listens.
    pub fn publish(&self, topic: &str, payload: impl Into<String>) {
        if self.inner.closed.load(Ordering::Acquire) {
            return;
        }
        let payload = payload.into();
        let topics = self.inner.topics.lock();
        let Some(slots) = topics.get(topic) else {
            return;
        };
        for slot in slots {
            slot.queue.push(Event::new(topic, payload.clone()));
        }
    }

    /// Shut the bus down: publishes become no-ops, subscribes fail, and
    /// every subscriber's `recv` returns `None` once its buffer drains.
    pub fn destroy(&self) {
        self.inner.closed.store(true, Ordering::Release);
        let mut topics = self.inner.topics.lock();
        for slots in topics.values() {
            for slot in slots {
                slot.queue.close();
            }
        }
        topics.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

/// Receiving half of a subscription.
///
/// Holds only a weak reference to the bus, so an abandoned subscription
/// never keeps a destroyed server's bus alive. Dropping unsubscribes.
pub struct Subscription {
    bus: Weak<BusInner>,
    topic: String,
    id: u64,
    queue: Arc<SubscriberQueue>,
}

impl Subscription {
    /// Receive the next event, waiting if the buffer is empty. Returns
    /// `None` once the bus has been destroyed and the buffer is drained.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.queue.events.lock().pop_front() {
                return Some(event);
            }
            if self.queue.closed.load(Ordering::Acquire) {
                return None;
            }
            self.queue.notify.notified().await;
        }
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.queue.events.lock().pop_front()
    }

    /// Number of events discarded from this subscriber's buffer.
    pub fn dropped(&self) -> u64 {
        self.queue.dropped.load(Ordering::Relaxed)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Cancel the subscription. Equivalent to dropping it.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.queue.close();
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        let mut topics = bus.topics.lock();
        if let Some(slots) = topics.get_mut(&self.topic) {
            slots.retain(|slot| slot.id != self.id);
            if slots.is_empty() {
                topics.remove(&self.topic);
            }
        }
    }
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;
