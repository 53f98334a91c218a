// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use roost_core::topic;

#[tokio::test]
async fn publish_reaches_subscriber() {
    let bus = EventBus::new();
    let mut sub = bus.subscribe(topic::CONSOLE_OUTPUT).unwrap();

    bus.publish(topic::CONSOLE_OUTPUT, "hello");

    let event = sub.recv().await.unwrap();
    assert_eq!(event.topic, topic::CONSOLE_OUTPUT);
    assert_eq!(event.payload, "hello");
}

#[tokio::test]
async fn every_subscriber_receives_every_event() {
    let bus = EventBus::new();
    let mut a = bus.subscribe("t").unwrap();
    let mut b = bus.subscribe("t").unwrap();

    bus.publish("t", "one");
    bus.publish("t", "two");

    for sub in [&mut a, &mut b] {
        assert_eq!(sub.recv().await.unwrap().payload, "one");
        assert_eq!(sub.recv().await.unwrap().payload, "two");
    }
}

#[tokio::test]
async fn delivery_order_matches_publish_order() {
    let bus = EventBus::new();
    let mut sub = bus.subscribe("t").unwrap();
    for i in 0..100 {
        bus.publish("t", i.to_string());
    }
    for i in 0..100 {
        assert_eq!(sub.recv().await.unwrap().payload, i.to_string());
    }
}

#[tokio::test]
async fn topics_are_isolated() {
    let bus = EventBus::new();
    let mut console = bus.subscribe(topic::CONSOLE_OUTPUT).unwrap();
    let mut state = bus.subscribe(topic::STATE_CHANGE).unwrap();

    bus.publish(topic::STATE_CHANGE, "starting");

    assert!(console.try_recv().is_none());
    assert_eq!(state.recv().await.unwrap().payload, "starting");
}

#[tokio::test]
async fn slow_subscriber_drops_oldest_beyond_bound() {
    let bus = EventBus::new();
    let mut sub = bus.subscribe("t").unwrap();

    for i in 0..(SUBSCRIBER_BUFFER + 10) {
        bus.publish("t", i.to_string());
    }

    assert_eq!(sub.dropped(), 10);
    // the oldest 10 are gone; delivery resumes at 10
    assert_eq!(sub.recv().await.unwrap().payload, "10");
}

#[tokio::test]
async fn slow_subscriber_does_not_affect_others() {
    let bus = EventBus::new();
    let mut slow = bus.subscribe("t").unwrap();
    let mut fast = bus.subscribe("t").unwrap();

    for i in 0..(SUBSCRIBER_BUFFER + 1) {
        bus.publish("t", i.to_string());
        // the fast subscriber keeps up
        assert_eq!(fast.recv().await.unwrap().payload, i.to_string());
    }

    assert_eq!(fast.dropped(), 0);
    assert_eq!(slow.dropped(), 1);
    assert_eq!(slow.recv().await.unwrap().payload, "1");
}

#[tokio::test]
async fn destroy_makes_publish_noop_and_subscribe_fail() {
    let bus = EventBus::new();
    bus.destroy();

    bus.publish("t", "lost");
    assert!(bus.is_closed());
    assert_eq!(bus.subscribe("t").unwrap_err(), BusError::Closed);
}

#[tokio::test]
async fn destroy_drains_then_ends_subscriptions() {
    let bus = EventBus::new();
    let mut sub = bus.subscribe("t").unwrap();
    bus.publish("t", "pending");

    bus.destroy();

    assert_eq!(sub.recv().await.unwrap().payload, "pending");
    assert!(sub.recv().await.is_none());
}

#[tokio::test]
async fn recv_wakes_when_bus_destroyed_mid_wait() {
    let bus = EventBus::new();
    let mut sub = bus.subscribe("t").unwrap();

    let waiter = tokio::spawn(async move { sub.recv().await });
    tokio::task::yield_now().await;
    bus.destroy();

    assert!(waiter.await.unwrap().is_none());
}

#[tokio::test]
async fn unsubscribe_is_explicit_and_detaches() {
    let bus = EventBus::new();
    let sub = bus.subscribe("t").unwrap();
    sub.unsubscribe();

    // nothing is buffered for the departed subscriber
    bus.publish("t", "after");
    let mut again = bus.subscribe("t").unwrap();
    bus.publish("t", "later");
    assert_eq!(again.recv().await.unwrap().payload, "later");
}

#[tokio::test]
async fn subscription_does_not_keep_bus_alive() {
    let bus = EventBus::new();
    let sub = bus.subscribe("t").unwrap();
    let weak = Arc::downgrade(&bus.inner);
    drop(bus);
    assert!(weak.upgrade().is_none());
    drop(sub);
}
