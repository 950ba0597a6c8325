use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use super::Broker;
use super::message::Message;
use super::subscriber::Subscription;
use crate::utils::error::BrokerError;

const RECV_TIMEOUT: Duration = Duration::from_secs(1);
/// Window used to assert that a delivery does NOT happen.
const QUIET_WINDOW: Duration = Duration::from_millis(100);

/// Helper: subscribe with a handler that forwards every delivery into a channel.
fn channel_subscriber(
    broker: &Broker<String>,
    subject: &str,
) -> (Subscription<String>, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sub = broker
        .subscribe(subject, move |msg| {
            let _ = tx.send(msg);
        })
        .expect("subscribe failed");
    (sub, rx)
}

async fn recv_one(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for delivery")
        .expect("delivery channel closed")
}

#[test]
fn test_broker_new() {
    let broker: Broker<String> = Broker::default();
    assert!(!broker.is_closed());
    assert!(broker.topic_names().is_empty());
}

#[tokio::test]
async fn test_subscribe_creates_topic_lazily() {
    let broker: Broker<String> = Broker::new();
    assert_eq!(broker.subscriber_count("orders"), 0);

    let (_sub, _rx) = channel_subscriber(&broker, "orders");
    assert_eq!(broker.topic_names(), vec!["orders".to_string()]);
    assert_eq!(broker.subscriber_count("orders"), 1);
}

#[tokio::test]
async fn test_publish_to_unknown_subject_errors() {
    let broker: Broker<String> = Broker::new();
    assert_eq!(
        broker.publish("nonexistent", "X".to_string()),
        Err(BrokerError::TopicNotFound("nonexistent".to_string()))
    );
}

#[tokio::test]
async fn test_messages_arrive_in_publish_order() {
    let broker = Broker::new();
    let (_sub, mut rx) = channel_subscriber(&broker, "orders");

    broker.publish("orders", "A".to_string()).unwrap();
    broker.publish("orders", "B".to_string()).unwrap();

    assert_eq!(recv_one(&mut rx).await, "A");
    assert_eq!(recv_one(&mut rx).await, "B");
}

#[tokio::test]
async fn test_late_subscriber_sees_only_later_messages() {
    let broker = Broker::new();
    let (_s1, mut rx1) = channel_subscriber(&broker, "orders");

    broker.publish("orders", "A".to_string()).unwrap();

    let (_s2, mut rx2) = channel_subscriber(&broker, "orders");
    broker.publish("orders", "B".to_string()).unwrap();

    assert_eq!(recv_one(&mut rx1).await, "A");
    assert_eq!(recv_one(&mut rx1).await, "B");
    // The second subscriber starts at the tail: "A" is never replayed.
    assert_eq!(recv_one(&mut rx2).await, "B");
}

#[tokio::test]
async fn test_every_subscriber_receives_every_message() {
    let broker = Broker::new();
    let mut subs = Vec::new();
    let mut receivers = Vec::new();
    for _ in 0..3 {
        let (sub, rx) = channel_subscriber(&broker, "orders");
        subs.push(sub);
        receivers.push(rx);
    }

    for n in 0..3 {
        broker.publish("orders", format!("m{n}")).unwrap();
    }

    for rx in &mut receivers {
        for n in 0..3 {
            assert_eq!(recv_one(rx).await, format!("m{n}"));
        }
    }
}

#[tokio::test]
async fn test_subjects_are_independent() {
    let broker = Broker::new();
    let (_sa, mut rx_orders) = channel_subscriber(&broker, "orders");
    let (_sb, mut rx_billing) = channel_subscriber(&broker, "billing");

    broker.publish("orders", "A".to_string()).unwrap();

    assert_eq!(recv_one(&mut rx_orders).await, "A");
    assert!(timeout(QUIET_WINDOW, rx_billing.recv()).await.is_err());
}

#[tokio::test]
async fn test_burst_publishes_are_delivered_completely() {
    let broker = Broker::new();
    let (_sub, mut rx) = channel_subscriber(&broker, "orders");

    for n in 0..100 {
        broker.publish("orders", n.to_string()).unwrap();
    }

    // Wake-ups coalesce, deliveries do not: all 100 arrive, in order.
    for n in 0..100 {
        assert_eq!(recv_one(&mut rx).await, n.to_string());
    }
}

#[tokio::test]
async fn test_unsubscribed_handler_is_never_invoked_again() {
    let broker = Broker::new();
    let (sub, mut rx) = channel_subscriber(&broker, "orders");

    sub.unsubscribe();
    broker.publish("orders", "C".to_string()).unwrap();

    // The loop stops and drops the handler, closing the channel without
    // having delivered anything.
    let last = timeout(RECV_TIMEOUT, rx.recv())
        .await
        .expect("delivery loop did not stop");
    assert_eq!(last, None);
    assert_eq!(broker.subscriber_count("orders"), 0);
}

#[tokio::test]
async fn test_unsubscribe_twice_is_noop() {
    let broker = Broker::new();
    let (sub, _rx) = channel_subscriber(&broker, "orders");

    sub.unsubscribe();
    sub.unsubscribe();

    assert_eq!(broker.subscriber_count("orders"), 0);
    // The topic itself survives, so publishing to it is still valid.
    broker.publish("orders", "x".to_string()).unwrap();
}

#[tokio::test]
async fn test_subscriber_ids_are_per_topic_monotonic() {
    let broker: Broker<String> = Broker::new();
    let s1 = broker.subscribe("orders", |_msg: String| {}).unwrap();
    let s2 = broker.subscribe("orders", |_msg: String| {}).unwrap();
    let other = broker.subscribe("billing", |_msg: String| {}).unwrap();

    assert_eq!(s1.id(), 0);
    assert_eq!(s2.id(), 1);
    assert_eq!(other.id(), 0);
    assert_eq!(s1.subject(), "orders");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_waits_for_backlog_delivery() {
    let broker = Broker::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = broker
        .subscribe("orders", move |msg: String| {
            std::thread::sleep(Duration::from_millis(200));
            let _ = tx.send(msg);
        })
        .unwrap();

    broker.publish("orders", "D".to_string()).unwrap();

    broker
        .close(Some(Duration::from_secs(5)))
        .await
        .expect("close failed");

    // By the time close returned, the slow handler had already run.
    assert_eq!(rx.try_recv().unwrap(), "D");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_close_with_expired_deadline_returns_timeout() {
    let broker = Broker::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = broker
        .subscribe("orders", move |msg: String| {
            std::thread::sleep(Duration::from_millis(300));
            let _ = tx.send(msg);
        })
        .unwrap();

    broker.publish("orders", "slow".to_string()).unwrap();

    let result = broker.close(Some(Duration::ZERO)).await;
    assert_eq!(result, Err(BrokerError::CloseTimedOut));

    // The drain keeps running in the background and still completes.
    let delivered = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("background drain never finished")
        .expect("delivery channel closed");
    assert_eq!(delivered, "slow");
}

#[tokio::test]
async fn test_closed_broker_rejects_subscribe_and_publish() {
    let broker = Broker::new();
    let (_sub, _rx) = channel_subscriber(&broker, "orders");

    broker.close(None).await.expect("close failed");
    assert!(broker.is_closed());

    assert_eq!(
        broker.subscribe("orders", |_msg: String| {}).err(),
        Some(BrokerError::Closed)
    );
    assert_eq!(
        broker.publish("orders", "x".to_string()),
        Err(BrokerError::Closed)
    );

    // A second close has nothing left to wait for.
    broker
        .close(Some(Duration::from_millis(10)))
        .await
        .expect("second close failed");
}

#[tokio::test]
async fn test_handler_panic_does_not_stop_the_loop() {
    let broker = Broker::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = broker
        .subscribe("orders", move |msg: String| {
            if msg == "boom" {
                panic!("handler failure");
            }
            let _ = tx.send(msg);
        })
        .unwrap();

    broker.publish("orders", "boom".to_string()).unwrap();
    broker.publish("orders", "ok".to_string()).unwrap();

    assert_eq!(recv_one(&mut rx).await, "ok");
}

#[test]
fn test_message_new_stamps_current_time() {
    let msg = Message::new("hello");
    assert_eq!(msg.payload, "hello");
    assert!(msg.timestamp > 0);
}
