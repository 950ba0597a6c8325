//! Topic management
//!
//! A `Topic` owns the append-only message log for one subject together with
//! the control handles of every active subscriber. Both live under a single
//! reader/writer lock: publishing writes, delivery loops read, and the lock
//! is only ever held for short critical sections with no await point inside.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::broker::subscriber::{DeliveryLoop, MsgHandler};

/// Identifies a subscriber within its topic. Ids are assigned monotonically
/// and never reused.
pub type SubscriberId = u64;

/// Control channels the topic keeps for one running delivery loop.
///
/// `notify` has capacity one and is sent to with `try_send`: a wake-up that
/// finds one already pending is dropped, which is safe because a delivery
/// loop always drains to the current tail before waiting again.
pub(crate) struct SubscriberHandle {
    notify: mpsc::Sender<()>,
    unsubscribe: mpsc::Sender<()>,
    close: mpsc::Sender<()>,
    finished: Option<oneshot::Receiver<()>>,
}

pub(crate) struct TopicState<M> {
    pub(crate) log: Vec<M>,
    subscribers: HashMap<SubscriberId, SubscriberHandle>,
    next_id: SubscriberId,
    closed: bool,
}

pub(crate) struct Topic<M> {
    name: String,
    pub(crate) state: RwLock<TopicState<M>>,
}

impl<M: Clone + Send + Sync + 'static> Topic<M> {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: RwLock::new(TopicState {
                log: Vec::new(),
                subscribers: HashMap::new(),
                next_id: 0,
                closed: false,
            }),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.state.read().unwrap().subscribers.len()
    }

    /// Append a message and wake every registered subscriber.
    ///
    /// The wake is a coalescing signal, not a per-message queue; see
    /// [`SubscriberHandle`]. Once draining has begun the tail is frozen and
    /// further appends are ignored.
    pub(crate) fn publish(&self, message: M) {
        let mut state = self.state.write().unwrap();
        if state.closed {
            return;
        }
        state.log.push(message);
        for handle in state.subscribers.values() {
            let _ = handle.notify.try_send(());
        }
    }

    /// Register a new subscriber and spawn its delivery loop.
    ///
    /// The cursor starts at the current tail, so messages already in the log
    /// are never delivered to this subscriber.
    pub(crate) fn register(self: Arc<Self>, handler: MsgHandler<M>) -> SubscriberId {
        let (notify_tx, notify_rx) = mpsc::channel(1);
        let (unsubscribe_tx, unsubscribe_rx) = mpsc::channel(1);
        let (close_tx, close_rx) = mpsc::channel(1);
        let (finished_tx, finished_rx) = oneshot::channel();

        let mut state = self.state.write().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        let cursor = state.log.len();
        state.subscribers.insert(
            id,
            SubscriberHandle {
                notify: notify_tx,
                unsubscribe: unsubscribe_tx,
                close: close_tx,
                finished: Some(finished_rx),
            },
        );
        drop(state);

        debug!(topic = self.name.as_str(), id, "subscriber registered");

        let delivery = DeliveryLoop::new(
            self,
            id,
            cursor,
            handler,
            notify_rx,
            unsubscribe_rx,
            close_rx,
            finished_tx,
        );
        tokio::spawn(delivery.run());

        id
    }

    /// Remove a subscriber and tell its loop to stop. Undelivered backlog is
    /// discarded. Unknown ids are ignored, so unsubscribing twice is a no-op.
    pub(crate) fn unregister(&self, id: SubscriberId) {
        let mut state = self.state.write().unwrap();
        if let Some(handle) = state.subscribers.remove(&id) {
            let _ = handle.unsubscribe.try_send(());
            debug!(topic = self.name.as_str(), id, "subscriber removed");
        }
    }

    /// Signal every subscriber to drain to the current tail and stop,
    /// returning the completion channels the caller can wait on.
    pub(crate) fn drain_and_close(&self) -> Vec<oneshot::Receiver<()>> {
        let mut state = self.state.write().unwrap();
        state.closed = true;
        let mut completions = Vec::with_capacity(state.subscribers.len());
        for handle in state.subscribers.values_mut() {
            let _ = handle.close.try_send(());
            if let Some(done) = handle.finished.take() {
                completions.push(done);
            }
        }
        debug!(
            topic = self.name.as_str(),
            subscribers = completions.len(),
            "topic draining"
        );
        completions
    }
}
