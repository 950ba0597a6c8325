//! Broker engine
//!
//! This module contains the in-process broker implementation responsible for:
//! - managing topics and their subscriber registries
//! - routing published messages to per-subscriber delivery loops
//! - coordinated shutdown that drains every backlog, bounded by a deadline
//!
//! Concurrency notes:
//! - The broker-level registry and closed flag live under a reader/writer
//!   lock. `publish` holds it shared for the whole append, `subscribe` and
//!   `close` hold it exclusively, so every publish is strictly ordered
//!   against the closed transition: it either lands inside the frozen tail
//!   and gets drained, or it is rejected.
//! - The lock is never held across an await point. `close` collects the
//!   completion channels under the lock and waits on them after releasing it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::broker::subscriber::Subscription;
use crate::broker::topic::Topic;
use crate::utils::error::BrokerError;

pub struct Broker<M> {
    state: RwLock<BrokerState<M>>,
}

struct BrokerState<M> {
    topics: HashMap<String, Arc<Topic<M>>>,
    closed: bool,
}

impl<M: Clone + Send + Sync + 'static> Broker<M> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(BrokerState {
                topics: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Subscribe `handler` to `subject`, creating the topic if it does not
    /// exist yet. The handler starts receiving messages published from this
    /// point on; messages already in the topic's log are never replayed.
    ///
    /// Spawns the subscriber's delivery loop, so a Tokio runtime must be
    /// running. Fails with [`BrokerError::Closed`] once shutdown has begun.
    pub fn subscribe(
        &self,
        subject: &str,
        handler: impl Fn(M) + Send + 'static,
    ) -> Result<Subscription<M>, BrokerError> {
        let mut state = self.state.write().unwrap();
        if state.closed {
            return Err(BrokerError::Closed);
        }
        let topic = state
            .topics
            .entry(subject.to_string())
            .or_insert_with(|| Arc::new(Topic::new(subject)))
            .clone();
        let id = Arc::clone(&topic).register(Box::new(handler));
        Ok(Subscription::new(topic, id))
    }

    /// Publish a message to all subscribers of `subject`.
    ///
    /// Appends to the topic's log and wakes every delivery loop; it never
    /// waits for any subscriber to make progress. Fails with
    /// [`BrokerError::Closed`] once shutdown has begun and with
    /// [`BrokerError::TopicNotFound`] if nobody has ever subscribed to
    /// `subject` (topics are created by subscription only).
    pub fn publish(&self, subject: &str, message: M) -> Result<(), BrokerError> {
        let state = self.state.read().unwrap();
        if state.closed {
            return Err(BrokerError::Closed);
        }
        let topic = state
            .topics
            .get(subject)
            .ok_or_else(|| BrokerError::TopicNotFound(subject.to_string()))?;
        topic.publish(message);
        Ok(())
    }

    /// Shut the broker down: reject all further subscribe/publish calls,
    /// then wait until every subscriber has drained its backlog.
    ///
    /// With `timeout` set, the wait is cut short after that duration and
    /// [`BrokerError::CloseTimedOut`] is returned; delivery loops still in
    /// flight keep draining in the background and are never aborted. Calling
    /// `close` again after a full drain returns `Ok` immediately.
    pub async fn close(&self, timeout: Option<Duration>) -> Result<(), BrokerError> {
        let completions: Vec<oneshot::Receiver<()>> = {
            let mut state = self.state.write().unwrap();
            state.closed = true;
            state
                .topics
                .values()
                .flat_map(|topic| topic.drain_and_close())
                .collect()
        };
        info!(subscribers = completions.len(), "broker closing");

        let wait = async move {
            for done in completions {
                // A dropped sender means the loop is already gone; either way
                // there is nothing left to wait for.
                let _ = done.await;
            }
        };

        let result = match timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| BrokerError::CloseTimedOut),
            None => {
                wait.await;
                Ok(())
            }
        };

        match &result {
            Ok(()) => debug!("all subscribers drained"),
            Err(e) => debug!(error = %e, "close wait cut short"),
        }
        result
    }

    /// Whether shutdown has begun.
    pub fn is_closed(&self) -> bool {
        self.state.read().unwrap().closed
    }

    /// Names of all topics created so far.
    pub fn topic_names(&self) -> Vec<String> {
        self.state.read().unwrap().topics.keys().cloned().collect()
    }

    /// Number of active subscribers on `subject`, or zero if the topic does
    /// not exist.
    pub fn subscriber_count(&self, subject: &str) -> usize {
        self.state
            .read()
            .unwrap()
            .topics
            .get(subject)
            .map(|topic| topic.subscriber_count())
            .unwrap_or(0)
    }
}

impl<M: Clone + Send + Sync + 'static> Default for Broker<M> {
    fn default() -> Self {
        Self::new()
    }
}
