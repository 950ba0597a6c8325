//! Subscriber delivery loop
//!
//! Each subscription runs one task that consumes a suffix of its topic's log
//! through the user-supplied handler. The loop reacts to three signals:
//! unsubscribe (stop now, abandon backlog), notify (catch up to the tail) and
//! close (catch up to the tail, report completion, stop). The topic lock is
//! never held across a handler invocation.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::broker::topic::{SubscriberId, Topic};

/// Callback invoked with each delivered message.
pub type MsgHandler<M> = Box<dyn Fn(M) + Send + 'static>;

/// Handle to an active subscription, returned by [`Broker::subscribe`].
///
/// [`Broker::subscribe`]: crate::broker::Broker::subscribe
pub struct Subscription<M> {
    topic: Arc<Topic<M>>,
    id: SubscriberId,
}

impl<M: Clone + Send + Sync + 'static> Subscription<M> {
    pub(crate) fn new(topic: Arc<Topic<M>>, id: SubscriberId) -> Self {
        Self { topic, id }
    }

    /// The subject this subscription belongs to.
    pub fn subject(&self) -> &str {
        self.topic.name()
    }

    /// The id assigned to this subscription within its topic.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Cancel the subscription. Messages not yet handed to the handler are
    /// discarded and the handler is never invoked again. Calling this a
    /// second time is a no-op.
    pub fn unsubscribe(&self) {
        self.topic.unregister(self.id);
    }
}

pub(crate) struct DeliveryLoop<M> {
    topic: Arc<Topic<M>>,
    id: SubscriberId,
    cursor: usize,
    handler: MsgHandler<M>,
    notify: mpsc::Receiver<()>,
    unsubscribe: mpsc::Receiver<()>,
    close: mpsc::Receiver<()>,
    finished: Option<oneshot::Sender<()>>,
}

impl<M: Clone + Send + Sync + 'static> DeliveryLoop<M> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        topic: Arc<Topic<M>>,
        id: SubscriberId,
        cursor: usize,
        handler: MsgHandler<M>,
        notify: mpsc::Receiver<()>,
        unsubscribe: mpsc::Receiver<()>,
        close: mpsc::Receiver<()>,
        finished: oneshot::Sender<()>,
    ) -> Self {
        Self {
            topic,
            id,
            cursor,
            handler,
            notify,
            unsubscribe,
            close,
            finished: Some(finished),
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            // Biased toward unsubscribe: a pending cancellation always wins
            // over a pending wake-up, so the backlog really is abandoned.
            tokio::select! {
                biased;
                _ = self.unsubscribe.recv() => return,
                sig = self.close.recv() => {
                    if sig.is_some() {
                        self.drain_to_tail();
                        if let Some(done) = self.finished.take() {
                            let _ = done.send(());
                        }
                    }
                    return;
                }
                sig = self.notify.recv() => {
                    if sig.is_none() {
                        return;
                    }
                    self.drain_to_tail();
                }
            }
        }
    }

    /// Deliver every message between the cursor and the current tail, one at
    /// a time, in log order. The read lock is released before each handler
    /// call and re-acquired for the next comparison, so a slow handler never
    /// blocks publishers or other subscribers.
    fn drain_to_tail(&mut self) {
        loop {
            let message = {
                let state = self.topic.state.read().unwrap();
                if self.cursor >= state.log.len() {
                    return;
                }
                let message = state.log[self.cursor].clone();
                self.cursor += 1;
                message
            };

            if panic::catch_unwind(AssertUnwindSafe(|| (self.handler)(message))).is_err() {
                warn!(
                    topic = self.topic.name(),
                    id = self.id,
                    "message handler panicked; delivery continues"
                );
            }
        }
    }
}
