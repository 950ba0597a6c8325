//! The `error` module defines the error types surfaced by broker operations.
//!
//! Every error is returned synchronously from the call that produced it; the
//! broker performs no internal retries.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The broker has begun (or finished) shutting down. Callers should treat
    /// the broker as permanently unavailable.
    #[error("broker is closed")]
    Closed,

    /// The subject has never been subscribed to. Topics come into existence
    /// through subscription, so this is a caller usage error.
    #[error("topic '{0}' does not exist")]
    TopicNotFound(String),

    /// The close deadline expired before every subscriber finished draining.
    /// Delivery loops still in flight keep running in the background.
    #[error("close deadline expired before all subscribers drained")]
    CloseTimedOut,
}
