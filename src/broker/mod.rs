pub mod engine;
pub mod message;
pub mod subscriber;
pub mod topic;

pub use engine::Broker;
pub use message::Message;
pub use subscriber::{MsgHandler, Subscription};
pub use topic::SubscriberId;

#[cfg(test)]
mod tests;
