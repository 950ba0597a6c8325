//! # Fanout
//!
//! `fanout` is a minimalist, in-process publish/subscribe broker built with Rust.
//! Messages published to a subject are delivered asynchronously, in publish
//! order, to every subscriber of that subject, each on its own Tokio task.
//!
//! ## Core Modules
//!
//! The library is structured into several modules, each with a distinct responsibility:
//!
//! - `broker`: The central component that manages topics, subscribers, delivery loops and shutdown.
//! - `config`: Handles loading and managing configuration.
//! - `utils`: Contains shared utilities, such as error types and logging setup.

pub mod broker;
pub mod config;
pub mod utils;
