//! Command-line client for wirefeed.
//!
//! # Modules
//!
//! - [`config`] - Command-line and environment options, resolved into a
//!   [`ClientConfig`](wirefeed::config::ClientConfig)
//! - [`observer`] - Logging observer for the stream

pub mod config;
pub mod observer;

pub use config::{Cli, Command};
pub use observer::LogObserver;
