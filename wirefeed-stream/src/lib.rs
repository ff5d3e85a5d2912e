#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Paid news stream sessions for wirefeed.
//!
//! - [`session`] - Buys a session, streams with it and renews it before expiry
//! - [`connection`] - One WebSocket connection whose token can be swapped in place
//! - [`message`] - Classification of stream frames
//! - [`observer`] - Callbacks for stream and session events
//! - [`retry`] - Renewal backoff
//! - [`webhook`] - Forwarding content to a chat webhook
//! - [`tungstenite`] - The WebSocket transport
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wirefeed::config::ClientConfig;
//! use wirefeed_stream::SessionManager;
//!
//! # async fn run(
//! #     config: ClientConfig,
//! #     payer: Arc<dyn wirefeed::InvoicePayer>,
//! # ) -> Result<(), wirefeed::Error> {
//! let mut manager = SessionManager::from_config(&config, Some(payer))?;
//! manager.start().await?;
//! manager.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod message;
pub mod observer;
pub mod retry;
pub mod session;
pub mod tungstenite;
pub mod webhook;

pub use connection::{StreamConnection, StreamEvent};
pub use message::StreamMessage;
pub use observer::{ObserverError, ObserverList, StreamObserver};
pub use retry::RetryPolicy;
pub use session::{SessionGateway, SessionManager, SessionState, StopHandle};
pub use webhook::WebhookForwarder;

#[cfg(test)]
mod testing;
