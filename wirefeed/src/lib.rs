#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the wirefeed pay-per-use news client.
//!
//! wirefeed pays for access to a real-time news stream and to a content
//! extraction API using the x402 convention: every paid request is first
//! answered with `402 Payment Required` and an [`Invoice`](proto::Invoice),
//! the client settles the invoice with a signed token transfer sent in the
//! `X-PAYMENT` header, and the retried request returns the paid resource.
//!
//! This crate is chain-agnostic. The Solana transaction builder lives in
//! `wirefeed-svm`, the HTTP protocol client in `wirefeed-http` and the
//! streaming session manager in `wirefeed-stream`.
//!
//! # Modules
//!
//! - [`config`] - Client configuration resolved once at construction
//! - [`encoding`] - Base64 helpers used by payment headers
//! - [`error`] - Error taxonomy shared by every crate in the workspace
//! - [`networks`] - Payment network labels accepted by the vendor API
//! - [`payer`] - The [`InvoicePayer`](payer::InvoicePayer) seam between protocol and chain
//! - [`proto`] - Invoice, payment header and session wire types
//! - [`timestamp`] - Unix timestamps

pub mod config;
pub mod encoding;
pub mod error;
pub mod networks;
pub mod payer;
pub mod proto;
pub mod timestamp;

pub use error::Error;
pub use networks::Network;
pub use payer::InvoicePayer;
pub use proto::{Invoice, PaymentHeader, Session};
