//! Solana "exact" payment scheme, payer side.
//!
//! The payer pays the whole invoiced amount with one SPL Token
//! `TransferChecked` instruction. See [`builder`] for the transaction layout.

pub mod builder;
pub mod client;

pub mod error;
pub use error::*;

pub mod types;
pub use types::*;

pub use builder::{TransferBuilder, TransferRequest};
pub use client::SolanaInvoicePayer;
