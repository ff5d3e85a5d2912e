//! Solana chain access for payment construction.
//!
//! # Key Types
//!
//! - [`Address`] - a base58 Solana public key as it appears in invoices
//! - [`RpcClientLike`] - the JSON-RPC calls the transaction builder needs

/// Address type.
pub mod types;
pub use types::*;

/// RPC client abstraction.
pub mod rpc;
pub use rpc::RpcClientLike;
