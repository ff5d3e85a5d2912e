#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Solana payment construction for the wirefeed client.
//!
//! Invoices are paid with a single SPL Token (or Token-2022)
//! `TransferChecked` instruction from the payer's associated token account
//! to the recipient's, preceded by compute budget directives and, when
//! needed, creation of the recipient's account. The transaction is signed by
//! the payer only; the fee payer named by the invoice or the facilitator
//! co-signs at settlement.
//!
//! # Modules
//!
//! - [`chain`] - Address type and the [`RpcClientLike`](chain::RpcClientLike) ledger seam
//! - [`exact`] - Transaction builder and the [`SolanaInvoicePayer`]
//! - [`wallet`] - Payer keypair loading
//!
//! # Example
//!
//! ```ignore
//! use solana_client::nonblocking::rpc_client::RpcClient;
//! use wirefeed_svm::{SolanaInvoicePayer, wallet};
//!
//! let keypair = wallet::load_keypair("~/.config/solana/id.json")?;
//! let rpc = RpcClient::new("https://api.mainnet-beta.solana.com".to_owned());
//! let payer = SolanaInvoicePayer::new(keypair, rpc);
//! let header = payer.pay(&invoice, &fee_payer).await?;
//! ```

pub mod chain;
pub mod exact;
pub mod wallet;

mod networks;
pub use networks::*;

pub use exact::SolanaInvoicePayer;

#[cfg(test)]
mod testing;
