#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP clients for the wirefeed vendor API.
//!
//! - [`protocol`] - The 402 invoice / `X-PAYMENT` exchange shared by every paid operation
//! - [`facilitator`] - `GET /supported` lookup and fee payer resolution
//! - [`extract`] - Pay-per-request content extraction
//!
//! Payment construction is delegated to an [`InvoicePayer`](wirefeed::InvoicePayer),
//! normally `wirefeed_svm::SolanaInvoicePayer`.

pub mod constants;
pub mod extract;
pub mod facilitator;
pub mod protocol;

pub use extract::{BatchOutcome, ExtractionClient};
pub use facilitator::{FacilitatorClient, FeePayerResolver};
pub use protocol::{Operation, PaymentProtocolClient};

#[cfg(test)]
mod testing;
