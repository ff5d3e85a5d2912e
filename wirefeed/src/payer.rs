//! The seam between the HTTP protocol and the chain that settles payments.

use async_trait::async_trait;

use crate::networks::Network;
use crate::proto::{Invoice, PaymentHeader};
use crate::Error;

/// Turns an invoice into a signed payment header.
///
/// Implementations build a fresh transaction for every call, sign it with the
/// payer's key and encode it. They never sign on behalf of the fee payer.
#[async_trait]
pub trait InvoicePayer: Send + Sync {
    /// Address of the paying identity.
    fn payer_address(&self) -> String;

    /// Network this payer settles on.
    fn network(&self) -> Network;

    /// Pays `invoice` in full, with `fee_payer` funding fees and account creation.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the transaction cannot be built, signed or encoded.
    async fn pay(&self, invoice: &Invoice, fee_payer: &str) -> Result<PaymentHeader, Error>;
}
