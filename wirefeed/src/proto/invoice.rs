//! The invoice returned with `402 Payment Required`.

use serde::{Deserialize, Serialize};

use super::U64String;
use crate::Error;
use crate::networks::Network;

/// Payment terms set by the server.
///
/// An invoice is consumed exactly once: the whole of
/// [`max_amount_required`](Self::max_amount_required) is paid, never a part.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    /// Payment scheme, `"exact"` for every invoice this client pays.
    pub scheme: String,
    /// Network name, e.g. `"solana"`.
    pub network: String,
    /// Token mint address.
    pub asset: String,
    /// Recipient wallet address. The transfer goes to its associated token account.
    pub pay_to: String,
    /// Amount in the token's smallest unit.
    pub max_amount_required: U64String,
    /// Scheme-specific hints.
    #[serde(default)]
    pub extra: InvoiceExtra,
    /// Resource URL being paid for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Human-readable description of the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type of the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Validity window of a payment for this invoice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_timeout_seconds: Option<u64>,
}

/// The `extra` object of an [`Invoice`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceExtra {
    /// Address that funds fees and account creation, if the server names one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_payer: Option<String>,
    /// Session minutes bought by this invoice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes: Option<U64String>,
}

impl Invoice {
    /// Atomic amount to transfer.
    #[must_use]
    pub const fn amount(&self) -> u64 {
        self.max_amount_required.inner()
    }

    /// Fee payer declared by the server, ignoring blank values.
    #[must_use]
    pub fn declared_fee_payer(&self) -> Option<&str> {
        self.extra
            .fee_payer
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Payment network of this invoice, if recognised.
    #[must_use]
    pub fn payment_network(&self) -> Option<Network> {
        Network::from_invoice_network(&self.network)
    }

    /// Parses the body of a 402 response.
    ///
    /// The body is either `{ "accepts": [Invoice, ...] }`, in which case the
    /// first entry is used, or a bare invoice object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInvoice`] if `accepts` is empty or neither
    /// shape matches.
    pub fn from_payment_required(body: serde_json::Value) -> Result<Self, Error> {
        let response: InvoiceResponse = serde_json::from_value(body)
            .map_err(|e| Error::InvalidInvoice(e.to_string()))?;
        response.into_invoice()
    }
}

/// Body of a 402 response.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum InvoiceResponse {
    /// `{ "accepts": [...] }`.
    Accepts {
        /// Acceptable invoices, in server preference order.
        accepts: Vec<Invoice>,
        /// Optional error text from the server.
        #[serde(default)]
        error: Option<String>,
    },
    /// A bare invoice.
    Single(Box<Invoice>),
}

impl InvoiceResponse {
    /// Picks the invoice to pay.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInvoice`] if no invoice is offered.
    pub fn into_invoice(self) -> Result<Invoice, Error> {
        match self {
            Self::Accepts { accepts, error } => accepts.into_iter().next().ok_or_else(|| {
                Error::InvalidInvoice(error.unwrap_or_else(|| "empty accepts list".to_owned()))
            }),
            Self::Single(invoice) => Ok(*invoice),
        }
    }
}
