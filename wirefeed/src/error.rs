//! Error types shared by every wirefeed crate.
//!
//! Payment-protocol failures ([`Error::UnexpectedStatus`],
//! [`Error::InvalidInvoice`], [`Error::MissingFeePayer`]) are kept apart from
//! network failures ([`Error::Transport`], [`Error::Rpc`]) so that callers can
//! tell a rejected payment from an unreachable server.

/// Errors produced while paying for and consuming wirefeed resources.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No payer identity is configured.
    #[error("no wallet configured: a payer keypair is required")]
    MissingWallet,

    /// Malformed target reference or extraction kind.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// HTTP response outside the expected 402/200 pairing.
    #[error("unexpected HTTP status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The server answered 402 but the body is not a usable invoice.
    #[error("invalid invoice: {0}")]
    InvalidInvoice(String),

    /// The payer holds no token account for the invoiced asset.
    #[error("payer has no token account {0} for the invoiced asset")]
    MissingSourceAccount(String),

    /// No fee payer from the invoice, the override or the facilitator.
    #[error("no fee payer available from invoice, override or facilitator")]
    MissingFeePayer,

    /// The network has no payment backend.
    #[error("payments on network '{0}' are not supported")]
    UnsupportedNetwork(String),

    /// Connection-level failure (HTTP or stream).
    #[error("transport error: {0}")]
    Transport(String),

    /// Ledger RPC failure while building a transaction.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// Transaction assembly or signing failed.
    #[error("signing error: {0}")]
    Signing(String),

    /// Wallet key material could not be loaded.
    #[error("wallet error: {0}")]
    Wallet(String),

    /// JSON or base64 encoding failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Every renewal attempt failed. `last` is the final attempt's error.
    #[error("session renewal failed after {attempts} attempts: {last}")]
    RenewalExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Error of the last attempt.
        #[source]
        last: Box<Error>,
    },
}

impl Error {
    /// Returns `true` for failures reported by the payment counterparty
    /// rather than by the network.
    #[must_use]
    pub const fn is_payment_failure(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedStatus { .. }
                | Self::InvalidInvoice(_)
                | Self::MissingFeePayer
                | Self::MissingSourceAccount(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Encoding(e.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Self::Encoding(e.to_string())
    }
}
