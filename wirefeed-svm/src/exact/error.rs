//! Error types for building and signing Solana "exact" payments.
//!
//! Everything here converts into [`wirefeed::Error`] so that the payer seam
//! stays chain-agnostic.

use solana_pubkey::Pubkey;

/// Failures while assembling a transfer transaction.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The mint account could not be decoded.
    #[error("Can not read mint {mint}: {reason}")]
    Mint {
        /// Mint address.
        mint: Pubkey,
        /// Decoder message.
        reason: String,
    },
    /// The payer's associated token account does not exist.
    #[error("Payer has no token account {0}")]
    MissingSourceAccount(Pubkey),
    /// A ledger read failed.
    #[error(transparent)]
    Rpc(wirefeed::Error),
    /// The token program rejected the instruction arguments.
    #[error("Can not build transfer instruction: {0}")]
    Instruction(String),
    /// The message could not be compiled.
    #[error("Can not compile message: {0}")]
    Compile(String),
}

impl From<BuildError> for wirefeed::Error {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::MissingSourceAccount(account) => {
                Self::MissingSourceAccount(account.to_string())
            }
            BuildError::Rpc(inner) => inner,
            BuildError::Mint { .. } => Self::Rpc(e.to_string()),
            BuildError::Instruction(_) | BuildError::Compile(_) => Self::Signing(e.to_string()),
        }
    }
}

/// Error encoding a transaction to base64.
#[derive(Debug, thiserror::Error)]
#[error("Can not encode transaction to base64: {0}")]
pub struct TransactionToB64Error(pub String);

impl From<TransactionToB64Error> for wirefeed::Error {
    fn from(e: TransactionToB64Error) -> Self {
        Self::Encoding(e.to_string())
    }
}

/// Error signing a transaction.
#[derive(Debug, thiserror::Error)]
#[error("Can not sign transaction: {0}")]
pub struct TransactionSignError(pub String);

impl From<TransactionSignError> for wirefeed::Error {
    fn from(e: TransactionSignError) -> Self {
        Self::Signing(e.to_string())
    }
}
