//! Payment networks accepted by the vendor API.
//!
//! The API takes a short `network` query label (`sol`, `base`). Only Solana
//! has a payment backend; `base` is accepted as a label so that requests can
//! be expressed, and is rejected when a payment has to be built.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// x402 network name used in invoices and payment headers for Solana.
pub const SOLANA_NETWORK_NAME: &str = "solana";

/// Network names that identify a Solana invoice.
pub static SOLANA_NETWORK_NAMES: &[&str] = &["solana", "solana-devnet", "solana-mainnet"];

/// A payment network label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Solana, settled with SPL token transfers.
    #[default]
    #[serde(alias = "solana")]
    #[cfg_attr(feature = "cli", value(alias = "solana"))]
    Sol,
    /// Base. Accepted as a label, no payment backend.
    Base,
}

impl Network {
    /// The value of the `network` query parameter.
    #[must_use]
    pub const fn query_label(&self) -> &'static str {
        match self {
            Self::Sol => "sol",
            Self::Base => "base",
        }
    }

    /// Classifies an invoice `network` field.
    #[must_use]
    pub fn from_invoice_network(name: &str) -> Option<Self> {
        if SOLANA_NETWORK_NAMES.contains(&name) {
            Some(Self::Sol)
        } else if name == "base" || name == "base-sepolia" {
            Some(Self::Base)
        } else {
            None
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_label())
    }
}

impl FromStr for Network {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sol" | "solana" => Ok(Self::Sol),
            "base" => Ok(Self::Base),
            other => Err(crate::Error::InvalidInput(format!("unknown network '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_labels_and_aliases() {
        assert_eq!("sol".parse::<Network>().unwrap(), Network::Sol);
        assert_eq!("Solana".parse::<Network>().unwrap(), Network::Sol);
        assert_eq!("base".parse::<Network>().unwrap(), Network::Base);
        assert!("eth".parse::<Network>().is_err());
    }

    #[test]
    fn classifies_invoice_network_names() {
        assert_eq!(Network::from_invoice_network("solana-devnet"), Some(Network::Sol));
        assert_eq!(Network::from_invoice_network("base"), Some(Network::Base));
        assert_eq!(Network::from_invoice_network("polygon"), None);
    }
}
