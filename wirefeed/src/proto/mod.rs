//! Wire types for the x402 exchange with the vendor API.
//!
//! # Key Types
//!
//! - [`Invoice`] - payment terms returned with `402 Payment Required`
//! - [`PaymentHeader`] - base64 proof of payment sent as `X-PAYMENT`
//! - [`Session`] - access token returned by a paid `connect`/`extend`
//! - [`ExtractKind`] - content-extraction endpoint selector
//!
//! All JSON uses camelCase field names except the session response, which
//! the vendor sends in snake case.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

mod extract;
mod invoice;
mod payment;
mod session;

pub use extract::ExtractKind;
pub use invoice::{Invoice, InvoiceExtra, InvoiceResponse};
pub use payment::{ExactScheme, ExactSolanaPayload, PaymentHeader, PaymentPayload, X402Version1};
pub use session::Session;

/// A `u64` that travels as a decimal string.
///
/// JavaScript servers cannot represent every 64-bit integer as a number, so
/// atomic token amounts are always quoted. Unquoted numbers are accepted on
/// input for leniency.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct U64String(u64);

impl U64String {
    /// Returns the inner value.
    #[must_use]
    pub const fn inner(&self) -> u64 {
        self.0
    }
}

impl FromStr for U64String {
    type Err = <u64 as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}

impl From<u64> for U64String {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<U64String> for u64 {
    fn from(value: U64String) -> Self {
        value.0
    }
}

impl fmt::Display for U64String {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for U64String {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for U64String {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
            Raw::Number(n) => Ok(Self(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u64_string_accepts_quoted_and_bare_numbers() {
        let quoted: U64String = serde_json::from_str("\"17500\"").unwrap();
        let bare: U64String = serde_json::from_str("17500").unwrap();
        assert_eq!(quoted, bare);
        assert_eq!(serde_json::to_string(&quoted).unwrap(), "\"17500\"");
    }

    #[test]
    fn u64_string_rejects_fractions() {
        assert!(serde_json::from_str::<U64String>("\"1.5\"").is_err());
        assert!(serde_json::from_str::<U64String>("-3").is_err());
    }
}
