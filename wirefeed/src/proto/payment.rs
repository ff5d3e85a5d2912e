//! The `X-PAYMENT` header and the payload it encodes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Error;
use crate::encoding::Base64Bytes;
use crate::networks::SOLANA_NETWORK_NAME;

/// Protocol version marker that serializes as `1` and rejects anything else.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct X402Version1;

impl Serialize for X402Version1 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(1)
    }
}

impl<'de> Deserialize<'de> for X402Version1 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            1 => Ok(Self),
            v => Err(serde::de::Error::custom(format!("expected x402Version 1, got {v}"))),
        }
    }
}

/// The `"exact"` scheme literal.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct ExactScheme;

impl ExactScheme {
    /// Wire value.
    pub const VALUE: &'static str = "exact";
}

impl AsRef<str> for ExactScheme {
    fn as_ref(&self) -> &str {
        Self::VALUE
    }
}

impl Serialize for ExactScheme {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(Self::VALUE)
    }
}

impl<'de> Deserialize<'de> for ExactScheme {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == Self::VALUE {
            Ok(Self)
        } else {
            Err(serde::de::Error::custom(format!("expected scheme 'exact', got '{s}'")))
        }
    }
}

/// Scheme payload carrying a signed Solana transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactSolanaPayload {
    /// Base64 of the bincode-serialized, payer-signed transaction.
    pub transaction: String,
}

/// The JSON object encoded into a [`PaymentHeader`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Always `1`.
    pub x402_version: X402Version1,
    /// Always `"exact"`.
    pub scheme: ExactScheme,
    /// Always `"solana"`.
    pub network: String,
    /// The signed transaction.
    pub payload: ExactSolanaPayload,
}

impl PaymentPayload {
    /// Wraps a base64 signed Solana transaction.
    #[must_use]
    pub fn solana(transaction_b64: String) -> Self {
        Self {
            x402_version: X402Version1,
            scheme: ExactScheme,
            network: SOLANA_NETWORK_NAME.to_owned(),
            payload: ExactSolanaPayload {
                transaction: transaction_b64,
            },
        }
    }
}

/// Base64 proof of payment, bound to one invoice and one transaction.
///
/// Deliberately not `Clone`: a header is built for one request and moved into it.
#[derive(Debug, PartialEq, Eq)]
pub struct PaymentHeader(Base64Bytes);

impl PaymentHeader {
    /// Encodes a payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if JSON serialization fails.
    pub fn encode(payload: &PaymentPayload) -> Result<Self, Error> {
        let json = serde_json::to_vec(payload)?;
        Ok(Self(Base64Bytes::encode(json)))
    }

    /// Decodes the payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] on base64 or JSON failure.
    pub fn decode(&self) -> Result<PaymentPayload, Error> {
        let bytes = self.0.decode()?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// The header value.
    #[must_use]
    pub fn value(&self) -> String {
        self.0.as_text()
    }
}
