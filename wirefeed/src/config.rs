//! Client configuration.
//!
//! Every external setting is resolved once into a [`ClientConfig`] value and
//! passed to the clients at construction. Nothing downstream reads the
//! process environment.
//!
//! # Example
//!
//! ```rust
//! use wirefeed::config::ClientConfig;
//!
//! let config = ClientConfig::new("https://news.example.com".parse().unwrap());
//! assert_eq!(config.stream_endpoint().unwrap().as_str(), "wss://news.example.com/stream");
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::networks::Network;

/// Default vendor API base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Default Solana JSON-RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

/// Default facilitator used for fee-payer lookup.
pub const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";

/// Default session length bought by `connect` and `extend`.
pub const DEFAULT_DURATION_MINUTES: u64 = 60;

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Vendor API base URL.
    pub api_url: Url,

    /// Stream URL override. Derived from `api_url` when absent.
    #[serde(default)]
    pub stream_url: Option<Url>,

    /// Solana JSON-RPC endpoint.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: Url,

    /// Facilitator base URL for fee-payer lookup.
    #[serde(default = "default_facilitator_url")]
    pub facilitator_url: Url,

    /// Token mint used when an invoice leaves `asset` empty.
    #[serde(default)]
    pub token_mint: Option<String>,

    /// Fee payer used when an invoice does not name one.
    #[serde(default)]
    pub fee_payer_override: Option<String>,

    /// Wallet key material location: a keypair file path or a base58 secret.
    #[serde(default)]
    pub wallet: Option<String>,

    /// Network label sent with extraction requests.
    #[serde(default)]
    pub network: Network,

    /// Minutes bought per `connect` / `extend`.
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: u64,

    /// Create the recipient's token account when it does not exist yet.
    #[serde(default = "default_true")]
    pub create_destination_account: bool,

    /// Renewal retry policy.
    #[serde(default)]
    pub renewal: RenewalConfig,

    /// Per-request HTTP timeout. `None` leaves requests unbounded.
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
}

/// Retry policy for session renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalConfig {
    /// Attempts before giving up.
    pub max_attempts: u32,
    /// Delay after the first failure, doubled after each further failure.
    pub base_delay_ms: u64,
}

impl Default for RenewalConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

impl RenewalConfig {
    /// Base delay as a [`Duration`].
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

#[allow(clippy::expect_used)]
fn default_rpc_url() -> Url {
    Url::parse(DEFAULT_RPC_URL).expect("default RPC URL is valid")
}

#[allow(clippy::expect_used)]
fn default_facilitator_url() -> Url {
    Url::parse(DEFAULT_FACILITATOR_URL).expect("default facilitator URL is valid")
}

const fn default_duration_minutes() -> u64 {
    DEFAULT_DURATION_MINUTES
}

const fn default_true() -> bool {
    true
}

impl Default for ClientConfig {
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self::new(Url::parse(DEFAULT_API_URL).expect("default API URL is valid"))
    }
}

impl ClientConfig {
    /// Creates a configuration with defaults for everything but the API URL.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            stream_url: None,
            rpc_url: default_rpc_url(),
            facilitator_url: default_facilitator_url(),
            token_mint: None,
            fee_payer_override: None,
            wallet: None,
            network: Network::default(),
            duration_minutes: DEFAULT_DURATION_MINUTES,
            create_destination_account: true,
            renewal: RenewalConfig::default(),
            http_timeout_secs: None,
        }
    }

    /// Sets the renewal policy.
    #[must_use]
    pub const fn with_renewal(mut self, renewal: RenewalConfig) -> Self {
        self.renewal = renewal;
        self
    }

    /// Sets the session length.
    #[must_use]
    pub const fn with_duration_minutes(mut self, minutes: u64) -> Self {
        self.duration_minutes = minutes;
        self
    }

    /// HTTP timeout, if configured.
    #[must_use]
    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }

    /// Stream endpoint without the token query.
    ///
    /// Uses `stream_url` when set, otherwise `ws(s)://{api host}/stream`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the API URL has no host or an
    /// unsupported scheme.
    pub fn stream_endpoint(&self) -> Result<Url, Error> {
        if let Some(url) = &self.stream_url {
            return Ok(url.clone());
        }
        let scheme = match self.api_url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(Error::InvalidInput(format!(
                    "cannot derive a stream URL from scheme '{other}'"
                )));
            }
        };
        let host = self
            .api_url
            .host_str()
            .ok_or_else(|| Error::InvalidInput("API URL has no host".to_owned()))?;
        let authority = match self.api_url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };
        Url::parse(&format!("{scheme}://{authority}/stream"))
            .map_err(|e| Error::InvalidInput(e.to_string()))
    }
}
