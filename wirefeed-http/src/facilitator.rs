//! Fee payer lookup.
//!
//! An invoice normally names the account that funds transaction fees. When
//! it does not, [`FeePayerResolver`] falls back to a configured override and
//! then to the fee payer advertised by the facilitator's `GET /supported`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_with::{VecSkipError, serde_as};
use tokio::sync::RwLock;
use url::Url;
use wirefeed::config::ClientConfig;
use wirefeed::{Error, Invoice, Network};

/// Response of `GET /supported`.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedResponse {
    /// Supported payment kinds. Entries that fail to parse are skipped.
    #[serde(default)]
    #[serde_as(as = "VecSkipError<_>")]
    pub kinds: Vec<SupportedPaymentKind>,
}

/// One payment kind offered by the facilitator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedPaymentKind {
    /// Protocol version of the kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x402_version: Option<u8>,
    /// Scheme name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    /// Network name.
    pub network: String,
    /// Scheme-specific data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<SupportedPaymentKindExtra>,
}

/// The `extra` object of a [`SupportedPaymentKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedPaymentKindExtra {
    /// Fee payer the facilitator co-signs with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_payer: Option<String>,
}

impl SupportedResponse {
    /// First non-blank fee payer advertised for `network`.
    #[must_use]
    pub fn fee_payer_for(&self, network: Network) -> Option<&str> {
        self.kinds
            .iter()
            .filter(|kind| Network::from_invoice_network(&kind.network) == Some(network))
            .filter_map(|kind| kind.extra.as_ref()?.fee_payer.as_deref())
            .map(str::trim)
            .find(|fee_payer| !fee_payer.is_empty())
    }
}

/// Caches the `/supported` response for a fixed TTL.
#[derive(Debug, Clone)]
pub struct SupportedCache {
    ttl: Duration,
    entry: Arc<RwLock<Option<(Instant, SupportedResponse)>>>,
}

impl SupportedCache {
    /// Creates an empty cache. A zero TTL disables caching.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Arc::new(RwLock::new(None)),
        }
    }

    /// Returns the cached response if still fresh.
    pub async fn get(&self) -> Option<SupportedResponse> {
        let entry = self.entry.read().await;
        entry
            .as_ref()
            .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl)
            .map(|(_, response)| response.clone())
    }

    /// Stores a response.
    pub async fn set(&self, response: SupportedResponse) {
        if !self.ttl.is_zero() {
            *self.entry.write().await = Some((Instant::now(), response));
        }
    }
}

/// Client for the facilitator's `GET /supported`.
#[derive(Debug, Clone)]
pub struct FacilitatorClient {
    supported_url: Url,
    client: Client,
    supported_cache: SupportedCache,
}

impl FacilitatorClient {
    /// Default TTL for caching the supported endpoint response.
    pub const DEFAULT_SUPPORTED_CACHE_TTL: Duration = Duration::from_secs(600);

    /// Constructs a client for the facilitator at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the `./supported` URL cannot be built.
    pub fn try_new(base_url: &Url) -> Result<Self, Error> {
        Self::with_http_client(base_url, Client::new())
    }

    /// Constructs a client around a pre-configured `reqwest` client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the `./supported` URL cannot be built.
    pub fn with_http_client(base_url: &Url, client: Client) -> Result<Self, Error> {
        let mut base_url = base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let supported_url = base_url
            .join("./supported")
            .map_err(|e| Error::InvalidInput(format!("Failed to construct ./supported URL: {e}")))?;
        Ok(Self {
            supported_url,
            client,
            supported_cache: SupportedCache::new(Self::DEFAULT_SUPPORTED_CACHE_TTL),
        })
    }

    /// Returns the computed `./supported` URL.
    #[must_use]
    pub const fn supported_url(&self) -> &Url {
        &self.supported_url
    }

    /// Sends a `GET /supported` request, served from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] on request failure,
    /// [`Error::UnexpectedStatus`] on a non-success status and
    /// [`Error::Encoding`] if the body does not parse.
    pub async fn supported(&self) -> Result<SupportedResponse, Error> {
        if let Some(response) = self.supported_cache.get().await {
            return Ok(response);
        }

        let response = self
            .client
            .get(self.supported_url.clone())
            .send()
            .await
            .map_err(|e| Error::Transport(format!("GET /supported: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("GET /supported: {e}")))?;
        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }
        let supported: SupportedResponse = serde_json::from_str(&body)?;
        self.supported_cache.set(supported.clone()).await;
        Ok(supported)
    }
}

/// Picks the fee payer for an invoice: invoice, then override, then facilitator.
#[derive(Debug, Clone, Default)]
pub struct FeePayerResolver {
    fee_payer_override: Option<String>,
    facilitator: Option<FacilitatorClient>,
}

impl FeePayerResolver {
    /// Creates a resolver with no fallbacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resolver from the configured override and facilitator URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the facilitator URL is unusable.
    pub fn from_config(config: &ClientConfig, client: Client) -> Result<Self, Error> {
        let facilitator = FacilitatorClient::with_http_client(&config.facilitator_url, client)?;
        let mut resolver = Self::new().with_facilitator(facilitator);
        if let Some(fee_payer) = &config.fee_payer_override {
            resolver = resolver.with_override(fee_payer.clone());
        }
        Ok(resolver)
    }

    /// Fee payer used when the invoice names none.
    #[must_use]
    pub fn with_override(mut self, fee_payer: impl Into<String>) -> Self {
        let fee_payer = fee_payer.into();
        self.fee_payer_override = Some(fee_payer).filter(|s| !s.trim().is_empty());
        self
    }

    /// Facilitator consulted when neither invoice nor override names a fee payer.
    #[must_use]
    pub fn with_facilitator(mut self, facilitator: FacilitatorClient) -> Self {
        self.facilitator = Some(facilitator);
        self
    }

    /// Resolves the fee payer for `invoice`.
    ///
    /// A facilitator that cannot be reached counts as offering no fee payer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingFeePayer`] if no source names one.
    pub async fn resolve(&self, invoice: &Invoice) -> Result<String, Error> {
        if let Some(fee_payer) = invoice.declared_fee_payer() {
            return Ok(fee_payer.to_owned());
        }
        if let Some(fee_payer) = &self.fee_payer_override {
            tracing::debug!(fee_payer = %fee_payer, "Invoice names no fee payer, using override");
            return Ok(fee_payer.trim().to_owned());
        }
        let Some(facilitator) = &self.facilitator else {
            return Err(Error::MissingFeePayer);
        };
        let network = invoice.payment_network().unwrap_or_default();
        match facilitator.supported().await {
            Ok(supported) => supported
                .fee_payer_for(network)
                .map(str::to_owned)
                .ok_or(Error::MissingFeePayer),
            Err(err) => {
                tracing::warn!(error = %err, "Facilitator fee payer lookup failed");
                Err(Error::MissingFeePayer)
            }
        }
    }
}
