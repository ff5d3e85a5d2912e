//! Pay-per-request content extraction.
//!
//! Every call is paid individually: there is no session, so each target
//! runs the full invoice → pay → fetch exchange.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;
use wirefeed::config::ClientConfig;
use wirefeed::proto::ExtractKind;
use wirefeed::{Error, InvoicePayer, Network};

use crate::facilitator::FeePayerResolver;
use crate::protocol::{Operation, PaymentProtocolClient, http_client};

/// Result of one target of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BatchOutcome {
    /// Extraction succeeded.
    Success {
        /// Target URL.
        url: String,
        /// Extracted content.
        result: serde_json::Value,
    },
    /// Extraction failed.
    Failure {
        /// Target URL.
        url: String,
        /// Error text.
        error: String,
    },
}

impl BatchOutcome {
    /// Returns `true` for [`BatchOutcome::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Client for the content extraction endpoints.
#[derive(Clone)]
pub struct ExtractionClient {
    protocol: PaymentProtocolClient,
    fee_payers: FeePayerResolver,
    payer: Option<Arc<dyn InvoicePayer>>,
    network: Network,
}

impl std::fmt::Debug for ExtractionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionClient")
            .field("base_url", &self.protocol.base_url().as_str())
            .field("network", &self.network)
            .field("has_payer", &self.payer.is_some())
            .finish_non_exhaustive()
    }
}

impl ExtractionClient {
    /// Creates a client without a payer.
    #[must_use]
    pub fn new(protocol: PaymentProtocolClient, fee_payers: FeePayerResolver) -> Self {
        Self {
            protocol,
            fee_payers,
            payer: None,
            network: Network::default(),
        }
    }

    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or facilitator URL is unusable.
    pub fn from_config(config: &ClientConfig) -> Result<Self, Error> {
        let client = http_client(config)?;
        let protocol =
            PaymentProtocolClient::with_http_client(config.api_url.clone(), client.clone());
        let fee_payers = FeePayerResolver::from_config(config, client)?;
        Ok(Self::new(protocol, fee_payers).with_network(config.network))
    }

    /// Sets the payer identity.
    #[must_use]
    pub fn with_payer(mut self, payer: Arc<dyn InvoicePayer>) -> Self {
        self.payer = Some(payer);
        self
    }

    /// Sets the network label sent with requests.
    #[must_use]
    pub const fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    /// Extracts structured content from `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a target that is not an absolute
    /// `http`/`https` URL, [`Error::MissingWallet`] without a payer and
    /// [`Error::UnsupportedNetwork`] when the payer settles on another
    /// network, all before any request is sent. Later failures come from the
    /// payment exchange.
    pub async fn extract(&self, kind: ExtractKind, url: &str) -> Result<serde_json::Value, Error> {
        let target = validate_target(url)?;
        let payer = self.payer.as_deref().ok_or(Error::MissingWallet)?;
        if payer.network() != self.network {
            return Err(Error::UnsupportedNetwork(self.network.to_string()));
        }

        let operation = Operation::Extract {
            kind,
            url: target,
            network: self.network,
        };
        tracing::info!(%kind, url, "Extracting");
        self.protocol.purchase(&operation, payer, &self.fee_payers).await
    }

    /// Extracts every target in order, one at a time.
    ///
    /// A failing target does not stop the batch.
    pub async fn batch_extract<S: AsRef<str>>(
        &self,
        kind: ExtractKind,
        targets: &[S],
    ) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            let url = target.as_ref();
            let outcome = match self.extract(kind, url).await {
                Ok(result) => BatchOutcome::Success {
                    url: url.to_owned(),
                    result,
                },
                Err(err) => {
                    tracing::warn!(url, error = %err, "Extraction failed");
                    BatchOutcome::Failure {
                        url: url.to_owned(),
                        error: err.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

/// Parses an extraction target.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] unless `url` is an absolute `http` or
/// `https` URL with a host.
pub fn validate_target(url: &str) -> Result<Url, Error> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| Error::InvalidInput(format!("'{url}' is not a URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(Error::InvalidInput(format!("'{url}' is not an http(s) URL")));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::X_PAYMENT_HEADER;
    use crate::testing::FixedPayer;
    use serde_json::json;
    use wiremock::matchers::{any, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ExtractionClient {
        let protocol = PaymentProtocolClient::new(server.uri().parse().unwrap());
        ExtractionClient::new(protocol, FeePayerResolver::new().with_override("Fee1"))
            .with_payer(Arc::new(FixedPayer::default()))
    }

    async fn refuse_all_requests(server: &MockServer) {
        Mock::given(any())
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(server)
            .await;
    }

    async fn mount_article(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/diffbot/article"))
            .and(header_exists(X_PAYMENT_HEADER))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "objects": [{ "title": "Hello" }] })),
            )
            .with_priority(1)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/diffbot/article"))
            .and(query_param("network", "sol"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "accepts": [{
                    "scheme": "exact",
                    "network": "solana",
                    "asset": "Mint1",
                    "payTo": "Addr1",
                    "maxAmountRequired": "2000"
                }]
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn not_a_url_fails_without_network_call() {
        let server = MockServer::start().await;
        refuse_all_requests(&server).await;

        let err = client(&server).extract(ExtractKind::Article, "not-a-url").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        let err = client(&server)
            .extract(ExtractKind::Image, "ftp://example.com/a.png")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn missing_payer_is_missing_wallet() {
        let server = MockServer::start().await;
        refuse_all_requests(&server).await;

        let protocol = PaymentProtocolClient::new(server.uri().parse().unwrap());
        let client = ExtractionClient::new(protocol, FeePayerResolver::new());
        let err = client
            .extract(ExtractKind::Product, "https://shop.example.com/p/1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingWallet));
    }

    #[tokio::test]
    async fn base_network_is_rejected_before_any_request() {
        let server = MockServer::start().await;
        refuse_all_requests(&server).await;

        let err = client(&server)
            .with_network(Network::Base)
            .extract(ExtractKind::Article, "https://news.example.com/a")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedNetwork(n) if n == "base"));
    }

    #[tokio::test]
    async fn paid_extraction_returns_the_body() {
        let server = MockServer::start().await;
        mount_article(&server).await;

        let payer = Arc::new(FixedPayer::default());
        let protocol = PaymentProtocolClient::new(server.uri().parse().unwrap());
        let client = ExtractionClient::new(protocol, FeePayerResolver::new().with_override("Fee1"))
            .with_payer(payer.clone());

        let result = client
            .extract(ExtractKind::Article, "https://news.example.com/a")
            .await
            .unwrap();
        assert_eq!(result["objects"][0]["title"], "Hello");
        assert_eq!(payer.paid(), vec![(2000, "Fee1".to_owned())]);
    }

    #[tokio::test]
    async fn batch_reports_each_target() {
        let server = MockServer::start().await;
        mount_article(&server).await;

        let outcomes = client(&server)
            .batch_extract(ExtractKind::Article, &["https://news.example.com/a", "nope"])
            .await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_success());
        assert!(matches!(&outcomes[1], BatchOutcome::Failure { url, .. } if url == "nope"));

        let json = serde_json::to_value(&outcomes[1]).unwrap();
        assert_eq!(json["status"], "failure");
    }
}
