//! The two-step x402 exchange with the vendor API.
//!
//! Every paid operation is sent twice: first without payment, expecting
//! `402 Payment Required` and an [`Invoice`], then with an `X-PAYMENT`
//! header, expecting `200` and the paid resource.

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;
use wirefeed::config::ClientConfig;
use wirefeed::proto::ExtractKind;
use wirefeed::{Error, Invoice, InvoicePayer, Network, PaymentHeader};

use crate::constants::{
    HTTP_STATUS_PAYMENT_REQUIRED, SETTLEMENT_FAILURE_MARKERS, X_PAYMENT_HEADER, X_SESSION_HEADER,
};
use crate::facilitator::FeePayerResolver;

/// A paid operation on the vendor API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Open a new stream session.
    Connect {
        /// Minutes to buy.
        duration_minutes: u64,
    },
    /// Extend the current session.
    Extend {
        /// Minutes to buy.
        duration_minutes: u64,
        /// Token of the session being extended.
        access_token: String,
    },
    /// Extract structured content from one page.
    Extract {
        /// Extraction endpoint.
        kind: ExtractKind,
        /// Page to extract.
        url: Url,
        /// Network label for the request.
        network: Network,
    },
}

impl Operation {
    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Extend { .. } => "extend",
            Self::Extract { .. } => "extract",
        }
    }

    fn path(&self) -> String {
        match self {
            Self::Connect { .. } => "connect".to_owned(),
            Self::Extend { .. } => "extend".to_owned(),
            Self::Extract { kind, .. } => format!("diffbot/{kind}"),
        }
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Connect { duration_minutes } | Self::Extend { duration_minutes, .. } => vec![
                ("duration_min", duration_minutes.to_string()),
                ("network", Network::Sol.query_label().to_owned()),
            ],
            Self::Extract { url, network, .. } => vec![
                ("url", url.to_string()),
                ("network", network.query_label().to_owned()),
            ],
        }
    }

    const fn session_token(&self) -> Option<&str> {
        match self {
            Self::Extend { access_token, .. } => Some(access_token.as_str()),
            _ => None,
        }
    }
}

/// Returns the settlement failure marker found in `err`, if any.
///
/// Only used to label log lines; retry decisions do not depend on it.
#[must_use]
pub fn settlement_failure_marker(err: &Error) -> Option<&'static str> {
    let text = err.to_string().to_ascii_lowercase();
    SETTLEMENT_FAILURE_MARKERS
        .iter()
        .copied()
        .find(|marker| text.contains(marker))
}

/// Client for the invoice and payment requests of the vendor API.
#[derive(Debug, Clone)]
pub struct PaymentProtocolClient {
    base_url: Url,
    client: Client,
}

impl PaymentProtocolClient {
    /// Creates a client with a default `reqwest` client.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self::with_http_client(base_url, Client::new())
    }

    /// Creates a client around a pre-configured `reqwest` client.
    #[must_use]
    pub fn with_http_client(mut base_url: Url, client: Client) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { base_url, client }
    }

    /// Creates a client honoring the configured API URL and timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, Error> {
        Ok(Self::with_http_client(config.api_url.clone(), http_client(config)?))
    }

    /// Returns the API base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Full URL of `operation`, query included.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the path cannot be joined to the base URL.
    pub fn endpoint(&self, operation: &Operation) -> Result<Url, Error> {
        let mut url = self
            .base_url
            .join(&operation.path())
            .map_err(|e| {
                Error::InvalidInput(format!("can not build {} URL: {e}", operation.name()))
            })?;
        url.query_pairs_mut().extend_pairs(operation.query());
        Ok(url)
    }

    fn request(&self, operation: &Operation) -> Result<RequestBuilder, Error> {
        let mut request = self.client.post(self.endpoint(operation)?);
        if let Some(token) = operation.session_token() {
            request = request.header(X_SESSION_HEADER, token);
        }
        Ok(request)
    }

    /// Sends `operation` unpaid and returns the invoice from the 402 response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedStatus`] for any status other than 402,
    /// [`Error::InvalidInvoice`] if the body holds no usable invoice and
    /// [`Error::Transport`] if the request fails.
    pub async fn request_invoice(&self, operation: &Operation) -> Result<Invoice, Error> {
        let response = self.request(operation)?.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if status.as_u16() != HTTP_STATUS_PAYMENT_REQUIRED {
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }
        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| Error::InvalidInvoice(format!("402 body is not JSON: {e}")))?;
        let invoice = Invoice::from_payment_required(value)?;
        tracing::debug!(
            operation = operation.name(),
            amount = invoice.amount(),
            network = %invoice.network,
            "Received invoice"
        );
        Ok(invoice)
    }

    /// Sends `operation` with `payment` and decodes the 200 response body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnexpectedStatus`] unless the server answers 200 with
    /// a JSON body of type `T`, and [`Error::Transport`] if the request fails.
    pub async fn submit_payment<T: DeserializeOwned>(
        &self,
        operation: &Operation,
        payment: PaymentHeader,
    ) -> Result<T, Error> {
        let response = self
            .request(operation)?
            .header(X_PAYMENT_HEADER, payment.value())
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if status != StatusCode::OK {
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|_| Error::UnexpectedStatus {
            status: status.as_u16(),
            body,
        })
    }

    /// Runs the whole exchange: invoice, fee payer, payment, resource.
    ///
    /// # Errors
    ///
    /// Returns the first error of any step.
    pub async fn purchase<T: DeserializeOwned>(
        &self,
        operation: &Operation,
        payer: &dyn InvoicePayer,
        fee_payers: &FeePayerResolver,
    ) -> Result<T, Error> {
        let invoice = self.request_invoice(operation).await?;
        let fee_payer = fee_payers.resolve(&invoice).await?;
        let header = payer.pay(&invoice, &fee_payer).await?;
        let result = self.submit_payment(operation, header).await;
        if let Err(err) = &result
            && let Some(marker) = settlement_failure_marker(err)
        {
            tracing::warn!(operation = operation.name(), marker, "Payment rejected at settlement");
        }
        result
    }
}

/// Builds the shared `reqwest` client for `config`.
///
/// # Errors
///
/// Returns [`Error::Transport`] if the TLS backend cannot be initialized.
pub fn http_client(config: &ClientConfig) -> Result<Client, Error> {
    let mut builder = Client::builder();
    if let Some(timeout) = config.http_timeout() {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| Error::Transport(format!("can not build HTTP client: {e}")))
}

fn transport_error(e: reqwest::Error) -> Error {
    Error::Transport(e.to_string())
}
