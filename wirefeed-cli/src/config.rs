//! Command-line options.
//!
//! Every option can also be set through the environment variable named in
//! its help text; a `.env` file in the working directory is loaded first.
//!
//! # Environment Variables
//!
//! - `WIREFEED_API_URL` - Vendor API base URL
//! - `WIREFEED_STREAM_URL` - Stream URL, derived from the API URL when unset
//! - `SOLANA_RPC_URL` - Solana JSON-RPC endpoint
//! - `WIREFEED_TOKEN_MINT` - Mint paid when an invoice names none (USDC by default)
//! - `WIREFEED_FEE_PAYER` - Fee payer used when an invoice names none
//! - `FACILITATOR_URL` - Facilitator consulted for the fee payer
//! - `WIREFEED_WALLET` - Keypair file path, JSON byte array or base58 secret
//! - `WIREFEED_DURATION_MIN` - Minutes bought per session purchase
//! - `WIREFEED_RENEWAL_ATTEMPTS` - Renewal attempts before giving up
//! - `WIREFEED_RENEWAL_BASE_DELAY_MS` - Delay after the first failed renewal
//! - `WIREFEED_NETWORK` - Network label for extraction requests (`sol`, `base`)

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use solana_client::nonblocking::rpc_client::RpcClient;
use url::Url;
use wirefeed::config::{
    ClientConfig, DEFAULT_API_URL, DEFAULT_DURATION_MINUTES, DEFAULT_FACILITATOR_URL,
    DEFAULT_RPC_URL, RenewalConfig,
};
use wirefeed::proto::ExtractKind;
use wirefeed::{Error, InvoicePayer, Network};
use wirefeed_svm::{SolanaInvoicePayer, USDC};
use wirefeed_svm::chain::Address;
use wirefeed_svm::wallet;

/// Pay-per-use news stream and content extraction over x402.
#[derive(Debug, Parser)]
#[command(name = "wirefeed", version, about)]
pub struct Cli {
    /// Client settings.
    #[command(flatten)]
    pub client: ClientArgs,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream news, renewing the session before it expires.
    Stream {
        /// Forward posts and articles to this chat webhook.
        #[arg(long, env = "WIREFEED_WEBHOOK_URL")]
        webhook: Option<Url>,
    },
    /// Extract structured content from one page.
    Extract {
        /// Kind of content.
        #[arg(value_enum)]
        kind: ExtractKind,
        /// Page URL.
        url: String,
    },
    /// Extract structured content from several pages, one after another.
    Batch {
        /// Kind of content.
        #[arg(value_enum)]
        kind: ExtractKind,
        /// Page URLs.
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

/// Options shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct ClientArgs {
    /// Vendor API base URL.
    #[arg(long, env = "WIREFEED_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: Url,

    /// Stream URL. Derived from the API URL when unset.
    #[arg(long, env = "WIREFEED_STREAM_URL", global = true)]
    pub stream_url: Option<Url>,

    /// Solana JSON-RPC endpoint.
    #[arg(long, env = "SOLANA_RPC_URL", default_value = DEFAULT_RPC_URL, global = true)]
    pub rpc_url: Url,

    /// Token mint paid when an invoice names none.
    #[arg(long, env = "WIREFEED_TOKEN_MINT", global = true)]
    pub token_mint: Option<String>,

    /// Fee payer used when an invoice names none.
    #[arg(long, env = "WIREFEED_FEE_PAYER", global = true)]
    pub fee_payer: Option<String>,

    /// Facilitator consulted for the fee payer.
    #[arg(long, env = "FACILITATOR_URL", default_value = DEFAULT_FACILITATOR_URL, global = true)]
    pub facilitator_url: Url,

    /// Keypair file path, JSON byte array or base58 secret.
    #[arg(long, env = "WIREFEED_WALLET", hide_env_values = true, global = true)]
    pub wallet: Option<String>,

    /// Minutes bought per session purchase.
    #[arg(
        long,
        env = "WIREFEED_DURATION_MIN",
        default_value_t = DEFAULT_DURATION_MINUTES,
        global = true
    )]
    pub duration_min: u64,

    /// Renewal attempts before giving up.
    #[arg(
        long,
        env = "WIREFEED_RENEWAL_ATTEMPTS",
        default_value_t = RenewalConfig::default().max_attempts,
        global = true
    )]
    pub renewal_attempts: u32,

    /// Delay after the first failed renewal, doubled after each further failure.
    #[arg(
        long,
        env = "WIREFEED_RENEWAL_BASE_DELAY_MS",
        default_value_t = RenewalConfig::default().base_delay_ms,
        global = true
    )]
    pub renewal_base_delay_ms: u64,

    /// Network label for extraction requests.
    #[arg(
        long,
        env = "WIREFEED_NETWORK",
        value_enum,
        default_value_t = Network::Sol,
        global = true
    )]
    pub network: Network,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, env = "WIREFEED_HTTP_TIMEOUT_SECS", global = true)]
    pub http_timeout_secs: Option<u64>,

    /// Fail instead of creating the recipient's token account.
    #[arg(long, global = true)]
    pub no_create_destination: bool,
}

impl ClientArgs {
    /// Resolves the options into a client configuration.
    #[must_use]
    pub fn into_config(self) -> ClientConfig {
        let mut config = ClientConfig::new(self.api_url)
            .with_duration_minutes(self.duration_min)
            .with_renewal(RenewalConfig {
                max_attempts: self.renewal_attempts,
                base_delay_ms: self.renewal_base_delay_ms,
            });
        config.stream_url = self.stream_url;
        config.rpc_url = self.rpc_url;
        config.facilitator_url = self.facilitator_url;
        config.token_mint = non_blank(self.token_mint);
        config.fee_payer_override = non_blank(self.fee_payer);
        config.wallet = non_blank(self.wallet);
        config.network = self.network;
        config.http_timeout_secs = self.http_timeout_secs;
        config.create_destination_account = !self.no_create_destination;
        config
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Builds the Solana payer from the configured wallet.
///
/// Returns `None` when no wallet is configured; paid operations then fail
/// with [`Error::MissingWallet`].
///
/// # Errors
///
/// Returns [`Error::Wallet`] for unreadable key material and
/// [`Error::InvalidInput`] for a malformed default mint.
pub fn payer(config: &ClientConfig) -> Result<Option<Arc<dyn InvoicePayer>>, Error> {
    let Some(source) = config.wallet.as_deref() else {
        return Ok(None);
    };
    let keypair = wallet::load_keypair(source)?;
    let rpc = RpcClient::new(config.rpc_url.to_string());
    let mint = match &config.token_mint {
        Some(mint) => mint.trim().parse::<Address>().map_err(|_| {
            Error::InvalidInput(format!("token mint is not a Solana address: '{mint}'"))
        })?,
        None => USDC::solana().address(),
    };
    let payer = SolanaInvoicePayer::new(keypair, rpc)
        .with_create_destination_account(config.create_destination_account)
        .with_default_mint(mint);
    tracing::info!(payer = %payer.payer_address(), rpc = %config.rpc_url, %mint, "Wallet loaded");
    Ok(Some(Arc::new(payer)))
}
