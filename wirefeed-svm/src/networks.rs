//! Well-known Solana token deployments.

use solana_pubkey::{Pubkey, pubkey};

use crate::chain::Address;

/// A token mint on a Solana cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolanaTokenDeployment {
    /// x402 network name of the cluster.
    pub network: &'static str,
    /// Mint address.
    pub mint: Pubkey,
    /// Decimal places.
    pub decimals: u8,
}

impl SolanaTokenDeployment {
    /// The mint as an [`Address`].
    #[must_use]
    pub const fn address(&self) -> Address {
        Address::new(self.mint)
    }
}

/// Well-known USDC token deployments on Solana networks.
static USDC_DEPLOYMENTS: &[SolanaTokenDeployment] = &[
    // Native Circle USDC, SPL Token
    SolanaTokenDeployment {
        network: "solana",
        mint: pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"),
        decimals: 6,
    },
    SolanaTokenDeployment {
        network: "solana-devnet",
        mint: pubkey!("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU"),
        decimals: 6,
    },
];

/// USDC token deployments on Solana clusters.
#[derive(Debug, Clone, Copy)]
pub struct USDC;

impl USDC {
    /// Looks up the deployment for an x402 network name.
    #[must_use]
    pub fn on(network: &str) -> Option<&'static SolanaTokenDeployment> {
        USDC_DEPLOYMENTS.iter().find(|d| d.network == network)
    }

    /// All known deployments.
    #[must_use]
    pub const fn all() -> &'static [SolanaTokenDeployment] {
        USDC_DEPLOYMENTS
    }

    /// USDC on mainnet.
    #[must_use]
    pub const fn solana() -> &'static SolanaTokenDeployment {
        &USDC_DEPLOYMENTS[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_usdc_is_the_default_lookup() {
        assert_eq!(USDC::on("solana"), Some(USDC::solana()));
        assert_eq!(
            USDC::solana().address().to_string(),
            "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"
        );
        assert!(USDC::on("base").is_none());
    }
}
