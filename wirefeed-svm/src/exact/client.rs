//! Payer-side signing for the Solana "exact" scheme.
//!
//! [`SolanaInvoicePayer`] turns an [`Invoice`] into a [`PaymentHeader`]:
//! it builds the transfer with [`TransferBuilder`], signs the payer's slot
//! and wraps the base64 transaction in a version 1 payment payload.

use async_trait::async_trait;
use solana_signer::Signer;
use wirefeed::proto::{ExactScheme, PaymentPayload};
use wirefeed::{Error, Invoice, InvoicePayer, Network, PaymentHeader};

use crate::chain::{Address, RpcClientLike};
use crate::exact::builder::{TransferBuilder, TransferRequest};
use crate::exact::TransactionInt;

/// Pays invoices with SPL token transfers signed by `S`.
pub struct SolanaInvoicePayer<S, R> {
    signer: S,
    builder: TransferBuilder<R>,
    create_destination_account: bool,
    default_mint: Option<Address>,
}

impl<S, R> std::fmt::Debug for SolanaInvoicePayer<S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaInvoicePayer")
            .field("create_destination_account", &self.create_destination_account)
            .field("default_mint", &self.default_mint)
            .finish_non_exhaustive()
    }
}

impl<S, R> SolanaInvoicePayer<S, R>
where
    S: Signer + Send + Sync,
    R: RpcClientLike,
{
    /// Creates a payer with a default-budget builder over `rpc_client`.
    pub const fn new(signer: S, rpc_client: R) -> Self {
        Self::with_builder(signer, TransferBuilder::new(rpc_client))
    }

    /// Creates a payer around a configured builder.
    pub const fn with_builder(signer: S, builder: TransferBuilder<R>) -> Self {
        Self {
            signer,
            builder,
            create_destination_account: true,
            default_mint: None,
        }
    }

    /// Whether to create a missing recipient token account. Defaults to `true`.
    #[must_use]
    pub const fn with_create_destination_account(mut self, create: bool) -> Self {
        self.create_destination_account = create;
        self
    }

    /// Mint used when an invoice leaves `asset` empty.
    #[must_use]
    pub const fn with_default_mint(mut self, mint: Address) -> Self {
        self.default_mint = Some(mint);
        self
    }

    /// Builds and signs the transaction paying `invoice` in full.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedNetwork`] for non-Solana invoices,
    /// [`Error::InvalidInvoice`] for unusable fields, and build or signing
    /// errors otherwise.
    pub async fn sign_invoice(
        &self,
        invoice: &Invoice,
        fee_payer: &str,
    ) -> Result<TransactionInt, Error> {
        if invoice.payment_network() != Some(Network::Sol) {
            return Err(Error::UnsupportedNetwork(invoice.network.clone()));
        }
        if invoice.scheme != ExactScheme::VALUE {
            return Err(Error::InvalidInvoice(format!("unsupported scheme '{}'", invoice.scheme)));
        }

        let mint = if invoice.asset.trim().is_empty() {
            self.default_mint
                .ok_or_else(|| Error::InvalidInvoice("invoice names no asset".to_owned()))?
        } else {
            Address::parse_field("asset", &invoice.asset)?
        };
        let request = TransferRequest {
            payer: self.signer.pubkey(),
            fee_payer: *Address::parse_field("feePayer", fee_payer)?.pubkey(),
            recipient: Address::parse_field("payTo", &invoice.pay_to)?,
            mint,
            amount: invoice.amount(),
            create_destination_if_missing: self.create_destination_account,
        };

        let tx = self.builder.build(&request).await?;
        Ok(tx.sign_with_keypair(&self.signer)?)
    }
}

#[async_trait]
impl<S, R> InvoicePayer for SolanaInvoicePayer<S, R>
where
    S: Signer + Send + Sync,
    R: RpcClientLike,
{
    fn payer_address(&self) -> String {
        self.signer.pubkey().to_string()
    }

    fn network(&self) -> Network {
        Network::Sol
    }

    async fn pay(&self, invoice: &Invoice, fee_payer: &str) -> Result<PaymentHeader, Error> {
        let signed = self.sign_invoice(invoice, fee_payer).await?;
        let tx_b64 = signed.as_base64()?;
        tracing::info!(
            amount = invoice.amount(),
            pay_to = %invoice.pay_to,
            fee_payer,
            "Signed payment transaction"
        );
        PaymentHeader::encode(&PaymentPayload::solana(tx_b64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::associated_token_address;
    use crate::testing::MockLedger;
    use serde_json::json;
    use solana_keypair::Keypair;
    use solana_signature::Signature;
    use spl_token::instruction::TokenInstruction;

    fn invoice(ledger: &MockLedger, network: &str) -> Invoice {
        Invoice::from_payment_required(json!({
            "accepts": [{
                "scheme": "exact",
                "network": network,
                "asset": ledger.mint.to_string(),
                "payTo": ledger.recipient.to_string(),
                "maxAmountRequired": "17500"
            }]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn header_carries_the_exact_invoice_amount() {
        let payer = Keypair::new();
        let ledger = MockLedger::new(payer.pubkey(), spl_token::id(), true, true);
        let invoice = invoice(&ledger, "solana");
        let fee_payer = ledger.fee_payer.to_string();
        let client = SolanaInvoicePayer::new(payer, ledger.clone());

        let header = client.pay(&invoice, &fee_payer).await.unwrap();
        let payload = header.decode().unwrap();
        assert_eq!(payload.network, "solana");
        assert_eq!(payload.scheme.as_ref(), "exact");

        let tx = TransactionInt::from_base64(&payload.payload.transaction).unwrap();
        let transfer = tx.instruction(tx.instruction_count() - 1).unwrap();
        assert_eq!(
            TokenInstruction::unpack(transfer.data()).unwrap(),
            TokenInstruction::TransferChecked {
                amount: 17_500,
                decimals: 6
            }
        );
        assert_eq!(transfer.account(1), Some(ledger.mint));
        assert_eq!(
            transfer.account(2),
            Some(associated_token_address(&ledger.recipient, &spl_token::id(), &ledger.mint))
        );

        let resigned = client.sign_invoice(&invoice, &fee_payer).await.unwrap();
        assert_eq!(payload.payload.transaction, resigned.as_base64().unwrap());
    }

    #[tokio::test]
    async fn only_the_payer_slot_is_signed() {
        let payer = Keypair::new();
        let ledger = MockLedger::new(payer.pubkey(), spl_token::id(), true, false);
        let invoice = invoice(&ledger, "solana-devnet");
        let client = SolanaInvoicePayer::new(payer, ledger.clone());

        let tx = client.sign_invoice(&invoice, &ledger.fee_payer.to_string()).await.unwrap();
        assert!(!tx.is_fully_signed());
        assert_eq!(tx.inner().signatures[0], Signature::default());
        assert_ne!(tx.inner().signatures[1], Signature::default());
    }

    #[tokio::test]
    async fn base_invoices_are_rejected() {
        let payer = Keypair::new();
        let ledger = MockLedger::new(payer.pubkey(), spl_token::id(), true, true);
        let client = SolanaInvoicePayer::new(payer, ledger.clone());

        let err = client
            .pay(&invoice(&ledger, "base"), &ledger.fee_payer.to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedNetwork(n) if n == "base"));
    }

    #[tokio::test]
    async fn malformed_fee_payer_is_an_invalid_invoice() {
        let payer = Keypair::new();
        let ledger = MockLedger::new(payer.pubkey(), spl_token::id(), true, true);
        let client = SolanaInvoicePayer::new(payer, ledger.clone());

        let err = client.pay(&invoice(&ledger, "solana"), "Fee1!").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInvoice(msg) if msg.contains("feePayer")));
    }

    #[tokio::test]
    async fn empty_asset_falls_back_to_default_mint() {
        let payer = Keypair::new();
        let ledger = MockLedger::new(payer.pubkey(), spl_token::id(), true, true);
        let mut invoice = invoice(&ledger, "solana");
        invoice.asset = String::new();
        let client =
            SolanaInvoicePayer::new(payer, ledger.clone()).with_default_mint(ledger.mint.into());

        assert!(client.pay(&invoice, &ledger.fee_payer.to_string()).await.is_ok());
    }
}
