//! Transfer transaction assembly.
//!
//! The built transaction always has this layout:
//!
//! - Index 0: `SetComputeUnitLimit`
//! - Index 1: `SetComputeUnitPrice`
//! - Index 2: `CreateIdempotent` for the recipient's token account, only when
//!   it is missing and creation is enabled
//! - Last: `TransferChecked` (SPL Token or Token-2022)
//!
//! The fee payer is the message payer, so its signature slot is left empty
//! for the settlement counterparty. The builder never signs.

use solana_compute_budget_interface::ComputeBudgetInstruction;
use solana_instruction::{AccountMeta, Instruction};
use solana_message::VersionedMessage;
use solana_message::v0::Message as MessageV0;
use solana_pubkey::Pubkey;
use solana_transaction::versioned::VersionedTransaction;
use spl_token::solana_program::program_pack::Pack;
use spl_token_2022::extension::StateWithExtensions;

use crate::chain::{Address, RpcClientLike};
use crate::exact::{
    ATA_PROGRAM_PUBKEY, BuildError, CREATE_IDEMPOTENT_DISCRIMINATOR, SYSTEM_PROGRAM_PUBKEY,
    TransactionInt, associated_token_address,
};

/// Default compute unit limit.
pub const DEFAULT_COMPUTE_UNIT_LIMIT: u32 = 50_000;

/// Default compute unit price, in micro-lamports.
pub const DEFAULT_COMPUTE_UNIT_PRICE: u64 = 1;

/// Mint information for SPL tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mint {
    /// Standard SPL Token mint.
    Token {
        /// Number of decimal places.
        decimals: u8,
    },
    /// SPL Token-2022 mint.
    Token2022 {
        /// Number of decimal places.
        decimals: u8,
    },
}

impl Mint {
    /// Returns the token program that owns this mint.
    #[must_use]
    pub fn token_program(&self) -> Pubkey {
        match self {
            Self::Token { .. } => spl_token::id(),
            Self::Token2022 { .. } => spl_token_2022::id(),
        }
    }

    /// Decimal places of the token.
    #[must_use]
    pub const fn decimals(&self) -> u8 {
        match self {
            Self::Token { decimals } | Self::Token2022 { decimals } => *decimals,
        }
    }
}

/// Fetch mint information from the ledger.
///
/// Mints owned by neither token program are read as legacy SPL Token mints.
///
/// # Errors
///
/// Returns [`BuildError`] if the mint account cannot be fetched or parsed.
pub async fn fetch_mint<R: RpcClientLike + ?Sized>(
    mint_address: &Address,
    rpc_client: &R,
) -> Result<Mint, BuildError> {
    let mint_pubkey = mint_address.pubkey();
    let account = rpc_client.get_account(mint_pubkey).await.map_err(BuildError::Rpc)?;
    let unpack_error = |reason: String| BuildError::Mint {
        mint: *mint_pubkey,
        reason,
    };
    if account.owner == spl_token_2022::id() {
        let mint = StateWithExtensions::<spl_token_2022::state::Mint>::unpack(&account.data)
            .map_err(|e| unpack_error(e.to_string()))?;
        Ok(Mint::Token2022 {
            decimals: mint.base.decimals,
        })
    } else {
        if account.owner != spl_token::id() {
            tracing::warn!(
                mint = %mint_pubkey,
                owner = %account.owner,
                "Unknown mint owner, assuming SPL Token"
            );
        }
        let mint = spl_token::state::Mint::unpack(&account.data)
            .map_err(|e| unpack_error(e.to_string()))?;
        Ok(Mint::Token {
            decimals: mint.decimals,
        })
    }
}

/// What to transfer, from whom, to whom.
#[derive(Debug, Clone, Copy)]
pub struct TransferRequest {
    /// Token owner authorizing the transfer.
    pub payer: Pubkey,
    /// Account funding fees and account creation.
    pub fee_payer: Pubkey,
    /// Recipient wallet. Funds go to its associated token account.
    pub recipient: Address,
    /// Token mint.
    pub mint: Address,
    /// Atomic amount.
    pub amount: u64,
    /// Create the recipient's token account if it does not exist.
    pub create_destination_if_missing: bool,
}

/// Builds unsigned `TransferChecked` transactions.
#[derive(Debug, Clone)]
pub struct TransferBuilder<R> {
    rpc_client: R,
    compute_unit_limit: u32,
    compute_unit_price: u64,
}

impl<R: RpcClientLike> TransferBuilder<R> {
    /// Creates a builder with the default compute budget.
    pub const fn new(rpc_client: R) -> Self {
        Self {
            rpc_client,
            compute_unit_limit: DEFAULT_COMPUTE_UNIT_LIMIT,
            compute_unit_price: DEFAULT_COMPUTE_UNIT_PRICE,
        }
    }

    /// Overrides the compute unit limit.
    #[must_use]
    pub const fn with_compute_unit_limit(mut self, units: u32) -> Self {
        self.compute_unit_limit = units;
        self
    }

    /// Overrides the compute unit price, in micro-lamports.
    #[must_use]
    pub const fn with_compute_unit_price(mut self, micro_lamports: u64) -> Self {
        self.compute_unit_price = micro_lamports;
        self
    }

    /// Returns the RPC client.
    pub const fn rpc_client(&self) -> &R {
        &self.rpc_client
    }

    /// Builds the transfer transaction described by `request`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::MissingSourceAccount`] if the payer has no token
    /// account for the mint, or another [`BuildError`] on ledger or
    /// compilation failure.
    pub async fn build(&self, request: &TransferRequest) -> Result<TransactionInt, BuildError> {
        let mint = fetch_mint(&request.mint, &self.rpc_client).await?;
        let token_program = mint.token_program();
        let mint_pubkey = request.mint.pubkey();

        let source_ata = associated_token_address(&request.payer, &token_program, mint_pubkey);
        let destination_ata =
            associated_token_address(request.recipient.pubkey(), &token_program, mint_pubkey);

        let accounts = self
            .rpc_client
            .get_multiple_accounts(&[source_ata, destination_ata])
            .await
            .map_err(BuildError::Rpc)?;
        let exists = |i: usize| accounts.get(i).is_some_and(Option::is_some);
        if !exists(0) {
            return Err(BuildError::MissingSourceAccount(source_ata));
        }

        let mut instructions = Vec::with_capacity(4);
        instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(
            self.compute_unit_limit,
        ));
        instructions.push(ComputeBudgetInstruction::set_compute_unit_price(
            self.compute_unit_price,
        ));

        if !exists(1) {
            if request.create_destination_if_missing {
                instructions.push(create_idempotent_instruction(
                    &request.fee_payer,
                    &destination_ata,
                    request.recipient.pubkey(),
                    mint_pubkey,
                    &token_program,
                ));
            } else {
                tracing::warn!(
                    account = %destination_ata,
                    "Recipient token account missing, settlement will fail"
                );
            }
        }

        let transfer = match mint {
            Mint::Token { decimals } => spl_token::instruction::transfer_checked(
                &token_program,
                &source_ata,
                mint_pubkey,
                &destination_ata,
                &request.payer,
                &[],
                request.amount,
                decimals,
            ),
            Mint::Token2022 { decimals } => spl_token_2022::instruction::transfer_checked(
                &token_program,
                &source_ata,
                mint_pubkey,
                &destination_ata,
                &request.payer,
                &[],
                request.amount,
                decimals,
            ),
        }
        .map_err(|e| BuildError::Instruction(format!("{e}")))?;
        instructions.push(transfer);

        let recent_blockhash = self
            .rpc_client
            .get_latest_blockhash()
            .await
            .map_err(BuildError::Rpc)?;
        let message =
            MessageV0::try_compile(&request.fee_payer, &instructions, &[], recent_blockhash)
                .map_err(|e| BuildError::Compile(format!("{e:?}")))?;

        tracing::debug!(
            amount = request.amount,
            decimals = mint.decimals(),
            instructions = instructions.len(),
            "Built transfer transaction"
        );

        Ok(TransactionInt::new(VersionedTransaction {
            signatures: vec![],
            message: VersionedMessage::V0(message),
        }))
    }
}

/// `CreateIdempotent` for `owner`'s token account, funded by `funder`.
fn create_idempotent_instruction(
    funder: &Pubkey,
    ata: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
    token_program: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: ATA_PROGRAM_PUBKEY,
        accounts: vec![
            AccountMeta::new(*funder, true),
            AccountMeta::new(*ata, false),
            AccountMeta::new_readonly(*owner, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_PUBKEY, false),
            AccountMeta::new_readonly(*token_program, false),
        ],
        data: vec![CREATE_IDEMPOTENT_DISCRIMINATOR],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockLedger, unique_pubkey};

    const SET_COMPUTE_UNIT_LIMIT: u8 = 2;
    const SET_COMPUTE_UNIT_PRICE: u8 = 3;

    fn request(ledger: &MockLedger, create: bool) -> TransferRequest {
        TransferRequest {
            payer: ledger.payer,
            fee_payer: ledger.fee_payer,
            recipient: ledger.recipient.into(),
            mint: ledger.mint.into(),
            amount: 17_500,
            create_destination_if_missing: create,
        }
    }

    fn assert_compute_budget_prefix(tx: &TransactionInt) {
        for (index, discriminator) in [(0, SET_COMPUTE_UNIT_LIMIT), (1, SET_COMPUTE_UNIT_PRICE)] {
            let ix = tx.instruction(index).unwrap();
            assert_eq!(ix.program_id(), Some(solana_compute_budget_interface::ID));
            assert_eq!(ix.data().first(), Some(&discriminator));
        }
    }

    #[tokio::test]
    async fn compute_budget_leads_without_account_creation() {
        let ledger = MockLedger::with_token_accounts(true);
        let tx = TransferBuilder::new(ledger.clone()).build(&request(&ledger, true)).await.unwrap();

        assert_eq!(tx.instruction_count(), 3);
        assert_compute_budget_prefix(&tx);
        assert_eq!(tx.instruction(2).unwrap().program_id(), Some(spl_token::id()));
    }

    #[tokio::test]
    async fn compute_budget_leads_with_account_creation() {
        let ledger = MockLedger::with_token_accounts(false);
        let tx = TransferBuilder::new(ledger.clone()).build(&request(&ledger, true)).await.unwrap();

        assert_eq!(tx.instruction_count(), 4);
        assert_compute_budget_prefix(&tx);

        let create = tx.instruction(2).unwrap();
        assert_eq!(create.program_id(), Some(ATA_PROGRAM_PUBKEY));
        assert_eq!(create.data(), &[CREATE_IDEMPOTENT_DISCRIMINATOR]);
        assert_eq!(create.account(0), Some(ledger.fee_payer));
        assert_eq!(create.account(2), Some(ledger.recipient));
        assert_eq!(tx.instruction(3).unwrap().program_id(), Some(spl_token::id()));
    }

    #[tokio::test]
    async fn missing_destination_without_creation_still_builds() {
        let ledger = MockLedger::with_token_accounts(false);
        let tx = TransferBuilder::new(ledger.clone())
            .build(&request(&ledger, false))
            .await
            .unwrap();
        assert_eq!(tx.instruction_count(), 3);
    }

    #[tokio::test]
    async fn missing_source_account_is_reported() {
        let ledger = MockLedger::without_source();
        let err = TransferBuilder::new(ledger.clone())
            .build(&request(&ledger, true))
            .await
            .unwrap_err();
        let expected = associated_token_address(&ledger.payer, &spl_token::id(), &ledger.mint);
        assert!(matches!(err, BuildError::MissingSourceAccount(a) if a == expected));
    }

    #[tokio::test]
    async fn fee_payer_pays_and_payer_signs() {
        let ledger = MockLedger::with_token_accounts(true);
        let tx = TransferBuilder::new(ledger.clone())
            .with_compute_unit_limit(80_000)
            .build(&request(&ledger, true))
            .await
            .unwrap();

        assert_eq!(tx.fee_payer(), Some(ledger.fee_payer));
        assert_eq!(tx.inner().message.header().num_required_signatures, 2);
        assert!(tx.inner().signatures.is_empty());
        assert_eq!(tx.inner().message.recent_blockhash(), &ledger.blockhash);
    }

    #[tokio::test]
    async fn token_2022_mints_use_their_program() {
        let ledger = MockLedger::token_2022();
        let tx = TransferBuilder::new(ledger.clone()).build(&request(&ledger, true)).await.unwrap();
        assert_eq!(tx.instruction(2).unwrap().program_id(), Some(spl_token_2022::id()));
    }

    #[tokio::test]
    async fn mints_of_unknown_programs_fall_back_to_spl_token() {
        let ledger = MockLedger::new(unique_pubkey(), unique_pubkey(), true, true);

        let mint_address = Address::from(ledger.mint);
        let mint = fetch_mint(&mint_address, &ledger).await.unwrap();
        assert_eq!(mint, Mint::Token { decimals: 6 });

        let tx = TransferBuilder::new(ledger.clone()).build(&request(&ledger, true)).await.unwrap();
        assert_eq!(tx.instruction_count(), 3);
        assert_eq!(tx.instruction(2).unwrap().program_id(), Some(spl_token::id()));
    }
}
