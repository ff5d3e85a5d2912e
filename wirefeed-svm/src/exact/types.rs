//! Program ids and the transaction wrapper used by the payer.

use solana_message::compiled_instruction::CompiledInstruction;
use solana_pubkey::{Pubkey, pubkey};
use solana_signature::Signature;
use solana_signer::Signer;
use solana_transaction::versioned::VersionedTransaction;
use wirefeed::encoding::Base64Bytes;

use crate::exact::{TransactionSignError, TransactionToB64Error};

/// Associated Token Account program public key.
pub const ATA_PROGRAM_PUBKEY: Pubkey = pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// System program public key, required by associated account creation.
pub const SYSTEM_PROGRAM_PUBKEY: Pubkey = pubkey!("11111111111111111111111111111111");

/// `CreateIdempotent` discriminator of the associated token account program.
pub const CREATE_IDEMPOTENT_DISCRIMINATOR: u8 = 1;

/// Derives the associated token account of `owner` for `mint`.
#[must_use]
pub fn associated_token_address(owner: &Pubkey, token_program: &Pubkey, mint: &Pubkey) -> Pubkey {
    let (ata, _) = Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ATA_PROGRAM_PUBKEY,
    );
    ata
}

/// Compiled instruction with its index and resolved account keys.
#[derive(Debug)]
pub struct InstructionInt {
    index: usize,
    instruction: CompiledInstruction,
    account_keys: Vec<Pubkey>,
}

impl InstructionInt {
    /// Position of the instruction in the message.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Program invoked by the instruction.
    #[must_use]
    pub fn program_id(&self) -> Option<Pubkey> {
        self.account_keys
            .get(usize::from(self.instruction.program_id_index))
            .copied()
    }

    /// Raw instruction data.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.instruction.data
    }

    /// Account passed at `position` in the instruction's account list.
    #[must_use]
    pub fn account(&self, position: usize) -> Option<Pubkey> {
        let key_index = *self.instruction.accounts.get(position)?;
        self.account_keys.get(usize::from(key_index)).copied()
    }
}

/// Wrapper around a versioned Solana transaction with helper methods.
#[derive(Debug)]
pub struct TransactionInt {
    inner: VersionedTransaction,
}

impl TransactionInt {
    /// Creates a new transaction wrapper.
    #[must_use]
    pub const fn new(transaction: VersionedTransaction) -> Self {
        Self { inner: transaction }
    }

    /// Returns the inner transaction.
    #[must_use]
    pub const fn inner(&self) -> &VersionedTransaction {
        &self.inner
    }

    /// Number of instructions in the message.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.inner.message.instructions().len()
    }

    /// Returns the instruction at the given index.
    #[must_use]
    pub fn instruction(&self, index: usize) -> Option<InstructionInt> {
        let instruction = self.inner.message.instructions().get(index).cloned()?;
        let account_keys = self.inner.message.static_account_keys().to_vec();
        Some(InstructionInt {
            index,
            instruction,
            account_keys,
        })
    }

    /// The account paying transaction fees.
    #[must_use]
    pub fn fee_payer(&self) -> Option<Pubkey> {
        self.inner.message.static_account_keys().first().copied()
    }

    /// Checks if every required signature slot is filled.
    #[must_use]
    pub fn is_fully_signed(&self) -> bool {
        let num_required = self.inner.message.header().num_required_signatures;
        if self.inner.signatures.len() < num_required as usize {
            return false;
        }
        let default = Signature::default();
        self.inner.signatures.iter().all(|signature| *signature != default)
    }

    /// Signs the transaction with any Signer, leaving other slots untouched.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionSignError`] if the signer is not in the required signers list.
    pub fn sign_with_keypair<S: Signer + ?Sized>(
        self,
        signer: &S,
    ) -> Result<Self, TransactionSignError> {
        let mut tx = self.inner;
        let msg_bytes = tx.message.serialize();
        let signature = signer
            .try_sign_message(msg_bytes.as_slice())
            .map_err(|e| TransactionSignError(format!("{e}")))?;

        let num_required = tx.message.header().num_required_signatures as usize;
        let static_keys = tx.message.static_account_keys();

        let pos = static_keys
            .iter()
            .take(num_required)
            .position(|k| *k == signer.pubkey())
            .ok_or_else(|| {
                TransactionSignError("Signer not found in required signers".to_string())
            })?;

        if tx.signatures.len() < num_required {
            tx.signatures.resize(num_required, Signature::default());
        }
        tx.signatures[pos] = signature;
        Ok(Self { inner: tx })
    }

    /// Encodes the transaction to base64.
    ///
    /// # Errors
    ///
    /// Returns [`TransactionToB64Error`] if serialization fails.
    pub fn as_base64(&self) -> Result<String, TransactionToB64Error> {
        let bytes = bincode::serialize(&self.inner)
            .map_err(|e| TransactionToB64Error(format!("{e}")))?;
        Ok(Base64Bytes::encode(bytes).as_text())
    }

    /// Decodes a base64 transaction, as carried in a payment payload.
    ///
    /// # Errors
    ///
    /// Returns [`wirefeed::Error::Encoding`] on base64 or bincode failure.
    pub fn from_base64(encoded: &str) -> Result<Self, wirefeed::Error> {
        let bytes = Base64Bytes::from(encoded).decode()?;
        let inner: VersionedTransaction =
            bincode::deserialize(&bytes).map_err(|e| wirefeed::Error::Encoding(format!("{e}")))?;
        Ok(Self { inner })
    }
}
