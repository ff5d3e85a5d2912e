use async_trait::async_trait;
use solana_account::Account;
use solana_keypair::Keypair;
use solana_message::Hash;
use solana_pubkey::Pubkey;
use solana_signer::Signer;
use spl_token::solana_program::program_option::COption;
use spl_token::solana_program::program_pack::Pack;
use std::collections::HashMap;
use std::sync::Arc;

use crate::chain::RpcClientLike;
use crate::exact::associated_token_address;

pub fn unique_pubkey() -> Pubkey {
    Keypair::new().pubkey()
}

/// In-memory ledger holding one mint and up to two token accounts.
#[derive(Debug, Clone)]
pub struct MockLedger {
    pub payer: Pubkey,
    pub fee_payer: Pubkey,
    pub recipient: Pubkey,
    pub mint: Pubkey,
    pub blockhash: Hash,
    accounts: Arc<HashMap<Pubkey, Account>>,
}

impl MockLedger {
    pub fn new(payer: Pubkey, mint_owner: Pubkey, source: bool, destination: bool) -> Self {
        let fee_payer = unique_pubkey();
        let recipient = unique_pubkey();
        let mint = unique_pubkey();

        let mut data = vec![0; spl_token::state::Mint::LEN];
        spl_token::state::Mint::pack(
            spl_token::state::Mint {
                mint_authority: COption::None,
                supply: 1_000_000_000,
                decimals: 6,
                is_initialized: true,
                freeze_authority: COption::None,
            },
            &mut data,
        )
        .unwrap();

        let mut accounts = HashMap::new();
        accounts.insert(mint, account(mint_owner, data));
        let token_program = if mint_owner == spl_token_2022::id() {
            spl_token_2022::id()
        } else {
            spl_token::id()
        };
        if source {
            let ata = associated_token_address(&payer, &token_program, &mint);
            accounts.insert(ata, account(token_program, vec![0; 165]));
        }
        if destination {
            let ata = associated_token_address(&recipient, &token_program, &mint);
            accounts.insert(ata, account(token_program, vec![0; 165]));
        }

        Self {
            payer,
            fee_payer,
            recipient,
            mint,
            blockhash: Hash::new_from_array([7; 32]),
            accounts: Arc::new(accounts),
        }
    }

    pub fn with_token_accounts(destination: bool) -> Self {
        Self::new(unique_pubkey(), spl_token::id(), true, destination)
    }

    pub fn without_source() -> Self {
        Self::new(unique_pubkey(), spl_token::id(), false, true)
    }

    pub fn token_2022() -> Self {
        Self::new(unique_pubkey(), spl_token_2022::id(), true, true)
    }
}

fn account(owner: Pubkey, data: Vec<u8>) -> Account {
    Account {
        lamports: 2_039_280,
        data,
        owner,
        executable: false,
        rent_epoch: 0,
    }
}

#[async_trait]
impl RpcClientLike for MockLedger {
    async fn get_account(&self, pubkey: &Pubkey) -> Result<Account, wirefeed::Error> {
        self.accounts
            .get(pubkey)
            .cloned()
            .ok_or_else(|| wirefeed::Error::Rpc(format!("AccountNotFound: pubkey={pubkey}")))
    }

    async fn get_multiple_accounts(
        &self,
        pubkeys: &[Pubkey],
    ) -> Result<Vec<Option<Account>>, wirefeed::Error> {
        Ok(pubkeys.iter().map(|k| self.accounts.get(k).cloned()).collect())
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, wirefeed::Error> {
        Ok(self.blockhash)
    }
}
