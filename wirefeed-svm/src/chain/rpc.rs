use async_trait::async_trait;
use solana_account::Account;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_message::Hash;
use solana_pubkey::Pubkey;
use std::sync::Arc;

use wirefeed::Error;

/// The JSON-RPC reads needed to assemble a transfer.
///
/// Implemented for the nonblocking [`RpcClient`]; tests substitute an
/// in-memory ledger.
#[async_trait]
pub trait RpcClientLike: Send + Sync {
    /// Fetches one account. Missing accounts are an error.
    async fn get_account(&self, pubkey: &Pubkey) -> Result<Account, Error>;

    /// Fetches several accounts, `None` for each that does not exist.
    async fn get_multiple_accounts(
        &self,
        pubkeys: &[Pubkey],
    ) -> Result<Vec<Option<Account>>, Error>;

    /// Latest blockhash for transaction recency.
    async fn get_latest_blockhash(&self) -> Result<Hash, Error>;
}

#[async_trait]
impl RpcClientLike for RpcClient {
    async fn get_account(&self, pubkey: &Pubkey) -> Result<Account, Error> {
        Self::get_account(self, pubkey)
            .await
            .map_err(|e| Error::Rpc(format!("get_account {pubkey}: {e}")))
    }

    async fn get_multiple_accounts(
        &self,
        pubkeys: &[Pubkey],
    ) -> Result<Vec<Option<Account>>, Error> {
        Self::get_multiple_accounts(self, pubkeys)
            .await
            .map_err(|e| Error::Rpc(format!("get_multiple_accounts: {e}")))
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, Error> {
        Self::get_latest_blockhash(self)
            .await
            .map_err(|e| Error::Rpc(format!("get_latest_blockhash: {e}")))
    }
}

#[async_trait]
impl<T: RpcClientLike + ?Sized> RpcClientLike for Arc<T> {
    async fn get_account(&self, pubkey: &Pubkey) -> Result<Account, Error> {
        (**self).get_account(pubkey).await
    }

    async fn get_multiple_accounts(
        &self,
        pubkeys: &[Pubkey],
    ) -> Result<Vec<Option<Account>>, Error> {
        (**self).get_multiple_accounts(pubkeys).await
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, Error> {
        (**self).get_latest_blockhash().await
    }
}
