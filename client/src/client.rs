use std::sync::Arc;

use tonkit_core::cell::{BagOfCells, CellId};
use tonkit_core::message::Transfer;
use tonkit_core::wallet::{TonWallet, WalletVersion};
use tonkit_core::{TonAddress, TonHash};

use crate::error::TonClientError;
use crate::transport::{AccountState, TonTransport};

/// Sends wallet messages through an injected [`TonTransport`].
#[derive(Clone)]
pub struct TonClient {
    transport: Arc<dyn TonTransport>,
}

impl TonClient {
    pub fn new(transport: Arc<dyn TonTransport>) -> TonClient {
        TonClient { transport }
    }

    pub fn transport(&self) -> &Arc<dyn TonTransport> {
        &self.transport
    }

    pub async fn get_account_state(
        &self,
        address: &TonAddress,
    ) -> Result<AccountState, TonClientError> {
        self.transport.get_account_state(address).await
    }

    /// Version of the wallet deployed at `address`, `None` for uninitialized accounts
    /// and unknown contracts.
    pub async fn get_wallet_version(
        &self,
        address: &TonAddress,
    ) -> Result<Option<WalletVersion>, TonClientError> {
        let state = self.get_account_state(address).await?;
        let Some(mut code) = state.code()? else {
            return Ok(None);
        };
        let root = code.single_root()?;
        Ok(WalletVersion::from_code_hash(&code.cell_hash(root)?))
    }

    /// Seqno stored in the wallet data, 0 when the wallet is not deployed yet.
    pub async fn get_wallet_seqno(&self, wallet: &TonWallet) -> Result<u32, TonClientError> {
        let state = self.get_account_state(&wallet.address).await?;
        match state.data()? {
            Some(data) => {
                let root = data.single_root()?;
                Ok(wallet.version.parse_data(&data, root)?.seqno)
            }
            None => Ok(0),
        }
    }

    /// Signs the transfers with the wallet key and broadcasts the external message.
    /// Returns the hash of the message.
    pub async fn send_transfer(
        &self,
        wallet: &TonWallet,
        transfers: &[Transfer],
        seqno: u32,
        expire_at: Option<u32>,
    ) -> Result<TonHash, TonClientError> {
        let mut boc = BagOfCells::new();
        let message = wallet.create_transfer_message(&mut boc, transfers, seqno, expire_at, false)?;
        self.send_message(boc, message, "transfer").await
    }

    /// Deploys the wallet contract without sending anything.
    pub async fn deploy_wallet(&self, wallet: &TonWallet) -> Result<TonHash, TonClientError> {
        let mut boc = BagOfCells::new();
        let message = wallet.create_init_external_message(&mut boc)?;
        self.send_message(boc, message, "deploy").await
    }

    async fn send_message(
        &self,
        mut boc: BagOfCells,
        message: CellId,
        kind: &str,
    ) -> Result<TonHash, TonClientError> {
        let hash = boc.cell_hash(message)?;
        let serialized = boc.serialize(true)?;
        log::debug!(
            "Sending {} message {} ({} bytes)",
            kind,
            hex::encode(hash),
            serialized.len()
        );
        self.transport.send_boc(&serialized).await?;
        Ok(hash)
    }
}
