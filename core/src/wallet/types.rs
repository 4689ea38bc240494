use std::fmt::{Debug, Formatter};

use nacl::sign::generate_keypair;

use crate::cell::{BagOfCells, Cell, CellId, TonCellError};
use crate::message::TonMessageError;
use crate::types::{TonHash, TON_HASH_BYTES, ZERO_HASH};
use crate::wallet::DataLayout;

pub const ED25519_SEED_BYTES: usize = 32;

#[derive(PartialEq, Eq, Clone, Hash)]
pub struct KeyPair {
    pub public_key: Vec<u8>,
    pub secret_key: Vec<u8>,
}

impl KeyPair {
    /// Ed25519 key pair from a 32-byte seed.
    pub fn from_seed(seed: &[u8]) -> Result<KeyPair, TonMessageError> {
        if seed.len() != ED25519_SEED_BYTES {
            return Err(TonMessageError::NaclCryptographicError(format!(
                "Seed must be {} bytes, got {}",
                ED25519_SEED_BYTES,
                seed.len()
            )));
        }
        let key_pair = generate_keypair(seed);
        Ok(KeyPair {
            public_key: key_pair.pkey.to_vec(),
            secret_key: key_pair.skey.to_vec(),
        })
    }

    pub fn public_key_hash(&self) -> Result<TonHash, TonMessageError> {
        TonHash::try_from(self.public_key.as_slice()).map_err(|_| {
            TonMessageError::NaclCryptographicError(format!(
                "Public key must be {} bytes, got {}",
                TON_HASH_BYTES,
                self.public_key.len()
            ))
        })
    }
}

impl Debug for KeyPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("secret_key", &"***REDACTED***")
            .finish()
    }
}

/// Persistent data of a wallet contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletData {
    pub seqno: u32,
    /// `None` for wallets without a subwallet id.
    pub wallet_id: Option<u32>,
    pub public_key: TonHash,
}

impl WalletData {
    pub fn new(wallet_id: Option<u32>, public_key: TonHash) -> WalletData {
        WalletData {
            seqno: 0,
            wallet_id,
            public_key,
        }
    }

    pub(crate) fn to_cell(
        &self,
        layout: DataLayout,
        boc: &mut BagOfCells,
    ) -> Result<CellId, TonCellError> {
        let mut cell = Cell::new();
        let bits = cell.bits_mut();
        bits.store_u32(32, self.seqno)?;
        if layout != DataLayout::SeqnoPublicKey {
            let wallet_id = self.wallet_id.ok_or_else(|| {
                TonCellError::InternalError(format!("{:?} data requires a wallet id", layout))
            })?;
            bits.store_u32(32, wallet_id)?;
        }
        bits.store_slice(&self.public_key)?;
        if layout == DataLayout::SeqnoWalletIdPublicKeyPlugins {
            // empty plugin dict
            bits.store_bit(false)?;
        }
        boc.add_cell(cell)
    }

    pub(crate) fn from_cell(
        layout: DataLayout,
        boc: &BagOfCells,
        id: CellId,
    ) -> Result<WalletData, TonCellError> {
        let mut parser = boc.parser(id)?;
        let seqno = parser.load_u32(32)?;
        let wallet_id = match layout {
            DataLayout::SeqnoPublicKey => None,
            _ => Some(parser.load_u32(32)?),
        };
        let mut public_key = ZERO_HASH;
        parser.load_slice(&mut public_key)?;
        Ok(WalletData {
            seqno,
            wallet_id,
            public_key,
        })
    }
}
