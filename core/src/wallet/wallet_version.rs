use serde::{Deserialize, Serialize};

use crate::cell::{BagOfCells, CellId, TonCellError};
use crate::types::TonHash;
use crate::wallet::wallet_code::{code_boc, WALLET_VERSION_BY_CODE};
use crate::wallet::WalletData;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum WalletVersion {
    V1R1,
    V1R2,
    V1R3,
    V2R1,
    V2R2,
    V3R1,
    V3R2,
    V4R1,
    V4R2,
}

/// Fields of the signing message before the transfers.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SigningLayout {
    /// `seqno:uint32`
    Seqno,
    /// `seqno:uint32 valid_until:uint32`
    SeqnoExpiry,
    /// `wallet_id:uint32 valid_until:uint32 seqno:uint32`
    WalletIdExpirySeqno,
}

/// Fields of the persistent contract data.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DataLayout {
    SeqnoPublicKey,
    SeqnoWalletIdPublicKey,
    SeqnoWalletIdPublicKeyPlugins,
}

/// Everything that differs between wallet versions.
#[derive(Debug)]
pub struct WalletDescriptor {
    pub version: WalletVersion,
    pub signing_layout: SigningLayout,
    pub data_layout: DataLayout,
    /// Width of the zero op written after the seqno for simple transfers, 0 when absent.
    pub op_bits: usize,
    /// Hex encoded bag of cells with the contract code.
    pub code: &'static str,
}

macro_rules! wallet_descriptor {
    ($version:ident, $signing:ident, $data:ident, $op_bits:expr, $path:expr) => {
        WalletDescriptor {
            version: WalletVersion::$version,
            signing_layout: SigningLayout::$signing,
            data_layout: DataLayout::$data,
            op_bits: $op_bits,
            code: include_str!($path),
        }
    };
}

#[rustfmt::skip]
static WALLET_DESCRIPTORS: [WalletDescriptor; 9] = [
    wallet_descriptor!(V1R1, Seqno, SeqnoPublicKey, 0, "../../resources/wallet/wallet_v1r1.code"),
    wallet_descriptor!(V1R2, Seqno, SeqnoPublicKey, 0, "../../resources/wallet/wallet_v1r2.code"),
    wallet_descriptor!(V1R3, Seqno, SeqnoPublicKey, 0, "../../resources/wallet/wallet_v1r3.code"),
    wallet_descriptor!(V2R1, SeqnoExpiry, SeqnoPublicKey, 0, "../../resources/wallet/wallet_v2r1.code"),
    wallet_descriptor!(V2R2, SeqnoExpiry, SeqnoPublicKey, 0, "../../resources/wallet/wallet_v2r2.code"),
    wallet_descriptor!(V3R1, WalletIdExpirySeqno, SeqnoWalletIdPublicKey, 0, "../../resources/wallet/wallet_v3r1.code"),
    wallet_descriptor!(V3R2, WalletIdExpirySeqno, SeqnoWalletIdPublicKey, 0, "../../resources/wallet/wallet_v3r2.code"),
    wallet_descriptor!(V4R1, WalletIdExpirySeqno, SeqnoWalletIdPublicKeyPlugins, 32, "../../resources/wallet/wallet_v4r1.code"),
    wallet_descriptor!(V4R2, WalletIdExpirySeqno, SeqnoWalletIdPublicKeyPlugins, 8, "../../resources/wallet/wallet_v4r2.code"),
];

impl WalletVersion {
    pub const ALL: [WalletVersion; 9] = [
        WalletVersion::V1R1,
        WalletVersion::V1R2,
        WalletVersion::V1R3,
        WalletVersion::V2R1,
        WalletVersion::V2R2,
        WalletVersion::V3R1,
        WalletVersion::V3R2,
        WalletVersion::V4R1,
        WalletVersion::V4R2,
    ];

    pub fn descriptor(&self) -> &'static WalletDescriptor {
        &WALLET_DESCRIPTORS[*self as usize]
    }

    pub fn has_wallet_id(&self) -> bool {
        self.descriptor().signing_layout == SigningLayout::WalletIdExpirySeqno
    }

    pub fn has_op(&self) -> bool {
        self.descriptor().op_bits != 0
    }

    /// Copies the contract code into `boc`.
    pub fn code(&self, boc: &mut BagOfCells) -> Result<CellId, TonCellError> {
        let code = code_boc(*self)?;
        boc.import(code, code.single_root()?)
    }

    pub fn initial_data(
        &self,
        boc: &mut BagOfCells,
        public_key: &TonHash,
        wallet_id: u32,
    ) -> Result<CellId, TonCellError> {
        let wallet_id = self.has_wallet_id().then_some(wallet_id);
        WalletData::new(wallet_id, *public_key).to_cell(self.descriptor().data_layout, boc)
    }

    pub fn parse_data(&self, boc: &BagOfCells, data: CellId) -> Result<WalletData, TonCellError> {
        WalletData::from_cell(self.descriptor().data_layout, boc, data)
    }

    /// Recognizes a wallet by the hash of its code cell.
    pub fn from_code_hash(code_hash: &TonHash) -> Option<WalletVersion> {
        WALLET_VERSION_BY_CODE.get(code_hash).copied()
    }
}
