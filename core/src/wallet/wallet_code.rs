use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::cell::{BagOfCells, TonCellError};
use crate::types::TonHash;
use crate::wallet::wallet_version::WalletVersion;

lazy_static! {
    static ref WALLET_CODE_BY_VERSION: HashMap<WalletVersion, Result<BagOfCells, TonCellError>> =
        WalletVersion::ALL
            .iter()
            .map(|version| (*version, BagOfCells::parse_hex(version.descriptor().code)))
            .collect();

    pub(super) static ref WALLET_VERSION_BY_CODE: HashMap<TonHash, WalletVersion> =
        WALLET_CODE_BY_VERSION
            .iter()
            .filter_map(|(version, code)| {
                let mut code = code.as_ref().ok()?.clone();
                let root = code.single_root().ok()?;
                let hash = code.cell_hash(root).ok()?;
                Some((hash, *version))
            })
            .collect();
}

/// Parsed code of the wallet contract, shared by all wallets of the version.
pub(super) fn code_boc(version: WalletVersion) -> Result<&'static BagOfCells, TonCellError> {
    match WALLET_CODE_BY_VERSION.get(&version) {
        Some(Ok(code)) => Ok(code),
        Some(Err(e)) => Err(e.clone()),
        None => Err(TonCellError::InternalError(format!(
            "No code found for {:?}",
            version
        ))),
    }
}
