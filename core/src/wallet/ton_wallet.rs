use std::fmt::{Debug, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

use nacl::sign::signature;

use super::{
    KeyPair, SigningLayout, WalletVersion, DEFAULT_VALIDITY_SECS, DEFAULT_WALLET_ID, MAX_TRANSFERS,
};
use crate::cell::{BagOfCells, Cell, CellId};
use crate::message::{
    CommonMsgInfo, StateInit, TonMessage, TonMessageError, Transfer, TransferMessage,
};
use crate::types::{TonAddress, BASECHAIN};

pub const SIGNATURE_BYTES: usize = 64;

/// Expiration written into the signing message of a wallet that is not deployed yet.
pub const NO_EXPIRATION: u32 = u32::MAX;

/// Unix time in seconds.
pub fn system_clock() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or_default()
}

/// Builds and signs external messages of a wallet contract.
///
/// All cells are added to the [`BagOfCells`] passed by the caller, the returned ids
/// point into it.
#[derive(Clone)]
pub struct TonWallet {
    pub key_pair: KeyPair,
    pub version: WalletVersion,
    pub address: TonAddress,
    pub wallet_id: u32,
    clock: fn() -> u32,
}

impl TonWallet {
    pub fn derive(
        workchain: i32,
        version: WalletVersion,
        key_pair: &KeyPair,
        wallet_id: u32,
    ) -> Result<TonWallet, TonMessageError> {
        let public_key = key_pair.public_key_hash()?;
        let mut boc = BagOfCells::new();
        let code = version.code(&mut boc)?;
        let data = version.initial_data(&mut boc, &public_key, wallet_id)?;
        let address = TonAddress::derive(workchain, &mut boc, code, data)?;
        Ok(TonWallet {
            key_pair: key_pair.clone(),
            version,
            address,
            wallet_id,
            clock: system_clock,
        })
    }

    /// Basechain wallet with the default subwallet id.
    pub fn derive_default(
        version: WalletVersion,
        key_pair: &KeyPair,
    ) -> Result<TonWallet, TonMessageError> {
        Self::derive(
            BASECHAIN,
            version,
            key_pair,
            Self::default_wallet_id(BASECHAIN),
        )
    }

    pub fn default_wallet_id(workchain: i32) -> u32 {
        DEFAULT_WALLET_ID.wrapping_add_signed(workchain)
    }

    /// Replaces the source of the current time used for message expiration.
    pub fn with_clock(mut self, clock: fn() -> u32) -> TonWallet {
        self.clock = clock;
        self
    }

    pub fn state_init(&self, boc: &mut BagOfCells) -> Result<StateInit, TonMessageError> {
        let public_key = self.key_pair.public_key_hash()?;
        let code = self.version.code(boc)?;
        let data = self
            .version
            .initial_data(boc, &public_key, self.wallet_id)?;
        Ok(StateInit::new(code, data))
    }

    fn expiration(&self, seqno: u32, expire_at: Option<u32>) -> u32 {
        if seqno == 0 {
            NO_EXPIRATION
        } else {
            expire_at.unwrap_or_else(|| (self.clock)().saturating_add(DEFAULT_VALIDITY_SECS))
        }
    }

    /// Signing message fields that precede the transfers. Plugin operations of V4
    /// wallets pass `without_op` and append their own op.
    pub fn signing_message_header(
        &self,
        seqno: u32,
        expire_at: Option<u32>,
        without_op: bool,
    ) -> Result<Cell, TonMessageError> {
        let descriptor = self.version.descriptor();
        let mut cell = Cell::new();
        let bits = cell.bits_mut();
        match descriptor.signing_layout {
            SigningLayout::Seqno => {
                bits.store_u32(32, seqno)?;
            }
            SigningLayout::SeqnoExpiry => {
                bits.store_u32(32, seqno)?
                    .store_u32(32, self.expiration(seqno, expire_at))?;
            }
            SigningLayout::WalletIdExpirySeqno => {
                bits.store_u32(32, self.wallet_id)?
                    .store_u32(32, self.expiration(seqno, expire_at))?
                    .store_u32(32, seqno)?;
            }
        }
        if descriptor.op_bits > 0 && !without_op {
            bits.store_u32(descriptor.op_bits, 0)?;
        }
        Ok(cell)
    }

    /// `expire_at` is ignored for `seqno == 0`, the first message never expires.
    pub fn create_signing_message(
        &self,
        boc: &mut BagOfCells,
        seqno: u32,
        expire_at: Option<u32>,
        transfers: &[Transfer],
    ) -> Result<CellId, TonMessageError> {
        if transfers.is_empty() || transfers.len() > MAX_TRANSFERS {
            return Err(TonMessageError::InvalidMessage(format!(
                "Expected 1 to {} transfers, got {}",
                MAX_TRANSFERS,
                transfers.len()
            )));
        }
        let mut cell = self.signing_message_header(seqno, expire_at, false)?;
        for transfer in transfers {
            let out_message = transfer.build_out_message(boc)?;
            cell.bits_mut().store_u8(8, transfer.send_mode)?;
            cell.store_reference(out_message)?;
        }
        Ok(boc.add_cell(cell)?)
    }

    pub fn sign(
        &self,
        boc: &mut BagOfCells,
        signing_message: CellId,
    ) -> Result<Vec<u8>, TonMessageError> {
        let hash = boc.cell_hash(signing_message)?;
        signature(&hash, self.key_pair.secret_key.as_slice())
            .map_err(|e| TonMessageError::NaclCryptographicError(e.message))
    }

    /// Wraps a signing message into an external message addressed to the wallet.
    ///
    /// The state init is attached for `seqno == 0`. A dummy signature of zeros is
    /// enough for fee estimation and skips the secret key entirely.
    pub fn create_external_message(
        &self,
        boc: &mut BagOfCells,
        signing_message: CellId,
        seqno: u32,
        dummy_signature: bool,
    ) -> Result<CellId, TonMessageError> {
        let signature = if dummy_signature {
            vec![0u8; SIGNATURE_BYTES]
        } else {
            self.sign(boc, signing_message)?
        };
        let mut body = Cell::new();
        body.bits_mut().store_slice(&signature)?;
        let body = boc.add_cell(body)?;
        boc.store_cell(body, signing_message)?;

        let mut message = TransferMessage::new(CommonMsgInfo::new_external_incoming(&self.address));
        message.with_body(body);
        if seqno == 0 {
            message.with_state_init(self.state_init(boc)?);
        }
        log::debug!(
            "external message to {} (seqno: {}, deploy: {}, dummy signature: {})",
            self.address,
            seqno,
            seqno == 0,
            dummy_signature
        );
        message.build(boc)
    }

    /// Signing message plus external message in one go. The external message becomes
    /// a root of `boc`.
    pub fn create_transfer_message(
        &self,
        boc: &mut BagOfCells,
        transfers: &[Transfer],
        seqno: u32,
        expire_at: Option<u32>,
        dummy_signature: bool,
    ) -> Result<CellId, TonMessageError> {
        let signing_message = self.create_signing_message(boc, seqno, expire_at, transfers)?;
        let external = self.create_external_message(boc, signing_message, seqno, dummy_signature)?;
        boc.add_root(external)?;
        Ok(external)
    }

    /// Deploys the wallet without any transfer. The external message becomes a root of `boc`.
    pub fn create_init_external_message(
        &self,
        boc: &mut BagOfCells,
    ) -> Result<CellId, TonMessageError> {
        let header = self.signing_message_header(0, None, false)?;
        let signing_message = boc.add_cell(header)?;
        let external = self.create_external_message(boc, signing_message, 0, false)?;
        boc.add_root(external)?;
        Ok(external)
    }
}

impl Debug for TonWallet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TonWallet")
            .field("key_pair", &self.key_pair)
            .field("version", &self.version)
            .field("address", &self.address)
            .field("wallet_id", &self.wallet_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;

    use super::*;
    use crate::message::TransferPayload;
    use crate::types::MASTERCHAIN;

    const NOW: u32 = 1_700_000_000;

    fn frozen_clock() -> u32 {
        NOW
    }

    fn wallet(version: WalletVersion) -> TonWallet {
        let key_pair = KeyPair::from_seed(&[42u8; 32]).unwrap();
        TonWallet::derive_default(version, &key_pair)
            .unwrap()
            .with_clock(frozen_clock)
    }

    fn transfer() -> Transfer {
        let dest: TonAddress = "EQDk2VTvn04SUKJrW7rXahzdF8_Qi6utb0wj43InCu9vdjrR"
            .parse()
            .unwrap();
        let mut transfer = Transfer::new(&dest, &BigUint::from(1_000_000u32));
        transfer.with_payload(TransferPayload::Text("gift".to_string()));
        transfer
    }

    #[test]
    fn test_ton_wallet_debug() -> anyhow::Result<()> {
        let key_pair = KeyPair {
            public_key: vec![1, 2, 3],
            secret_key: vec![4, 5, 6],
        };
        let wallet = TonWallet {
            key_pair,
            version: WalletVersion::V4R2,
            address: "EQBiMfDMivebQb052Z6yR3jHrmwNhw1kQ5bcAUOBYsK_VPuK".parse()?,
            wallet_id: 42,
            clock: system_clock,
        };

        let debug_output = format!("{:?}", wallet);
        let expected_output = "TonWallet { key_pair: KeyPair { public_key: [1, 2, 3], secret_key: \"***REDACTED***\" }, version: V4R2, address: EQBiMfDMivebQb052Z6yR3jHrmwNhw1kQ5bcAUOBYsK_VPuK, wallet_id: 42 }";
        assert_eq!(debug_output, expected_output);
        Ok(())
    }

    #[test]
    fn derive_matches_state_init_hash() -> anyhow::Result<()> {
        let key_pair = KeyPair::from_seed(&[1u8; 32])?;
        for version in WalletVersion::ALL {
            let wallet = TonWallet::derive(MASTERCHAIN, version, &key_pair, 7)?;
            let mut boc = BagOfCells::new();
            let state_init = wallet.state_init(&mut boc)?;
            let state_init_cell = state_init.to_cell(&mut boc)?;
            assert_eq!(wallet.address.workchain(), MASTERCHAIN);
            assert_eq!(wallet.address.hash_part(), &boc.cell_hash(state_init_cell)?);
        }
        Ok(())
    }

    #[test]
    fn default_wallet_id_depends_on_workchain() {
        assert_eq!(TonWallet::default_wallet_id(0), 698983191);
        assert_eq!(TonWallet::default_wallet_id(-1), 698983190);
        let wallet = wallet(WalletVersion::V3R2);
        assert_eq!(wallet.wallet_id, DEFAULT_WALLET_ID);
    }

    #[test]
    fn first_message_never_expires() -> anyhow::Result<()> {
        let wallet = wallet(WalletVersion::V3R2);
        let mut boc = BagOfCells::new();
        let id = wallet.create_signing_message(&mut boc, 0, Some(NOW), &[transfer()])?;
        let mut parser = boc.parser(id)?;
        assert_eq!(parser.load_u32(32)?, DEFAULT_WALLET_ID);
        assert_eq!(parser.load_u32(32)?, u32::MAX);
        assert_eq!(parser.load_u32(32)?, 0);
        assert_eq!(parser.load_u8(8)?, 3);
        assert_eq!(parser.remaining_refs(), 1);
        Ok(())
    }

    #[test]
    fn expiration_uses_clock() -> anyhow::Result<()> {
        let wallet = wallet(WalletVersion::V3R1);
        let mut boc = BagOfCells::new();
        let id = wallet.create_signing_message(&mut boc, 1, None, &[transfer()])?;
        let mut parser = boc.parser(id)?;
        parser.skip_bits(32)?;
        assert_eq!(parser.load_u32(32)?, NOW + 60);
        assert_eq!(parser.load_u32(32)?, 1);

        let id = wallet.create_signing_message(&mut boc, 1, Some(NOW + 5), &[transfer()])?;
        let mut parser = boc.parser(id)?;
        parser.skip_bits(32)?;
        assert_eq!(parser.load_u32(32)?, NOW + 5);
        Ok(())
    }

    #[test]
    fn signing_layouts() -> anyhow::Result<()> {
        for (version, header_bits) in [
            (WalletVersion::V1R3, 32),
            (WalletVersion::V2R2, 64),
            (WalletVersion::V3R2, 96),
            (WalletVersion::V4R1, 128),
            (WalletVersion::V4R2, 104),
        ] {
            let wallet = wallet(version);
            let mut boc = BagOfCells::new();
            let id = wallet.create_signing_message(&mut boc, 5, None, &[transfer(), transfer()])?;
            let cell = boc.cell(id)?;
            assert_eq!(cell.bit_len(), header_bits + 16, "{:?}", version);
            assert_eq!(cell.references().len(), 2);
        }

        let wallet = wallet(WalletVersion::V2R1);
        let mut boc = BagOfCells::new();
        let id = wallet.create_signing_message(&mut boc, 5, None, &[transfer()])?;
        let mut parser = boc.parser(id)?;
        assert_eq!(parser.load_u32(32)?, 5);
        assert_eq!(parser.load_u32(32)?, NOW + 60);

        let header = self::wallet(WalletVersion::V4R2).signing_message_header(5, None, true)?;
        assert_eq!(header.bit_len(), 96);
        Ok(())
    }

    #[test]
    fn transfer_count_is_limited() {
        let wallet = wallet(WalletVersion::V4R2);
        let mut boc = BagOfCells::new();
        assert!(matches!(
            wallet.create_signing_message(&mut boc, 1, None, &[]),
            Err(TonMessageError::InvalidMessage(_))
        ));
        let transfers = vec![transfer(); 5];
        assert!(matches!(
            wallet.create_signing_message(&mut boc, 1, None, &transfers),
            Err(TonMessageError::InvalidMessage(_))
        ));
    }

    #[test]
    fn external_message_layout() -> anyhow::Result<()> {
        let wallet = wallet(WalletVersion::V4R2);
        let mut boc = BagOfCells::new();
        let signing = wallet.create_signing_message(&mut boc, 0, None, &[transfer()])?;
        let signing_bits = boc.cell(signing)?.bit_len();
        let external = wallet.create_external_message(&mut boc, signing, 0, false)?;

        let message = TransferMessage::parse(&mut boc, external)?;
        assert_eq!(message.common_msg_info.dest(), Some(wallet.address));
        let state_init = message
            .state_init
            .ok_or(TonMessageError::invalid_message("no state init"))?;
        let code_hash = boc.cell_hash(state_init.code)?;
        assert_eq!(
            WalletVersion::from_code_hash(&code_hash),
            Some(WalletVersion::V4R2)
        );

        let body = message
            .body
            .ok_or(TonMessageError::invalid_message("no body"))?;
        let body_cell = boc.cell(body)?;
        assert_eq!(body_cell.bit_len(), SIGNATURE_BYTES * 8 + signing_bits);
        assert_eq!(body_cell.references().len(), 1);
        let expected_signature = wallet.sign(&mut boc, signing)?;
        let mut parser = boc.parser(body)?;
        assert_eq!(parser.load_bytes(SIGNATURE_BYTES)?, expected_signature);
        Ok(())
    }

    #[test]
    fn dummy_signature_and_no_state_init() -> anyhow::Result<()> {
        let wallet = wallet(WalletVersion::V3R2);
        let mut boc = BagOfCells::new();
        let external = wallet.create_transfer_message(&mut boc, &[transfer()], 3, None, true)?;
        assert_eq!(boc.roots(), [external]);

        let message = TransferMessage::parse(&mut boc, external)?;
        assert_eq!(message.state_init, None);
        let body = message
            .body
            .ok_or(TonMessageError::invalid_message("no body"))?;
        let mut parser = boc.parser(body)?;
        assert_eq!(parser.load_bytes(SIGNATURE_BYTES)?, vec![0u8; SIGNATURE_BYTES]);
        Ok(())
    }

    #[test]
    fn signature_is_deterministic() -> anyhow::Result<()> {
        let wallet = wallet(WalletVersion::V3R2);
        let mut boc = BagOfCells::new();
        let signing = wallet.create_signing_message(&mut boc, 2, Some(NOW), &[transfer()])?;
        let first = wallet.sign(&mut boc, signing)?;
        let second = wallet.sign(&mut boc, signing)?;
        assert_eq!(first.len(), SIGNATURE_BYTES);
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn init_message_serializes() -> anyhow::Result<()> {
        let wallet = wallet(WalletVersion::V4R2);
        let mut boc = BagOfCells::new();
        let external = wallet.create_init_external_message(&mut boc)?;
        let expected_hash = boc.cell_hash(external)?;

        let serialized = boc.serialize(true)?;
        let mut parsed = BagOfCells::parse(&serialized)?;
        let root = parsed.single_root()?;
        assert_eq!(parsed.cell_hash(root)?, expected_hash);

        let message = TransferMessage::parse(&mut parsed, root)?;
        assert!(message.state_init.is_some());
        Ok(())
    }
}
