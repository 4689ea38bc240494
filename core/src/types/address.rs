use std::fmt::{Debug, Display, Formatter};

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use crc::Crc;
use lazy_static::lazy_static;

use super::{TonAddressParseError, TonHash, TON_HASH_BYTES, ZERO_HASH};
use crate::cell::{BagOfCells, CellId, TonCellError};
use crate::message::StateInit;

mod from_impl;
mod serde_impl;

lazy_static! {
    pub static ref CRC_16_XMODEM: Crc<u16> = Crc::<u16>::new(&crc::CRC_16_XMODEM);
}

pub const BASECHAIN: i32 = 0;
pub const MASTERCHAIN: i32 = -1;
/// Reserved value meaning "workchain not set", never a valid address workchain.
pub const WORKCHAIN_UNSET: i32 = i32::MIN;

const FRIENDLY_ADDRESS_BYTES: usize = 36;
const FRIENDLY_ADDRESS_CHARS: usize = 48;
const BOUNCEABLE_TAG: u8 = 0x11;
const NON_BOUNCEABLE_TAG: u8 = 0x51;
const TEST_ONLY_FLAG: u8 = 0x80;

/// Rendering flags of a user-friendly address. They never take part in address equality.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct AddressFlags {
    pub user_friendly: bool,
    pub url_safe: bool,
    pub bounceable: bool,
    pub test_only: bool,
}

impl Default for AddressFlags {
    fn default() -> Self {
        AddressFlags {
            user_friendly: true,
            url_safe: true,
            bounceable: true,
            test_only: false,
        }
    }
}

/// Workchain plus 256-bit account id.
#[derive(PartialEq, Eq, Clone, Copy, Hash)]
pub struct TonAddress {
    workchain: i32,
    hash_part: TonHash,
}

impl TonAddress {
    pub const NULL: TonAddress = TonAddress {
        workchain: 0,
        hash_part: ZERO_HASH,
    };

    /// Fails for workchains outside the `int8` range, including [`WORKCHAIN_UNSET`].
    pub fn new(workchain: i32, hash_part: TonHash) -> Result<TonAddress, TonAddressParseError> {
        if i8::try_from(workchain).is_err() {
            return Err(TonAddressParseError::InvalidWorkchain(workchain));
        }
        Ok(TonAddress {
            workchain,
            hash_part,
        })
    }

    pub fn null() -> TonAddress {
        TonAddress::NULL
    }

    /// Address of a contract with the given code and data.
    pub fn derive(
        workchain: i32,
        boc: &mut BagOfCells,
        code: CellId,
        data: CellId,
    ) -> Result<TonAddress, TonCellError> {
        let state_init = StateInit::new(code, data).to_cell(boc)?;
        let hash = boc.cell_hash(state_init)?;
        Ok(TonAddress::new(workchain, hash)?)
    }

    pub fn workchain(&self) -> i32 {
        self.workchain
    }

    pub fn hash_part(&self) -> &TonHash {
        &self.hash_part
    }

    pub fn is_valid(s: &str) -> bool {
        s.parse::<TonAddress>().is_ok()
    }

    pub fn from_hex_str(s: &str) -> Result<TonAddress, TonAddressParseError> {
        let Some((wc, hash)) = s.split_once(':') else {
            return Err(TonAddressParseError::new(
                s,
                "Invalid hex address string: wrong address format",
            ));
        };

        let workchain = wc.parse::<i32>().map_err(|_| {
            TonAddressParseError::new(s, "Invalid hex address string: parse int error")
        })?;

        if hash.len() != TON_HASH_BYTES * 2 {
            return Err(TonAddressParseError::new(
                s,
                "Invalid hex address string: wrong hash length",
            ));
        }
        let mut hash_part = ZERO_HASH;
        hex::decode_to_slice(hash, &mut hash_part).map_err(|_| {
            TonAddressParseError::new(s, "Invalid hex address string: hex decode error")
        })?;

        TonAddress::new(workchain, hash_part)
    }

    pub fn from_base64_url(s: &str) -> Result<TonAddress, TonAddressParseError> {
        Ok(Self::from_base64_url_flags(s)?.0)
    }

    /// Parses url-safe base64 representation of an address
    ///
    /// # Returns
    /// the address and the flags it was rendered with.
    pub fn from_base64_url_flags(
        s: &str,
    ) -> Result<(TonAddress, AddressFlags), TonAddressParseError> {
        Self::from_base64_with(s, true)
    }

    pub fn from_base64_std(s: &str) -> Result<TonAddress, TonAddressParseError> {
        Ok(Self::from_base64_std_flags(s)?.0)
    }

    /// Parses standard base64 representation of an address
    ///
    /// # Returns
    /// the address and the flags it was rendered with.
    pub fn from_base64_std_flags(
        s: &str,
    ) -> Result<(TonAddress, AddressFlags), TonAddressParseError> {
        Self::from_base64_with(s, false)
    }

    /// Parses any textual form and reports the flags found in it.
    pub fn from_str_with_flags(
        s: &str,
    ) -> Result<(TonAddress, AddressFlags), TonAddressParseError> {
        if s.len() == FRIENDLY_ADDRESS_CHARS {
            // Some form of base64 address, check which one
            let url_safe = s.contains('-') || s.contains('_');
            Self::from_base64_with(s, url_safe)
        } else {
            let flags = AddressFlags {
                user_friendly: false,
                url_safe: false,
                bounceable: false,
                test_only: false,
            };
            Ok((Self::from_hex_str(s)?, flags))
        }
    }

    fn from_base64_with(
        s: &str,
        url_safe: bool,
    ) -> Result<(TonAddress, AddressFlags), TonAddressParseError> {
        if s.len() != FRIENDLY_ADDRESS_CHARS {
            return Err(TonAddressParseError::new(
                s,
                "Invalid base64 address: Wrong length",
            ));
        }
        let engine = if url_safe {
            &URL_SAFE_NO_PAD
        } else {
            &STANDARD_NO_PAD
        };
        let bytes = engine
            .decode(s)
            .map_err(|_| TonAddressParseError::new(s, "Invalid base64 address: decode error"))?;

        let (addr, mut flags) = Self::from_bytes_src(&bytes, s)?;
        flags.url_safe = url_safe;
        Ok((addr, flags))
    }

    /// Parses the 36-byte friendly form: tag, workchain, hash, CRC16.
    pub fn from_bytes(bytes: &[u8]) -> Result<(TonAddress, AddressFlags), TonAddressParseError> {
        Self::from_bytes_src(bytes, hex::encode(bytes))
    }

    fn from_bytes_src<S: ToString>(
        bytes: &[u8],
        src: S,
    ) -> Result<(TonAddress, AddressFlags), TonAddressParseError> {
        let bytes: &[u8; FRIENDLY_ADDRESS_BYTES] = bytes.try_into().map_err(|_| {
            TonAddressParseError::new(
                src.to_string(),
                format!(
                    "Invalid address: expected {} bytes, got {}",
                    FRIENDLY_ADDRESS_BYTES,
                    bytes.len()
                ),
            )
        })?;

        let calc_crc = CRC_16_XMODEM.checksum(&bytes[0..34]);
        let addr_crc = u16::from_be_bytes([bytes[34], bytes[35]]);
        if calc_crc != addr_crc {
            return Err(TonAddressParseError::ChecksumMismatch {
                address: src.to_string(),
                expected: addr_crc,
                actual: calc_crc,
            });
        }

        let test_only = bytes[0] & TEST_ONLY_FLAG != 0;
        let bounceable = match bytes[0] & !TEST_ONLY_FLAG {
            BOUNCEABLE_TAG => true,
            NON_BOUNCEABLE_TAG => false,
            _ => {
                return Err(TonAddressParseError::new(
                    src.to_string(),
                    "Invalid address: Wrong tag byte",
                ))
            }
        };

        let workchain = bytes[1] as i8 as i32;
        let mut hash_part = ZERO_HASH;
        hash_part.copy_from_slice(&bytes[2..34]);
        let flags = AddressFlags {
            user_friendly: true,
            url_safe: false,
            bounceable,
            test_only,
        };
        Ok((TonAddress::new(workchain, hash_part)?, flags))
    }

    pub fn to_hex(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash_part))
    }

    pub fn to_bytes(&self, bounceable: bool, test_only: bool) -> [u8; FRIENDLY_ADDRESS_BYTES] {
        let mut bytes = [0; FRIENDLY_ADDRESS_BYTES];
        let mut tag = if bounceable {
            BOUNCEABLE_TAG
        } else {
            NON_BOUNCEABLE_TAG
        };
        if test_only {
            tag |= TEST_ONLY_FLAG;
        }
        bytes[0] = tag;
        bytes[1] = self.workchain as i8 as u8;
        bytes[2..34].copy_from_slice(&self.hash_part);
        let crc = CRC_16_XMODEM.checksum(&bytes[0..34]);
        bytes[34..36].copy_from_slice(&crc.to_be_bytes());
        bytes
    }

    pub fn to_base64_url(&self) -> String {
        self.to_base64_url_flags(false, false)
    }

    pub fn to_base64_url_flags(&self, non_bounceable: bool, test_only: bool) -> String {
        URL_SAFE_NO_PAD.encode(self.to_bytes(!non_bounceable, test_only))
    }

    pub fn to_base64_std(&self) -> String {
        self.to_base64_std_flags(false, false)
    }

    pub fn to_base64_std_flags(&self, non_bounceable: bool, test_only: bool) -> String {
        STANDARD_NO_PAD.encode(self.to_bytes(!non_bounceable, test_only))
    }

    pub fn to_string_with(&self, flags: AddressFlags) -> String {
        if !flags.user_friendly {
            return self.to_hex();
        }
        let bytes = self.to_bytes(flags.bounceable, flags.test_only);
        if flags.url_safe {
            URL_SAFE_NO_PAD.encode(bytes)
        } else {
            STANDARD_NO_PAD.encode(bytes)
        }
    }
}

impl Display for TonAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_base64_url().as_str())
    }
}

impl Debug for TonAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_base64_url().as_str())
    }
}
