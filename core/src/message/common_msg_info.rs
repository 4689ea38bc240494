use num_bigint::BigUint;

use super::ZERO_COINS;
use crate::cell::{BitBuffer, CellParser, TonCellError};
use crate::types::TonAddress;

/// Header of a message, the part before the optional state init and body.
#[derive(Clone, Debug, PartialEq)]
pub enum CommonMsgInfo {
    InternalMessage(InternalMessage),
    ExternalIncomingMessage(ExternalIncomingMessage),
    ExternalOutgoingMessage(ExternalOutgoingMessage),
}

#[derive(Clone, Debug, PartialEq)]
pub struct InternalMessage {
    /// Hyper cube routing flag.
    pub ihr_disabled: bool,
    /// Message should be bounced if there are errors during processing.
    pub bounce: bool,
    /// Flag that describes, that message itself is a result of bounce.
    pub bounced: bool,
    /// Address of smart contract sender of message, `None` is filled in by the network.
    pub src: Option<TonAddress>,
    pub dest: TonAddress,
    /// Amount of nanotons transferred. Extra currencies are not supported.
    pub value: BigUint,
    pub ihr_fee: BigUint,
    pub fwd_fee: BigUint,
    pub created_lt: u64,
    /// Unix time
    pub created_at: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExternalIncomingMessage {
    /// External source, only `addr_none` is supported.
    pub src: Option<TonAddress>,
    pub dest: TonAddress,
    pub import_fee: BigUint,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExternalOutgoingMessage {
    pub src: TonAddress,
    /// External destination, only `addr_none` is supported.
    pub dest: Option<TonAddress>,
    pub created_lt: u64,
    pub created_at: u32,
}

impl CommonMsgInfo {
    pub fn new_default_internal(dest: &TonAddress, value: &BigUint, bounce: bool) -> Self {
        CommonMsgInfo::InternalMessage(InternalMessage {
            ihr_disabled: true,
            bounce,
            bounced: false,
            src: None,
            dest: *dest,
            value: value.clone(),
            ihr_fee: ZERO_COINS.clone(),
            fwd_fee: ZERO_COINS.clone(),
            created_lt: 0,
            created_at: 0,
        })
    }

    pub fn new_external_incoming(dest: &TonAddress) -> Self {
        CommonMsgInfo::ExternalIncomingMessage(ExternalIncomingMessage {
            src: None,
            dest: *dest,
            import_fee: ZERO_COINS.clone(),
        })
    }

    pub fn dest(&self) -> Option<TonAddress> {
        match self {
            CommonMsgInfo::InternalMessage(m) => Some(m.dest),
            CommonMsgInfo::ExternalIncomingMessage(m) => Some(m.dest),
            CommonMsgInfo::ExternalOutgoingMessage(m) => m.dest,
        }
    }

    pub fn store(&self, bits: &mut BitBuffer) -> Result<(), TonCellError> {
        match self {
            CommonMsgInfo::InternalMessage(m) => {
                bits.store_bit(false)?; // int_msg_info$0
                bits.store_bit(m.ihr_disabled)?;
                bits.store_bit(m.bounce)?;
                bits.store_bit(m.bounced)?;
                bits.store_maybe_address(m.src.as_ref())?;
                bits.store_address(&m.dest)?;
                bits.store_coins(&m.value)?;
                bits.store_bit(false)?; // empty extra currency dict
                bits.store_coins(&m.ihr_fee)?;
                bits.store_coins(&m.fwd_fee)?;
                bits.store_u64(64, m.created_lt)?;
                bits.store_u32(32, m.created_at)?;
            }
            CommonMsgInfo::ExternalIncomingMessage(m) => {
                bits.store_u8(2, 0b10)?; // ext_in_msg_info$10
                bits.store_maybe_address(m.src.as_ref())?;
                bits.store_address(&m.dest)?;
                bits.store_coins(&m.import_fee)?;
            }
            CommonMsgInfo::ExternalOutgoingMessage(m) => {
                bits.store_u8(2, 0b11)?; // ext_out_msg_info$11
                bits.store_address(&m.src)?;
                bits.store_maybe_address(m.dest.as_ref())?;
                bits.store_u64(64, m.created_lt)?;
                bits.store_u32(32, m.created_at)?;
            }
        }
        Ok(())
    }

    pub fn load(parser: &mut CellParser) -> Result<CommonMsgInfo, TonCellError> {
        if !parser.load_bit()? {
            let ihr_disabled = parser.load_bit()?;
            let bounce = parser.load_bit()?;
            let bounced = parser.load_bit()?;
            let src = parser.load_maybe_address()?;
            let dest = parser.load_address()?;
            let value = parser.load_coins()?;
            if parser.load_bit()? {
                return Err(TonCellError::cell_parser_error(
                    "Extra currencies are not supported",
                ));
            }
            let ihr_fee = parser.load_coins()?;
            let fwd_fee = parser.load_coins()?;
            let created_lt = parser.load_u64(64)?;
            let created_at = parser.load_u32(32)?;

            return Ok(CommonMsgInfo::InternalMessage(InternalMessage {
                ihr_disabled,
                bounce,
                bounced,
                src,
                dest,
                value,
                ihr_fee,
                fwd_fee,
                created_lt,
                created_at,
            }));
        }

        if !parser.load_bit()? {
            let src = parser.load_maybe_address()?;
            let dest = parser.load_address()?;
            let import_fee = parser.load_coins()?;
            Ok(CommonMsgInfo::ExternalIncomingMessage(
                ExternalIncomingMessage {
                    src,
                    dest,
                    import_fee,
                },
            ))
        } else {
            let src = parser.load_address()?;
            let dest = parser.load_maybe_address()?;
            let created_lt = parser.load_u64(64)?;
            let created_at = parser.load_u32(32)?;
            Ok(CommonMsgInfo::ExternalOutgoingMessage(
                ExternalOutgoingMessage {
                    src,
                    dest,
                    created_lt,
                    created_at,
                },
            ))
        }
    }
}
