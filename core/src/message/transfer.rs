use num_bigint::BigUint;

use super::{CommonMsgInfo, StateInit, TonMessage, TonMessageError};
use crate::cell::{BagOfCells, Cell, CellId, MAX_CELL_REFERENCES};
use crate::types::{TonAddress, TonAddressParseError};

/// Pay transfer fees separately, ignore errors.
pub const DEFAULT_SEND_MODE: u8 = 3;

/// `message$_ info:CommonMsgInfo init:(Maybe (Either StateInit ^StateInit))
/// body:(Either X ^X) = Message X`
#[derive(Clone, Debug, PartialEq)]
pub struct TransferMessage {
    pub common_msg_info: CommonMsgInfo,
    pub state_init: Option<StateInit>,
    pub body: Option<CellId>,
}

impl TransferMessage {
    pub fn new(common_msg_info: CommonMsgInfo) -> Self {
        TransferMessage {
            common_msg_info,
            state_init: None,
            body: None,
        }
    }

    pub fn with_state_init(&mut self, state_init: StateInit) -> &mut Self {
        self.state_init = Some(state_init);
        self
    }

    pub fn with_body(&mut self, body: CellId) -> &mut Self {
        self.body = Some(body);
        self
    }
}

impl TonMessage for TransferMessage {
    /// The state init always goes to a reference. The body is stored inline
    /// when its bits and references fit, otherwise in a reference.
    fn build(&self, boc: &mut BagOfCells) -> Result<CellId, TonMessageError> {
        let mut cell = Cell::new();
        self.common_msg_info.store(cell.bits_mut())?;

        match &self.state_init {
            Some(state_init) => {
                let state_init = state_init.to_cell(boc)?;
                cell.bits_mut().store_bit(true)?.store_bit(true)?;
                cell.store_reference(state_init)?;
            }
            None => {
                cell.bits_mut().store_bit(false)?;
            }
        }

        let Some(body) = self.body else {
            cell.bits_mut().store_bit(false)?;
            return Ok(boc.add_cell(cell)?);
        };

        let body_cell = boc.cell(body)?;
        let fits_inline = cell.bits().remaining_bits() > body_cell.bit_len()
            && cell.references().len() + body_cell.references().len() <= MAX_CELL_REFERENCES;
        log::trace!(
            "message body {}: {} bits, {} refs, inline: {}",
            body,
            body_cell.bit_len(),
            body_cell.references().len(),
            fits_inline
        );
        if fits_inline {
            cell.bits_mut().store_bit(false)?;
            let id = boc.add_cell(cell)?;
            boc.store_cell(id, body)?;
            Ok(id)
        } else {
            cell.bits_mut().store_bit(true)?;
            cell.store_reference(body)?;
            Ok(boc.add_cell(cell)?)
        }
    }

    fn parse(boc: &mut BagOfCells, cell: CellId) -> Result<Self, TonMessageError> {
        let mut inline_body = None;
        let (common_msg_info, state_init, mut body) = {
            let mut parser = boc.parser(cell)?;
            let common_msg_info = CommonMsgInfo::load(&mut parser)?;

            let state_init = if parser.load_bit()? {
                if parser.load_bit()? {
                    let id = parser.next_reference()?;
                    Some(StateInit::from_cell(boc, id)?)
                } else {
                    Some(StateInit::load(&mut parser)?)
                }
            } else {
                None
            };

            let body = if parser.load_bit()? {
                let body = parser.next_reference()?;
                parser.ensure_empty()?;
                Some(body)
            } else {
                let bit_len = parser.remaining_bits();
                let bits = parser.load_bits(bit_len)?;
                let mut references = Vec::new();
                while parser.remaining_refs() > 0 {
                    references.push(parser.next_reference()?);
                }
                inline_body = Some((bits, bit_len, references));
                None
            };
            (common_msg_info, state_init, body)
        };

        if let Some((bits, bit_len, references)) = inline_body {
            let mut body_cell = Cell::new();
            body_cell.bits_mut().store_bits(bit_len, &bits)?;
            for reference in references {
                body_cell.store_reference(reference)?;
            }
            body = Some(boc.add_cell(body_cell)?);
        }

        Ok(TransferMessage {
            common_msg_info,
            state_init,
            body,
        })
    }
}

/// Body of an outgoing transfer.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum TransferPayload {
    #[default]
    Empty,
    /// Text comment: a zero 32-bit op followed by UTF-8 bytes. An empty text is an empty body.
    Text(String),
    Bytes(Vec<u8>),
    Cell(CellId),
}

impl TransferPayload {
    pub fn to_cell(&self, boc: &mut BagOfCells) -> Result<CellId, TonMessageError> {
        let mut cell = Cell::new();
        match self {
            TransferPayload::Empty => {}
            TransferPayload::Text(text) if text.is_empty() => {}
            TransferPayload::Text(text) => {
                cell.bits_mut().store_u32(32, 0)?.store_string(text)?;
            }
            TransferPayload::Bytes(bytes) => {
                cell.bits_mut().store_slice(bytes)?;
            }
            TransferPayload::Cell(id) => {
                boc.cell(*id)?;
                return Ok(*id);
            }
        }
        Ok(boc.add_cell(cell)?)
    }
}

/// One outgoing internal message of a wallet.
#[derive(Clone, Debug, PartialEq)]
pub struct Transfer {
    pub dest: TonAddress,
    /// Nanotons
    pub amount: BigUint,
    pub bounce: bool,
    pub payload: TransferPayload,
    pub send_mode: u8,
    pub state_init: Option<StateInit>,
}

impl Transfer {
    pub fn new(dest: &TonAddress, amount: &BigUint) -> Transfer {
        Transfer {
            dest: *dest,
            amount: amount.clone(),
            bounce: true,
            payload: TransferPayload::Empty,
            send_mode: DEFAULT_SEND_MODE,
            state_init: None,
        }
    }

    /// Takes the bounce flag from the textual form, raw addresses are non-bounceable.
    pub fn to_address(dest: &str, amount: &BigUint) -> Result<Transfer, TonAddressParseError> {
        let (address, flags) = TonAddress::from_str_with_flags(dest)?;
        let mut transfer = Transfer::new(&address, amount);
        transfer.bounce = flags.bounceable;
        Ok(transfer)
    }

    pub fn with_bounce(&mut self, bounce: bool) -> &mut Self {
        self.bounce = bounce;
        self
    }

    pub fn with_payload(&mut self, payload: TransferPayload) -> &mut Self {
        self.payload = payload;
        self
    }

    pub fn with_send_mode(&mut self, send_mode: u8) -> &mut Self {
        self.send_mode = send_mode;
        self
    }

    pub fn with_state_init(&mut self, state_init: StateInit) -> &mut Self {
        self.state_init = Some(state_init);
        self
    }

    /// Builds the internal message cell referenced from a wallet signing message.
    pub fn build_out_message(&self, boc: &mut BagOfCells) -> Result<CellId, TonMessageError> {
        let body = self.payload.to_cell(boc)?;
        let info = CommonMsgInfo::new_default_internal(&self.dest, &self.amount, self.bounce);
        let mut message = TransferMessage::new(info);
        message.with_body(body);
        if let Some(state_init) = self.state_init {
            message.with_state_init(state_init);
        }
        message.build(boc)
    }
}
