use crate::cell::{BagOfCells, Cell, CellId, CellParser, TonCellError};

/// `_ split_depth:(Maybe (## 5)) special:(Maybe TickTock) code:(Maybe ^Cell)
/// data:(Maybe ^Cell) library:(Maybe ^Cell) = StateInit`
///
/// Only the code and data fields are supported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateInit {
    pub code: CellId,
    pub data: CellId,
}

impl StateInit {
    pub fn new(code: CellId, data: CellId) -> StateInit {
        StateInit { code, data }
    }

    /// Appends the state init fields to `cell`.
    pub fn store(&self, cell: &mut Cell) -> Result<(), TonCellError> {
        cell.bits_mut()
            .store_bit(false)? // split_depth
            .store_bit(false)? // special
            .store_bit(true)? // code
            .store_bit(true)? // data
            .store_bit(false)?; // library
        cell.store_reference(self.code)?
            .store_reference(self.data)?;
        Ok(())
    }

    pub fn to_cell(&self, boc: &mut BagOfCells) -> Result<CellId, TonCellError> {
        let mut cell = Cell::new();
        self.store(&mut cell)?;
        boc.add_cell(cell)
    }

    pub fn load(parser: &mut CellParser) -> Result<StateInit, TonCellError> {
        if parser.load_bit()? {
            return Err(TonCellError::cell_parser_error(
                "StateInit split_depth is not supported",
            ));
        }
        if parser.load_bit()? {
            return Err(TonCellError::cell_parser_error(
                "StateInit special is not supported",
            ));
        }
        if !parser.load_bit()? {
            return Err(TonCellError::cell_parser_error("StateInit without code"));
        }
        if !parser.load_bit()? {
            return Err(TonCellError::cell_parser_error("StateInit without data"));
        }
        if parser.load_bit()? {
            return Err(TonCellError::cell_parser_error(
                "StateInit library is not supported",
            ));
        }
        let code = parser.next_reference()?;
        let data = parser.next_reference()?;
        Ok(StateInit { code, data })
    }

    pub fn from_cell(boc: &BagOfCells, id: CellId) -> Result<StateInit, TonCellError> {
        let mut parser = boc.parser(id)?;
        let state_init = StateInit::load(&mut parser)?;
        parser.ensure_empty()?;
        Ok(state_init)
    }
}
