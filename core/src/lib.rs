pub mod cell;
pub mod message;
pub mod types;
pub mod wallet;

pub use crate::cell::{BagOfCells, Cell, CellId, TonCellError};
pub use crate::types::{ShardId, TonAddress, TonAddressParseError, TonHash};
