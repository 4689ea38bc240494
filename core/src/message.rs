mod error;
pub use error::*;
use lazy_static::lazy_static;
use num_bigint::BigUint;
use num_traits::Zero;

mod common_msg_info;
pub use common_msg_info::*;

use crate::cell::{BagOfCells, CellId};

mod state_init;
mod transfer;
pub use state_init::*;
pub use transfer::*;

lazy_static! {
    pub(crate) static ref ZERO_COINS: BigUint = BigUint::zero();
}

/// A message that can be written into and read back from a cell of a [`BagOfCells`].
pub trait TonMessage: Sized {
    fn build(&self, boc: &mut BagOfCells) -> Result<CellId, TonMessageError>;

    /// Parsing may add cells to `boc`, e.g. for a body stored inline in the message cell.
    fn parse(boc: &mut BagOfCells, cell: CellId) -> Result<Self, TonMessageError>;
}
