use std::fmt;
use std::fmt::{Debug, Display, Formatter};

pub use bag_of_cells::*;
use bitstream_io::{BigEndian, BitWrite, BitWriter};
pub use bit_buffer::*;
pub use error::*;
pub use parser::*;
use sha2::{Digest, Sha256};
pub use util::*;

use crate::types::TonHash;

mod bag_of_cells;
mod bit_buffer;
mod error;
mod parser;
mod raw;
mod raw_boc_from_boc;
mod util;

pub const MAX_CELL_BITS: usize = 1023;
pub const MAX_CELL_REFERENCES: usize = 4;
pub const MAX_CELL_DEPTH: usize = 1024;

const DEPTH_BYTES: usize = 2;

/// Position of a cell inside its [`BagOfCells`].
///
/// Ids are only meaningful for the bag that produced them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct CellId(usize);

impl CellId {
    pub fn index(self) -> usize {
        self.0
    }

    pub(crate) fn from_index(index: usize) -> CellId {
        CellId(index)
    }
}

impl Display for CellId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
struct CachedHash {
    hash: TonHash,
    depth: u16,
    children: Vec<(TonHash, u16)>,
}

/// Up to 1023 bits of data plus up to 4 references to other cells of the same bag.
///
/// Every mutator marks the cell dirty; the hash is recomputed on the next read
/// through [`BagOfCells::cell_hash`].
#[derive(Clone)]
pub struct Cell {
    data: BitBuffer,
    references: Vec<CellId>,
    is_exotic: bool,
    level_mask: u8,
    dirty: bool,
    cached: Option<CachedHash>,
}

impl Cell {
    pub fn new() -> Cell {
        Cell {
            data: BitBuffer::default(),
            references: Vec::new(),
            is_exotic: false,
            level_mask: 0,
            dirty: true,
            cached: None,
        }
    }

    pub fn with_data(data: BitBuffer, references: Vec<CellId>) -> Result<Cell, TonCellError> {
        if references.len() > MAX_CELL_REFERENCES {
            return Err(TonCellError::TooManyReferences {
                max: MAX_CELL_REFERENCES,
                got: references.len(),
            });
        }
        let data = if data.capacity() > MAX_CELL_BITS {
            BitBuffer::from_bytes(data.data(), data.bit_len())?
        } else {
            data
        };
        Ok(Cell {
            data,
            references,
            ..Cell::new()
        })
    }

    pub(crate) fn from_raw(
        data: BitBuffer,
        references: Vec<CellId>,
        is_exotic: bool,
        level_mask: u8,
    ) -> Result<Cell, TonCellError> {
        let mut cell = Cell::with_data(data, references)?;
        cell.is_exotic = is_exotic;
        cell.level_mask = level_mask;
        Ok(cell)
    }

    pub fn bits(&self) -> &BitBuffer {
        &self.data
    }

    pub fn bits_mut(&mut self) -> &mut BitBuffer {
        self.dirty = true;
        &mut self.data
    }

    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    pub fn bit_len(&self) -> usize {
        self.data.bit_len()
    }

    pub fn references(&self) -> &[CellId] {
        &self.references
    }

    pub fn reference(&self, idx: usize) -> Result<CellId, TonCellError> {
        self.references
            .get(idx)
            .copied()
            .ok_or_else(|| TonCellError::cell_parser_error(format!("No reference at {}", idx)))
    }

    /// Appends a child reference. The id is not checked against any bag,
    /// [`BagOfCells::add_reference`] does that.
    pub fn store_reference(&mut self, child: CellId) -> Result<&mut Self, TonCellError> {
        if self.references.len() >= MAX_CELL_REFERENCES {
            return Err(TonCellError::TooManyReferences {
                max: MAX_CELL_REFERENCES,
                got: self.references.len() + 1,
            });
        }
        self.dirty = true;
        self.references.push(child);
        Ok(self)
    }

    pub fn is_exotic(&self) -> bool {
        self.is_exotic
    }

    pub fn set_exotic(&mut self, is_exotic: bool) {
        self.dirty = true;
        self.is_exotic = is_exotic;
    }

    pub fn level_mask(&self) -> u8 {
        self.level_mask
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Hash from the last computation, `None` if the cell changed since.
    ///
    /// Children are not checked, use [`BagOfCells::cell_hash`] for an up to date value.
    pub fn cached_hash(&self) -> Option<TonHash> {
        match (&self.cached, self.dirty) {
            (Some(cached), false) => Some(cached.hash),
            _ => None,
        }
    }

    pub fn parser(&self) -> CellParser<'_> {
        CellParser::new(self.data.bit_len(), self.data.data(), &self.references)
    }

    /// `d1 = refs + 8 * exotic + 32 * level_mask`
    pub fn refs_descriptor(&self) -> u8 {
        self.references.len() as u8 + (self.is_exotic as u8) * 8 + self.level_mask * 32
    }

    /// `d2 = floor(bits / 8) + ceil(bits / 8)`
    pub fn bits_descriptor(&self) -> u8 {
        let bit_len = self.data.bit_len();
        (bit_len / 8 + (bit_len + 7) / 8) as u8
    }

    /// Returns the memoized hash and depth when neither this cell nor any child
    /// hash changed, otherwise recomputes them.
    pub(crate) fn refresh_hash(
        &mut self,
        children: &[(TonHash, u16)],
    ) -> Result<(TonHash, u16), TonCellError> {
        if let (Some(cached), false) = (&self.cached, self.dirty) {
            if cached.children == children {
                return Ok((cached.hash, cached.depth));
            }
        }

        let depth = match children.iter().map(|(_, depth)| *depth).max() {
            Some(max_child_depth) => max_child_depth as usize + 1,
            None => 0,
        };
        if depth > MAX_CELL_DEPTH {
            return Err(TonCellError::DepthLimitExceeded {
                limit: MAX_CELL_DEPTH,
            });
        }

        let repr = self.repr(children)?;
        let hash: TonHash = Sha256::new_with_prefix(repr).finalize().into();
        self.cached = Some(CachedHash {
            hash,
            depth: depth as u16,
            children: children.to_vec(),
        });
        self.dirty = false;
        Ok((hash, depth as u16))
    }

    /// Descriptors, padded data, then the depth and the hash of every child.
    fn repr(&self, children: &[(TonHash, u16)]) -> Result<Vec<u8>, TonCellError> {
        let padded = self.data.to_padded_bytes();
        let buffer_len = 2 + padded.len() + (32 + DEPTH_BYTES) * children.len();

        let mut writer = BitWriter::endian(Vec::with_capacity(buffer_len), BigEndian);
        writer
            .write(8, self.refs_descriptor())
            .map_internal_error()?;
        writer
            .write(8, self.bits_descriptor())
            .map_internal_error()?;
        writer.write_bytes(&padded).map_internal_error()?;
        for (_, depth) in children {
            writer.write(16, *depth).map_internal_error()?;
        }
        for (hash, _) in children {
            writer.write_bytes(hash).map_internal_error()?;
        }

        writer
            .writer()
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| TonCellError::InternalError("Cell repr is not byte-aligned".to_owned()))
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::new()
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
            && self.references == other.references
            && self.is_exotic == other.is_exotic
            && self.level_mask == other.level_mask
    }
}

impl Eq for Cell {}

impl Debug for Cell {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let t = if self.is_exotic { 'p' } else { 'x' };
        write!(
            f,
            "Cell {}{{{}}} refs: [{}]",
            t,
            self.data.to_hex_string(),
            self.references
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}
