use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::cell::raw::RawBagOfCells;
use crate::cell::raw_boc_from_boc::{convert_from_raw_boc, convert_to_raw_boc};
use crate::cell::*;
use crate::types::TonHash;

/// Arena owning a DAG of cells plus the list of roots.
///
/// Cells reference each other by [`CellId`]; a cell may be referenced by any number
/// of parents. Cells built in place can only reference cells added before them,
/// [`BagOfCells::add_reference`] allows arbitrary edges and serialization rejects cycles.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct BagOfCells {
    cells: Vec<Cell>,
    roots: Vec<CellId>,
}

impl BagOfCells {
    pub fn new() -> BagOfCells {
        BagOfCells::default()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Adds a cell; all its references must already belong to this bag.
    pub fn add_cell(&mut self, cell: Cell) -> Result<CellId, TonCellError> {
        for reference in cell.references() {
            self.check_id(*reference)?;
        }
        Ok(self.push_unchecked(cell))
    }

    pub(crate) fn push_unchecked(&mut self, cell: Cell) -> CellId {
        let id = CellId::from_index(self.cells.len());
        self.cells.push(cell);
        id
    }

    pub fn cell(&self, id: CellId) -> Result<&Cell, TonCellError> {
        let cell_count = self.cells.len();
        self.cells.get(id.index()).ok_or(TonCellError::InvalidCellId {
            id: id.index(),
            cell_count,
        })
    }

    pub fn cell_mut(&mut self, id: CellId) -> Result<&mut Cell, TonCellError> {
        let cell_count = self.cells.len();
        self.cells
            .get_mut(id.index())
            .ok_or(TonCellError::InvalidCellId {
                id: id.index(),
                cell_count,
            })
    }

    pub fn parser(&self, id: CellId) -> Result<CellParser<'_>, TonCellError> {
        Ok(self.cell(id)?.parser())
    }

    pub fn add_reference(&mut self, parent: CellId, child: CellId) -> Result<(), TonCellError> {
        self.check_id(child)?;
        self.cell_mut(parent)?.store_reference(child)?;
        Ok(())
    }

    /// Appends the bits and references of `source` to `target`.
    pub fn store_cell(&mut self, target: CellId, source: CellId) -> Result<(), TonCellError> {
        let source_cell = self.cell(source)?;
        let bits = source_cell.bits().clone();
        let references = source_cell.references().to_vec();

        let target_cell = self.cell_mut(target)?;
        if target_cell.references().len() + references.len() > MAX_CELL_REFERENCES {
            return Err(TonCellError::TooManyReferences {
                max: MAX_CELL_REFERENCES,
                got: target_cell.references().len() + references.len(),
            });
        }
        target_cell.bits_mut().store_bit_buffer(&bits)?;
        for reference in references {
            target_cell.store_reference(reference)?;
        }
        Ok(())
    }

    pub fn add_root(&mut self, root: CellId) -> Result<(), TonCellError> {
        self.check_id(root)?;
        self.roots.push(root);
        Ok(())
    }

    pub fn roots(&self) -> &[CellId] {
        &self.roots
    }

    pub fn num_roots(&self) -> usize {
        self.roots.len()
    }

    pub fn root(&self, idx: usize) -> Result<CellId, TonCellError> {
        self.roots.get(idx).copied().ok_or_else(|| {
            TonCellError::cell_parser_error(format!(
                "Invalid root index: {}, BoC contains {} roots",
                idx,
                self.roots.len()
            ))
        })
    }

    pub fn single_root(&self) -> Result<CellId, TonCellError> {
        match self.roots.as_slice() {
            [root] => Ok(*root),
            roots => Err(TonCellError::cell_parser_error(format!(
                "Single root expected, got {}",
                roots.len()
            ))),
        }
    }

    /// Representation hash of the cell, recomputing only cells whose content or
    /// children changed since the last call.
    pub fn cell_hash(&mut self, id: CellId) -> Result<TonHash, TonCellError> {
        Ok(self.refresh_hashes(id)?.0)
    }

    pub fn cell_depth(&mut self, id: CellId) -> Result<u16, TonCellError> {
        Ok(self.refresh_hashes(id)?.1)
    }

    fn refresh_hashes(&mut self, id: CellId) -> Result<(TonHash, u16), TonCellError> {
        let mut done = HashMap::new();
        let mut visiting = HashSet::new();
        self.refresh_hash_rec(id, 0, &mut done, &mut visiting)
    }

    fn refresh_hash_rec(
        &mut self,
        id: CellId,
        level: usize,
        done: &mut HashMap<CellId, (TonHash, u16)>,
        visiting: &mut HashSet<CellId>,
    ) -> Result<(TonHash, u16), TonCellError> {
        if let Some(result) = done.get(&id) {
            return Ok(*result);
        }
        if level > MAX_CELL_DEPTH {
            return Err(TonCellError::DepthLimitExceeded {
                limit: MAX_CELL_DEPTH,
            });
        }
        if !visiting.insert(id) {
            return Err(TonCellError::CyclicCellGraph(id.index()));
        }

        let references = self.cell(id)?.references().to_vec();
        let mut children = Vec::with_capacity(references.len());
        for child in references {
            children.push(self.refresh_hash_rec(child, level + 1, done, visiting)?);
        }
        visiting.remove(&id);

        let result = self.cell_mut(id)?.refresh_hash(&children)?;
        done.insert(id, result);
        Ok(result)
    }

    /// Deep-copies the sub-DAG rooted at `id` of `other` into this bag,
    /// keeping shared cells shared. Returns the id of the copied root.
    pub fn import(&mut self, other: &BagOfCells, id: CellId) -> Result<CellId, TonCellError> {
        let mut copied = HashMap::new();
        let mut visiting = HashSet::new();
        self.import_rec(other, id, 0, &mut copied, &mut visiting)
    }

    fn import_rec(
        &mut self,
        other: &BagOfCells,
        id: CellId,
        level: usize,
        copied: &mut HashMap<CellId, CellId>,
        visiting: &mut HashSet<CellId>,
    ) -> Result<CellId, TonCellError> {
        if let Some(new_id) = copied.get(&id) {
            return Ok(*new_id);
        }
        if level > MAX_CELL_DEPTH {
            return Err(TonCellError::DepthLimitExceeded {
                limit: MAX_CELL_DEPTH,
            });
        }
        if !visiting.insert(id) {
            return Err(TonCellError::CyclicCellGraph(id.index()));
        }

        let source = other.cell(id)?;
        let mut references = Vec::with_capacity(source.references().len());
        for child in source.references() {
            references.push(self.import_rec(other, *child, level + 1, copied, visiting)?);
        }
        visiting.remove(&id);

        let cell = Cell::from_raw(
            source.bits().clone(),
            references,
            source.is_exotic(),
            source.level_mask(),
        )?;
        let new_id = self.push_unchecked(cell);
        copied.insert(id, new_id);
        Ok(new_id)
    }

    pub fn parse(serial: &[u8]) -> Result<BagOfCells, TonCellError> {
        let raw = RawBagOfCells::parse(serial)?;
        convert_from_raw_boc(raw)
    }

    pub fn parse_hex(hex: &str) -> Result<BagOfCells, TonCellError> {
        let bin = hex::decode(hex.trim()).map_boc_format_error()?;
        Self::parse(&bin)
    }

    pub fn parse_base64(base64: &str) -> Result<BagOfCells, TonCellError> {
        let bin = STANDARD.decode(base64.trim()).map_boc_format_error()?;
        Self::parse(&bin)
    }

    pub fn serialize(&self, has_crc32: bool) -> Result<Vec<u8>, TonCellError> {
        self.serialize_with(false, has_crc32)
    }

    pub fn serialize_with(&self, has_idx: bool, has_crc32: bool) -> Result<Vec<u8>, TonCellError> {
        let raw = convert_to_raw_boc(self)?;
        raw.serialize(has_idx, has_crc32)
    }

    pub fn to_base64(&self, has_crc32: bool) -> Result<String, TonCellError> {
        Ok(STANDARD.encode(self.serialize(has_crc32)?))
    }

    /// Fift-style dump of the tree under `id`, one cell per line.
    pub fn print_tree(&self, id: CellId) -> Result<String, TonCellError> {
        let mut out = String::new();
        self.print_tree_rec(id, 0, &mut out)?;
        Ok(out)
    }

    fn print_tree_rec(&self, id: CellId, indent: usize, out: &mut String) -> Result<(), TonCellError> {
        if indent > MAX_CELL_DEPTH {
            return Err(TonCellError::DepthLimitExceeded {
                limit: MAX_CELL_DEPTH,
            });
        }
        let cell = self.cell(id)?;
        let t = if cell.is_exotic() { 'p' } else { 'x' };
        writeln!(
            out,
            "{}{}{{{}}}",
            " ".repeat(indent),
            t,
            cell.bits().to_hex_string()
        )
        .map_internal_error()?;
        for child in cell.references() {
            self.print_tree_rec(*child, indent + 1, out)?;
        }
        Ok(())
    }

    fn check_id(&self, id: CellId) -> Result<(), TonCellError> {
        self.cell(id).map(|_| ())
    }
}
