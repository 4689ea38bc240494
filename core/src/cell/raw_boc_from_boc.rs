use std::collections::{HashMap, HashSet};

use crate::cell::raw::{RawBagOfCells, RawCell};
use crate::cell::{BagOfCells, BitBuffer, Cell, CellId, TonCellError, MAX_CELL_DEPTH};

/// Orders the cells reachable from the roots so that every child comes after all
/// of its parents. Shared cells are emitted once, keyed by id.
struct RevIndexer<'a> {
    boc: &'a BagOfCells,
    rev_indices: HashMap<CellId, usize>,
    rev_cells: Vec<CellId>,
    visiting: HashSet<CellId>,
}

impl<'a> RevIndexer<'a> {
    fn new(boc: &'a BagOfCells) -> Self {
        RevIndexer {
            boc,
            rev_indices: HashMap::new(),
            rev_cells: Vec::new(),
            visiting: HashSet::new(),
        }
    }

    /// Post-order walk: a cell gets its reverse index after all of its children.
    fn fill(&mut self, id: CellId, level: usize) -> Result<usize, TonCellError> {
        if let Some(rev_index) = self.rev_indices.get(&id) {
            return Ok(*rev_index);
        }
        if level > MAX_CELL_DEPTH {
            return Err(TonCellError::DepthLimitExceeded {
                limit: MAX_CELL_DEPTH,
            });
        }
        if !self.visiting.insert(id) {
            return Err(TonCellError::CyclicCellGraph(id.index()));
        }

        let boc = self.boc;
        for child in boc.cell(id)?.references() {
            self.fill(*child, level + 1)?;
        }

        self.visiting.remove(&id);
        let rev_index = self.rev_cells.len();
        self.rev_indices.insert(id, rev_index);
        self.rev_cells.push(id);
        Ok(rev_index)
    }

    fn index_of(&self, id: CellId) -> Result<usize, TonCellError> {
        self.rev_indices
            .get(&id)
            .map(|rev_index| self.rev_cells.len() - rev_index - 1)
            .ok_or_else(|| TonCellError::InternalError(format!("Cell {} is not indexed", id)))
    }
}

pub(crate) fn convert_to_raw_boc(boc: &BagOfCells) -> Result<RawBagOfCells, TonCellError> {
    if boc.roots().is_empty() {
        return Err(TonCellError::boc_format_error("At least one root is required"));
    }

    let mut indexer = RevIndexer::new(boc);
    for root in boc.roots() {
        indexer.fill(*root, 0)?;
    }

    let mut cells = Vec::with_capacity(indexer.rev_cells.len());
    for id in indexer.rev_cells.iter().rev() {
        let cell = boc.cell(*id)?;
        let references = cell
            .references()
            .iter()
            .map(|child| indexer.index_of(*child))
            .collect::<Result<Vec<_>, _>>()?;
        cells.push(RawCell {
            data: cell.data().to_vec(),
            bit_len: cell.bit_len(),
            references,
            is_exotic: cell.is_exotic(),
            level_mask: cell.level_mask(),
        });
    }

    let roots = boc
        .roots()
        .iter()
        .map(|root| indexer.index_of(*root))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RawBagOfCells { cells, roots })
}

/// Wire indices become cell ids: cell `i` of the wire list is `CellId(i)`.
pub(crate) fn convert_from_raw_boc(raw: RawBagOfCells) -> Result<BagOfCells, TonCellError> {
    let mut boc = BagOfCells::new();
    for raw_cell in raw.cells {
        let data = BitBuffer::from_bytes(&raw_cell.data, raw_cell.bit_len)?;
        let references = raw_cell
            .references
            .into_iter()
            .map(CellId::from_index)
            .collect();
        let cell = Cell::from_raw(data, references, raw_cell.is_exotic, raw_cell.level_mask)?;
        boc.push_unchecked(cell);
    }
    for root in raw.roots {
        boc.add_root(CellId::from_index(root))?;
    }
    Ok(boc)
}
