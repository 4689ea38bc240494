use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tonkit_core::cell::{BagOfCells, Cell, CellId, TonCellError, MAX_CELL_BITS, MAX_CELL_REFERENCES};

#[allow(dead_code)]
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Random DAG of `num_cells` cells where every cell references its predecessor and
/// up to three other earlier cells, so all cells are reachable from the root and often
/// shared by several parents. Bit lengths span the full 0..=1023 range. The last cell
/// is added as the root.
#[allow(dead_code)]
pub fn random_dag(
    rng: &mut StdRng,
    num_cells: usize,
) -> Result<(BagOfCells, CellId), TonCellError> {
    let mut boc = BagOfCells::new();
    let mut ids: Vec<CellId> = Vec::with_capacity(num_cells);
    for _ in 0..num_cells.max(1) {
        let mut cell = Cell::new();
        let bit_len = rng.gen_range(0..=MAX_CELL_BITS);
        for _ in 0..bit_len {
            cell.bits_mut().store_bit(rng.gen())?;
        }
        if let Some(previous) = ids.last() {
            cell.store_reference(*previous)?;
            let extra_refs = rng.gen_range(0..MAX_CELL_REFERENCES);
            for _ in 0..extra_refs {
                let child = ids[rng.gen_range(0..ids.len())];
                cell.store_reference(child)?;
            }
        }
        ids.push(boc.add_cell(cell)?);
    }
    let root = ids[ids.len() - 1];
    boc.add_root(root)?;
    Ok((boc, root))
}

/// Hashes of the cells reachable from `root`, each cell once, in depth-first order.
#[allow(dead_code)]
pub fn tree_hashes(boc: &mut BagOfCells, root: CellId) -> Result<Vec<[u8; 32]>, TonCellError> {
    let mut seen = HashSet::new();
    let mut hashes = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        hashes.push(boc.cell_hash(id)?);
        stack.extend(boc.cell(id)?.references().iter().rev());
    }
    Ok(hashes)
}
