//! Occupancy bookkeeping for the square item grid.

use can_rush_core::{CellIndex, ItemId};

/// Dense row-major occupancy grid; each slot holds the item living in it.
#[derive(Clone, Debug)]
pub(crate) struct GridModel {
    size: u32,
    cells: Vec<Option<ItemId>>,
}

impl GridModel {
    pub(crate) fn new(size: u32) -> Self {
        let mut grid = Self {
            size: 0,
            cells: Vec::new(),
        };
        grid.initialize(size);
        grid
    }

    /// Clears every slot and rebuilds `size²` empty cells.
    pub(crate) fn initialize(&mut self, size: u32) {
        let capacity_u64 = u64::from(size) * u64::from(size);
        let capacity = usize::try_from(capacity_u64).unwrap_or(0);
        self.size = size;
        self.cells.clear();
        self.cells.resize(capacity, None);
    }

    pub(crate) fn size(&self) -> u32 {
        self.size
    }

    /// Unoccupied cells in scan order.
    pub(crate) fn empty_cells(&self) -> Vec<CellIndex> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_none())
            .filter_map(|(index, _)| u32::try_from(index).ok().map(CellIndex::new))
            .collect()
    }

    pub(crate) fn occupy(&mut self, cell: CellIndex, item: ItemId) {
        if let Some(slot) = self.slot_mut(cell) {
            debug_assert!(slot.is_none(), "occupy requires an empty cell");
            *slot = Some(item);
        }
    }

    pub(crate) fn release(&mut self, cell: CellIndex) {
        if let Some(slot) = self.slot_mut(cell) {
            *slot = None;
        }
    }

    pub(crate) fn occupant(&self, cell: CellIndex) -> Option<ItemId> {
        self.index(cell)
            .and_then(|index| self.cells.get(index).copied().flatten())
    }

    pub(crate) fn cells(&self) -> &[Option<ItemId>] {
        &self.cells
    }

    fn slot_mut(&mut self, cell: CellIndex) -> Option<&mut Option<ItemId>> {
        let index = self.index(cell)?;
        self.cells.get_mut(index)
    }

    fn index(&self, cell: CellIndex) -> Option<usize> {
        let index = usize::try_from(cell.get()).ok()?;
        (index < self.cells.len()).then_some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_rebuilds_square_of_empty_cells() {
        let mut grid = GridModel::new(3);
        grid.occupy(CellIndex::new(4), ItemId::new(1));

        grid.initialize(4);

        assert_eq!(grid.size(), 4);
        assert_eq!(grid.cells().len(), 16);
        assert_eq!(grid.empty_cells().len(), 16);
    }

    #[test]
    fn empty_cells_follow_scan_order() {
        let mut grid = GridModel::new(2);
        grid.occupy(CellIndex::new(1), ItemId::new(7));

        assert_eq!(
            grid.empty_cells(),
            vec![CellIndex::new(0), CellIndex::new(2), CellIndex::new(3)]
        );
        assert_eq!(grid.occupant(CellIndex::new(1)), Some(ItemId::new(7)));
    }

    #[test]
    fn release_frees_the_cell() {
        let mut grid = GridModel::new(2);
        grid.occupy(CellIndex::new(3), ItemId::new(2));
        grid.release(CellIndex::new(3));

        assert_eq!(grid.occupant(CellIndex::new(3)), None);
        assert_eq!(grid.empty_cells().len(), 4);
    }

    #[test]
    fn out_of_range_cells_are_ignored() {
        let mut grid = GridModel::new(1);
        grid.occupy(CellIndex::new(5), ItemId::new(1));
        grid.release(CellIndex::new(9));

        assert_eq!(grid.occupant(CellIndex::new(5)), None);
        assert_eq!(grid.empty_cells(), vec![CellIndex::new(0)]);
    }
}
