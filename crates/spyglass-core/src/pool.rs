//! Virtualised list of cells.
//!
//! A pool keeps at most `capacity` cells alive no matter how many items the
//! data source reports. Cell `i` always shows item `top + i`; scrolling moves
//! `top` and rebinds every active cell instead of creating new ones.

use tracing::debug;

pub trait PoolCell: Default {
    fn is_enabled(&self) -> bool;
    /// Returns the cell to its unbound state
    fn disable(&mut self);
}

pub trait CellPoolDataSource<C> {
    fn item_count(&self) -> usize;

    /// Binds item `index` to `cell`. Must overwrite everything the previous item set.
    fn set_cell(&mut self, cell_id: usize, cell: &mut C, index: usize);

    fn on_cell_borrowed(&mut self, _cell_id: usize, _cell: &mut C) {}

    fn disable_cell(&mut self, _cell_id: usize, cell: &mut C)
    where
        C: PoolCell,
    {
        cell.disable();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Rebind the cells to the items they already show
    Soft,
    /// Re-query the item count and reflow from `top`
    Hard { jump_to_top: bool },
}

#[derive(Debug)]
pub struct CellPool<C> {
    cells: Vec<C>,
    bound: Vec<Option<usize>>,
    capacity: usize,
    top: usize,
    count: usize,
}

impl<C: PoolCell> CellPool<C> {
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: Vec::new(),
            bound: Vec::new(),
            capacity: capacity.max(1),
            top: 0,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn top(&self) -> usize {
        self.top
    }

    /// Item count seen by the last hard refresh
    pub fn item_count(&self) -> usize {
        self.count
    }

    /// Number of cells ever created
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cell(&self, id: usize) -> Option<&C> {
        self.cells.get(id)
    }

    pub fn cell_mut(&mut self, id: usize) -> Option<&mut C> {
        self.cells.get_mut(id)
    }

    /// Item shown by a cell
    pub fn index_of(&self, cell_id: usize) -> Option<usize> {
        self.bound.get(cell_id).copied().flatten()
    }

    /// Cell showing an item, if it is in view
    pub fn cell_for(&self, index: usize) -> Option<usize> {
        self.bound.iter().position(|b| *b == Some(index))
    }

    /// Active cells with the item each one shows, in display order
    pub fn visible(&self) -> impl Iterator<Item = (usize, &C)> + '_ {
        self.cells
            .iter()
            .zip(&self.bound)
            .filter_map(|(cell, bound)| bound.map(|index| (index, cell)))
            .filter(|(_, cell)| cell.is_enabled())
    }

    pub fn refresh(&mut self, source: &mut dyn CellPoolDataSource<C>, mode: RefreshMode) {
        match mode {
            RefreshMode::Soft => {
                let count = source.item_count();
                for id in 0..self.cells.len() {
                    match self.bound[id] {
                        Some(index) if index < count => source.set_cell(id, &mut self.cells[id], index),
                        Some(_) => {
                            source.disable_cell(id, &mut self.cells[id]);
                            self.bound[id] = None;
                        }
                        None => {}
                    }
                }
            }
            RefreshMode::Hard { jump_to_top } => {
                if jump_to_top {
                    self.top = 0;
                }
                self.reflow(source);
            }
        }
    }

    /// Moves the first visible item and rebinds every cell
    pub fn scroll_to(&mut self, source: &mut dyn CellPoolDataSource<C>, top: usize) {
        self.top = top;
        self.reflow(source);
    }

    fn reflow(&mut self, source: &mut dyn CellPoolDataSource<C>) {
        self.count = source.item_count();
        self.top = self.top.min(self.count.saturating_sub(self.capacity));
        let visible = self.capacity.min(self.count - self.top);

        while self.cells.len() < visible {
            let id = self.cells.len();
            let mut cell = C::default();
            source.on_cell_borrowed(id, &mut cell);
            self.cells.push(cell);
            self.bound.push(None);
            debug!("Cell pool grew to {} cells", self.cells.len());
        }

        for id in 0..self.cells.len() {
            if id < visible {
                let index = self.top + id;
                source.set_cell(id, &mut self.cells[id], index);
                self.bound[id] = Some(index);
            } else if self.bound[id].is_some() || self.cells[id].is_enabled() {
                source.disable_cell(id, &mut self.cells[id]);
                self.bound[id] = None;
            }
        }
    }

    /// Unbinds every cell, keeping them for reuse
    pub fn clear(&mut self, source: &mut dyn CellPoolDataSource<C>) {
        for id in 0..self.cells.len() {
            if self.bound[id].is_some() || self.cells[id].is_enabled() {
                source.disable_cell(id, &mut self.cells[id]);
                self.bound[id] = None;
            }
        }
        self.top = 0;
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default, Debug)]
    struct Row {
        text: Option<String>,
        enabled: bool,
    }

    impl PoolCell for Row {
        fn is_enabled(&self) -> bool {
            self.enabled
        }

        fn disable(&mut self) {
            self.enabled = false;
            self.text = None;
        }
    }

    struct Words {
        items: Vec<&'static str>,
        created: usize,
    }

    impl CellPoolDataSource<Row> for Words {
        fn item_count(&self) -> usize {
            self.items.len()
        }

        fn set_cell(&mut self, _cell_id: usize, cell: &mut Row, index: usize) {
            cell.enabled = true;
            cell.text = Some(self.items[index].to_string());
        }

        fn on_cell_borrowed(&mut self, _cell_id: usize, _cell: &mut Row) {
            self.created += 1;
        }
    }

    fn shown(pool: &CellPool<Row>) -> Vec<(usize, String)> {
        pool.visible()
            .map(|(i, c)| (i, c.text.clone().unwrap_or_default()))
            .collect()
    }

    #[test]
    fn test_cell_count_bounded_by_capacity() {
        let mut words = Words {
            items: vec!["a", "b", "c", "d", "e", "f"],
            created: 0,
        };
        let mut pool = CellPool::new(3);
        pool.refresh(&mut words, RefreshMode::Hard { jump_to_top: true });
        assert_eq!(pool.cell_count(), 3);
        assert_eq!(shown(&pool), vec![(0, "a".into()), (1, "b".into()), (2, "c".into())]);

        pool.scroll_to(&mut words, 2);
        assert_eq!(pool.cell_count(), 3);
        assert_eq!(words.created, 3);
        assert_eq!(shown(&pool), vec![(2, "c".into()), (3, "d".into()), (4, "e".into())]);
    }

    #[test]
    fn test_scroll_past_end_clamps() {
        let mut words = Words {
            items: vec!["a", "b", "c", "d"],
            created: 0,
        };
        let mut pool = CellPool::new(3);
        pool.scroll_to(&mut words, 10);
        assert_eq!(pool.top(), 1);
        assert_eq!(shown(&pool).first().map(|(i, _)| *i), Some(1));
    }

    #[test]
    fn test_shrink_disables_extra_cells() {
        let mut words = Words {
            items: vec!["a", "b", "c"],
            created: 0,
        };
        let mut pool = CellPool::new(5);
        pool.refresh(&mut words, RefreshMode::Hard { jump_to_top: false });
        words.items.truncate(1);
        pool.refresh(&mut words, RefreshMode::Hard { jump_to_top: false });
        assert_eq!(shown(&pool), vec![(0, "a".into())]);
        assert!(pool.cell(1).map(|c| c.text.is_none()).unwrap_or(false));
    }

    #[test]
    fn test_soft_refresh_keeps_scroll() {
        let mut words = Words {
            items: vec!["a", "b", "c", "d"],
            created: 0,
        };
        let mut pool = CellPool::new(2);
        pool.scroll_to(&mut words, 2);
        words.items[2] = "C";
        pool.refresh(&mut words, RefreshMode::Soft);
        assert_eq!(pool.top(), 2);
        assert_eq!(shown(&pool), vec![(2, "C".into()), (3, "d".into())]);
    }
}
