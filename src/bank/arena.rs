//! Shared storage for a response bank: a flat arena of payload cells plus
//! the side metadata store holding the per-identifier linked-list next
//! pointers. One cell backs one reservation; for the read-data bank a cell
//! holds up to a whole burst of beats.

use smallvec::SmallVec;

use crate::axi::CellAddr;

#[derive(Debug)]
struct Cell<T> {
    reserved: bool,
    beats_reserved: usize,
    beats: SmallVec<[T; 4]>,
}

impl<T> Cell<T> {
    fn idle() -> Self {
        Self {
            reserved: false,
            beats_reserved: 0,
            beats: SmallVec::new(),
        }
    }
}

#[derive(Debug)]
pub struct CellArena<T> {
    cells: Vec<Cell<T>>,
    /// Linked-list metadata: `next[a]` is only meaningful if it has been
    /// written by `link` since `a` was last reserved.
    next: Vec<CellAddr>,
}

impl<T> CellArena<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            cells: (0..capacity).map(|_| Cell::idle()).collect(),
            next: vec![0; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    pub fn free_count(&self) -> usize {
        self.cells.iter().filter(|c| !c.reserved).count()
    }

    /// Lowest-address free cell, the allocation policy of the bank.
    pub fn lowest_free(&self) -> Option<CellAddr> {
        self.cells.iter().position(|c| !c.reserved)
    }

    pub fn is_reserved(&self, cell: CellAddr) -> bool {
        self.cells[cell].reserved
    }

    pub fn reserve(&mut self, cell: CellAddr, beats: usize) {
        debug_assert!(!self.cells[cell].reserved);
        debug_assert!(beats >= 1);
        let c = &mut self.cells[cell];
        c.reserved = true;
        c.beats_reserved = beats;
        c.beats.clear();
    }

    pub fn free(&mut self, cell: CellAddr) {
        debug_assert!(self.cells[cell].reserved);
        self.cells[cell] = Cell::idle();
    }

    /// Writes the metadata entry chaining `prev` to `next`.
    pub fn link(&mut self, prev: CellAddr, next: CellAddr) {
        self.next[prev] = next;
    }

    pub fn next_of(&self, cell: CellAddr) -> CellAddr {
        self.next[cell]
    }

    pub fn beats_reserved(&self, cell: CellAddr) -> usize {
        self.cells[cell].beats_reserved
    }

    pub fn beats_arrived(&self, cell: CellAddr) -> usize {
        self.cells[cell].beats.len()
    }

    pub fn push_beat(&mut self, cell: CellAddr, beat: T) {
        let c = &mut self.cells[cell];
        debug_assert!(c.reserved && c.beats.len() < c.beats_reserved);
        c.beats.push(beat);
    }

    pub fn beat(&self, cell: CellAddr, index: usize) -> &T {
        &self.cells[cell].beats[index]
    }
}
