//! Reservation slot tables for in-flight write and read bursts.
//!
//! Each slot tracks one admitted burst with per-beat bitmaps. A write beat
//! becomes schedulable once its data has arrived; a read beat is
//! schedulable as soon as the address request is admitted. Beats beyond
//! the true burst length are vacuously satisfied at admission so that the
//! completion check is a plain full-mask compare.

use crate::axi::{CellAddr, ReadAddress, WriteAddress};
use crate::engine::age::{AgeTracker, Entity};
use crate::engine::cost::{CostClass, CostModel};

/// Per-beat bitmap. Burst lengths are capped at 32 by configuration.
pub type BeatMask = u32;

fn full_mask(bits: usize) -> BeatMask {
    debug_assert!(bits >= 1 && bits <= 32);
    if bits == 32 {
        BeatMask::MAX
    } else {
        (1 << bits) - 1
    }
}

fn below_mask(bits: usize) -> BeatMask {
    if bits == 0 {
        0
    } else {
        full_mask(bits)
    }
}

#[derive(Debug, Clone)]
pub struct WriteSlot {
    pub valid: bool,
    pub iid: CellAddr,
    pub addr: u64,
    pub burst_len: usize,
    pub burst_size: u32,
    pub data_arrived: BeatMask,
    pub in_flight: BeatMask,
    pub done: BeatMask,
}

impl WriteSlot {
    fn idle() -> Self {
        Self {
            valid: false,
            iid: 0,
            addr: 0,
            burst_len: 0,
            burst_size: 0,
            data_arrived: 0,
            in_flight: 0,
            done: 0,
        }
    }

    pub fn beat_addr(&self, entry: usize) -> u64 {
        self.addr + ((entry as u64) << self.burst_size)
    }

    /// True beats still waiting for their write data.
    fn unfilled(&self, max_entries: usize) -> BeatMask {
        !self.data_arrived & full_mask(max_entries) & below_mask(self.burst_len)
    }

    /// Beats eligible for dispatch: data arrived, not dispatched, not done.
    fn schedulable(&self, max_entries: usize) -> BeatMask {
        self.data_arrived & !self.in_flight & !self.done & full_mask(max_entries)
    }
}

#[derive(Debug, Clone)]
pub struct ReadSlot {
    pub valid: bool,
    pub iid: CellAddr,
    pub addr: u64,
    pub burst_len: usize,
    pub burst_size: u32,
    pub in_flight: BeatMask,
    pub done: BeatMask,
}

impl ReadSlot {
    fn idle() -> Self {
        Self {
            valid: false,
            iid: 0,
            addr: 0,
            burst_len: 0,
            burst_size: 0,
            in_flight: 0,
            done: 0,
        }
    }

    pub fn beat_addr(&self, entry: usize) -> u64 {
        self.addr + ((entry as u64) << self.burst_size)
    }

    fn schedulable(&self, max_entries: usize) -> BeatMask {
        !self.in_flight & !self.done & full_mask(max_entries)
    }
}

/// Which kind of slot a scheduling candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Write,
    Read,
}

/// One candidate memory operation: a specific beat of a specific slot.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub kind: SlotKind,
    pub slot: usize,
    pub entry: usize,
    pub cost: CostClass,
    pub addr: u64,
}

#[derive(Debug)]
pub struct SlotTable {
    pub wslots: Vec<WriteSlot>,
    pub rslots: Vec<ReadSlot>,
    max_wburst: usize,
    max_rburst: usize,
}

impl SlotTable {
    pub fn new(num_wslots: usize, num_rslots: usize, max_wburst: usize, max_rburst: usize) -> Self {
        assert!(max_wburst >= 1 && max_wburst <= 32);
        assert!(max_rburst >= 1 && max_rburst <= 32);
        Self {
            wslots: vec![WriteSlot::idle(); num_wslots],
            rslots: vec![ReadSlot::idle(); num_rslots],
            max_wburst,
            max_rburst,
        }
    }

    pub fn max_wburst(&self) -> usize {
        self.max_wburst
    }

    pub fn has_free_wslot(&self) -> bool {
        self.wslots.iter().any(|s| !s.valid)
    }

    pub fn has_free_rslot(&self) -> bool {
        self.rslots.iter().any(|s| !s.valid)
    }

    /// Admits a write burst into the lowest-indexed free slot.
    ///
    /// `immediate_beats` write-data beats are credited at admission (those
    /// that arrived before the address). Beats beyond the true burst length
    /// are marked arrived and done right away. Returns the slot index.
    pub fn admit_write(
        &mut self,
        iid: CellAddr,
        req: &WriteAddress,
        immediate_beats: usize,
        age: &mut AgeTracker,
    ) -> Option<usize> {
        debug_assert!(req.burst_len >= 1 && req.burst_len <= self.max_wburst);
        let max = self.max_wburst;
        let idx = self.wslots.iter().position(|s| !s.valid)?;
        let beyond = full_mask(max) & !below_mask(req.burst_len);
        let credited = immediate_beats.min(req.burst_len);
        let slot = &mut self.wslots[idx];
        slot.valid = true;
        slot.iid = iid;
        slot.addr = req.addr;
        slot.burst_len = req.burst_len;
        slot.burst_size = req.burst_size;
        slot.data_arrived = below_mask(credited) | beyond;
        slot.in_flight = 0;
        slot.done = beyond;
        age.mark_newest(Entity::WriteSlot(idx));
        for entry in 0..credited {
            age.mark_newest(Entity::WriteEntry { slot: idx, entry });
        }
        Some(idx)
    }

    /// Admits a read burst into the lowest-indexed free slot.
    pub fn admit_read(&mut self, iid: CellAddr, req: &ReadAddress, age: &mut AgeTracker) -> Option<usize> {
        debug_assert!(req.burst_len >= 1 && req.burst_len <= self.max_rburst);
        let max = self.max_rburst;
        let idx = self.rslots.iter().position(|s| !s.valid)?;
        let beyond = full_mask(max) & !below_mask(req.burst_len);
        let slot = &mut self.rslots[idx];
        slot.valid = true;
        slot.iid = iid;
        slot.addr = req.addr;
        slot.burst_len = req.burst_len;
        slot.burst_size = req.burst_size;
        slot.in_flight = 0;
        slot.done = beyond;
        age.mark_newest(Entity::ReadSlot(idx));
        Some(idx)
    }

    /// Credits one write-data beat to the oldest valid write slot that
    /// still has an unfilled entry, lowest entry index first. Returns the
    /// (slot, entry) that was filled, or `None` if every slot is full.
    pub fn credit_wdata(&mut self, age: &mut AgeTracker) -> Option<(usize, usize)> {
        let mut target: Option<usize> = None;
        for (idx, slot) in self.wslots.iter().enumerate() {
            if !slot.valid || slot.unfilled(self.max_wburst) == 0 {
                continue;
            }
            match target {
                None => target = Some(idx),
                Some(best) => {
                    if age.is_older(Entity::WriteSlot(idx), Entity::WriteSlot(best)) {
                        target = Some(idx);
                    }
                }
            }
        }
        let idx = target?;
        let entry = self.wslots[idx].unfilled(self.max_wburst).trailing_zeros() as usize;
        self.wslots[idx].data_arrived |= 1 << entry;
        age.mark_newest(Entity::WriteEntry { slot: idx, entry });
        Some((idx, entry))
    }

    /// Slot-local optimum for one write slot: the cheapest schedulable
    /// beat, ties broken oldest-entry-first.
    fn wslot_best(
        &self,
        idx: usize,
        cost: &CostModel,
        open_row: Option<u64>,
        age: &AgeTracker,
    ) -> Option<(usize, CostClass)> {
        let slot = &self.wslots[idx];
        if !slot.valid {
            return None;
        }
        let mut best: Option<(usize, CostClass)> = None;
        let mut mask = slot.schedulable(self.max_wburst);
        while mask != 0 {
            let entry = mask.trailing_zeros() as usize;
            mask &= mask - 1;
            let class = cost.classify(slot.beat_addr(entry), open_row);
            best = match best {
                None => Some((entry, class)),
                Some((be, bc)) => {
                    if class < bc
                        || (class == bc
                            && age.is_older(
                                Entity::WriteEntry { slot: idx, entry },
                                Entity::WriteEntry { slot: idx, entry: be },
                            ))
                    {
                        Some((entry, class))
                    } else {
                        Some((be, bc))
                    }
                }
            };
        }
        best
    }

    /// Slot-local optimum for one read slot. All beats of a read burst
    /// share the slot's age, so equal-cost ties fall to the lowest index.
    fn rslot_best(&self, idx: usize, cost: &CostModel, open_row: Option<u64>) -> Option<(usize, CostClass)> {
        let slot = &self.rslots[idx];
        if !slot.valid {
            return None;
        }
        let mut best: Option<(usize, CostClass)> = None;
        let mut mask = slot.schedulable(self.max_rburst);
        while mask != 0 {
            let entry = mask.trailing_zeros() as usize;
            mask &= mask - 1;
            let class = cost.classify(slot.beat_addr(entry), open_row);
            best = match best {
                None => Some((entry, class)),
                Some((_, bc)) if class < bc => Some((entry, class)),
                Some(prev) => Some(prev),
            };
        }
        best
    }

    /// Cross-slot optimum among write slots: cheapest slot-local optimum,
    /// ties broken oldest-slot-first.
    pub fn best_write(&self, cost: &CostModel, open_row: Option<u64>, age: &AgeTracker) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        for idx in 0..self.wslots.len() {
            let Some((entry, class)) = self.wslot_best(idx, cost, open_row, age) else {
                continue;
            };
            let replace = match &best {
                None => true,
                Some(b) => {
                    class < b.cost
                        || (class == b.cost
                            && age.is_older(Entity::WriteSlot(idx), Entity::WriteSlot(b.slot)))
                }
            };
            if replace {
                best = Some(Candidate {
                    kind: SlotKind::Write,
                    slot: idx,
                    entry,
                    cost: class,
                    addr: self.wslots[idx].beat_addr(entry),
                });
            }
        }
        best
    }

    /// Cross-slot optimum among read slots.
    pub fn best_read(&self, cost: &CostModel, open_row: Option<u64>, age: &AgeTracker) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        for idx in 0..self.rslots.len() {
            let Some((entry, class)) = self.rslot_best(idx, cost, open_row) else {
                continue;
            };
            let replace = match &best {
                None => true,
                Some(b) => {
                    class < b.cost
                        || (class == b.cost
                            && age.is_older(Entity::ReadSlot(idx), Entity::ReadSlot(b.slot)))
                }
            };
            if replace {
                best = Some(Candidate {
                    kind: SlotKind::Read,
                    slot: idx,
                    entry,
                    cost: class,
                    addr: self.rslots[idx].beat_addr(entry),
                });
            }
        }
        best
    }

    /// Global pick. Precedence is cost first, age second, write-preference
    /// third: writes win unless the read candidate is strictly cheaper, or
    /// equally expensive and strictly older than the chosen write beat.
    pub fn choose(&self, cost: &CostModel, open_row: Option<u64>, age: &AgeTracker) -> Option<Candidate> {
        let write = self.best_write(cost, open_row, age);
        let read = self.best_read(cost, open_row, age);
        match (write, read) {
            (None, None) => None,
            (Some(w), None) => Some(w),
            (None, Some(r)) => Some(r),
            (Some(w), Some(r)) => {
                let read_older = age.is_older(
                    Entity::ReadSlot(r.slot),
                    Entity::WriteEntry { slot: w.slot, entry: w.entry },
                );
                if w.cost < r.cost || (w.cost == r.cost && !read_older) {
                    Some(w)
                } else {
                    Some(r)
                }
            }
        }
    }

    /// Marks a chosen candidate as dispatched to the rank.
    pub fn set_in_flight(&mut self, cand: &Candidate) {
        match cand.kind {
            SlotKind::Write => {
                let slot = &mut self.wslots[cand.slot];
                debug_assert!(slot.valid && slot.in_flight & (1 << cand.entry) == 0);
                slot.in_flight |= 1 << cand.entry;
            }
            SlotKind::Read => {
                let slot = &mut self.rslots[cand.slot];
                debug_assert!(slot.valid && slot.in_flight & (1 << cand.entry) == 0);
                slot.in_flight |= 1 << cand.entry;
            }
        }
    }

    /// Applies the global completion pulse: every in-flight beat of every
    /// slot becomes done. Returns the per-slot count of read beats that
    /// completed on this pulse.
    pub fn apply_done_pulse(&mut self) -> Vec<(usize, u32)> {
        for slot in self.wslots.iter_mut() {
            slot.done |= slot.in_flight;
            slot.in_flight = 0;
        }
        let mut completed_reads = Vec::new();
        for (idx, slot) in self.rslots.iter_mut().enumerate() {
            if slot.in_flight != 0 {
                completed_reads.push((idx, slot.in_flight.count_ones()));
            }
            slot.done |= slot.in_flight;
            slot.in_flight = 0;
        }
        completed_reads
    }

    /// Frees every write slot whose beats are all done, returning their
    /// internal ids.
    pub fn retire_writes(&mut self) -> Vec<CellAddr> {
        let full = full_mask(self.max_wburst);
        let mut retired = Vec::new();
        for slot in self.wslots.iter_mut() {
            if slot.valid && slot.done == full {
                slot.valid = false;
                retired.push(slot.iid);
            }
        }
        retired
    }

    /// Frees every read slot whose beats are all done.
    pub fn retire_reads(&mut self) -> Vec<CellAddr> {
        let full = full_mask(self.max_rburst);
        let mut retired = Vec::new();
        for slot in self.rslots.iter_mut() {
            if slot.valid && slot.done == full {
                slot.valid = false;
                retired.push(slot.iid);
            }
        }
        retired
    }

    /// Invariant from the data model: a write beat within the true burst
    /// length can only be in flight or done once its data has arrived.
    #[cfg(debug_assertions)]
    pub fn debug_validate(&self) {
        for slot in &self.wslots {
            if !slot.valid {
                continue;
            }
            let true_beats = below_mask(slot.burst_len);
            debug_assert_eq!(slot.in_flight & true_beats & !slot.data_arrived, 0);
            debug_assert_eq!(slot.done & true_beats & !slot.data_arrived, 0);
            debug_assert_eq!(slot.in_flight & slot.done, 0);
        }
        for slot in &self.rslots {
            if slot.valid {
                debug_assert_eq!(slot.in_flight & slot.done, 0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axi::{ReadAddress, WriteAddress};
    use crate::sim::config::DramConfig;

    fn cost() -> CostModel {
        CostModel::new(&DramConfig {
            row_hit_cost: 3,
            activation_cost: 4,
            precharge_cost: 5,
            row_shift: 10,
        })
    }

    fn table() -> (SlotTable, AgeTracker) {
        (SlotTable::new(3, 2, 4, 4), AgeTracker::new(3, 4, 2))
    }

    #[test]
    fn write_admission_uses_lowest_free_slot() {
        let (mut t, mut age) = table();
        let req = WriteAddress::new(0, 0x100, 2, 2);
        assert_eq!(t.admit_write(5, &req, 0, &mut age), Some(0));
        assert_eq!(t.admit_write(6, &req, 0, &mut age), Some(1));
        t.wslots[0].valid = false;
        assert_eq!(t.admit_write(7, &req, 0, &mut age), Some(0));
    }

    #[test]
    fn beats_beyond_burst_length_are_pre_done() {
        let (mut t, mut age) = table();
        let req = WriteAddress::new(0, 0x100, 2, 2);
        t.admit_write(5, &req, 1, &mut age).unwrap();
        let slot = &t.wslots[0];
        // Beats 2 and 3 are beyond the burst, beat 0 was credited.
        assert_eq!(slot.data_arrived, 0b1101);
        assert_eq!(slot.done, 0b1100);
    }

    #[test]
    fn immediate_credit_is_capped_at_burst_length() {
        let (mut t, mut age) = table();
        let req = WriteAddress::new(0, 0x100, 2, 2);
        t.admit_write(5, &req, 10, &mut age).unwrap();
        assert_eq!(t.wslots[0].data_arrived, 0b1111);
        assert_eq!(t.wslots[0].done, 0b1100);
    }

    #[test]
    fn wdata_goes_to_oldest_slot_lowest_entry() {
        let (mut t, mut age) = table();
        let req = WriteAddress::new(0, 0x100, 3, 2);
        t.admit_write(5, &req, 0, &mut age).unwrap();
        t.admit_write(6, &req, 0, &mut age).unwrap();
        assert_eq!(t.credit_wdata(&mut age), Some((0, 0)));
        assert_eq!(t.credit_wdata(&mut age), Some((0, 1)));
        assert_eq!(t.credit_wdata(&mut age), Some((0, 2)));
        assert_eq!(t.credit_wdata(&mut age), Some((1, 0)));
    }

    #[test]
    fn wdata_with_no_open_slot_is_refused() {
        let (mut t, mut age) = table();
        assert_eq!(t.credit_wdata(&mut age), None);
        let req = WriteAddress::new(0, 0x100, 1, 2);
        t.admit_write(5, &req, 1, &mut age).unwrap();
        assert_eq!(t.credit_wdata(&mut age), None);
    }

    #[test]
    fn cheaper_beat_wins_within_slot() {
        let (mut t, mut age) = table();
        // Burst striding across a row boundary: beat 0 in row 0, beat 1 in row 1.
        let req = WriteAddress::new(0, 0x3fc, 2, 2);
        t.admit_write(5, &req, 2, &mut age).unwrap();
        let cand = t.best_write(&cost(), Some(0x400), &age).unwrap();
        assert_eq!(cand.entry, 1);
        assert_eq!(cand.cost, CostClass::RowHit);
    }

    #[test]
    fn equal_cost_goes_to_older_entry() {
        let (mut t, mut age) = table();
        let req = WriteAddress::new(0, 0x100, 2, 2);
        t.admit_write(5, &req, 2, &mut age).unwrap();
        // Both beats are row hits against an open matching row.
        let cand = t.best_write(&cost(), Some(0x100), &age).unwrap();
        assert_eq!(cand.entry, 0);
    }

    #[test]
    fn cross_slot_tie_goes_to_older_slot() {
        let (mut t, mut age) = table();
        let req = WriteAddress::new(0, 0x100, 1, 2);
        t.admit_write(5, &req, 1, &mut age).unwrap();
        t.admit_write(6, &req, 1, &mut age).unwrap();
        let cand = t.best_write(&cost(), None, &age).unwrap();
        assert_eq!(cand.slot, 0);
    }

    #[test]
    fn write_wins_cost_tie_against_younger_read() {
        let (mut t, mut age) = table();
        t.admit_write(5, &WriteAddress::new(0, 0x100, 1, 2), 1, &mut age).unwrap();
        t.admit_read(3, &ReadAddress::new(0, 0x200, 1, 2), &mut age).unwrap();
        let cand = t.choose(&cost(), None, &age).unwrap();
        assert_eq!(cand.kind, SlotKind::Write);
    }

    #[test]
    fn strictly_older_read_wins_cost_tie() {
        let (mut t, mut age) = table();
        t.admit_read(3, &ReadAddress::new(0, 0x200, 1, 2), &mut age).unwrap();
        t.admit_write(5, &WriteAddress::new(0, 0x100, 1, 2), 1, &mut age).unwrap();
        let cand = t.choose(&cost(), None, &age).unwrap();
        assert_eq!(cand.kind, SlotKind::Read);
    }

    #[test]
    fn cheaper_read_beats_older_write() {
        let (mut t, mut age) = table();
        t.admit_write(5, &WriteAddress::new(0, 0x800, 1, 2), 1, &mut age).unwrap();
        t.admit_read(3, &ReadAddress::new(0, 0x420, 1, 2), &mut age).unwrap();
        // Row 1 is open: the read is a hit, the write a conflict.
        let cand = t.choose(&cost(), Some(0x400), &age).unwrap();
        assert_eq!(cand.kind, SlotKind::Read);
    }

    #[test]
    fn done_pulse_retires_write_slot() {
        let (mut t, mut age) = table();
        t.admit_write(5, &WriteAddress::new(0, 0x100, 1, 2), 1, &mut age).unwrap();
        let cand = t.choose(&cost(), None, &age).unwrap();
        t.set_in_flight(&cand);
        assert!(t.choose(&cost(), None, &age).is_none());
        t.apply_done_pulse();
        assert_eq!(t.retire_writes(), vec![5]);
        assert!(!t.wslots[0].valid);
    }

    #[test]
    fn done_pulse_reports_completed_read_beats() {
        let (mut t, mut age) = table();
        t.admit_read(3, &ReadAddress::new(0, 0x100, 2, 2), &mut age).unwrap();
        let cand = t.choose(&cost(), None, &age).unwrap();
        t.set_in_flight(&cand);
        assert_eq!(t.apply_done_pulse(), vec![(0, 1)]);
        assert!(t.retire_reads().is_empty());
        let cand = t.choose(&cost(), None, &age).unwrap();
        t.set_in_flight(&cand);
        assert_eq!(t.apply_done_pulse(), vec![(0, 1)]);
        assert_eq!(t.retire_reads(), vec![3]);
    }
}
