//! Delay calculator: composes the cost model, age tracker, slot tables and
//! rank model into the block that decides when each admitted request is
//! simulation-complete, and drives the response banks' release-enable
//! signals.

use log::{debug, trace};
use serde::Serialize;

use crate::axi::{CellAddr, Cycle, ReadAddress, WriteAddress};
use crate::engine::age::AgeTracker;
use crate::engine::cost::{CostClass, CostModel};
use crate::engine::rank::RankModel;
use crate::engine::slots::SlotTable;
use crate::sim::config::{DramConfig, SimmemConfig};

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CalculatorStats {
    pub waddr_admitted: u64,
    pub raddr_admitted: u64,
    pub wdata_beats: u64,
    pub row_hit_dispatches: u64,
    pub activate_dispatches: u64,
    pub precharge_dispatches: u64,
    pub write_bursts_completed: u64,
    pub read_beats_completed: u64,
}

#[derive(Debug)]
pub struct DelayCalculator {
    cost: CostModel,
    age: AgeTracker,
    slots: SlotTable,
    rank: RankModel,
    cycle: Cycle,
    /// Write-data beats that arrived before any slot could take them.
    pending_wdata: usize,
    max_pending_wdata: usize,
    /// One-shot release-enable bit per write-response bank cell.
    wresp_release: Vec<bool>,
    /// Per-beat release-enable counter per read-data bank cell.
    rdata_release: Vec<u32>,
    stats: CalculatorStats,
}

impl DelayCalculator {
    pub fn new(config: &SimmemConfig, dram: &DramConfig) -> Self {
        Self {
            cost: CostModel::new(dram),
            age: AgeTracker::new(config.num_wslots, config.max_wburst_len, config.num_rslots),
            slots: SlotTable::new(
                config.num_wslots,
                config.num_rslots,
                config.max_wburst_len,
                config.max_rburst_len,
            ),
            rank: RankModel::new(),
            cycle: 0,
            pending_wdata: 0,
            max_pending_wdata: config.max_pending_wdata,
            wresp_release: vec![false; config.wresp_bank_capacity],
            rdata_release: vec![0; config.rdata_bank_capacity],
            stats: CalculatorStats::default(),
        }
    }

    pub fn waddr_ready(&self) -> bool {
        self.slots.has_free_wslot()
    }

    pub fn raddr_ready(&self) -> bool {
        self.slots.has_free_rslot()
    }

    pub fn wdata_ready(&self) -> bool {
        self.pending_wdata < self.max_pending_wdata
    }

    /// Admits a write address tagged with the internal id granted by the
    /// write-response bank. Beats that arrived ahead of the address are
    /// credited immediately. Returns false (with no state change) if no
    /// slot is free.
    pub fn accept_waddr(&mut self, iid: CellAddr, req: &WriteAddress) -> bool {
        let credited = self.pending_wdata.min(req.burst_len);
        let Some(slot) = self.slots.admit_write(iid, req, credited, &mut self.age) else {
            return false;
        };
        self.pending_wdata -= credited;
        self.stats.waddr_admitted += 1;
        trace!(
            "[{}] waddr admitted: iid={} addr={:#x} len={} wslot={} credited={}",
            self.cycle, iid, req.addr, req.burst_len, slot, credited
        );
        true
    }

    /// Admits a read address tagged with the internal id granted by the
    /// read-data bank.
    pub fn accept_raddr(&mut self, iid: CellAddr, req: &ReadAddress) -> bool {
        let Some(slot) = self.slots.admit_read(iid, req, &mut self.age) else {
            return false;
        };
        self.stats.raddr_admitted += 1;
        trace!(
            "[{}] raddr admitted: iid={} addr={:#x} len={} rslot={}",
            self.cycle, iid, req.addr, req.burst_len, slot
        );
        true
    }

    /// Accepts one write-data beat. Identifier-less per AXI: the beat goes
    /// to the oldest slot with an unfilled entry, or is counted for a
    /// future address if no slot can take it.
    pub fn accept_wdata(&mut self) -> bool {
        if let Some((slot, entry)) = self.slots.credit_wdata(&mut self.age) {
            self.stats.wdata_beats += 1;
            trace!("[{}] wdata beat -> wslot={} entry={}", self.cycle, slot, entry);
            return true;
        }
        if self.pending_wdata >= self.max_pending_wdata {
            return false;
        }
        self.pending_wdata += 1;
        self.stats.wdata_beats += 1;
        trace!("[{}] wdata beat pending (count={})", self.cycle, self.pending_wdata);
        true
    }

    /// Release-enable bus towards the write-response bank, one bit per cell.
    pub fn wresp_release_en(&self) -> &[bool] {
        &self.wresp_release
    }

    /// Release-enable counters towards the read-data bank, one per cell.
    pub fn rdata_release_en(&self) -> &[u32] {
        &self.rdata_release
    }

    /// Feedback from the write-response bank: the cell was released to the
    /// requester, clear its release-enable bit.
    pub fn wresp_released(&mut self, cell: CellAddr) {
        debug_assert!(self.wresp_release[cell], "release feedback for idle cell {cell}");
        self.wresp_release[cell] = false;
    }

    /// Feedback from the read-data bank: one beat of the cell was released.
    /// The counter must never go negative.
    pub fn rdata_released(&mut self, cell: CellAddr) {
        assert!(self.rdata_release[cell] > 0, "release counter underflow for cell {cell}");
        self.rdata_release[cell] -= 1;
    }

    /// One synchronous cycle: age the rank, apply the completion pulse,
    /// retire finished slots, then dispatch the globally best candidate if
    /// the rank is free.
    pub fn step(&mut self) {
        self.cycle += 1;

        if self.rank.tick() {
            let completed_reads = self.slots.apply_done_pulse();
            for (slot, beats) in completed_reads {
                let iid = self.slots.rslots[slot].iid;
                self.rdata_release[iid] += beats;
                self.stats.read_beats_completed += u64::from(beats);
                trace!("[{}] read beats done: rslot={} iid={} beats={}", self.cycle, slot, iid, beats);
            }
            for iid in self.slots.retire_writes() {
                debug_assert!(!self.wresp_release[iid]);
                self.wresp_release[iid] = true;
                self.stats.write_bursts_completed += 1;
                debug!("[{}] write burst complete: iid={}", self.cycle, iid);
            }
            for iid in self.slots.retire_reads() {
                debug!("[{}] read burst complete: iid={}", self.cycle, iid);
            }
        }

        if self.rank.is_free() {
            if let Some(cand) = self.slots.choose(&self.cost, self.rank.open_row(), &self.age) {
                self.slots.set_in_flight(&cand);
                self.rank.dispatch(cand.addr, self.cost.decompress(cand.cost));
                match cand.cost {
                    CostClass::RowHit => self.stats.row_hit_dispatches += 1,
                    CostClass::ActivateThenHit => self.stats.activate_dispatches += 1,
                    CostClass::PrechargeActivateHit => self.stats.precharge_dispatches += 1,
                }
                debug!(
                    "[{}] dispatch {:?} slot={} entry={} addr={:#x} cost={:?}",
                    self.cycle,
                    cand.kind,
                    cand.slot,
                    cand.entry,
                    cand.addr,
                    cand.cost
                );
            }
        }

        #[cfg(debug_assertions)]
        self.slots.debug_validate();
    }

    /// True when nothing is in flight anywhere in the calculator.
    pub fn is_idle(&self) -> bool {
        self.rank.is_idle()
            && self.pending_wdata == 0
            && self.slots.wslots.iter().all(|s| !s.valid)
            && self.slots.rslots.iter().all(|s| !s.valid)
    }

    pub fn stats(&self) -> &CalculatorStats {
        &self.stats
    }
}
