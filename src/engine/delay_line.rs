//! Fixed-delay release tracker: the simple stand-in for the full delay
//! calculator. Each internal id gets a caller-supplied delay at admission;
//! when the delay expires the id's release counter goes up, and the
//! released-address feedback brings it back down.

use crate::axi::{CellAddr, Cycle};

#[derive(Debug)]
pub struct DelayLine {
    /// Remaining cycles and pending beat count per in-flight internal id.
    pending: Vec<Option<(Cycle, u32)>>,
    release: Vec<u32>,
}

impl DelayLine {
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: vec![None; capacity],
            release: vec![0; capacity],
        }
    }

    /// Arms `iid` to release `beats` beats after `delay` cycles. The id
    /// must not already be armed.
    pub fn set(&mut self, iid: CellAddr, delay: Cycle, beats: u32) {
        debug_assert!(self.pending[iid].is_none(), "delay already armed for iid {iid}");
        debug_assert!(delay >= 1 && beats >= 1);
        self.pending[iid] = Some((delay, beats));
    }

    /// Advances one cycle, moving expired delays into release counters.
    pub fn tick(&mut self) {
        for (iid, slot) in self.pending.iter_mut().enumerate() {
            if let Some((left, beats)) = slot.as_mut() {
                *left -= 1;
                if *left == 0 {
                    self.release[iid] += *beats;
                    *slot = None;
                }
            }
        }
    }

    pub fn release_en(&self, iid: CellAddr) -> bool {
        self.release[iid] > 0
    }

    /// Snapshot of the full release-enable bus.
    pub fn release_bus(&self) -> Vec<bool> {
        self.release.iter().map(|&cnt| cnt > 0).collect()
    }

    /// Feedback: one beat of `iid` was actually released downstream.
    pub fn released(&mut self, iid: CellAddr) {
        assert!(self.release[iid] > 0, "release counter underflow for iid {iid}");
        self.release[iid] -= 1;
    }

    pub fn is_idle(&self) -> bool {
        self.pending.iter().all(Option::is_none) && self.release.iter().all(|&c| c == 0)
    }
}
