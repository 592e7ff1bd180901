//! Single-rank DRAM timing model: one access in flight at a time, a
//! countdown standing in for the access latency, and open-row state for
//! the cost model.

use crate::axi::Cycle;

/// Cycles between a dispatch and the completion pulse, modeling the
/// response-path pipeline. The cost model guarantees every access costs at
/// least `RowHitCost >= 3` cycles, so the pulse always lands before the
/// rank can accept the next access.
pub const RESPONSE_PIPELINE_CYCLES: Cycle = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct RankState {
    pub row_open: bool,
    pub open_row_addr: u64,
}

#[derive(Debug, Default)]
pub struct RankModel {
    state: RankState,
    remaining_cycles: Cycle,
    pulse_countdown: Option<Cycle>,
}

impl RankModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base address of the open row, if a row is open.
    pub fn open_row(&self) -> Option<u64> {
        self.state.row_open.then_some(self.state.open_row_addr)
    }

    /// Whether a new access may be dispatched this cycle.
    pub fn is_free(&self) -> bool {
        self.remaining_cycles == 0
    }

    pub fn is_idle(&self) -> bool {
        self.remaining_cycles == 0 && self.pulse_countdown.is_none()
    }

    /// Advances one cycle. Returns true when the completion pulse fires,
    /// `RESPONSE_PIPELINE_CYCLES` after the matching dispatch.
    pub fn tick(&mut self) -> bool {
        if self.remaining_cycles > 0 {
            self.remaining_cycles -= 1;
        }
        match self.pulse_countdown.as_mut() {
            Some(left) => {
                *left -= 1;
                if *left == 0 {
                    self.pulse_countdown = None;
                    true
                } else {
                    false
                }
            }
            None => false,
        }
    }

    /// Dispatches an access: loads the decompressed cost, arms the
    /// completion pulse and opens the accessed row.
    pub fn dispatch(&mut self, addr: u64, cost_cycles: Cycle) {
        debug_assert!(self.is_free());
        debug_assert!(cost_cycles >= RESPONSE_PIPELINE_CYCLES);
        self.remaining_cycles = cost_cycles;
        self.pulse_countdown = Some(RESPONSE_PIPELINE_CYCLES);
        self.state.row_open = true;
        self.state.open_row_addr = addr;
    }
}
