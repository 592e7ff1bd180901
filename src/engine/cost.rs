use serde::Deserialize;

use crate::axi::Cycle;
use crate::sim::config::DramConfig;

/// Compressed DRAM access cost class. The ordinal ordering is the cost
/// ordering: a row hit is always cheaper than an activate, which is always
/// cheaper than a precharge followed by an activate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
pub enum CostClass {
    RowHit,
    ActivateThenHit,
    PrechargeActivateHit,
}

/// Pure cost model for a single DRAM rank: maps a requested address and the
/// rank's open-row state to a compressed cost class, and decompresses the
/// class back to a cycle count.
#[derive(Debug, Clone, Copy)]
pub struct CostModel {
    row_shift: u32,
    row_hit_cost: Cycle,
    activation_cost: Cycle,
    precharge_cost: Cycle,
}

impl CostModel {
    pub fn new(config: &DramConfig) -> Self {
        Self {
            row_shift: config.row_shift,
            row_hit_cost: config.row_hit_cost,
            activation_cost: config.activation_cost,
            precharge_cost: config.precharge_cost,
        }
    }

    /// Row index of an address.
    pub fn row_of(&self, addr: u64) -> u64 {
        addr >> self.row_shift
    }

    /// Classifies an access given the currently open row (if any).
    pub fn classify(&self, addr: u64, open_row_addr: Option<u64>) -> CostClass {
        match open_row_addr {
            Some(open) if self.row_of(open) == self.row_of(addr) => CostClass::RowHit,
            None => CostClass::ActivateThenHit,
            Some(_) => CostClass::PrechargeActivateHit,
        }
    }

    /// Decompresses a cost class to its modeled cycle count.
    pub fn decompress(&self, class: CostClass) -> Cycle {
        match class {
            CostClass::RowHit => self.row_hit_cost,
            CostClass::ActivateThenHit => self.row_hit_cost + self.activation_cost,
            CostClass::PrechargeActivateHit => {
                self.row_hit_cost + self.activation_cost + self.precharge_cost
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CostClass, CostModel};
    use crate::sim::config::DramConfig;

    fn model() -> CostModel {
        CostModel::new(&DramConfig {
            row_hit_cost: 4,
            activation_cost: 6,
            precharge_cost: 5,
            row_shift: 10,
        })
    }

    #[test]
    fn same_row_is_a_hit() {
        let m = model();
        assert_eq!(m.classify(0x420, Some(0x400)), CostClass::RowHit);
    }

    #[test]
    fn closed_row_needs_activation() {
        let m = model();
        assert_eq!(m.classify(0x420, None), CostClass::ActivateThenHit);
    }

    #[test]
    fn other_row_needs_precharge() {
        let m = model();
        assert_eq!(m.classify(0x420, Some(0x1400)), CostClass::PrechargeActivateHit);
    }

    #[test]
    fn class_ordering_matches_cost_ordering() {
        assert!(CostClass::RowHit < CostClass::ActivateThenHit);
        assert!(CostClass::ActivateThenHit < CostClass::PrechargeActivateHit);
    }

    #[test]
    fn decompressed_costs_are_strictly_monotonic() {
        for row_hit in 3..8u64 {
            for act in 1..6u64 {
                for pre in 1..6u64 {
                    let m = CostModel::new(&DramConfig {
                        row_hit_cost: row_hit,
                        activation_cost: act,
                        precharge_cost: pre,
                        row_shift: 10,
                    });
                    let hit = m.decompress(CostClass::RowHit);
                    let miss = m.decompress(CostClass::ActivateThenHit);
                    let conflict = m.decompress(CostClass::PrechargeActivateHit);
                    assert!(hit < miss && miss < conflict);
                }
            }
        }
    }
}
