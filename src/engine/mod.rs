pub mod age;
pub mod calculator;
pub mod cost;
pub mod delay_line;
pub mod rank;
pub mod slots;

pub use age::{AgeTracker, Entity};
pub use calculator::{CalculatorStats, DelayCalculator};
pub use cost::{CostClass, CostModel};
pub use delay_line::DelayLine;
pub use rank::{RankModel, RankState, RESPONSE_PIPELINE_CYCLES};
pub use slots::{Candidate, SlotKind, SlotTable};
