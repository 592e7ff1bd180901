pub mod memory;
pub mod runner;

pub use memory::RealMemoryModel;
pub use runner::{TrafficReport, TrafficRunner};
