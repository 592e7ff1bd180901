use std::path::PathBuf;

use anyhow::{bail, Result};
use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use toml::*;

pub trait Config: DeserializeOwned + Default {
    fn from_section(section: Option<&Value>) -> Self {
        match section {
            Some(value) => value.clone().try_into().expect("cannot deserialize config"),
            None => {
                warn!("config section not found");
                Self::default()
            }
        }
    }
}

/// Which back end decides response release times.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    /// Row-buffer-aware delay calculator.
    #[default]
    Dram,
    /// Flat fixed delay per request.
    Fixed,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimConfig {
    pub cycles: u64,
    pub seed: u64,
    pub log_level: u64,
    /// Extra cycles granted after the last injection for in-flight
    /// responses to drain.
    pub trailing_cycles: u64,
    /// Where to write the stats report; stdout if unset.
    pub stats: Option<PathBuf>,
}

impl Config for SimConfig {}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            cycles: 1000,
            seed: 0,
            log_level: 0,
            trailing_cycles: 1500,
            stats: None,
        }
    }
}

impl SimConfig {
    /// Logger filter for the numeric log level (0:warn, 1:info, 2:debug,
    /// 3+:trace).
    pub fn level_filter(&self) -> log::LevelFilter {
        match self.log_level {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

/// Structural parameters of the front end. These model compile-time
/// constants of the hardware and are fixed for the lifetime of a `Simmem`.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct SimmemConfig {
    pub num_ids: usize,
    pub wresp_bank_capacity: usize,
    pub rdata_bank_capacity: usize,
    pub num_wslots: usize,
    pub num_rslots: usize,
    pub max_wburst_len: usize,
    pub max_rburst_len: usize,
    /// Cap on write-data beats buffered ahead of their address.
    pub max_pending_wdata: usize,
    /// Depth of the pass-through queues towards the real memory controller.
    pub passthrough_depth: usize,
    pub backend: BackendMode,
    /// Release delay when `backend = "fixed"`.
    pub fixed_delay: u64,
}

impl Config for SimmemConfig {}

impl Default for SimmemConfig {
    fn default() -> Self {
        Self {
            num_ids: 16,
            wresp_bank_capacity: 32,
            rdata_bank_capacity: 32,
            num_wslots: 6,
            num_rslots: 6,
            max_wburst_len: 4,
            max_rburst_len: 4,
            max_pending_wdata: 64,
            passthrough_depth: 8,
            backend: BackendMode::Dram,
            fixed_delay: 10,
        }
    }
}

impl SimmemConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_ids == 0 {
            bail!("num_ids must be at least 1");
        }
        if self.wresp_bank_capacity == 0 || self.rdata_bank_capacity == 0 {
            bail!("bank capacities must be at least 1");
        }
        if self.num_wslots == 0 || self.num_rslots == 0 {
            bail!("slot counts must be at least 1");
        }
        if self.max_wburst_len < 1 || self.max_wburst_len > 32 {
            bail!("max_wburst_len must be in 1..=32, got {}", self.max_wburst_len);
        }
        if self.max_rburst_len < 1 || self.max_rburst_len > 32 {
            bail!("max_rburst_len must be in 1..=32, got {}", self.max_rburst_len);
        }
        if self.passthrough_depth == 0 {
            bail!("passthrough_depth must be at least 1");
        }
        if self.fixed_delay == 0 {
            bail!("fixed_delay must be at least 1");
        }
        Ok(())
    }
}

/// DRAM cost-model constants, in cycles.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct DramConfig {
    pub row_hit_cost: u64,
    pub activation_cost: u64,
    pub precharge_cost: u64,
    /// log2 of the row size in bytes; addresses sharing `addr >> row_shift`
    /// fall in the same row.
    pub row_shift: u32,
}

impl Config for DramConfig {}

impl Default for DramConfig {
    fn default() -> Self {
        Self {
            row_hit_cost: 4,
            activation_cost: 6,
            precharge_cost: 5,
            row_shift: 10,
        }
    }
}

impl DramConfig {
    pub fn validate(&self) -> Result<()> {
        // The completion pulse fires 3 cycles after dispatch; a cheaper
        // access would outrun its own response path.
        if self.row_hit_cost < 3 {
            bail!("row_hit_cost must be at least 3, got {}", self.row_hit_cost);
        }
        if self.activation_cost == 0 || self.precharge_cost == 0 {
            bail!("activation_cost and precharge_cost must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{Config, DramConfig, SimConfig, SimmemConfig};

    #[test]
    fn defaults_validate() {
        SimmemConfig::default().validate().unwrap();
        DramConfig::default().validate().unwrap();
    }

    #[test]
    fn row_hit_cost_below_pipeline_latency_is_rejected() {
        let config = DramConfig { row_hit_cost: 2, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_burst_is_rejected() {
        let config = SimmemConfig { max_wburst_len: 33, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn sections_parse_from_toml() {
        let table: toml::Table = toml::from_str(
            r#"
            [sim]
            cycles = 250
            log_level = 2
            stats = "out/stats.json"

            [simmem]
            num_ids = 4
            backend = "fixed"
            fixed_delay = 7

            [dram]
            row_hit_cost = 3
            "#,
        )
        .unwrap();
        let sim = SimConfig::from_section(table.get("sim"));
        assert_eq!(sim.cycles, 250);
        assert_eq!(sim.log_level, 2);
        assert_eq!(sim.stats, Some(PathBuf::from("out/stats.json")));
        let simmem = SimmemConfig::from_section(table.get("simmem"));
        assert_eq!(simmem.num_ids, 4);
        assert_eq!(simmem.fixed_delay, 7);
        let dram = DramConfig::from_section(table.get("dram"));
        assert_eq!(dram.row_hit_cost, 3);
        assert_eq!(dram.activation_cost, DramConfig::default().activation_cost);
    }

    #[test]
    fn log_level_maps_to_filter() {
        let mut config = SimConfig::default();
        assert_eq!(config.level_filter(), log::LevelFilter::Warn);
        config.log_level = 1;
        assert_eq!(config.level_filter(), log::LevelFilter::Info);
        config.log_level = 2;
        assert_eq!(config.level_filter(), log::LevelFilter::Debug);
        config.log_level = 9;
        assert_eq!(config.level_filter(), log::LevelFilter::Trace);
    }
}
