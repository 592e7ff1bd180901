use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use toml::Table;

use simmem::sim::config::{Config, DramConfig, SimConfig, SimmemConfig};
use simmem::traffic::TrafficRunner;

#[derive(Parser)]
#[command(version, about)]
struct SimmemArgs {
    #[arg(help = "Path to config.toml")]
    config_path: PathBuf,
    #[arg(long, help = "Override number of traffic cycles")]
    cycles: Option<u64>,
    #[arg(long, help = "Override traffic seed")]
    seed: Option<u64>,
    #[arg(long, help = "Enable log at level (0:warn, 1:info, 2:debug, 3:trace)")]
    log: Option<u64>,
    #[arg(long, help = "Write the stats report to this file instead of stdout")]
    stats: Option<PathBuf>,
}

pub fn main() -> Result<()> {
    let argv = SimmemArgs::parse();
    let config = fs::read_to_string(&argv.config_path)
        .with_context(|| format!("failed to read config file {}", argv.config_path.display()))?;
    let config_table: Table = toml::from_str(&config).context("cannot parse config toml")?;
    let mut sim_config = SimConfig::from_section(config_table.get("sim"));
    let simmem_config = SimmemConfig::from_section(config_table.get("simmem"));
    let dram_config = DramConfig::from_section(config_table.get("dram"));

    // override toml configs with argv
    sim_config.cycles = argv.cycles.unwrap_or(sim_config.cycles);
    sim_config.seed = argv.seed.unwrap_or(sim_config.seed);
    sim_config.log_level = argv.log.unwrap_or(sim_config.log_level);

    env_logger::Builder::from_default_env()
        .filter_level(sim_config.level_filter())
        .init();

    simmem_config.validate()?;
    dram_config.validate()?;

    let mut runner = TrafficRunner::new(sim_config.seed, &simmem_config, &dram_config);
    let report = runner.run(sim_config.cycles, sim_config.trailing_cycles)?;

    let stats = serde_json::json!({
        "traffic": report,
        "simmem": runner.sim_stats(),
    });
    let rendered = serde_json::to_string_pretty(&stats)?;
    match argv.stats.or(sim_config.stats) {
        Some(path) => fs::write(&path, rendered)
            .with_context(|| format!("failed to write stats to {}", path.display()))?,
        None => println!("{rendered}"),
    }

    if !report.drained {
        bail!("transactions still in flight after the drain window");
    }
    Ok(())
}
