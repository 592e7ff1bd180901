//! Randomized end-to-end driver: a requester issuing writes and reads with
//! coin-flip timing on every handshake, the front end under test in the
//! middle, and the real-memory model behind it. Per-identifier scoreboards
//! check ordering and payload pairing of every response that comes back.

use std::collections::VecDeque;

use anyhow::{bail, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::axi::{Cycle, ReadAddress, WriteAddress, WriteData};
use crate::sim::config::{DramConfig, SimmemConfig};
use crate::sim::top::{Simmem, SimmemStats, TopInputs};
use crate::traffic::memory::RealMemoryModel;

const BURST_SIZE: u32 = 3;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TrafficReport {
    pub cycles: u64,
    pub writes_issued: u64,
    pub write_responses: u64,
    pub reads_issued: u64,
    pub read_beats: u64,
    pub wresp_latency_max: u64,
    pub wresp_latency_total: u64,
    /// Whether every outstanding transaction drained before the run ended.
    pub drained: bool,
}

pub struct TrafficRunner {
    rng: StdRng,
    sim: Simmem,
    mem: RealMemoryModel,
    config: SimmemConfig,
    pending_waddr: Option<WriteAddress>,
    pending_raddr: Option<ReadAddress>,
    wdata_backlog: usize,
    /// Expected write responses per identifier: (address, issue cycle).
    write_sb: Vec<VecDeque<(u64, Cycle)>>,
    /// Expected read-data beats per identifier: (beat address, last flag).
    read_sb: Vec<VecDeque<(u64, bool)>>,
    report: TrafficReport,
}

impl TrafficRunner {
    pub fn new(seed: u64, config: &SimmemConfig, dram: &DramConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            sim: Simmem::new(config, dram),
            mem: RealMemoryModel::new(config.num_ids),
            config: *config,
            pending_waddr: None,
            pending_raddr: None,
            wdata_backlog: 0,
            write_sb: vec![VecDeque::new(); config.num_ids],
            read_sb: vec![VecDeque::new(); config.num_ids],
            report: TrafficReport::default(),
        }
    }

    fn random_waddr(&mut self) -> WriteAddress {
        let id = self.rng.gen_range(0..self.config.num_ids);
        let burst_len = self.rng.gen_range(1..=self.config.max_wburst_len);
        let addr = self.rng.gen_range(0..(1u64 << 20)) << BURST_SIZE;
        WriteAddress::new(id, addr, burst_len, BURST_SIZE)
    }

    fn random_raddr(&mut self) -> ReadAddress {
        let id = self.rng.gen_range(0..self.config.num_ids);
        let burst_len = self.rng.gen_range(1..=self.config.max_rburst_len);
        let addr = self.rng.gen_range(0..(1u64 << 20)) << BURST_SIZE;
        ReadAddress::new(id, addr, burst_len, BURST_SIZE)
    }

    /// Runs `cycles` of injection plus up to `trailing` drain cycles.
    pub fn run(&mut self, cycles: u64, trailing: u64) -> Result<TrafficReport> {
        for now in 0..cycles + trailing {
            let injecting = now < cycles;
            self.step_once(injecting)?;
            if !injecting && self.all_drained() {
                break;
            }
        }
        self.report.cycles = self.sim.cycle();
        self.report.drained = self.all_drained();
        info!(
            "traffic done: {} writes / {} reads in {} cycles, drained={}",
            self.report.writes_issued, self.report.reads_issued, self.report.cycles,
            self.report.drained
        );
        Ok(self.report)
    }

    fn all_drained(&self) -> bool {
        self.pending_waddr.is_none()
            && self.pending_raddr.is_none()
            && self.wdata_backlog == 0
            && self.sim.is_idle()
            && self.mem.is_idle()
            && self.write_sb.iter().all(VecDeque::is_empty)
            && self.read_sb.iter().all(VecDeque::is_empty)
    }

    fn step_once(&mut self, injecting: bool) -> Result<()> {
        // A refused offer stays on the wire until accepted.
        if injecting {
            if self.pending_waddr.is_none() && self.rng.gen_bool(0.3) {
                let req = self.random_waddr();
                self.wdata_backlog += req.burst_len;
                self.pending_waddr = Some(req);
            }
            if self.pending_raddr.is_none() && self.rng.gen_bool(0.3) {
                self.pending_raddr = Some(self.random_raddr());
            }
        }

        let offer_wdata = self.wdata_backlog > 0 && self.rng.gen_bool(0.7);
        let mem_wresp = if self.rng.gen_bool(0.7) { self.mem.next_wresp() } else { None };
        let mem_rdata = if self.rng.gen_bool(0.7) { self.mem.next_rdata() } else { None };
        let mem_waddr_ready = self.rng.gen_bool(0.8);
        let mem_wdata_ready = self.rng.gen_bool(0.8);
        let mem_raddr_ready = self.rng.gen_bool(0.8);

        let out = self.sim.step(TopInputs {
            waddr: self.pending_waddr,
            wdata: offer_wdata.then_some(WriteData { payload: 0 }),
            raddr: self.pending_raddr,
            wresp_ready: self.rng.gen_bool(0.8),
            rdata_ready: self.rng.gen_bool(0.8),
            mem_wresp,
            mem_rdata,
            mem_waddr_ready,
            mem_wdata_ready,
            mem_raddr_ready,
        });
        let now = self.sim.cycle();

        if out.waddr_accepted {
            let req = self.pending_waddr.take().expect("accept without an offer");
            self.write_sb[req.id].push_back((req.addr, now));
            self.report.writes_issued += 1;
        }
        if out.raddr_accepted {
            let req = self.pending_raddr.take().expect("accept without an offer");
            for i in 0..req.burst_len {
                self.read_sb[req.id].push_back((req.beat_addr(i), i + 1 == req.burst_len));
            }
            self.report.reads_issued += 1;
        }
        if out.wdata_accepted {
            self.wdata_backlog -= 1;
        }

        if let Some(resp) = out.wresp {
            let Some((addr, t_in)) = self.write_sb[resp.id].pop_front() else {
                bail!("unexpected write response for id {}", resp.id);
            };
            if resp.payload != addr {
                bail!(
                    "write response out of order for id {}: got {:#x}, expected {:#x}",
                    resp.id, resp.payload, addr
                );
            }
            let latency = now - t_in;
            self.report.wresp_latency_max = self.report.wresp_latency_max.max(latency);
            self.report.wresp_latency_total += latency;
            self.report.write_responses += 1;
            debug!("wresp id={} addr={:#x} latency={}", resp.id, addr, latency);
        }
        if let Some(beat) = out.rdata {
            let Some((addr, last)) = self.read_sb[beat.id].pop_front() else {
                bail!("unexpected read beat for id {}", beat.id);
            };
            if beat.payload != addr || beat.last != last {
                bail!(
                    "read beat out of order for id {}: got {:#x}/last={}, expected {:#x}/last={}",
                    beat.id, beat.payload, beat.last, addr, last
                );
            }
            self.report.read_beats += 1;
        }

        // Downstream side of the handshakes.
        if out.mem_wresp_accepted {
            self.mem.pop_wresp();
        }
        if out.mem_rdata_accepted {
            self.mem.pop_rdata();
        }
        if let Some(req) = out.mem_waddr {
            if mem_waddr_ready {
                self.mem.push_waddr(&req);
            }
        }
        if let Some(beat) = out.mem_wdata {
            if mem_wdata_ready {
                self.mem.push_wdata(&beat);
            }
        }
        if let Some(req) = out.mem_raddr {
            if mem_raddr_ready {
                self.mem.push_raddr(&req);
            }
        }

        Ok(())
    }

    pub fn sim_stats(&self) -> SimmemStats {
        self.sim.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::TrafficRunner;
    use crate::sim::config::{BackendMode, DramConfig, SimmemConfig};

    #[test]
    fn randomized_run_drains_clean() {
        let config = SimmemConfig::default();
        let dram = DramConfig::default();
        let mut runner = TrafficRunner::new(0, &config, &dram);
        let report = runner.run(1000, 1500).unwrap();
        assert!(report.drained);
        assert!(report.writes_issued > 0 && report.reads_issued > 0);
        assert_eq!(report.write_responses, report.writes_issued);
    }

    #[test]
    fn fixed_backend_run_drains_clean() {
        let config = SimmemConfig {
            backend: BackendMode::Fixed,
            fixed_delay: 10,
            ..Default::default()
        };
        let dram = DramConfig::default();
        let mut runner = TrafficRunner::new(3, &config, &dram);
        let report = runner.run(500, 300).unwrap();
        assert!(report.drained);
        assert_eq!(report.write_responses, report.writes_issued);
    }

    #[test]
    fn same_seed_gives_same_traffic() {
        let config = SimmemConfig::default();
        let dram = DramConfig::default();
        let a = TrafficRunner::new(7, &config, &dram).run(400, 1000).unwrap();
        let b = TrafficRunner::new(7, &config, &dram).run(400, 1000).unwrap();
        assert_eq!(a.writes_issued, b.writes_issued);
        assert_eq!(a.read_beats, b.read_beats);
        assert_eq!(a.wresp_latency_total, b.wresp_latency_total);
    }
}
