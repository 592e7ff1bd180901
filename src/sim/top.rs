//! Top level of the front end: ties the response banks, the release back
//! end and the pass-through request queues into one synchronous block
//! between a requester and the real memory controller.

use std::collections::VecDeque;

use log::trace;
use serde::Serialize;

use crate::axi::{Cycle, ReadAddress, ReadData, WriteAddress, WriteData, WriteResponse};
use crate::bank::{BankStats, BanksInputs, ResponseBanks};
use crate::engine::{CalculatorStats, DelayCalculator, DelayLine};
use crate::sim::config::{BackendMode, DramConfig, SimmemConfig};

/// Release-time back end. The DRAM calculator models row-buffer state; the
/// fixed variant releases every response a flat number of cycles after its
/// address was admitted.
#[derive(Debug)]
enum Backend {
    Dram(DelayCalculator),
    Fixed {
        wresp: DelayLine,
        rdata: DelayLine,
        delay: Cycle,
    },
}

impl Backend {
    fn new(config: &SimmemConfig, dram: &DramConfig) -> Self {
        match config.backend {
            BackendMode::Dram => Backend::Dram(DelayCalculator::new(config, dram)),
            BackendMode::Fixed => Backend::Fixed {
                wresp: DelayLine::new(config.wresp_bank_capacity),
                rdata: DelayLine::new(config.rdata_bank_capacity),
                delay: config.fixed_delay,
            },
        }
    }

    fn waddr_ready(&self) -> bool {
        match self {
            Backend::Dram(calc) => calc.waddr_ready(),
            Backend::Fixed { .. } => true,
        }
    }

    fn raddr_ready(&self) -> bool {
        match self {
            Backend::Dram(calc) => calc.raddr_ready(),
            Backend::Fixed { .. } => true,
        }
    }

    fn wdata_ready(&self) -> bool {
        match self {
            Backend::Dram(calc) => calc.wdata_ready(),
            Backend::Fixed { .. } => true,
        }
    }

    fn wresp_release_bus(&self) -> Vec<bool> {
        match self {
            Backend::Dram(calc) => calc.wresp_release_en().to_vec(),
            Backend::Fixed { wresp, .. } => wresp.release_bus(),
        }
    }

    fn rdata_release_bus(&self) -> Vec<bool> {
        match self {
            Backend::Dram(calc) => calc.rdata_release_en().iter().map(|&c| c > 0).collect(),
            Backend::Fixed { rdata, .. } => rdata.release_bus(),
        }
    }

    fn accept_waddr(&mut self, iid: usize, req: &WriteAddress) {
        match self {
            Backend::Dram(calc) => {
                let admitted = calc.accept_waddr(iid, req);
                debug_assert!(admitted, "waddr admitted past a ready check");
            }
            Backend::Fixed { wresp, delay, .. } => wresp.set(iid, *delay, 1),
        }
    }

    fn accept_raddr(&mut self, iid: usize, req: &ReadAddress) {
        match self {
            Backend::Dram(calc) => {
                let admitted = calc.accept_raddr(iid, req);
                debug_assert!(admitted, "raddr admitted past a ready check");
            }
            Backend::Fixed { rdata, delay, .. } => rdata.set(iid, *delay, req.burst_len as u32),
        }
    }

    fn accept_wdata(&mut self) {
        // The fixed back end keys releases off addresses alone.
        if let Backend::Dram(calc) = self {
            let admitted = calc.accept_wdata();
            debug_assert!(admitted, "wdata admitted past a ready check");
        }
    }

    fn wresp_released(&mut self, cell: usize) {
        match self {
            Backend::Dram(calc) => calc.wresp_released(cell),
            Backend::Fixed { wresp, .. } => wresp.released(cell),
        }
    }

    fn rdata_released(&mut self, cell: usize) {
        match self {
            Backend::Dram(calc) => calc.rdata_released(cell),
            Backend::Fixed { rdata, .. } => rdata.released(cell),
        }
    }

    fn step(&mut self) {
        match self {
            Backend::Dram(calc) => calc.step(),
            Backend::Fixed { wresp, rdata, .. } => {
                wresp.tick();
                rdata.tick();
            }
        }
    }

    fn is_idle(&self) -> bool {
        match self {
            Backend::Dram(calc) => calc.is_idle(),
            Backend::Fixed { wresp, rdata, .. } => wresp.is_idle() && rdata.is_idle(),
        }
    }
}

/// One cycle's worth of input ports.
#[derive(Debug, Default)]
pub struct TopInputs {
    /// Requester side.
    pub waddr: Option<WriteAddress>,
    pub wdata: Option<WriteData>,
    pub raddr: Option<ReadAddress>,
    pub wresp_ready: bool,
    pub rdata_ready: bool,
    /// Real memory controller side.
    pub mem_wresp: Option<WriteResponse>,
    pub mem_rdata: Option<ReadData>,
    pub mem_waddr_ready: bool,
    pub mem_wdata_ready: bool,
    pub mem_raddr_ready: bool,
}

/// One cycle's worth of output ports.
#[derive(Debug, Default)]
pub struct TopOutputs {
    /// Requester side.
    pub waddr_accepted: bool,
    pub wdata_accepted: bool,
    pub raddr_accepted: bool,
    pub wresp: Option<WriteResponse>,
    pub rdata: Option<ReadData>,
    /// Real memory controller side.
    pub mem_waddr: Option<WriteAddress>,
    pub mem_wdata: Option<WriteData>,
    pub mem_raddr: Option<ReadAddress>,
    pub mem_wresp_accepted: bool,
    pub mem_rdata_accepted: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SimmemStats {
    pub cycles: u64,
    pub wresp_bank: BankStats,
    pub rdata_bank: BankStats,
    pub calculator: Option<CalculatorStats>,
}

pub struct Simmem {
    config: SimmemConfig,
    banks: ResponseBanks,
    backend: Backend,
    waddr_queue: VecDeque<WriteAddress>,
    wdata_queue: VecDeque<WriteData>,
    raddr_queue: VecDeque<ReadAddress>,
    cycle: Cycle,
}

impl Simmem {
    pub fn new(config: &SimmemConfig, dram: &DramConfig) -> Self {
        Self {
            config: *config,
            banks: ResponseBanks::new(
                config.wresp_bank_capacity,
                config.rdata_bank_capacity,
                config.num_ids,
            ),
            backend: Backend::new(config, dram),
            waddr_queue: VecDeque::with_capacity(config.passthrough_depth),
            wdata_queue: VecDeque::with_capacity(config.passthrough_depth),
            raddr_queue: VecDeque::with_capacity(config.passthrough_depth),
            cycle: 0,
        }
    }

    pub fn waddr_ready(&self) -> bool {
        self.banks.wresp.reservation_ready()
            && self.backend.waddr_ready()
            && self.waddr_queue.len() < self.config.passthrough_depth
    }

    pub fn raddr_ready(&self) -> bool {
        self.banks.rdata.reservation_ready()
            && self.backend.raddr_ready()
            && self.raddr_queue.len() < self.config.passthrough_depth
    }

    pub fn wdata_ready(&self) -> bool {
        self.backend.wdata_ready() && self.wdata_queue.len() < self.config.passthrough_depth
    }

    /// One synchronous cycle. All handshake decisions are made on the state
    /// left by the previous cycle; refusing an input leaves no trace.
    pub fn step(&mut self, inputs: TopInputs) -> TopOutputs {
        self.cycle += 1;
        let mut out = TopOutputs::default();

        // An address reserves a bank cell and occupies a back-end slot
        // together, so both must be ready at once.
        let take_waddr = inputs.waddr.is_some() && self.waddr_ready();
        let take_raddr = inputs.raddr.is_some() && self.raddr_ready();
        let take_wdata = inputs.wdata.is_some() && self.wdata_ready();

        if let Some(req) = &inputs.waddr {
            debug_assert!(req.id < self.config.num_ids);
            debug_assert!(req.burst_len >= 1 && req.burst_len <= self.config.max_wburst_len);
        }
        if let Some(req) = &inputs.raddr {
            debug_assert!(req.id < self.config.num_ids);
            debug_assert!(req.burst_len >= 1 && req.burst_len <= self.config.max_rburst_len);
        }

        let wresp_release = self.backend.wresp_release_bus();
        let rdata_release = self.backend.rdata_release_bus();

        let bank_out = self.banks.step(BanksInputs {
            wresp_reservation: inputs.waddr.as_ref().filter(|_| take_waddr).map(|r| r.id),
            rdata_reservation: inputs
                .raddr
                .as_ref()
                .filter(|_| take_raddr)
                .map(|r| (r.id, r.burst_len)),
            wresp_in: inputs.mem_wresp,
            rdata_in: inputs.mem_rdata,
            wresp_out_ready: inputs.wresp_ready,
            rdata_out_ready: inputs.rdata_ready,
            wresp_release_allowed: &wresp_release,
            rdata_release_allowed: &rdata_release,
        });

        if take_waddr {
            let req = inputs.waddr.as_ref().expect("gated on waddr");
            let iid = bank_out
                .wresp
                .granted
                .expect("reservation granted past a ready check");
            self.backend.accept_waddr(iid, req);
            self.waddr_queue.push_back(*req);
            out.waddr_accepted = true;
            trace!("[{}] waddr in: id={} iid={}", self.cycle, req.id, iid);
        }
        if take_raddr {
            let req = inputs.raddr.as_ref().expect("gated on raddr");
            let iid = bank_out
                .rdata
                .granted
                .expect("reservation granted past a ready check");
            self.backend.accept_raddr(iid, req);
            self.raddr_queue.push_back(*req);
            out.raddr_accepted = true;
            trace!("[{}] raddr in: id={} iid={}", self.cycle, req.id, iid);
        }
        if take_wdata {
            let beat = inputs.wdata.as_ref().expect("gated on wdata");
            self.backend.accept_wdata();
            self.wdata_queue.push_back(*beat);
            out.wdata_accepted = true;
        }

        if let Some(cell) = bank_out.wresp.released {
            self.backend.wresp_released(cell);
        }
        if let Some(cell) = bank_out.rdata.released {
            self.backend.rdata_released(cell);
        }

        self.backend.step();

        out.wresp = bank_out.wresp.payload_out;
        out.rdata = bank_out.rdata.payload_out;
        out.mem_wresp_accepted = bank_out.wresp.in_accepted;
        out.mem_rdata_accepted = bank_out.rdata.in_accepted;

        // The pass-through queues offer their fronts to the real memory
        // controller and pop on its ready.
        out.mem_waddr = self.waddr_queue.front().copied();
        if inputs.mem_waddr_ready && out.mem_waddr.is_some() {
            self.waddr_queue.pop_front();
        }
        out.mem_wdata = self.wdata_queue.front().copied();
        if inputs.mem_wdata_ready && out.mem_wdata.is_some() {
            self.wdata_queue.pop_front();
        }
        out.mem_raddr = self.raddr_queue.front().copied();
        if inputs.mem_raddr_ready && out.mem_raddr.is_some() {
            self.raddr_queue.pop_front();
        }

        out
    }

    /// True when no request or response remains anywhere in the block.
    pub fn is_idle(&self) -> bool {
        self.banks.is_empty()
            && self.backend.is_idle()
            && self.waddr_queue.is_empty()
            && self.wdata_queue.is_empty()
            && self.raddr_queue.is_empty()
    }

    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    pub fn stats(&self) -> SimmemStats {
        SimmemStats {
            cycles: self.cycle,
            wresp_bank: *self.banks.wresp.stats(),
            rdata_bank: *self.banks.rdata.stats(),
            calculator: match &self.backend {
                Backend::Dram(calc) => Some(*calc.stats()),
                Backend::Fixed { .. } => None,
            },
        }
    }
}
