//! Typed AXI-style request and response messages.
//!
//! The hardware-facing packed representations (bit offsets and widths) are
//! out of scope for this model; every message is carried as a plain struct
//! and the burst geometry fields keep their AXI meaning: `burst_len` is the
//! number of beats in the burst and `burst_size` is log2 of the bytes moved
//! per beat.

pub type Cycle = u64;

/// AXI transaction identifier, `0..num_ids`.
pub type AxiId = usize;

/// Storage-cell address inside a response bank, used as the opaque internal
/// id ("iid") handed to the delay calculator at reservation time.
pub type CellAddr = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteAddress {
    pub id: AxiId,
    pub addr: u64,
    pub burst_len: usize,
    pub burst_size: u32,
}

impl WriteAddress {
    pub fn new(id: AxiId, addr: u64, burst_len: usize, burst_size: u32) -> Self {
        Self { id, addr, burst_len, burst_size }
    }

    /// Address touched by beat `i` of the burst.
    pub fn beat_addr(&self, i: usize) -> u64 {
        self.addr + ((i as u64) << self.burst_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadAddress {
    pub id: AxiId,
    pub addr: u64,
    pub burst_len: usize,
    pub burst_size: u32,
}

impl ReadAddress {
    pub fn new(id: AxiId, addr: u64, burst_len: usize, burst_size: u32) -> Self {
        Self { id, addr, burst_len, burst_size }
    }

    pub fn beat_addr(&self, i: usize) -> u64 {
        self.addr + ((i as u64) << self.burst_size)
    }
}

/// One write-data beat. AXI write data carries no identifier; pairing with
/// the owning write address is positional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteData {
    pub payload: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResponse {
    pub id: AxiId,
    pub payload: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadData {
    pub id: AxiId,
    pub payload: u64,
    pub last: bool,
}
