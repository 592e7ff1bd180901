//! Behavioral stand-in for the real memory controller behind the front
//! end. It consumes forwarded requests and produces responses in order,
//! lowest identifier first, with the payload echoing the request address so
//! the requester can check pairing end to end.

use std::collections::VecDeque;

use crate::axi::{AxiId, ReadAddress, ReadData, WriteAddress, WriteData, WriteResponse};

#[derive(Debug)]
pub struct RealMemoryModel {
    wresp_pending: Vec<VecDeque<WriteResponse>>,
    rdata_pending: Vec<VecDeque<ReadData>>,
    wdata_beats_seen: u64,
}

impl RealMemoryModel {
    pub fn new(num_ids: usize) -> Self {
        Self {
            wresp_pending: vec![VecDeque::new(); num_ids],
            rdata_pending: vec![VecDeque::new(); num_ids],
            wdata_beats_seen: 0,
        }
    }

    pub fn push_waddr(&mut self, req: &WriteAddress) {
        self.wresp_pending[req.id].push_back(WriteResponse {
            id: req.id,
            payload: req.addr,
        });
    }

    pub fn push_raddr(&mut self, req: &ReadAddress) {
        for i in 0..req.burst_len {
            self.rdata_pending[req.id].push_back(ReadData {
                id: req.id,
                payload: req.beat_addr(i),
                last: i + 1 == req.burst_len,
            });
        }
    }

    /// Data content is not modeled; the beat is only counted.
    pub fn push_wdata(&mut self, _beat: &WriteData) {
        self.wdata_beats_seen += 1;
    }

    fn lowest_pending<T>(queues: &[VecDeque<T>]) -> Option<AxiId> {
        queues.iter().position(|q| !q.is_empty())
    }

    pub fn next_wresp(&self) -> Option<WriteResponse> {
        Self::lowest_pending(&self.wresp_pending)
            .map(|id| self.wresp_pending[id][0])
    }

    pub fn pop_wresp(&mut self) {
        if let Some(id) = Self::lowest_pending(&self.wresp_pending) {
            self.wresp_pending[id].pop_front();
        }
    }

    pub fn next_rdata(&self) -> Option<ReadData> {
        Self::lowest_pending(&self.rdata_pending)
            .map(|id| self.rdata_pending[id][0])
    }

    pub fn pop_rdata(&mut self) {
        if let Some(id) = Self::lowest_pending(&self.rdata_pending) {
            self.rdata_pending[id].pop_front();
        }
    }

    pub fn is_idle(&self) -> bool {
        self.wresp_pending.iter().all(VecDeque::is_empty)
            && self.rdata_pending.iter().all(VecDeque::is_empty)
    }

    pub fn wdata_beats_seen(&self) -> u64 {
        self.wdata_beats_seen
    }
}
