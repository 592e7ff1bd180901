//! One response bank per traffic class, sharing the identifier space.

use crate::axi::{AxiId, ReadData, WriteResponse};
use crate::bank::message_bank::{BankInputs, BankOutputs, MessageBank, Reservation};

#[derive(Debug)]
pub struct BanksInputs<'a> {
    /// Reservation for an accepted write address (one beat).
    pub wresp_reservation: Option<AxiId>,
    /// Reservation for an accepted read address with its burst length.
    pub rdata_reservation: Option<(AxiId, usize)>,
    pub wresp_in: Option<WriteResponse>,
    pub rdata_in: Option<ReadData>,
    pub wresp_out_ready: bool,
    pub rdata_out_ready: bool,
    pub wresp_release_allowed: &'a [bool],
    pub rdata_release_allowed: &'a [bool],
}

#[derive(Debug, Default)]
pub struct BanksOutputs {
    pub wresp: BankOutputs<WriteResponse>,
    pub rdata: BankOutputs<ReadData>,
}

/// The two storage banks of the front end: write responses and read data.
#[derive(Debug)]
pub struct ResponseBanks {
    pub wresp: MessageBank<WriteResponse>,
    pub rdata: MessageBank<ReadData>,
}

impl ResponseBanks {
    pub fn new(wresp_capacity: usize, rdata_capacity: usize, num_ids: usize) -> Self {
        Self {
            wresp: MessageBank::new("wresp_bank", wresp_capacity, num_ids),
            rdata: MessageBank::new("rdata_bank", rdata_capacity, num_ids),
        }
    }

    pub fn step(&mut self, inputs: BanksInputs<'_>) -> BanksOutputs {
        let wresp = self.wresp.step(BankInputs {
            reservation: inputs
                .wresp_reservation
                .map(|id| Reservation { id, beats: 1 }),
            payload_in: inputs.wresp_in,
            out_ready: inputs.wresp_out_ready,
            release_allowed: inputs.wresp_release_allowed,
        });
        let rdata = self.rdata.step(BankInputs {
            reservation: inputs
                .rdata_reservation
                .map(|(id, beats)| Reservation { id, beats }),
            payload_in: inputs.rdata_in,
            out_ready: inputs.rdata_out_ready,
            release_allowed: inputs.rdata_release_allowed,
        });
        BanksOutputs { wresp, rdata }
    }

    pub fn is_empty(&self) -> bool {
        self.wresp.is_empty() && self.rdata.is_empty()
    }
}
