//! Reservation-then-release response bank.
//!
//! All identifiers share one flat cell arena; each identifier's pending
//! responses form a singly linked list threaded through the metadata
//! store. Four pointers per identifier walk that list, in list order
//! `tail <= pre_tail <= response_head <= reservation_head`:
//!
//! - `reservation_head`: last reserved cell,
//! - `response_head`: cell receiving the next arriving payload beat,
//! - `tail`: next cell to release to the requester,
//! - `pre_tail`: the cell after `tail` in release order.
//!
//! A pointer that cannot be advanced from stored metadata (its target cell
//! was only reserved this very cycle) instead follows the new value of the
//! pointer ahead of it in the same cycle. The handshakes are processed in
//! reservation, input, output order inside `step()`, so each later pointer
//! update observes the staged values of the earlier ones and the
//! piggyback rules fall out of the sequencing.

use log::trace;
use serde::Serialize;

use crate::axi::{AxiId, CellAddr, ReadData, WriteResponse};
use crate::bank::arena::CellArena;

/// A response payload that can be stored in a bank.
pub trait Message: Clone {
    fn axi_id(&self) -> AxiId;
}

impl Message for WriteResponse {
    fn axi_id(&self) -> AxiId {
        self.id
    }
}

impl Message for ReadData {
    fn axi_id(&self) -> AxiId {
        self.id
    }
}

#[derive(Debug, Clone, Copy)]
struct IdQueue {
    tail: CellAddr,
    pre_tail: CellAddr,
    rsp_head: CellAddr,
    rsrv_head: CellAddr,
    /// Set when `rsp_head` coincides with `rsrv_head` only because every
    /// reserved beat has arrived; the pointed-to cell is not a valid input
    /// target until the next reservation moves the head forward.
    rsp_head_empty_box: bool,
    reserved_beats: usize,
    filled_beats: usize,
    /// Cells between `tail` and `rsrv_head` inclusive that have not been
    /// fully released.
    unreleased_cells: usize,
}

impl IdQueue {
    fn empty() -> Self {
        Self {
            tail: 0,
            pre_tail: 0,
            rsp_head: 0,
            rsrv_head: 0,
            rsp_head_empty_box: true,
            reserved_beats: 0,
            filled_beats: 0,
            unreleased_cells: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Reservation {
    pub id: AxiId,
    /// Beats this reservation backs: 1 for write responses, the burst
    /// length for read data.
    pub beats: usize,
}

#[derive(Debug)]
pub struct BankInputs<'a, T> {
    pub reservation: Option<Reservation>,
    pub payload_in: Option<T>,
    pub out_ready: bool,
    /// Release-enable view from the delay calculator, one flag per cell.
    pub release_allowed: &'a [bool],
}

#[derive(Debug)]
pub struct BankOutputs<T> {
    /// Cell granted to this cycle's reservation, used as the internal id.
    pub granted: Option<CellAddr>,
    pub in_accepted: bool,
    pub payload_out: Option<T>,
    /// Cell a beat was released from, fed back to the delay calculator.
    pub released: Option<CellAddr>,
}

impl<T> Default for BankOutputs<T> {
    fn default() -> Self {
        Self {
            granted: None,
            in_accepted: false,
            payload_out: None,
            released: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BankStats {
    pub reservations: u64,
    pub rejected_reservations: u64,
    pub beats_in: u64,
    pub rejected_beats_in: u64,
    pub beats_out: u64,
    pub cells_freed: u64,
}

#[derive(Debug)]
pub struct MessageBank<T> {
    name: &'static str,
    arena: CellArena<T>,
    queues: Vec<IdQueue>,
    /// Beats already released from each cell; reset at reservation.
    released_of: Vec<usize>,
    stats: BankStats,
}

impl<T: Message> MessageBank<T> {
    pub fn new(name: &'static str, capacity: usize, num_ids: usize) -> Self {
        Self {
            name,
            arena: CellArena::new(capacity),
            queues: vec![IdQueue::empty(); num_ids],
            released_of: vec![0; capacity],
            stats: BankStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Whether a reservation request would be granted this cycle.
    pub fn reservation_ready(&self) -> bool {
        self.arena.lowest_free().is_some()
    }

    pub fn free_cells(&self) -> usize {
        self.arena.free_count()
    }

    pub fn reserved_beats(&self, id: AxiId) -> usize {
        self.queues[id].reserved_beats
    }

    pub fn filled_beats(&self, id: AxiId) -> usize {
        self.queues[id].filled_beats
    }

    pub fn is_empty(&self) -> bool {
        self.arena.free_count() == self.arena.capacity()
    }

    pub fn stats(&self) -> &BankStats {
        &self.stats
    }

    /// Lowest-indexed identifier with a filled, release-enabled beat at its
    /// tail cell. Lowest-first is a modeling simplification of the source
    /// design, not a fairness policy.
    fn next_id_to_release(&self, release_allowed: &[bool]) -> Option<AxiId> {
        self.queues.iter().position(|q| {
            q.filled_beats > 0 && q.unreleased_cells > 0 && release_allowed[q.tail]
        })
    }

    /// One synchronous cycle. At most one reservation, one input beat and
    /// one output beat are handled; all three may fire together, including
    /// for the same identifier.
    pub fn step(&mut self, inputs: BankInputs<'_, T>) -> BankOutputs<T> {
        let mut out = BankOutputs::default();

        // Output selection and input gating are decided on start-of-cycle
        // state: a beat cannot arrive and leave in the same cycle, and a
        // reservation only enables inputs from the next cycle on.
        let out_id = if inputs.out_ready {
            self.next_id_to_release(inputs.release_allowed)
        } else {
            None
        };
        let in_ok = inputs
            .payload_in
            .as_ref()
            .is_some_and(|p| self.queues[p.axi_id()].reserved_beats > 0);

        // Reservation handshake.
        if let Some(rsv) = inputs.reservation {
            if let Some(cell) = self.arena.lowest_free() {
                self.arena.reserve(cell, rsv.beats);
                self.released_of[cell] = 0;
                let q = &mut self.queues[rsv.id];
                if q.unreleased_cells == 0 {
                    // First entry of an empty identifier: every pointer
                    // lands on the new cell, no metadata write.
                    q.tail = cell;
                    q.pre_tail = cell;
                    q.rsp_head = cell;
                    q.rsrv_head = cell;
                    q.rsp_head_empty_box = false;
                } else {
                    self.arena.link(q.rsrv_head, cell);
                    if q.rsp_head_empty_box {
                        // The head had drained; it follows the new
                        // reservation on the same cycle.
                        q.rsp_head = cell;
                        q.rsp_head_empty_box = false;
                    }
                    if q.unreleased_cells == 1 {
                        // tail and pre_tail sit on the single remaining
                        // cell; the new cell becomes next-after-tail.
                        q.pre_tail = cell;
                    }
                    q.rsrv_head = cell;
                }
                q.reserved_beats += rsv.beats;
                q.unreleased_cells += 1;
                out.granted = Some(cell);
                self.stats.reservations += 1;
                trace!("{}: reserve id={} -> cell={} beats={}", self.name, rsv.id, cell, rsv.beats);
            } else {
                self.stats.rejected_reservations += 1;
            }
        }

        // Input handshake: refused (not ready) unless the identifier has
        // an outstanding reservation.
        if in_ok {
            let payload = inputs.payload_in.expect("gated on payload_in");
            let id = payload.axi_id();
            let cell = self.queues[id].rsp_head;
            debug_assert!(!self.queues[id].rsp_head_empty_box);
            self.arena.push_beat(cell, payload);
            let filled = self.arena.beats_arrived(cell) == self.arena.beats_reserved(cell);
            let q = &mut self.queues[id];
            q.reserved_beats -= 1;
            q.filled_beats += 1;
            if filled {
                if cell != q.rsrv_head {
                    // Normal advance from stored metadata. If the next cell
                    // was reserved this very cycle, the link above is
                    // already in place, which is the same-edge piggyback.
                    let next = self.arena.next_of(cell);
                    self.queues[id].rsp_head = next;
                } else {
                    q.rsp_head_empty_box = true;
                }
            }
            out.in_accepted = true;
            self.stats.beats_in += 1;
            trace!("{}: input id={} -> cell={}", self.name, id, cell);
        } else if inputs.payload_in.is_some() {
            self.stats.rejected_beats_in += 1;
        }

        // Output handshake.
        if let Some(id) = out_id {
            let cell = self.queues[id].tail;
            let beat_idx = self.released_of[cell];
            debug_assert!(beat_idx < self.arena.beats_arrived(cell));
            out.payload_out = Some(self.arena.beat(cell, beat_idx).clone());
            out.released = Some(cell);
            self.released_of[cell] += 1;
            self.queues[id].filled_beats -= 1;
            self.stats.beats_out += 1;
            if self.released_of[cell] == self.arena.beats_reserved(cell) {
                self.arena.free(cell);
                self.stats.cells_freed += 1;
                let q = &mut self.queues[id];
                q.unreleased_cells -= 1;
                if q.unreleased_cells > 0 {
                    q.tail = q.pre_tail;
                    if q.pre_tail != q.rsrv_head {
                        let next = self.arena.next_of(q.pre_tail);
                        self.queues[id].pre_tail = next;
                    }
                    // Otherwise pre_tail is parked at the list end and the
                    // next reservation will carry it forward.
                }
            }
            trace!("{}: output id={} from cell={} beat={}", self.name, id, cell, beat_idx);
        }

        #[cfg(debug_assertions)]
        self.debug_validate();
        out
    }

    /// Walks every identifier's list and checks the pointer-ordering
    /// invariant and the count bookkeeping. Any violation is an internal
    /// logic bug.
    #[cfg(debug_assertions)]
    pub fn debug_validate(&self) {
        for (id, q) in self.queues.iter().enumerate() {
            if q.unreleased_cells == 0 {
                debug_assert_eq!(q.reserved_beats, 0, "id {id}: reserved beats on empty queue");
                debug_assert_eq!(q.filled_beats, 0, "id {id}: filled beats on empty queue");
                continue;
            }
            let mut reserved = 0usize;
            let mut filled = 0usize;
            let mut seen_rsp_head = false;
            let mut seen_pre_tail = false;
            let mut cell = q.tail;
            for hop in 0..q.unreleased_cells {
                debug_assert!(self.arena.is_reserved(cell), "id {id}: unreserved cell {cell} in list");
                reserved += self.arena.beats_reserved(cell) - self.arena.beats_arrived(cell);
                filled += self.arena.beats_arrived(cell) - self.released_of[cell];
                seen_rsp_head |= cell == q.rsp_head;
                seen_pre_tail |= cell == q.pre_tail;
                if hop + 1 == q.unreleased_cells {
                    debug_assert_eq!(cell, q.rsrv_head, "id {id}: list does not end at rsrv_head");
                } else {
                    cell = self.arena.next_of(cell);
                }
            }
            debug_assert_eq!(reserved, q.reserved_beats, "id {id}: reserved beat count");
            debug_assert_eq!(filled, q.filled_beats, "id {id}: filled beat count");
            debug_assert!(seen_rsp_head, "id {id}: rsp_head outside list");
            debug_assert!(seen_pre_tail, "id {id}: pre_tail outside list");
            let expected_pre_tail = if q.unreleased_cells == 1 {
                q.tail
            } else {
                self.arena.next_of(q.tail)
            };
            debug_assert_eq!(q.pre_tail, expected_pre_tail, "id {id}: pre_tail position");
            if q.rsp_head_empty_box {
                debug_assert_eq!(q.rsp_head, q.rsrv_head, "id {id}: empty box off rsrv_head");
                debug_assert_eq!(q.reserved_beats, 0, "id {id}: empty box with reserved beats");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BankInputs, MessageBank, Reservation};
    use crate::axi::WriteResponse;

    fn bank(capacity: usize, num_ids: usize) -> MessageBank<WriteResponse> {
        MessageBank::new("wresp", capacity, num_ids)
    }

    fn idle<'a>(release: &'a [bool]) -> BankInputs<'a, WriteResponse> {
        BankInputs {
            reservation: None,
            payload_in: None,
            out_ready: false,
            release_allowed: release,
        }
    }

    #[test]
    fn reserve_then_fill_then_release() {
        let release = vec![true; 4];
        let mut b = bank(4, 8);
        let out = b.step(BankInputs {
            reservation: Some(Reservation { id: 4, beats: 1 }),
            ..idle(&release)
        });
        let cell = out.granted.unwrap();
        assert_eq!(cell, 0);

        let out = b.step(BankInputs {
            payload_in: Some(WriteResponse { id: 4, payload: 0x9 }),
            ..idle(&release)
        });
        assert!(out.in_accepted);

        let out = b.step(BankInputs { out_ready: true, ..idle(&release) });
        let resp = out.payload_out.unwrap();
        assert_eq!(resp.id, 4);
        assert_eq!(resp.payload, 0x9);
        assert_eq!(out.released, Some(cell));
        assert!(b.is_empty());
    }

    #[test]
    fn input_without_reservation_is_refused() {
        let release = vec![true; 4];
        let mut b = bank(4, 8);
        let out = b.step(BankInputs {
            payload_in: Some(WriteResponse { id: 2, payload: 1 }),
            ..idle(&release)
        });
        assert!(!out.in_accepted);
        assert_eq!(b.stats().rejected_beats_in, 1);
    }

    #[test]
    fn full_bank_refuses_reservations() {
        let release = vec![true; 2];
        let mut b = bank(2, 4);
        for _ in 0..2 {
            let out = b.step(BankInputs {
                reservation: Some(Reservation { id: 0, beats: 1 }),
                ..idle(&release)
            });
            assert!(out.granted.is_some());
        }
        assert!(!b.reservation_ready());
        let out = b.step(BankInputs {
            reservation: Some(Reservation { id: 1, beats: 1 }),
            ..idle(&release)
        });
        assert!(out.granted.is_none());
        assert_eq!(b.free_cells(), 0);
    }

    #[test]
    fn release_waits_for_enable() {
        let release_off = vec![false; 4];
        let release_on = vec![true; 4];
        let mut b = bank(4, 2);
        b.step(BankInputs {
            reservation: Some(Reservation { id: 1, beats: 1 }),
            ..idle(&release_off)
        });
        b.step(BankInputs {
            payload_in: Some(WriteResponse { id: 1, payload: 3 }),
            ..idle(&release_off)
        });
        let out = b.step(BankInputs { out_ready: true, ..idle(&release_off) });
        assert!(out.payload_out.is_none());
        let out = b.step(BankInputs { out_ready: true, ..idle(&release_on) });
        assert!(out.payload_out.is_some());
    }

    #[test]
    fn release_waits_for_requester_ready() {
        let release = vec![true; 4];
        let mut b = bank(4, 2);
        b.step(BankInputs {
            reservation: Some(Reservation { id: 0, beats: 1 }),
            ..idle(&release)
        });
        b.step(BankInputs {
            payload_in: Some(WriteResponse { id: 0, payload: 3 }),
            ..idle(&release)
        });
        let out = b.step(idle(&release));
        assert!(out.payload_out.is_none());
        assert_eq!(b.filled_beats(0), 1);
    }

    #[test]
    fn drained_queue_accepts_new_round() {
        let release = vec![true; 2];
        let mut b = bank(2, 2);
        for round in 0..5 {
            let out = b.step(BankInputs {
                reservation: Some(Reservation { id: 1, beats: 1 }),
                ..idle(&release)
            });
            let cell = out.granted.unwrap();
            b.step(BankInputs {
                payload_in: Some(WriteResponse { id: 1, payload: round }),
                ..idle(&release)
            });
            let out = b.step(BankInputs { out_ready: true, ..idle(&release) });
            assert_eq!(out.payload_out.unwrap().payload, round);
            assert_eq!(out.released, Some(cell));
        }
    }

    #[test]
    fn same_cycle_reserve_fill_release() {
        // Queue of one fully filled cell: reservation, input into the new
        // cell's predecessor and release of the tail may all fire on the
        // same cycle without desynchronizing the pointers.
        let release = vec![true; 4];
        let mut b = bank(4, 2);
        b.step(BankInputs {
            reservation: Some(Reservation { id: 0, beats: 1 }),
            ..idle(&release)
        });
        b.step(BankInputs {
            payload_in: Some(WriteResponse { id: 0, payload: 10 }),
            ..idle(&release)
        });
        // Cycle with all three handshakes for id 0.
        let out = b.step(BankInputs {
            reservation: Some(Reservation { id: 0, beats: 1 }),
            payload_in: Some(WriteResponse { id: 0, payload: 11 }),
            out_ready: true,
            release_allowed: &release,
        });
        assert!(out.granted.is_some());
        // The new reservation was not yet filled at cycle start.
        assert!(!out.in_accepted);
        assert_eq!(out.payload_out.unwrap().payload, 10);

        b.step(BankInputs {
            payload_in: Some(WriteResponse { id: 0, payload: 11 }),
            ..idle(&release)
        });
        let out = b.step(BankInputs { out_ready: true, ..idle(&release) });
        assert_eq!(out.payload_out.unwrap().payload, 11);
        assert!(b.is_empty());
    }

    #[test]
    fn burst_cell_releases_beats_in_order() {
        use crate::axi::ReadData;
        let release = vec![true; 2];
        let mut b: MessageBank<ReadData> = MessageBank::new("rdata", 2, 2);
        b.step(BankInputs {
            reservation: Some(Reservation { id: 0, beats: 3 }),
            payload_in: None,
            out_ready: false,
            release_allowed: &release,
        });
        for i in 0..3 {
            let out = b.step(BankInputs {
                reservation: None,
                payload_in: Some(ReadData { id: 0, payload: 100 + i, last: i == 2 }),
                out_ready: false,
                release_allowed: &release,
            });
            assert!(out.in_accepted);
        }
        for i in 0..3 {
            let out = b.step(BankInputs {
                reservation: None,
                payload_in: None,
                out_ready: true,
                release_allowed: &release,
            });
            let beat = out.payload_out.unwrap();
            assert_eq!(beat.payload, 100 + i);
            assert_eq!(beat.last, i == 2);
            // The cell is freed only by the last beat.
            assert_eq!(b.is_empty(), i == 2);
        }
    }

    #[test]
    fn lowest_identifier_releases_first() {
        let release = vec![true; 4];
        let mut b = bank(4, 4);
        for id in [3, 1] {
            b.step(BankInputs {
                reservation: Some(Reservation { id, beats: 1 }),
                ..idle(&release)
            });
            b.step(BankInputs {
                payload_in: Some(WriteResponse { id, payload: id as u64 }),
                ..idle(&release)
            });
        }
        let out = b.step(BankInputs { out_ready: true, ..idle(&release) });
        assert_eq!(out.payload_out.unwrap().id, 1);
        let out = b.step(BankInputs { out_ready: true, ..idle(&release) });
        assert_eq!(out.payload_out.unwrap().id, 3);
    }
}
