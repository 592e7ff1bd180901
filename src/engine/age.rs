//! Relative-age bookkeeping across everything the scheduler can pick from:
//! individual write-data entries, whole write slots and whole read slots.
//!
//! The hardware keeps a triangular boolean matrix of "i is older than j"
//! relations; allocating an entity clears its row and sets its column. A
//! monotonic allocation stamp per entity is semantically equivalent (newer
//! entities get strictly larger stamps) and is what is implemented here.

/// An entity whose relative age the scheduler may query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    WriteEntry { slot: usize, entry: usize },
    WriteSlot(usize),
    ReadSlot(usize),
}

#[derive(Debug)]
pub struct AgeTracker {
    next_stamp: u64,
    wentry: Vec<u64>,
    wslot: Vec<u64>,
    rslot: Vec<u64>,
    entries_per_wslot: usize,
}

impl AgeTracker {
    pub fn new(num_wslots: usize, entries_per_wslot: usize, num_rslots: usize) -> Self {
        Self {
            next_stamp: 1,
            wentry: vec![0; num_wslots * entries_per_wslot],
            wslot: vec![0; num_wslots],
            rslot: vec![0; num_rslots],
            entries_per_wslot,
        }
    }

    /// Makes `entity` the newest tracked entity: it becomes younger than
    /// every other entity in every domain.
    pub fn mark_newest(&mut self, entity: Entity) {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        *self.stamp_slot(entity) = stamp;
    }

    /// Allocation stamp of `entity`; smaller stamps are older. Zero means
    /// the entity has never been allocated.
    pub fn stamp(&self, entity: Entity) -> u64 {
        match entity {
            Entity::WriteEntry { slot, entry } => self.wentry[slot * self.entries_per_wslot + entry],
            Entity::WriteSlot(slot) => self.wslot[slot],
            Entity::ReadSlot(slot) => self.rslot[slot],
        }
    }

    pub fn is_older(&self, a: Entity, b: Entity) -> bool {
        self.stamp(a) < self.stamp(b)
    }

    fn stamp_slot(&mut self, entity: Entity) -> &mut u64 {
        match entity {
            Entity::WriteEntry { slot, entry } => {
                &mut self.wentry[slot * self.entries_per_wslot + entry]
            }
            Entity::WriteSlot(slot) => &mut self.wslot[slot],
            Entity::ReadSlot(slot) => &mut self.rslot[slot],
        }
    }
}
