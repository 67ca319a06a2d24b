use std::collections::HashMap;

use crate::error::TimetableError;
use crate::grid::slot::SlotKey;
use crate::models::TimetableEntry;

/// Result of a store read. `stale` is set once the snapshot has been
/// invalidated and until the next `load`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreRead<T> {
    pub value: T,
    pub stale: bool,
}

impl<T> StoreRead<T> {
    /// The value, or `StaleSnapshot` if it may be outdated.
    pub fn fresh(self) -> Result<T, TimetableError> {
        if self.stale {
            Err(TimetableError::StaleSnapshot)
        } else {
            Ok(self.value)
        }
    }
}

/// In-memory snapshot of one timetable's entries, indexed by slot and by id.
#[derive(Debug, Clone)]
pub struct EntryStore {
    entries: Vec<TimetableEntry>,
    by_slot: HashMap<SlotKey, usize>,
    by_id: HashMap<String, usize>,
    stale: bool,
}

impl Default for EntryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryStore {
    /// An empty store is stale: nothing has been loaded into it yet.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            by_slot: HashMap::new(),
            by_id: HashMap::new(),
            stale: true,
        }
    }

    /// Replaces the whole snapshot. Both indexes are built aside and swapped
    /// in together; on a natural-key violation the previous snapshot stays.
    pub fn load(&mut self, entries: Vec<TimetableEntry>) -> Result<(), TimetableError> {
        let mut by_slot = HashMap::with_capacity(entries.len());
        let mut by_id = HashMap::with_capacity(entries.len());

        for (idx, entry) in entries.iter().enumerate() {
            if by_slot.insert(entry.slot(), idx).is_some() {
                return Err(TimetableError::DuplicateSlot(entry.slot()));
            }
            if by_id.insert(entry.id.clone(), idx).is_some() {
                return Err(TimetableError::DuplicateEntryId(entry.id.clone()));
            }
        }

        self.entries = entries;
        self.by_slot = by_slot;
        self.by_id = by_id;
        self.stale = false;
        Ok(())
    }

    pub fn get(&self, slot: SlotKey) -> StoreRead<Option<&TimetableEntry>> {
        self.read(self.by_slot.get(&slot).map(|&idx| &self.entries[idx]))
    }

    pub fn get_by_id(&self, id: &str) -> StoreRead<Option<&TimetableEntry>> {
        self.read(self.by_id.get(id).map(|&idx| &self.entries[idx]))
    }

    /// All entries in load order.
    pub fn snapshot(&self) -> StoreRead<&[TimetableEntry]> {
        self.read(self.entries.as_slice())
    }

    /// Exchanges the positions of two entries in the local snapshot only.
    pub fn apply_position_swap(
        &mut self,
        id_a: &str,
        id_b: &str,
    ) -> Result<(TimetableEntry, TimetableEntry), TimetableError> {
        let idx_a = *self
            .by_id
            .get(id_a)
            .ok_or_else(|| TimetableError::EntryNotFound(id_a.to_string()))?;
        let idx_b = *self
            .by_id
            .get(id_b)
            .ok_or_else(|| TimetableError::EntryNotFound(id_b.to_string()))?;

        if idx_a != idx_b {
            let slot_a = self.entries[idx_a].slot();
            let slot_b = self.entries[idx_b].slot();

            let (day_a, period_a) = (slot_a.day, slot_a.period);
            self.entries[idx_a].day_of_week = slot_b.day;
            self.entries[idx_a].period = slot_b.period;
            self.entries[idx_b].day_of_week = day_a;
            self.entries[idx_b].period = period_a;

            self.by_slot.insert(slot_b, idx_a);
            self.by_slot.insert(slot_a, idx_b);
        }

        Ok((self.entries[idx_a].clone(), self.entries[idx_b].clone()))
    }

    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    /// Drops every entry and leaves the store stale.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.by_slot.clear();
        self.by_id.clear();
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn read<T>(&self, value: T) -> StoreRead<T> {
        StoreRead {
            value,
            stale: self.stale,
        }
    }
}
