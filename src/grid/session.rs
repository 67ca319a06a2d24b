use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, TimetableError};
use crate::grid::coordinator::{
    CommitRequest, DragOutcome, RestoreCoordinator, SwapCoordinator, SwapPhase,
};
use crate::grid::filter::{self, FilterSelector};
use crate::grid::slot::SlotKey;
use crate::grid::store::{EntryStore, StoreRead};
use crate::models::{PlanSettings, PositionOperation, Timetable, TimetableEntry};

/// Identifies the session a network call was issued from. Responses carrying
/// a ticket from an earlier `timetable_selected` are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTicket {
    generation: u64,
    uuid: Uuid,
}

impl SessionTicket {
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// A fetch to perform. Only the most recently issued load may land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub session: SessionTicket,
    seq: u64,
}

impl LoadTicket {
    pub fn uuid(&self) -> Uuid {
        self.session.uuid
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCommit {
    pub ticket: SessionTicket,
    pub request: CommitRequest,
    /// Last load issued when the commit was sent.
    load_seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedRestore {
    pub ticket: SessionTicket,
    pub slot: SlotKey,
}

/// State of the one timetable currently on screen. Purely synchronous: every
/// network round-trip is split into a `prepare` step returning a ticket and a
/// `finish_*` step that takes the ticket back.
#[derive(Debug, Default)]
pub struct TimetableSession {
    generation: u64,
    load_seq: u64,
    uuid: Option<Uuid>,
    plan_settings: Option<PlanSettings>,
    store: EntryStore,
    selector: FilterSelector,
    swaps: SwapCoordinator,
    restores: RestoreCoordinator,
}

impl TimetableSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.uuid
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn plan_settings(&self) -> Option<PlanSettings> {
        self.plan_settings
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    pub fn selector(&self) -> &FilterSelector {
        &self.selector
    }

    pub fn swap_phase(&self) -> &SwapPhase {
        self.swaps.phase()
    }

    pub fn restore_in_flight(&self) -> Option<SlotKey> {
        self.restores.in_flight()
    }

    /// Switches to another timetable. Everything belonging to the previous
    /// one, including a pending or committing swap, is dropped.
    pub fn timetable_selected(&mut self, uuid: Uuid) -> LoadTicket {
        self.generation += 1;
        self.uuid = Some(uuid);
        self.plan_settings = None;
        self.store.reset();
        self.swaps.reset();
        self.restores.reset();
        info!("timetable {} selected (generation {})", uuid, self.generation);
        self.next_load()
    }

    pub fn refresh_requested(&mut self) -> Result<LoadTicket, TimetableError> {
        self.ticket()?;
        self.store.invalidate();
        Ok(self.next_load())
    }

    /// Re-derives the visible list only; no network involved.
    pub fn filter_changed(&mut self, selector: FilterSelector) {
        debug!("filter changed: {:?}", selector);
        self.selector = selector;
    }

    pub fn visible(&self) -> StoreRead<Vec<&TimetableEntry>> {
        let snapshot = self.store.snapshot();
        StoreRead {
            value: filter::apply(snapshot.value, &self.selector),
            stale: snapshot.stale,
        }
    }

    pub fn is_current(&self, ticket: &SessionTicket) -> bool {
        ticket.generation == self.generation && Some(ticket.uuid) == self.uuid
    }

    pub fn finish_load(&mut self, ticket: LoadTicket, timetable: Timetable) -> Result<(), TimetableError> {
        self.check(&ticket.session)?;
        if ticket.seq != self.load_seq {
            debug!("superseded load #{} dropped", ticket.seq);
            return Err(TimetableError::StaleSessionResponse);
        }
        if timetable.uuid != ticket.uuid() {
            return Err(TimetableError::PersistenceError(format!(
                "requested timetable {} but received {}",
                ticket.uuid(),
                timetable.uuid
            )));
        }

        self.store.load(timetable.entries)?;
        self.plan_settings = timetable.plan_settings;
        info!(
            "timetable {} loaded with {} entries",
            ticket.uuid(),
            self.store.len()
        );
        Ok(())
    }

    pub fn drag(&mut self, source: SlotKey, destination: SlotKey) -> Result<DragOutcome, TimetableError> {
        self.ticket()?;
        self.check_in_range(source)?;
        self.check_in_range(destination)?;
        self.swaps.drag(&self.store, source, destination)
    }

    pub fn cancel(&mut self) -> bool {
        self.swaps.cancel()
    }

    pub fn confirm(&mut self, operation: PositionOperation) -> Result<PreparedCommit, TimetableError> {
        let ticket = self.ticket()?;
        let request = self.swaps.confirm(&self.store, operation)?;
        Ok(PreparedCommit {
            ticket,
            request,
            load_seq: self.load_seq,
        })
    }

    /// Settles a commit. On success the returned load must be performed:
    /// the snapshot is stale until it lands.
    ///
    /// A swap is mirrored locally only when no reload was issued while it
    /// was on the wire; a reloaded snapshot already carries it.
    pub fn finish_commit(
        &mut self,
        prepared: &PreparedCommit,
        result: Result<(), AppError>,
    ) -> Result<LoadTicket, TimetableError> {
        self.check(&prepared.ticket)?;
        let (pending, operation) = self.swaps.complete(result)?;

        if operation == PositionOperation::Swap {
            if prepared.load_seq != self.load_seq || self.store.is_stale() {
                debug!("snapshot reloaded during commit; local swap skipped");
            } else if let Err(e) = self
                .store
                .apply_position_swap(&pending.source_entry.id, &pending.destination_entry.id)
            {
                warn!("committed swap not reflected locally: {}", e);
                self.store.invalidate();
                return Err(e);
            }
        }
        self.refresh_requested()
    }

    pub fn restore(&mut self, slot: SlotKey) -> Result<PreparedRestore, TimetableError> {
        let ticket = self.ticket()?;
        self.check_in_range(slot)?;
        let slot = self.restores.begin(&self.store, slot)?;
        Ok(PreparedRestore { ticket, slot })
    }

    /// Restore content is only known to the collaborator, so success always
    /// means a full refetch.
    pub fn finish_restore(
        &mut self,
        ticket: SessionTicket,
        result: Result<(), AppError>,
    ) -> Result<LoadTicket, TimetableError> {
        self.check(&ticket)?;
        self.restores.complete(result)?;
        self.refresh_requested()
    }

    fn ticket(&self) -> Result<SessionTicket, TimetableError> {
        let uuid = self.uuid.ok_or(TimetableError::NoTimetableSelected)?;
        Ok(SessionTicket {
            generation: self.generation,
            uuid,
        })
    }

    fn next_load(&mut self) -> LoadTicket {
        self.load_seq += 1;
        LoadTicket {
            session: SessionTicket {
                generation: self.generation,
                uuid: self.uuid.unwrap_or_default(),
            },
            seq: self.load_seq,
        }
    }

    fn check(&self, ticket: &SessionTicket) -> Result<(), TimetableError> {
        if self.is_current(ticket) {
            Ok(())
        } else {
            debug!(
                "response for timetable {} (generation {}) discarded",
                ticket.uuid, ticket.generation
            );
            Err(TimetableError::StaleSessionResponse)
        }
    }

    fn check_in_range(&self, slot: SlotKey) -> Result<(), TimetableError> {
        match &self.plan_settings {
            Some(plan) if !slot.within(plan) => Err(TimetableError::SlotOutOfRange(slot)),
            _ => Ok(()),
        }
    }
}
