//! Drag-and-drop swap protocol and single-slot restore.
//!
//! A swap goes `Idle -> AwaitingConfirmation -> Committing -> Idle`. Every
//! rejection lands back in `Idle` with the store untouched; nothing is
//! written locally before the persistence collaborator has accepted the
//! change.

use serde::Serialize;
use tracing::debug;

use crate::error::{AppError, TimetableError};
use crate::grid::slot::SlotKey;
use crate::grid::store::EntryStore;
use crate::models::{EntryPosition, PositionOperation, TimetableEntry};

/// Entries captured when a drag passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSwap {
    pub source: SlotKey,
    pub destination: SlotKey,
    pub source_entry: TimetableEntry,
    pub destination_entry: TimetableEntry,
}

impl PendingSwap {
    /// Each entry takes the other's slot.
    pub fn positions(&self) -> Vec<EntryPosition> {
        vec![
            EntryPosition {
                id: self.source_entry.id.clone(),
                day_of_week: self.destination.day,
                period: self.destination.period,
            },
            EntryPosition {
                id: self.destination_entry.id.clone(),
                day_of_week: self.source.day,
                period: self.source.period,
            },
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    pub positions: Vec<EntryPosition>,
    pub operation: PositionOperation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SwapPhase {
    #[default]
    Idle,
    AwaitingConfirmation(PendingSwap),
    Committing {
        pending: PendingSwap,
        operation: PositionOperation,
    },
}

impl SwapPhase {
    pub fn name(&self) -> &'static str {
        match self {
            SwapPhase::Idle => "idle",
            SwapPhase::AwaitingConfirmation(_) => "awaitingConfirmation",
            SwapPhase::Committing { .. } => "committing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DragOutcome {
    /// Dropped onto its own slot.
    Ignored,
    AwaitingConfirmation,
}

#[derive(Debug, Default)]
pub struct SwapCoordinator {
    phase: SwapPhase,
}

impl SwapCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &SwapPhase {
        &self.phase
    }

    pub fn pending(&self) -> Option<&PendingSwap> {
        match &self.phase {
            SwapPhase::AwaitingConfirmation(pending) => Some(pending),
            SwapPhase::Committing { pending, .. } => Some(pending),
            SwapPhase::Idle => None,
        }
    }

    /// Validates a drag from `source` onto `destination`.
    ///
    /// Checks run in order: same slot (ignored), locked endpoint, empty
    /// endpoint. A gesture still awaiting confirmation is superseded.
    pub fn drag(
        &mut self,
        store: &EntryStore,
        source: SlotKey,
        destination: SlotKey,
    ) -> Result<DragOutcome, TimetableError> {
        if matches!(self.phase, SwapPhase::Committing { .. }) {
            return Err(TimetableError::CommitInFlight);
        }
        self.phase = SwapPhase::Idle;

        if source == destination {
            debug!("drag onto own slot {} ignored", source);
            return Ok(DragOutcome::Ignored);
        }

        let source_entry = store.get(source).fresh()?;
        let destination_entry = store.get(destination).fresh()?;

        if source_entry
            .into_iter()
            .chain(destination_entry)
            .any(|entry| entry.is_locked)
        {
            return Err(TimetableError::LockedEntry);
        }

        let (Some(source_entry), Some(destination_entry)) = (
            source_entry.filter(|e| e.has_content()),
            destination_entry.filter(|e| e.has_content()),
        ) else {
            return Err(TimetableError::EmptyEndpoint);
        };

        debug!(
            "swap {} ({}) <-> {} ({}) awaiting confirmation",
            source, source_entry.id, destination, destination_entry.id
        );
        self.phase = SwapPhase::AwaitingConfirmation(PendingSwap {
            source,
            destination,
            source_entry: source_entry.clone(),
            destination_entry: destination_entry.clone(),
        });
        Ok(DragOutcome::AwaitingConfirmation)
    }

    /// Discards a gesture awaiting confirmation. A commit already on the
    /// wire cannot be cancelled.
    pub fn cancel(&mut self) -> bool {
        if matches!(self.phase, SwapPhase::AwaitingConfirmation(_)) {
            self.phase = SwapPhase::Idle;
            true
        } else {
            false
        }
    }

    /// Re-checks the captured swap against the current snapshot and moves
    /// it to `Committing`. Any failure drops the capture.
    pub fn confirm(
        &mut self,
        store: &EntryStore,
        operation: PositionOperation,
    ) -> Result<CommitRequest, TimetableError> {
        match std::mem::take(&mut self.phase) {
            SwapPhase::AwaitingConfirmation(captured) => {
                let pending = revalidate(store, captured)?;
                let request = CommitRequest {
                    positions: pending.positions(),
                    operation,
                };
                self.phase = SwapPhase::Committing { pending, operation };
                Ok(request)
            }
            committing @ SwapPhase::Committing { .. } => {
                self.phase = committing;
                Err(TimetableError::CommitInFlight)
            }
            SwapPhase::Idle => Err(TimetableError::NothingPending),
        }
    }

    /// Settles the outstanding commit and returns to `Idle` either way.
    pub fn complete(
        &mut self,
        result: Result<(), AppError>,
    ) -> Result<(PendingSwap, PositionOperation), TimetableError> {
        let (pending, operation) = match std::mem::take(&mut self.phase) {
            SwapPhase::Committing { pending, operation } => (pending, operation),
            other => {
                self.phase = other;
                return Err(TimetableError::NothingPending);
            }
        };

        match result {
            Ok(()) => Ok((pending, operation)),
            Err(e) => Err(TimetableError::PersistenceError(e.to_string())),
        }
    }

    pub fn reset(&mut self) {
        self.phase = SwapPhase::Idle;
    }
}

/// The snapshot may have been reloaded since the drag. Both entries must
/// still be present at their captured slots and still pass the drag checks.
fn revalidate(store: &EntryStore, captured: PendingSwap) -> Result<PendingSwap, TimetableError> {
    store.snapshot().fresh()?;

    let source_entry = current_entry(store, &captured.source_entry, captured.source)?;
    let destination_entry =
        current_entry(store, &captured.destination_entry, captured.destination)?;

    if source_entry.is_locked || destination_entry.is_locked {
        return Err(TimetableError::LockedEntry);
    }
    if !source_entry.has_content() || !destination_entry.has_content() {
        return Err(TimetableError::EmptyEndpoint);
    }

    Ok(PendingSwap {
        source_entry,
        destination_entry,
        ..captured
    })
}

fn current_entry(
    store: &EntryStore,
    captured: &TimetableEntry,
    slot: SlotKey,
) -> Result<TimetableEntry, TimetableError> {
    match store.get_by_id(&captured.id).fresh()? {
        Some(entry) if entry.slot() == slot => Ok(entry.clone()),
        _ => Err(TimetableError::EntryNotFound(captured.id.clone())),
    }
}

/// Single-slot restore: `Idle -> Restoring -> Idle`.
#[derive(Debug, Default)]
pub struct RestoreCoordinator {
    in_flight: Option<SlotKey>,
}

impl RestoreCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> Option<SlotKey> {
        self.in_flight
    }

    /// Only a soft-deleted entry or a slot without any entry can be restored.
    pub fn begin(&mut self, store: &EntryStore, slot: SlotKey) -> Result<SlotKey, TimetableError> {
        if self.in_flight.is_some() {
            return Err(TimetableError::RestoreInFlight);
        }

        match store.get(slot).fresh()? {
            Some(entry) if entry.is_locked => return Err(TimetableError::LockedEntry),
            Some(entry) if !entry.is_empty => return Err(TimetableError::NotRestorable(slot)),
            _ => {}
        }

        debug!("restoring slot {}", slot);
        self.in_flight = Some(slot);
        Ok(slot)
    }

    pub fn complete(&mut self, result: Result<(), AppError>) -> Result<SlotKey, TimetableError> {
        let slot = self.in_flight.take().ok_or(TimetableError::NothingPending)?;
        result
            .map(|()| slot)
            .map_err(|e| TimetableError::PersistenceError(e.to_string()))
    }

    pub fn reset(&mut self) {
        self.in_flight = None;
    }
}
