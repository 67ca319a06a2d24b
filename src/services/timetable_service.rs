use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, TimetableError};
use crate::grid::{
    DragOutcome, EntryFilter, FilterSelector, LoadTicket, PendingSwap, SlotKey, SwapPhase,
    TimetableSession,
};
use crate::models::{PlanSettings, PositionOperation, TimetableEntry};
use crate::persistence::TimetableBackend;

/// Filtered view of the current snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleEntries {
    pub timetable_uuid: Option<Uuid>,
    pub entries: Vec<TimetableEntry>,
    pub stale: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub timetable_uuid: Option<Uuid>,
    pub generation: u64,
    pub phase: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingSwap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<PositionOperation>,
    pub restore_in_flight: Option<SlotKey>,
    pub plan_settings: Option<PlanSettings>,
    pub entry_count: usize,
    pub stale: bool,
}

/// Drives a `TimetableSession` against a backend. The session lock is never
/// held while a backend call is awaited: every round-trip is prepare under
/// the lock, release, await, relock, finish with the ticket.
#[derive(Clone)]
pub struct TimetableService {
    session: Arc<Mutex<TimetableSession>>,
    backend: Arc<dyn TimetableBackend>,
}

impl TimetableService {
    pub fn new(backend: Arc<dyn TimetableBackend>) -> Self {
        Self {
            session: Arc::new(Mutex::new(TimetableSession::new())),
            backend,
        }
    }

    pub async fn select_timetable(&self, uuid: Uuid) -> Result<VisibleEntries, AppError> {
        let load = self.session.lock().await.timetable_selected(uuid);
        self.load(load).await?;
        Ok(self.visible_entries().await)
    }

    pub async fn refresh(&self) -> Result<VisibleEntries, AppError> {
        let load = self.session.lock().await.refresh_requested()?;
        self.load(load).await?;
        Ok(self.visible_entries().await)
    }

    pub async fn set_filter(&self, selector: FilterSelector) -> VisibleEntries {
        self.session.lock().await.filter_changed(selector);
        self.visible_entries().await
    }

    pub async fn visible_entries(&self) -> VisibleEntries {
        let session = self.session.lock().await;
        let visible = session.visible();
        VisibleEntries {
            timetable_uuid: session.uuid(),
            entries: visible.value.into_iter().cloned().collect(),
            stale: visible.stale,
        }
    }

    /// Asks the backend to filter instead of the local snapshot.
    pub async fn search_entries(&self, filter: &EntryFilter) -> Result<Vec<TimetableEntry>, AppError> {
        let uuid = self
            .session
            .lock()
            .await
            .uuid()
            .ok_or(TimetableError::NoTimetableSelected)?;
        self.backend.filter_timetable_entries(uuid, filter).await
    }

    pub async fn drag(&self, source: SlotKey, destination: SlotKey) -> Result<DragOutcome, AppError> {
        let outcome = self.session.lock().await.drag(source, destination);
        self.recover(outcome).await
    }

    pub async fn cancel(&self) -> bool {
        self.session.lock().await.cancel()
    }

    /// Sends the pending swap to the backend and reloads on success.
    pub async fn confirm(&self, operation: PositionOperation) -> Result<VisibleEntries, AppError> {
        let prepared = self.session.lock().await.confirm(operation);
        let prepared = self.recover(prepared).await?;
        let uuid = prepared.ticket.uuid();

        let result = self
            .backend
            .update_timetable_entry_positions(
                uuid,
                &prepared.request.positions,
                prepared.request.operation,
            )
            .await;
        if let Err(e) = &result {
            warn!("position update for timetable {} failed: {}", uuid, e);
        }

        let reload = self
            .session
            .lock()
            .await
            .finish_commit(&prepared, result);
        self.reload_after(reload).await
    }

    pub async fn restore(&self, slot: SlotKey) -> Result<VisibleEntries, AppError> {
        let prepared = self.session.lock().await.restore(slot);
        let prepared = self.recover(prepared).await?;
        let uuid = prepared.ticket.uuid();

        let result = self
            .backend
            .restore_timetable_entry(uuid, prepared.slot.day, prepared.slot.period)
            .await;
        if let Err(e) = &result {
            warn!("restore of {} in timetable {} failed: {}", slot, uuid, e);
        }

        let reload = self
            .session
            .lock()
            .await
            .finish_restore(prepared.ticket, result);
        self.reload_after(reload).await
    }

    pub async fn state(&self) -> SessionState {
        let session = self.session.lock().await;
        let (pending, operation) = match session.swap_phase() {
            SwapPhase::Idle => (None, None),
            SwapPhase::AwaitingConfirmation(pending) => (Some(pending.clone()), None),
            SwapPhase::Committing { pending, operation } => {
                (Some(pending.clone()), Some(*operation))
            }
        };

        SessionState {
            timetable_uuid: session.uuid(),
            generation: session.generation(),
            phase: session.swap_phase().name(),
            pending,
            operation,
            restore_in_flight: session.restore_in_flight(),
            plan_settings: session.plan_settings(),
            entry_count: session.store().len(),
            stale: session.store().is_stale(),
        }
    }

    async fn load(&self, ticket: LoadTicket) -> Result<(), AppError> {
        let fetched = self.backend.fetch_timetable_by_uuid(ticket.uuid()).await;

        let mut session = self.session.lock().await;
        let timetable = match fetched {
            Ok(timetable) => timetable,
            Err(e) if !session.is_current(&ticket.session) => {
                debug!("failed load of previous timetable {} ignored: {}", ticket.uuid(), e);
                return Ok(());
            }
            Err(e) => {
                warn!("failed to load timetable {}: {}", ticket.uuid(), e);
                return Err(e);
            }
        };

        match session.finish_load(ticket, timetable) {
            Ok(()) => Ok(()),
            Err(TimetableError::StaleSessionResponse) => Ok(()),
            Err(e) => {
                warn!("timetable {} rejected: {}", ticket.uuid(), e);
                Err(e.into())
            }
        }
    }

    async fn reload_after(
        &self,
        reload: Result<LoadTicket, TimetableError>,
    ) -> Result<VisibleEntries, AppError> {
        let load = self.recover(reload).await?;
        self.load(load).await?;
        Ok(self.visible_entries().await)
    }

    /// Passes the error through, reloading first when the snapshot turned
    /// out to be behind the backend.
    async fn recover<T>(&self, result: Result<T, TimetableError>) -> Result<T, AppError> {
        match result {
            Ok(value) => Ok(value),
            Err(e) if e.needs_refresh() => {
                info!("{}; reloading timetable", e);
                if let Err(reload) = self.refresh().await {
                    warn!("reload after \"{}\" failed: {}", e, reload);
                }
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}
