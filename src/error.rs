use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::grid::slot::SlotKey;

/// Failures of the slot manager itself. Validation outcomes of the
/// swap/restore coordinator are reported through this type as well.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimetableError {
    #[error("malformed slot key: {0:?}")]
    MalformedKey(String),

    #[error("entry not found: {0}")]
    EntryNotFound(String),

    #[error("more than one entry for slot {0}")]
    DuplicateSlot(SlotKey),

    #[error("duplicate entry id: {0}")]
    DuplicateEntryId(String),

    #[error("invalid entry: {0}")]
    InvalidEntry(String),

    #[error("slot {0} is outside the plan settings")]
    SlotOutOfRange(SlotKey),

    #[error("entry is locked")]
    LockedEntry,

    #[error("swap endpoint is empty")]
    EmptyEndpoint,

    #[error("slot {0} has nothing to restore")]
    NotRestorable(SlotKey),

    #[error("a position update is already in flight")]
    CommitInFlight,

    #[error("a restore is already in flight")]
    RestoreInFlight,

    #[error("no swap is awaiting confirmation")]
    NothingPending,

    #[error("no timetable selected")]
    NoTimetableSelected,

    #[error("timetable snapshot is stale")]
    StaleSnapshot,

    #[error("persistence error: {0}")]
    PersistenceError(String),

    #[error("response belongs to a previous session")]
    StaleSessionResponse,
}

impl TimetableError {
    /// The single message shown to the user for this cause, if any.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            TimetableError::LockedEntry => Some("This entry is locked and cannot be moved."),
            TimetableError::EmptyEndpoint => Some("Empty slots cannot be swapped."),
            TimetableError::NotRestorable(_) => Some("There is nothing to restore in this slot."),
            TimetableError::NoTimetableSelected | TimetableError::NothingPending => {
                Some("Missing information for this operation.")
            }
            TimetableError::CommitInFlight | TimetableError::RestoreInFlight => {
                Some("Another change is still being saved.")
            }
            TimetableError::SlotOutOfRange(_) => Some("That slot is outside the timetable."),
            TimetableError::EntryNotFound(_) | TimetableError::StaleSnapshot => {
                Some("The timetable has changed and is being reloaded.")
            }
            TimetableError::PersistenceError(_) => {
                Some("Failed to update the timetable. Please try again.")
            }
            TimetableError::DuplicateSlot(_)
            | TimetableError::DuplicateEntryId(_)
            | TimetableError::InvalidEntry(_) => Some("Failed to load the timetable."),
            TimetableError::MalformedKey(_) | TimetableError::StaleSessionResponse => None,
        }
    }

    /// Whether the caller should drop the snapshot and fetch it again.
    pub fn needs_refresh(&self) -> bool {
        matches!(
            self,
            TimetableError::EntryNotFound(_) | TimetableError::StaleSnapshot
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            TimetableError::MalformedKey(_)
            | TimetableError::SlotOutOfRange(_)
            | TimetableError::InvalidEntry(_) => StatusCode::BAD_REQUEST,
            TimetableError::LockedEntry
            | TimetableError::EmptyEndpoint
            | TimetableError::NotRestorable(_)
            | TimetableError::NothingPending
            | TimetableError::NoTimetableSelected => StatusCode::UNPROCESSABLE_ENTITY,
            TimetableError::CommitInFlight
            | TimetableError::RestoreInFlight
            | TimetableError::EntryNotFound(_)
            | TimetableError::StaleSnapshot
            | TimetableError::DuplicateSlot(_)
            | TimetableError::DuplicateEntryId(_)
            | TimetableError::StaleSessionResponse => StatusCode::CONFLICT,
            TimetableError::PersistenceError(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend error {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Not found")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Timetable(#[from] TimetableError),

    #[error("Internal server error")]
    InternalServerError,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not Found".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Timetable(e) => {
                let message = e
                    .user_message()
                    .map(str::to_string)
                    .unwrap_or_else(|| e.to_string());
                (e.status(), message)
            }
            AppError::Backend { status, message } => {
                error!("timetable backend responded {}: {}", status, message);
                (
                    StatusCode::BAD_GATEWAY,
                    "Timetable backend error".to_string(),
                )
            }
            AppError::Http(e) => {
                error!("timetable backend request failed: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "Timetable backend unreachable".to_string(),
                )
            }
            AppError::Database(e) => {
                error!("database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                )
            }
            AppError::Migrate(e) => {
                error!("migration error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                )
            }
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: error_message,
        });

        (status, body).into_response()
    }
}
