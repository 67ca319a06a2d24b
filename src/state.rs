use sqlx::SqlitePool;

use crate::services::TimetableService;

#[derive(Clone)]
pub struct AppState {
    pub service: TimetableService,
    /// Present when the timetable is stored locally.
    pub db: Option<SqlitePool>,
}
