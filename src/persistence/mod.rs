pub mod dto;
pub mod http;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::grid::EntryFilter;
use crate::models::{DayOfWeek, EntryPosition, PositionOperation, Timetable, TimetableEntry};

pub use http::{HttpBackendConfig, HttpTimetableBackend};

/// The service that owns timetables. This crate only ever holds a cached
/// projection of one of them.
#[async_trait]
pub trait TimetableBackend: Send + Sync {
    async fn fetch_timetable_by_uuid(&self, uuid: Uuid) -> Result<Timetable, AppError>;

    async fn filter_timetable_entries(
        &self,
        uuid: Uuid,
        filter: &EntryFilter,
    ) -> Result<Vec<TimetableEntry>, AppError>;

    async fn update_timetable_entry_positions(
        &self,
        uuid: Uuid,
        positions: &[EntryPosition],
        operation: PositionOperation,
    ) -> Result<(), AppError>;

    async fn restore_timetable_entry(
        &self,
        uuid: Uuid,
        day_of_week: DayOfWeek,
        period: u32,
    ) -> Result<(), AppError>;
}

pub struct NoopTimetableBackend;

#[async_trait]
impl TimetableBackend for NoopTimetableBackend {
    async fn fetch_timetable_by_uuid(&self, uuid: Uuid) -> Result<Timetable, AppError> {
        Ok(Timetable {
            uuid,
            plan_settings: None,
            generated_date: None,
            modified_date: None,
            entries: Vec::new(),
        })
    }

    async fn filter_timetable_entries(
        &self,
        _uuid: Uuid,
        _filter: &EntryFilter,
    ) -> Result<Vec<TimetableEntry>, AppError> {
        Ok(Vec::new())
    }

    async fn update_timetable_entry_positions(
        &self,
        _uuid: Uuid,
        _positions: &[EntryPosition],
        _operation: PositionOperation,
    ) -> Result<(), AppError> {
        Ok(())
    }

    async fn restore_timetable_entry(
        &self,
        _uuid: Uuid,
        _day_of_week: DayOfWeek,
        _period: u32,
    ) -> Result<(), AppError> {
        Ok(())
    }
}
