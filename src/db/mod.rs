pub mod repository;

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use uuid::Uuid;

use crate::error::AppError;
use crate::grid::EntryFilter;
use crate::models::{DayOfWeek, EntryPosition, PositionOperation, Timetable, TimetableEntry};
use crate::persistence::TimetableBackend;

/// Opens the pool and brings the schema up to date.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

/// Timetable collaborator backed by the local SQLite database.
#[derive(Clone)]
pub struct SqliteTimetableBackend {
    db: SqlitePool,
}

impl SqliteTimetableBackend {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TimetableBackend for SqliteTimetableBackend {
    async fn fetch_timetable_by_uuid(&self, uuid: Uuid) -> Result<Timetable, AppError> {
        repository::fetch_timetable(&self.db, uuid)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn filter_timetable_entries(
        &self,
        uuid: Uuid,
        filter: &EntryFilter,
    ) -> Result<Vec<TimetableEntry>, AppError> {
        Ok(repository::filter_entries(&self.db, uuid, filter).await?)
    }

    async fn update_timetable_entry_positions(
        &self,
        uuid: Uuid,
        positions: &[EntryPosition],
        operation: PositionOperation,
    ) -> Result<(), AppError> {
        repository::update_positions(&self.db, uuid, positions, operation).await?;
        tracing::info!(
            "Updated {} entry positions of timetable {} ({})",
            positions.len(),
            uuid,
            operation.as_str()
        );
        Ok(())
    }

    async fn restore_timetable_entry(
        &self,
        uuid: Uuid,
        day_of_week: DayOfWeek,
        period: u32,
    ) -> Result<(), AppError> {
        repository::restore_entry(&self.db, uuid, day_of_week, period).await?;
        tracing::info!(
            "Restored entry of timetable {} at {} period {}",
            uuid,
            day_of_week,
            period
        );
        Ok(())
    }
}
