use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DayOfWeek, EntityRef, EntryPosition, PeriodType, PlanSettings, PositionOperation};

/// Flat wire shape of a timetable entry. `periodType` may be missing, in
/// which case the entry is regular.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableEntryDto {
    #[serde(alias = "uuid")]
    pub id: String,
    pub day_of_week: DayOfWeek,
    pub period: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_type: Option<PeriodType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<EntityRef>,
    #[serde(default, alias = "schoolClass", skip_serializing_if = "Option::is_none")]
    pub class: Option<EntityRef>,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub is_empty: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

/// Entries are kept raw so one malformed entry does not sink the whole fetch.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableResponse {
    pub uuid: Uuid,
    #[serde(default)]
    pub plan_settings: Option<PlanSettings>,
    #[serde(default)]
    pub generated_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_date: Option<DateTime<Utc>>,
    #[serde(default, alias = "timetableEntries")]
    pub entries: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePositionsRequest<'a> {
    pub entry_positions: &'a [EntryPosition],
    pub operation: PositionOperation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreEntryRequest {
    pub day_of_week: DayOfWeek,
    pub period: u32,
}
