use serde::{Deserialize, Serialize};

use crate::models::DayOfWeek;

/// Target position of one entry in a position-update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPosition {
    pub id: String,
    pub day_of_week: DayOfWeek,
    pub period: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionOperation {
    /// Exchange the positions of both entries.
    Swap,
    /// Move the source onto the destination slot; the displaced destination
    /// entry is left restorable at the source slot.
    Create,
}

impl PositionOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            PositionOperation::Swap => "swap",
            PositionOperation::Create => "create",
        }
    }
}
