use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DayOfWeek, TimetableEntry};

/// Shape of the week a timetable was generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSettings {
    pub days_per_week: u8,
    pub periods_per_day: u32,
}

impl PlanSettings {
    pub fn contains(&self, day: DayOfWeek, period: u32) -> bool {
        day.number() <= self.days_per_week && period >= 1 && period <= self.periods_per_day
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timetable {
    pub uuid: Uuid,
    #[serde(default)]
    pub plan_settings: Option<PlanSettings>,
    #[serde(default)]
    pub generated_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_date: Option<DateTime<Utc>>,
    #[serde(default, alias = "timetableEntries")]
    pub entries: Vec<TimetableEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_settings_bounds() {
        let plan = PlanSettings {
            days_per_week: 5,
            periods_per_day: 6,
        };
        assert!(plan.contains(DayOfWeek::Monday, 1));
        assert!(plan.contains(DayOfWeek::Friday, 6));
        assert!(!plan.contains(DayOfWeek::Saturday, 1));
        assert!(!plan.contains(DayOfWeek::Monday, 7));
        assert!(!plan.contains(DayOfWeek::Monday, 0));
    }
}
