use serde::{Deserialize, Serialize};

use crate::error::TimetableError;
use crate::grid::slot::{SlotKey, key_of};
use crate::models::DayOfWeek;
use crate::persistence::dto::TimetableEntryDto;

/// Reference to an entity owned elsewhere (subject, teacher, room, class).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl EntityRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: None,
            name: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodType {
    #[serde(alias = "REGULAR", alias = "regular")]
    Regular,
    #[serde(alias = "BREAK", alias = "break")]
    Break,
    #[serde(alias = "LUNCH", alias = "lunch")]
    Lunch,
}

/// What a regular period is assigned to. Every field is optional: a regular
/// slot may be partially planned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    pub subject: Option<EntityRef>,
    pub teacher: Option<EntityRef>,
    pub room: Option<EntityRef>,
    pub class: Option<EntityRef>,
}

impl Assignment {
    /// A class alone does not make a lesson; subject, teacher or room does.
    pub fn has_content(&self) -> bool {
        self.subject.is_some() || self.teacher.is_some() || self.room.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotContent {
    Regular(Assignment),
    Break,
    Lunch,
}

impl SlotContent {
    pub fn period_type(&self) -> PeriodType {
        match self {
            SlotContent::Regular(_) => PeriodType::Regular,
            SlotContent::Break => PeriodType::Break,
            SlotContent::Lunch => PeriodType::Lunch,
        }
    }

    pub fn assignment(&self) -> Option<&Assignment> {
        match self {
            SlotContent::Regular(assignment) => Some(assignment),
            SlotContent::Break | SlotContent::Lunch => None,
        }
    }
}

/// One occupied slot of a timetable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TimetableEntryDto", into = "TimetableEntryDto")]
pub struct TimetableEntry {
    pub id: String,
    pub day_of_week: DayOfWeek,
    pub period: u32,
    pub content: SlotContent,
    pub is_locked: bool,
    /// Soft-deleted: blank on the grid but recoverable through a restore.
    pub is_empty: bool,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl TimetableEntry {
    pub fn regular(
        id: impl Into<String>,
        day_of_week: DayOfWeek,
        period: u32,
        assignment: Assignment,
    ) -> Self {
        Self {
            id: id.into(),
            day_of_week,
            period,
            content: SlotContent::Regular(assignment),
            is_locked: false,
            is_empty: false,
            start_time: None,
            end_time: None,
        }
    }

    pub fn slot(&self) -> SlotKey {
        key_of(self.day_of_week, self.period)
    }

    pub fn assignment(&self) -> Option<&Assignment> {
        self.content.assignment()
    }

    /// True when the entry can serve as a swap endpoint content-wise.
    pub fn has_content(&self) -> bool {
        if self.is_empty {
            return false;
        }
        match &self.content {
            SlotContent::Regular(assignment) => assignment.has_content(),
            SlotContent::Break | SlotContent::Lunch => true,
        }
    }
}

impl TryFrom<TimetableEntryDto> for TimetableEntry {
    type Error = TimetableError;

    fn try_from(dto: TimetableEntryDto) -> Result<Self, Self::Error> {
        if dto.id.trim().is_empty() {
            return Err(TimetableError::InvalidEntry("entry without id".to_string()));
        }
        if dto.period == 0 {
            return Err(TimetableError::InvalidEntry(format!(
                "entry {} has period 0",
                dto.id
            )));
        }

        let carries_refs = dto.subject.is_some()
            || dto.teacher.is_some()
            || dto.room.is_some()
            || dto.class.is_some();

        let content = match dto.period_type.unwrap_or(PeriodType::Regular) {
            PeriodType::Regular => SlotContent::Regular(Assignment {
                subject: dto.subject,
                teacher: dto.teacher,
                room: dto.room,
                class: dto.class,
            }),
            other if carries_refs => {
                return Err(TimetableError::InvalidEntry(format!(
                    "{:?} entry {} carries assignment references",
                    other, dto.id
                )));
            }
            PeriodType::Break => SlotContent::Break,
            PeriodType::Lunch => SlotContent::Lunch,
        };

        Ok(Self {
            id: dto.id,
            day_of_week: dto.day_of_week,
            period: dto.period,
            content,
            is_locked: dto.is_locked,
            is_empty: dto.is_empty,
            start_time: dto.start_time,
            end_time: dto.end_time,
        })
    }
}

impl From<TimetableEntry> for TimetableEntryDto {
    fn from(entry: TimetableEntry) -> Self {
        let period_type = entry.content.period_type();
        let assignment = match entry.content {
            SlotContent::Regular(assignment) => assignment,
            SlotContent::Break | SlotContent::Lunch => Assignment::default(),
        };

        Self {
            id: entry.id,
            day_of_week: entry.day_of_week,
            period: entry.period,
            period_type: Some(period_type),
            subject: assignment.subject,
            teacher: assignment.teacher,
            room: assignment.room,
            class: assignment.class,
            is_locked: entry.is_locked,
            is_empty: entry.is_empty,
            start_time: entry.start_time,
            end_time: entry.end_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_regular_entry_without_period_type() {
        let json = r#"{
            "id": "e1",
            "dayOfWeek": "Monday",
            "period": 1,
            "subject": { "id": "s1", "code": "MATH" },
            "teacher": { "id": "t1", "name": "Ms. Sato" },
            "isLocked": true
        }"#;

        let entry: TimetableEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.day_of_week, DayOfWeek::Monday);
        assert_eq!(entry.content.period_type(), PeriodType::Regular);
        assert!(entry.is_locked);
        assert!(!entry.is_empty);
        assert!(entry.has_content());

        let assignment = entry.assignment().unwrap();
        assert_eq!(assignment.subject.as_ref().unwrap().code.as_deref(), Some("MATH"));
        assert_eq!(assignment.teacher.as_ref().unwrap().name.as_deref(), Some("Ms. Sato"));
    }

    #[test]
    fn test_break_with_subject_is_rejected() {
        let json = r#"{
            "id": "b1",
            "dayOfWeek": 2,
            "period": 3,
            "periodType": "BREAK",
            "subject": { "id": "s1" }
        }"#;

        let err = serde_json::from_str::<TimetableEntry>(json).unwrap_err();
        assert!(err.to_string().contains("carries assignment references"));
    }

    #[test]
    fn test_regular_entry_with_only_class_has_no_content() {
        let assignment = Assignment {
            class: Some(EntityRef::new("c1")),
            ..Assignment::default()
        };
        let entry = TimetableEntry::regular("e1", DayOfWeek::Friday, 2, assignment);
        assert!(!entry.has_content());
    }

    #[test]
    fn test_encode_uses_numeric_day_and_period_type() {
        let entry = TimetableEntry {
            content: SlotContent::Lunch,
            ..TimetableEntry::regular("l1", DayOfWeek::Wednesday, 4, Assignment::default())
        };

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["dayOfWeek"], 3);
        assert_eq!(value["periodType"], "Lunch");
        assert!(value.get("subject").is_none());
    }
}
