use serde::{Deserialize, Serialize};

use crate::models::{EntityRef, TimetableEntry};

/// Session-scoped view criteria. Unset fields impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,
}

impl FilterSelector {
    pub fn is_identity(&self) -> bool {
        self.teacher_id.is_none()
            && self.room_id.is_none()
            && self.subject_id.is_none()
            && self.class_id.is_none()
    }

    pub fn matches(&self, entry: &TimetableEntry) -> bool {
        let assignment = entry.assignment();

        ref_matches(&self.teacher_id, assignment.and_then(|a| a.teacher.as_ref()))
            && ref_matches(&self.room_id, assignment.and_then(|a| a.room.as_ref()))
            && ref_matches(&self.subject_id, assignment.and_then(|a| a.subject.as_ref()))
            && ref_matches(&self.class_id, assignment.and_then(|a| a.class.as_ref()))
    }
}

fn ref_matches(wanted: &Option<String>, found: Option<&EntityRef>) -> bool {
    match wanted {
        None => true,
        Some(id) => found.is_some_and(|r| &r.id == id),
    }
}

/// Stable filter: keeps source order, never re-sorts.
pub fn apply<'a, I>(entries: I, selector: &FilterSelector) -> Vec<&'a TimetableEntry>
where
    I: IntoIterator<Item = &'a TimetableEntry>,
{
    if selector.is_identity() {
        return entries.into_iter().collect();
    }
    entries
        .into_iter()
        .filter(|entry| selector.matches(entry))
        .collect()
}

/// Server-side filter payload for `filter_timetable_entries`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_ids: Option<Vec<String>>,
}

impl From<&FilterSelector> for EntryFilter {
    fn from(selector: &FilterSelector) -> Self {
        let one = |id: &Option<String>| id.as_ref().map(|id| vec![id.clone()]);
        Self {
            class_ids: one(&selector.class_id),
            teacher_ids: one(&selector.teacher_id),
            room_ids: one(&selector.room_id),
            subject_ids: one(&selector.subject_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Assignment, DayOfWeek, SlotContent};

    fn entry(id: &str, period: u32, teacher: &str, room: &str, subject: &str) -> TimetableEntry {
        TimetableEntry::regular(
            id,
            DayOfWeek::Monday,
            period,
            Assignment {
                subject: Some(EntityRef::new(subject)),
                teacher: Some(EntityRef::new(teacher)),
                room: Some(EntityRef::new(room)),
                class: Some(EntityRef::new("7a")),
            },
        )
    }

    fn sample() -> Vec<TimetableEntry> {
        let mut lunch = TimetableEntry::regular("l1", DayOfWeek::Monday, 4, Assignment::default());
        lunch.content = SlotContent::Lunch;

        vec![
            entry("e1", 1, "t1", "r1", "math"),
            entry("e2", 2, "t2", "r1", "physics"),
            entry("e3", 3, "t1", "r2", "math"),
            lunch,
            entry("e5", 5, "t1", "r1", "art"),
        ]
    }

    fn ids(entries: &[&TimetableEntry]) -> Vec<String> {
        entries.iter().map(|e| e.id.clone()).collect()
    }

    #[test]
    fn test_empty_selector_is_identity() {
        let entries = sample();
        assert!(FilterSelector::default().is_identity());
        let visible = apply(&entries, &FilterSelector::default());
        assert_eq!(visible.len(), entries.len());
        assert!(visible.iter().zip(entries.iter()).all(|(a, b)| *a == b));
    }

    #[test]
    fn test_fields_are_conjunctive() {
        let entries = sample();
        let selector = FilterSelector {
            teacher_id: Some("t1".into()),
            room_id: Some("r1".into()),
            ..FilterSelector::default()
        };
        assert_eq!(ids(&apply(&entries, &selector)), vec!["e1", "e5"]);
    }

    #[test]
    fn test_lunch_is_excluded_by_any_set_field() {
        let entries = sample();
        let selector = FilterSelector {
            class_id: Some("7a".into()),
            ..FilterSelector::default()
        };
        assert_eq!(ids(&apply(&entries, &selector)), vec!["e1", "e2", "e3", "e5"]);
    }

    #[test]
    fn test_filter_is_idempotent_and_deterministic() {
        let entries = sample();
        let selector = FilterSelector {
            subject_id: Some("math".into()),
            ..FilterSelector::default()
        };

        let once = apply(&entries, &selector);
        let twice = apply(once.iter().copied(), &selector);
        assert_eq!(once, twice);
        assert_eq!(once, apply(&entries, &selector));
        assert_eq!(ids(&once), vec!["e1", "e3"]);
    }

    #[test]
    fn test_entry_filter_from_selector() {
        let selector = FilterSelector {
            room_id: Some("r2".into()),
            ..FilterSelector::default()
        };
        let filter = EntryFilter::from(&selector);
        assert_eq!(filter.room_ids, Some(vec!["r2".to_string()]));
        assert!(filter.class_ids.is_none());

        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json, serde_json::json!({ "roomIds": ["r2"] }));
    }
}
