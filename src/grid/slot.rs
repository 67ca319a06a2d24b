//! Slot addressing: a `(day, period)` pair is the natural key of an entry
//! within one timetable. The text form is `"{day}-{period}"`, e.g.
//! `"monday-3"`.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TimetableError;
use crate::models::{DayOfWeek, PlanSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub day: DayOfWeek,
    pub period: u32,
}

pub const fn key_of(day: DayOfWeek, period: u32) -> SlotKey {
    SlotKey { day, period }
}

pub fn parse_key(key: &str) -> Result<SlotKey, TimetableError> {
    key.parse()
}

impl SlotKey {
    pub fn within(&self, plan: &PlanSettings) -> bool {
        plan.contains(self.day, self.period)
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.day.name().to_ascii_lowercase(), self.period)
    }
}

impl FromStr for SlotKey {
    type Err = TimetableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || TimetableError::MalformedKey(s.to_string());

        let (day, period) = s.rsplit_once('-').ok_or_else(malformed)?;
        let day: DayOfWeek = day.parse().map_err(|_| malformed())?;
        let period: u32 = period.parse().map_err(|_| malformed())?;
        if period == 0 {
            return Err(malformed());
        }

        Ok(key_of(day, period))
    }
}

impl Serialize for SlotKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_roundtrip_for_whole_week() {
        for day in DayOfWeek::ALL {
            for period in 1..=12 {
                let key = key_of(day, period);
                assert_eq!(parse_key(&key.to_string()), Ok(key));
            }
        }
    }

    #[test]
    fn test_key_text_form() {
        assert_eq!(key_of(DayOfWeek::Tuesday, 2).to_string(), "tuesday-2");
        assert_eq!(parse_key("3-4"), Ok(key_of(DayOfWeek::Wednesday, 4)));
        assert_eq!(parse_key("Friday-1"), Ok(key_of(DayOfWeek::Friday, 1)));
    }

    #[test]
    fn test_malformed_keys() {
        for bad in ["", "monday", "monday-", "-1", "monday-0", "monday-x", "noday-1", "monday-1-2"] {
            assert_eq!(
                parse_key(bad),
                Err(TimetableError::MalformedKey(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_keys_are_distinct() {
        use std::collections::HashSet;

        let keys: HashSet<SlotKey> = DayOfWeek::ALL
            .iter()
            .flat_map(|&day| (1..=8).map(move |period| key_of(day, period)))
            .collect();
        assert_eq!(keys.len(), 7 * 8);
    }
}
