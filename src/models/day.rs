use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Grid column. Travels on the wire as its ISO number (Monday = 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DayOfWeek {
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
    Sunday = 7,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown day of week: {0}")]
pub struct UnknownDay(pub String);

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(DayOfWeek::Monday),
            2 => Some(DayOfWeek::Tuesday),
            3 => Some(DayOfWeek::Wednesday),
            4 => Some(DayOfWeek::Thursday),
            5 => Some(DayOfWeek::Friday),
            6 => Some(DayOfWeek::Saturday),
            7 => Some(DayOfWeek::Sunday),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Monday",
            DayOfWeek::Tuesday => "Tuesday",
            DayOfWeek::Wednesday => "Wednesday",
            DayOfWeek::Thursday => "Thursday",
            DayOfWeek::Friday => "Friday",
            DayOfWeek::Saturday => "Saturday",
            DayOfWeek::Sunday => "Sunday",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DayOfWeek {
    type Err = UnknownDay;

    /// Accepts `"3"`, `"Wednesday"`, `"WEDNESDAY"` or `"wed"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<u8>() {
            return DayOfWeek::from_number(n).ok_or_else(|| UnknownDay(s.to_string()));
        }

        let lower = trimmed.to_ascii_lowercase();
        let day = match lower.as_str() {
            "monday" | "mon" => DayOfWeek::Monday,
            "tuesday" | "tue" => DayOfWeek::Tuesday,
            "wednesday" | "wed" => DayOfWeek::Wednesday,
            "thursday" | "thu" => DayOfWeek::Thursday,
            "friday" | "fri" => DayOfWeek::Friday,
            "saturday" | "sat" => DayOfWeek::Saturday,
            "sunday" | "sun" => DayOfWeek::Sunday,
            _ => return Err(UnknownDay(s.to_string())),
        };
        Ok(day)
    }
}

impl Serialize for DayOfWeek {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.number())
    }
}

impl<'de> Deserialize<'de> for DayOfWeek {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u8),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => DayOfWeek::from_number(n)
                .ok_or_else(|| D::Error::custom(format!("day of week out of range: {}", n))),
            Raw::Name(name) => name.parse().map_err(D::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_day_names_and_numbers() {
        assert_eq!("Monday".parse::<DayOfWeek>(), Ok(DayOfWeek::Monday));
        assert_eq!("TUESDAY".parse::<DayOfWeek>(), Ok(DayOfWeek::Tuesday));
        assert_eq!("fri".parse::<DayOfWeek>(), Ok(DayOfWeek::Friday));
        assert_eq!("7".parse::<DayOfWeek>(), Ok(DayOfWeek::Sunday));
        assert!("0".parse::<DayOfWeek>().is_err());
        assert!("funday".parse::<DayOfWeek>().is_err());
    }

    #[test]
    fn test_serde_accepts_number_or_name() {
        let days: Vec<DayOfWeek> = serde_json::from_str(r#"[1, "Tuesday", "WEDNESDAY"]"#).unwrap();
        assert_eq!(
            days,
            vec![DayOfWeek::Monday, DayOfWeek::Tuesday, DayOfWeek::Wednesday]
        );

        let json = serde_json::to_string(&DayOfWeek::Thursday).unwrap();
        assert_eq!(json, "4");

        assert!(serde_json::from_str::<DayOfWeek>("8").is_err());
    }
}
