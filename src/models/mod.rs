pub mod day;
pub mod entry;
pub mod position;
pub mod timetable;

pub use day::{DayOfWeek, UnknownDay};
pub use entry::{Assignment, EntityRef, PeriodType, SlotContent, TimetableEntry};
pub use position::{EntryPosition, PositionOperation};
pub use timetable::{PlanSettings, Timetable};
