pub mod scheduler;
pub mod timetable_service;

pub use scheduler::RefreshScheduler;
pub use timetable_service::{SessionState, TimetableService, VisibleEntries};
