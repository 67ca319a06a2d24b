//! The slot manager behind the timetable grid: addressing, the entry
//! snapshot, filtering, the swap/restore protocol and the session tying them
//! together.

pub mod coordinator;
pub mod filter;
pub mod session;
pub mod slot;
pub mod store;

pub use coordinator::{CommitRequest, DragOutcome, PendingSwap, SwapPhase};
pub use filter::{EntryFilter, FilterSelector};
pub use session::{LoadTicket, PreparedCommit, PreparedRestore, SessionTicket, TimetableSession};
pub use slot::{SlotKey, key_of, parse_key};
pub use store::{EntryStore, StoreRead};
