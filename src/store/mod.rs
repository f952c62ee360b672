//! Persistence layer: JSON-file state store and event log.

pub mod event_log;
mod file;
pub mod model;
pub mod state;

pub use event_log::{EventLog, LogEntry};
pub use model::{HistoryEntry, Intent, TargetRecord, TargetStatus, TargetUpdate};
pub use state::StateStore;
