//! Append-only audit trail of externally observable simulation actions.
//!
//! Independent of the state store: the engine only ever appends here and
//! never reads back. The document is a JSON array rewritten on each append.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::file::{read_json, write_json};
use crate::error::StoreError;

/// Event types written by the simulation engine.
pub mod events {
    pub const INITIAL_EMAIL_SENT: &str = "initial_email_sent";
    pub const RESPONSE_PROCESSED: &str = "response_processed";
    pub const REMINDER_SENT: &str = "reminder_sent";
    pub const MAX_RETRIES: &str = "max_retries";
    pub const ERROR: &str = "error";
}

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub data: serde_json::Value,
}

pub struct EventLog {
    path: PathBuf,
    entries: Vec<LogEntry>,
}

impl EventLog {
    /// Load existing entries from `path` (empty if the file is absent).
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = read_json(&path).await?.unwrap_or_default();
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(
        &mut self,
        event_type: &str,
        data: serde_json::Value,
    ) -> Result<(), StoreError> {
        info!(event_type, data = %data, "Simulation event");
        self.entries.push(LogEntry {
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            data,
        });
        write_json(&self.path, &self.entries).await
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Entries whose `data.email` matches `email`.
    pub fn entries_for<'a>(&'a self, email: &'a str) -> impl Iterator<Item = &'a LogEntry> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.data.get("email").and_then(|v| v.as_str()) == Some(email))
    }

    /// Pretty JSON export of the whole log, for download/inspection.
    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_survive_reopen_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");

        let mut log = EventLog::open(&path).await.unwrap();
        log.append(events::INITIAL_EMAIL_SENT, serde_json::json!({"email": "a@x.com"}))
            .await
            .unwrap();
        log.append(events::REMINDER_SENT, serde_json::json!({"email": "a@x.com", "retry": 1}))
            .await
            .unwrap();

        let reopened = EventLog::open(&path).await.unwrap();
        let types: Vec<_> = reopened.entries().iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["initial_email_sent", "reminder_sent"]);
    }

    #[tokio::test]
    async fn entries_for_filters_by_email() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = EventLog::open(dir.path().join("log.json")).await.unwrap();
        log.append(events::INITIAL_EMAIL_SENT, serde_json::json!({"email": "a@x.com"}))
            .await
            .unwrap();
        log.append(events::INITIAL_EMAIL_SENT, serde_json::json!({"email": "b@x.com"}))
            .await
            .unwrap();
        log.append(events::ERROR, serde_json::json!({"error": "boom"}))
            .await
            .unwrap();

        assert_eq!(log.entries_for("a@x.com").count(), 1);
        assert_eq!(log.entries().len(), 3);
    }

    #[tokio::test]
    async fn export_is_a_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = EventLog::open(dir.path().join("log.json")).await.unwrap();
        log.append(events::MAX_RETRIES, serde_json::json!({"email": "a@x.com"}))
            .await
            .unwrap();

        let exported: serde_json::Value = serde_json::from_str(&log.to_json().unwrap()).unwrap();
        assert_eq!(exported[0]["event_type"], "max_retries");
        assert_eq!(exported[0]["data"]["email"], "a@x.com");
    }
}
