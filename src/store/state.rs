//! File-backed state store, the single source of truth for target records.
//!
//! The whole record set lives in memory and is written through to disk on
//! every mutation before the call returns. The on-disk shape is
//! `{"users": {email: record}}`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::file::{read_json, write_json};
use super::model::{HistoryEntry, TargetRecord, TargetStatus, TargetUpdate};
use crate::error::StoreError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateDocument {
    #[serde(default)]
    users: BTreeMap<String, TargetRecord>,
}

/// Persistent per-target records keyed by email address.
pub struct StateStore {
    path: PathBuf,
    users: BTreeMap<String, TargetRecord>,
}

impl StateStore {
    /// Load the store from `path`. A missing file is an empty simulation.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let document: StateDocument = read_json(&path).await?.unwrap_or_default();
        debug!(path = %path.display(), targets = document.users.len(), "Loaded simulation state");
        Ok(Self {
            path,
            users: document.users,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, email: &str) -> Option<&TargetRecord> {
        self.users.get(email)
    }

    pub fn contains(&self, email: &str) -> bool {
        self.users.contains_key(email)
    }

    pub fn records(&self) -> &BTreeMap<String, TargetRecord> {
        &self.users
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Create a record in `initial_sent`.
    ///
    /// Returns `false` without touching anything if the email is already
    /// present; callers are expected to check first.
    pub async fn put_new(
        &mut self,
        email: &str,
        message_id: &str,
        thread_id: &str,
    ) -> Result<bool, StoreError> {
        if self.users.contains_key(email) {
            return Ok(false);
        }
        self.users.insert(
            email.to_string(),
            TargetRecord::new(email, message_id, thread_id),
        );
        self.persist().await?;
        Ok(true)
    }

    /// Apply a partial update. Status must move forward and intent is write-once.
    pub async fn update(&mut self, email: &str, update: TargetUpdate) -> Result<(), StoreError> {
        let record = self.record_mut(email)?;

        if let Some(status) = update.status
            && !record.status.can_transition_to(status)
        {
            return Err(StoreError::InvalidTransition {
                email: email.to_string(),
                from: record.status.to_string(),
                to: status.to_string(),
            });
        }
        if update.intent.is_some() && record.intent.is_some() {
            return Err(StoreError::IntentAlreadySet(email.to_string()));
        }

        if let Some(status) = update.status {
            record.status = status;
        }
        if let Some(intent) = update.intent {
            record.intent = Some(intent);
        }
        self.persist().await
    }

    pub async fn append_history(
        &mut self,
        email: &str,
        event: &str,
        details: serde_json::Value,
    ) -> Result<(), StoreError> {
        let record = self.record_mut(email)?;
        record.history.push(HistoryEntry {
            timestamp: Utc::now(),
            event: event.to_string(),
            details,
        });
        self.persist().await
    }

    /// Bump the retry counter and return the new value.
    pub async fn increment_retry(&mut self, email: &str) -> Result<u32, StoreError> {
        let record = self.record_mut(email)?;
        if record.status == TargetStatus::Responded {
            return Err(StoreError::InvalidTransition {
                email: email.to_string(),
                from: record.status.to_string(),
                to: "retry".to_string(),
            });
        }
        record.retry_count += 1;
        let count = record.retry_count;
        self.persist().await?;
        Ok(count)
    }

    fn record_mut(&mut self, email: &str) -> Result<&mut TargetRecord, StoreError> {
        self.users
            .get_mut(email)
            .ok_or_else(|| StoreError::UnknownTarget(email.to_string()))
    }

    async fn persist(&self) -> Result<(), StoreError> {
        #[derive(Serialize)]
        struct DocumentRef<'a> {
            users: &'a BTreeMap<String, TargetRecord>,
        }
        write_json(&self.path, &DocumentRef { users: &self.users }).await
    }
}
