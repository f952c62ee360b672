//! Target record types persisted by the state store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Intent ──────────────────────────────────────────────────────────

/// Emotional register assigned to a target's first reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    WorriedCurious,
    UnbotheredDismissive,
}

impl Intent {
    pub fn label(&self) -> &'static str {
        match self {
            Self::WorriedCurious => "worried_curious",
            Self::UnbotheredDismissive => "unbothered_dismissive",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Status ──────────────────────────────────────────────────────────

/// Lifecycle of a target.
///
/// `InitialSent` is the only non-terminal state. It moves to `Responded`
/// when a reply is classified, or to `MaxRetriesReached` when the reminder
/// budget runs out. Neither terminal state is ever left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    InitialSent,
    Responded,
    MaxRetriesReached,
}

impl TargetStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::InitialSent => "initial_sent",
            Self::Responded => "responded",
            Self::MaxRetriesReached => "max_retries_reached",
        }
    }

    /// No further reminders or classification happen in a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InitialSent)
    }

    /// Valid state transitions. Re-asserting the current state is allowed.
    pub fn can_transition_to(&self, target: TargetStatus) -> bool {
        *self == target || (*self == Self::InitialSent && target.is_terminal())
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Records ─────────────────────────────────────────────────────────

/// One entry in a target's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub details: serde_json::Value,
}

/// Everything the simulation knows about one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub email: String,
    pub initial_message_id: String,
    pub thread_id: String,
    pub retry_count: u32,
    pub intent: Option<Intent>,
    pub status: TargetStatus,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
}

impl TargetRecord {
    pub fn new(
        email: impl Into<String>,
        initial_message_id: impl Into<String>,
        thread_id: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            initial_message_id: initial_message_id.into(),
            thread_id: thread_id.into(),
            retry_count: 0,
            intent: None,
            status: TargetStatus::InitialSent,
            history: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Partial update applied by [`StateStore::update`](super::StateStore::update).
#[derive(Debug, Clone, Default)]
pub struct TargetUpdate {
    pub intent: Option<Intent>,
    pub status: Option<TargetStatus>,
}

impl TargetUpdate {
    /// Reply classified: intent and status are written together.
    pub fn responded(intent: Intent) -> Self {
        Self {
            intent: Some(intent),
            status: Some(TargetStatus::Responded),
        }
    }

    pub fn status(status: TargetStatus) -> Self {
        Self {
            intent: None,
            status: Some(status),
        }
    }
}
