//! Simulation engine, the only component that mutates target state.
//!
//! Three mutating operations drive the exercise:
//! 1. `start()`: send the initial message and enroll each new target
//! 2. `process_responses()`: classify replies and send the matching follow-up
//! 3. `send_reminders()`: nudge non-responders until the retry budget runs out
//!
//! Each operation walks its targets sequentially. A failure for one target is
//! logged to the event log and never aborts the rest of the batch, so every
//! operation can simply be re-run to resume.

pub mod report;

pub use report::{IntentBreakdown, Report};

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::classifier::IntentClassifier;
use crate::config::SimulationConfig;
use crate::error::Result;
use crate::mail::text::{normalize_address, parse_sender, preview, resolve_body};
use crate::mail::{MailGateway, MessageSummary, OutgoingEmail, ReplyTo};
use crate::store::event_log::events;
use crate::store::{EventLog, Intent, StateStore, TargetRecord, TargetStatus, TargetUpdate};
use crate::templates::{self, EmailTemplate};

/// History event names recorded on target records.
pub mod history {
    pub const INITIAL_EMAIL_SENT: &str = "initial_email_sent";
    pub const USER_REPLIED: &str = "user_replied";
    pub const FOLLOWUP_SENT: &str = "followup_sent";
    pub const REMINDER_SENT: &str = "reminder_sent";
    pub const REMINDER_FAILED: &str = "reminder_failed";
    pub const MAX_RETRIES_REACHED: &str = "max_retries_reached";
}

/// Outcome counts of one mutating operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Already known, already terminal, or not a target at all.
    pub skipped: usize,
    /// Targets moved to `max_retries_reached` in this pass.
    pub expired: usize,
}

pub struct Simulation {
    config: SimulationConfig,
    store: StateStore,
    log: EventLog,
    mail: Arc<dyn MailGateway>,
    classifier: IntentClassifier,
}

impl Simulation {
    pub fn new(
        config: SimulationConfig,
        store: StateStore,
        log: EventLog,
        mail: Arc<dyn MailGateway>,
        classifier: IntentClassifier,
    ) -> Self {
        Self {
            config,
            store,
            log,
            mail,
            classifier,
        }
    }

    /// Open the state and event log files named in `config`.
    pub async fn open(
        config: SimulationConfig,
        mail: Arc<dyn MailGateway>,
        classifier: IntentClassifier,
    ) -> Result<Self> {
        let store = StateStore::open(&config.state_path).await?;
        let log = EventLog::open(&config.log_path).await?;
        Ok(Self::new(config, store, log, mail, classifier))
    }

    // ── Read-only accessors ─────────────────────────────────────────

    pub fn report(&self) -> Report {
        Report::from_records(self.store.records().values())
    }

    pub fn list_targets(&self) -> &BTreeMap<String, TargetRecord> {
        self.store.records()
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    // ── start ───────────────────────────────────────────────────────

    /// Send the initial message to every address not already enrolled.
    pub async fn start<S: AsRef<str>>(&mut self, emails: &[S]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        let mut seen = HashSet::new();

        for raw in emails {
            let raw = raw.as_ref();
            let Some(email) = normalize_address(raw) else {
                warn!(email = raw, "Skipping invalid target address");
                summary.failed += 1;
                self.record(
                    events::ERROR,
                    json!({ "email": raw, "stage": "start", "error": "invalid email address" }),
                )
                .await;
                continue;
            };

            if !seen.insert(email.clone()) || self.store.contains(&email) {
                warn!(email = %email, "Target already in simulation, skipping");
                summary.skipped += 1;
                continue;
            }

            match self.enroll(&email).await {
                Ok(()) => summary.succeeded += 1,
                Err(e) => {
                    error!(email = %email, error = %e, "Failed to send initial email");
                    summary.failed += 1;
                    self.record(
                        events::ERROR,
                        json!({ "email": email, "stage": "start", "error": e.to_string() }),
                    )
                    .await;
                }
            }
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "Simulation start complete"
        );
        summary
    }

    async fn enroll(&mut self, email: &str) -> Result<()> {
        let template = templates::initial();
        let sent = self.mail.send(&outgoing(email, &template, None)).await?;

        self.store
            .put_new(email, &sent.message_id, &sent.thread_id)
            .await?;
        self.store
            .append_history(
                email,
                history::INITIAL_EMAIL_SENT,
                json!({ "message_id": sent.message_id, "subject": template.subject }),
            )
            .await?;
        self.record(
            events::INITIAL_EMAIL_SENT,
            json!({
                "email": email,
                "message_id": sent.message_id,
                "thread_id": sent.thread_id,
            }),
        )
        .await;
        Ok(())
    }

    // ── process_responses ───────────────────────────────────────────

    /// Classify unread replies from enrolled targets and send follow-ups.
    ///
    /// Fails only if the unread listing itself cannot be fetched.
    pub async fn process_responses(&mut self) -> Result<BatchSummary> {
        let messages = self.mail.list_unread().await?;
        info!(count = messages.len(), "Processing unread messages");

        let mut summary = BatchSummary::default();
        for message in &messages {
            let Some(sender) = parse_sender(&message.from) else {
                debug!(from = %message.from, "Unparseable sender, skipping");
                summary.skipped += 1;
                continue;
            };

            match self.store.get(&sender).map(|r| r.status) {
                None => {
                    debug!(sender = %sender, "Not a target, skipping");
                    summary.skipped += 1;
                    continue;
                }
                Some(status) if status.is_terminal() => {
                    debug!(sender = %sender, status = %status, "Target already terminal, skipping");
                    summary.skipped += 1;
                    continue;
                }
                Some(_) => {}
            }

            match self.handle_reply(&sender, message).await {
                Ok(intent) => {
                    info!(sender = %sender, intent = %intent, "Reply processed");
                    summary.succeeded += 1;
                }
                Err(e) => {
                    error!(sender = %sender, message_id = %message.message_id, error = %e, "Failed to process reply");
                    summary.failed += 1;
                    self.record(
                        events::ERROR,
                        json!({
                            "email": sender,
                            "sender": sender,
                            "message_id": message.message_id,
                            "stage": "process_responses",
                            "error": e.to_string(),
                        }),
                    )
                    .await;
                }
            }
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "Response processing complete"
        );
        Ok(summary)
    }

    async fn handle_reply(&mut self, email: &str, message: &MessageSummary) -> Result<Intent> {
        let text = self.reply_text(message).await?;
        let intent = self.classifier.classify(&text).await?;

        self.store
            .update(email, TargetUpdate::responded(intent))
            .await?;
        self.store
            .append_history(
                email,
                history::USER_REPLIED,
                json!({
                    "message_id": message.message_id,
                    "intent": intent,
                    "content": preview(&text, self.config.preview_chars),
                }),
            )
            .await?;

        let template = match intent {
            Intent::WorriedCurious => templates::worried_followup(self.config.capture_link.as_deref()),
            Intent::UnbotheredDismissive => templates::dismissive_followup(),
        };
        let reply_to = ReplyTo {
            message_id: message.message_id.clone(),
            thread_id: self.thread_of(email)?,
        };
        let sent = self
            .mail
            .send(&outgoing(email, &template, Some(reply_to)))
            .await?;
        self.store
            .append_history(
                email,
                history::FOLLOWUP_SENT,
                json!({
                    "intent": intent,
                    "subject": template.subject,
                    "message_id": sent.message_id,
                }),
            )
            .await?;

        if let Err(e) = self.mail.mark_read(&message.message_id).await {
            debug!(message_id = %message.message_id, error = %e, "Failed to mark message read");
        }

        self.record(
            events::RESPONSE_PROCESSED,
            json!({ "email": email, "intent": intent, "message_id": message.message_id }),
        )
        .await;
        Ok(intent)
    }

    /// Inline content, else the provider summary, else a full fetch.
    async fn reply_text(&self, message: &MessageSummary) -> Result<String> {
        let inline = resolve_body(
            message.content.as_deref(),
            None,
            message.summary.as_deref(),
        );
        if !inline.is_empty() {
            return Ok(inline);
        }
        Ok(self.mail.fetch_content(message).await?)
    }

    // ── send_reminders ──────────────────────────────────────────────

    /// Remind every non-responder, or retire those out of retries.
    pub async fn send_reminders(&mut self) -> BatchSummary {
        let candidates: Vec<(String, TargetStatus, u32)> = self
            .store
            .records()
            .values()
            .filter(|r| r.status != TargetStatus::Responded)
            .map(|r| (r.email.clone(), r.status, r.retry_count))
            .collect();

        let mut summary = BatchSummary::default();
        for (email, status, retry_count) in candidates {
            if status == TargetStatus::MaxRetriesReached {
                summary.skipped += 1;
                continue;
            }

            if retry_count >= self.config.max_retries {
                match self.retire(&email, retry_count).await {
                    Ok(()) => summary.expired += 1,
                    Err(e) => {
                        error!(email = %email, error = %e, "Failed to mark target as max retries");
                        summary.failed += 1;
                        self.record(
                            events::ERROR,
                            json!({ "email": email, "stage": "max_retries", "error": e.to_string() }),
                        )
                        .await;
                    }
                }
                continue;
            }

            match self.remind(&email).await {
                Ok(retry) => {
                    debug!(email = %email, retry, "Reminder sent");
                    summary.succeeded += 1;
                }
                Err(e) => {
                    error!(email = %email, error = %e, "Failed to send reminder");
                    summary.failed += 1;
                    self.record(
                        events::ERROR,
                        json!({ "email": email, "stage": "send_reminders", "error": e.to_string() }),
                    )
                    .await;
                }
            }
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            expired = summary.expired,
            "Reminder pass complete"
        );
        summary
    }

    async fn retire(&mut self, email: &str, retry_count: u32) -> Result<()> {
        self.store
            .update(email, TargetUpdate::status(TargetStatus::MaxRetriesReached))
            .await?;
        self.store
            .append_history(
                email,
                history::MAX_RETRIES_REACHED,
                json!({ "retry_count": retry_count }),
            )
            .await?;
        self.record(
            events::MAX_RETRIES,
            json!({ "email": email, "retry_count": retry_count }),
        )
        .await;
        Ok(())
    }

    async fn remind(&mut self, email: &str) -> Result<u32> {
        // The retry is spent before sending, so a failed send still counts
        // toward the budget.
        let retry = self.store.increment_retry(email).await?;
        let template = templates::reminder(retry);
        let reply_to = self.original_message(email)?;

        let sent = match self
            .mail
            .send(&outgoing(email, &template, Some(reply_to)))
            .await
        {
            Ok(sent) => sent,
            Err(e) => {
                self.store
                    .append_history(
                        email,
                        history::REMINDER_FAILED,
                        json!({ "retry": retry, "error": e.to_string() }),
                    )
                    .await?;
                return Err(e.into());
            }
        };
        self.store
            .append_history(
                email,
                history::REMINDER_SENT,
                json!({ "retry": retry, "subject": template.subject, "message_id": sent.message_id }),
            )
            .await?;
        self.record(
            events::REMINDER_SENT,
            json!({ "email": email, "retry": retry }),
        )
        .await;
        Ok(retry)
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn thread_of(&self, email: &str) -> Result<String> {
        Ok(self.original_message(email)?.thread_id)
    }

    fn original_message(&self, email: &str) -> Result<ReplyTo> {
        let record = self
            .store
            .get(email)
            .ok_or_else(|| crate::error::StoreError::UnknownTarget(email.to_string()))?;
        Ok(ReplyTo {
            message_id: record.initial_message_id.clone(),
            thread_id: record.thread_id.clone(),
        })
    }

    /// Append to the audit log. Failures here never abort a batch.
    async fn record(&mut self, event_type: &str, data: serde_json::Value) {
        if let Err(e) = self.log.append(event_type, data).await {
            error!(event_type, error = %e, "Failed to append to event log");
        }
    }
}

fn outgoing(to: &str, template: &EmailTemplate, in_reply_to: Option<ReplyTo>) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: template.subject.clone(),
        body: template.body.clone(),
        in_reply_to,
    }
}
