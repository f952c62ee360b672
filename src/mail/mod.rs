//! Mail provider abstraction.
//!
//! The engine only talks to [`MailGateway`]; the Zoho REST client is the
//! production implementation and tests substitute an in-memory one.

pub mod text;
pub mod zoho;

pub use zoho::ZohoMail;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Conversation an outgoing message should be threaded into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyTo {
    /// Provider id of the message being replied to.
    pub message_id: String,
    pub thread_id: String,
}

/// A message to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub in_reply_to: Option<ReplyTo>,
}

/// Provider identifiers of a sent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    pub message_id: String,
    pub thread_id: String,
}

/// An unread message as returned by the inbox listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    /// Raw sender header, possibly display-name qualified.
    pub from: String,
    pub message_id: String,
    pub thread_id: Option<String>,
    /// Provider folder holding the message, needed to fetch full content.
    pub folder_id: Option<String>,
    pub subject: Option<String>,
    /// Short provider-generated excerpt.
    pub summary: Option<String>,
    /// Full body when the listing already includes it.
    pub content: Option<String>,
}

/// Send/fetch/mark-read against a mail provider.
///
/// Implementations own their credentials. Failures surface as
/// [`TransportError`]; there is no retry at this layer beyond a single
/// re-authentication when a credential has expired.
#[async_trait]
pub trait MailGateway: Send + Sync {
    /// Exchange the long-lived credential for a fresh access credential.
    async fn authenticate(&self) -> Result<(), TransportError>;

    async fn send(&self, email: &OutgoingEmail) -> Result<SentMessage, TransportError>;

    async fn list_unread(&self) -> Result<Vec<MessageSummary>, TransportError>;

    /// Human-authored text of a message: markup stripped, whitespace
    /// collapsed and quoted history removed.
    async fn fetch_content(&self, message: &MessageSummary) -> Result<String, TransportError>;

    async fn mark_read(&self, message_id: &str) -> Result<(), TransportError>;
}
