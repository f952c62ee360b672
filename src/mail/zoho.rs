//! Zoho Mail REST client.
//!
//! A long-lived refresh token is exchanged for a short-lived access token on
//! first use. The access token is cached for the lifetime of the client and
//! replaced only when the API rejects it with 401, at which point the call is
//! retried exactly once.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::text::resolve_body;
use super::{MailGateway, MessageSummary, OutgoingEmail, SentMessage};
use crate::config::ZohoConfig;
use crate::error::TransportError;

const SERVICE: &str = "zoho";

pub struct ZohoMail {
    config: ZohoConfig,
    client: Client,
    access_token: RwLock<Option<Arc<SecretString>>>,
}

impl ZohoMail {
    pub fn new(config: ZohoConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::network(SERVICE, e))?;
        Ok(Self {
            config,
            client,
            access_token: RwLock::new(None),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/api/accounts/{}/{path}",
            self.config.mail_url.trim_end_matches('/'),
            self.config.account_id
        )
    }

    /// Exchange the refresh token and cache the new access token.
    async fn refresh_access_token(&self) -> Result<Arc<SecretString>, TransportError> {
        let url = format!(
            "{}/oauth/v2/token",
            self.config.accounts_url.trim_end_matches('/')
        );
        let resp = self
            .client
            .post(&url)
            .form(&[
                ("refresh_token", self.config.refresh_token.expose_secret()),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| TransportError::network(SERVICE, e))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(TransportError::AuthFailed {
                service: SERVICE.into(),
                reason: format!("token endpoint returned HTTP {}: {body}", status.as_u16()),
            });
        }

        let token = parse_token_response(&body)?;
        let token = Arc::new(SecretString::from(token));
        *self.access_token.write().await = Some(Arc::clone(&token));
        info!("Zoho access token refreshed");
        Ok(token)
    }

    async fn current_token(&self) -> Result<Arc<SecretString>, TransportError> {
        if let Some(token) = self.access_token.read().await.as_ref() {
            return Ok(Arc::clone(token));
        }
        self.refresh_access_token().await
    }

    /// Run an authenticated request, re-authenticating once on 401.
    async fn execute<F>(&self, operation: &str, build: F) -> Result<Value, TransportError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.current_token().await?;
        let resp = self.send_with_token(&build, &token).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return read_api_response(operation, resp).await;
        }

        warn!(operation, "Zoho rejected the access token, re-authenticating");
        let token = self.refresh_access_token().await?;
        let resp = self.send_with_token(&build, &token).await?;
        read_api_response(operation, resp).await
    }

    async fn send_with_token<F>(
        &self,
        build: &F,
        token: &SecretString,
    ) -> Result<Response, TransportError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        build(&self.client)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Zoho-oauthtoken {}", token.expose_secret()),
            )
            .send()
            .await
            .map_err(|e| TransportError::network(SERVICE, e))
    }
}

#[async_trait]
impl MailGateway for ZohoMail {
    async fn authenticate(&self) -> Result<(), TransportError> {
        self.refresh_access_token().await.map(|_| ())
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<SentMessage, TransportError> {
        let mut payload = json!({
            "fromAddress": self.config.from_address,
            "toAddress": email.to,
            "subject": email.subject,
            "content": email.body,
            "mailFormat": "plaintext",
        });
        let url = match &email.in_reply_to {
            Some(reply) => {
                payload["action"] = json!("reply");
                self.api_url(&format!("messages/{}", reply.message_id))
            }
            None => self.api_url("messages"),
        };

        let response = self
            .execute("send", |client| client.post(&url).json(&payload))
            .await?;

        let data = &response["data"];
        let message_id = id_string(&data["messageId"]).ok_or_else(|| {
            TransportError::invalid_response(SERVICE, "send response has no messageId")
        })?;
        let thread_id = id_string(&data["threadId"])
            .or_else(|| email.in_reply_to.as_ref().map(|r| r.thread_id.clone()))
            .unwrap_or_else(|| message_id.clone());

        debug!(to = %email.to, message_id = %message_id, "Zoho message sent");
        Ok(SentMessage {
            message_id,
            thread_id,
        })
    }

    async fn list_unread(&self) -> Result<Vec<MessageSummary>, TransportError> {
        let url = self.api_url("messages/view");
        let limit = self.config.unread_limit.to_string();
        let response = self
            .execute("list_unread", |client| {
                client
                    .get(&url)
                    .query(&[("status", "unread"), ("limit", limit.as_str())])
            })
            .await?;

        let items = response["data"].as_array().cloned().unwrap_or_default();
        let summaries: Vec<MessageSummary> = items
            .iter()
            .filter_map(|item| {
                let summary = parse_summary(item);
                if summary.is_none() {
                    warn!("Skipping unread entry without messageId");
                }
                summary
            })
            .collect();
        debug!(count = summaries.len(), "Listed unread messages");
        Ok(summaries)
    }

    async fn fetch_content(&self, message: &MessageSummary) -> Result<String, TransportError> {
        let folder_id = message
            .folder_id
            .as_deref()
            .ok_or_else(|| TransportError::InvalidRequest {
                service: SERVICE.into(),
                reason: format!("message {} has no folderId", message.message_id),
            })?;
        let url = self.api_url(&format!(
            "folders/{folder_id}/messages/{}/content",
            message.message_id
        ));
        let response = self
            .execute("fetch_content", |client| client.get(&url))
            .await?;

        let html = response["data"]["content"].as_str();
        Ok(resolve_body(
            message.content.as_deref(),
            html,
            message.summary.as_deref(),
        ))
    }

    async fn mark_read(&self, message_id: &str) -> Result<(), TransportError> {
        let url = self.api_url("updatemessage");
        let id = message_id
            .parse::<u64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(message_id));
        let payload = json!({ "mode": "markAsRead", "messageId": [id] });
        self.execute("mark_read", |client| client.put(&url).json(&payload))
            .await
            .map(|_| ())
    }
}

// ── Response parsing (public for testing) ───────────────────────────

/// Pull `access_token` out of a token endpoint body.
///
/// Zoho reports some failures as HTTP 200 with an `error` field.
pub fn parse_token_response(body: &str) -> Result<String, TransportError> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| TransportError::invalid_response(SERVICE, format!("token body: {e}")))?;
    if let Some(token) = json["access_token"].as_str().filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }
    let reason = json["error"]
        .as_str()
        .unwrap_or("no access_token in response")
        .to_string();
    Err(TransportError::AuthFailed {
        service: SERVICE.into(),
        reason,
    })
}

/// Convert one entry of the `messages/view` listing.
pub fn parse_summary(item: &Value) -> Option<MessageSummary> {
    let message_id = id_string(&item["messageId"])?;
    let text = |key: &str| {
        item[key]
            .as_str()
            .map(str::to_string)
            .filter(|s| !s.trim().is_empty())
    };
    Some(MessageSummary {
        from: text("fromAddress").or_else(|| text("sender")).unwrap_or_default(),
        message_id,
        thread_id: id_string(&item["threadId"]),
        folder_id: id_string(&item["folderId"]),
        subject: text("subject"),
        summary: text("summary"),
        content: text("content"),
    })
}

/// Zoho ids arrive as strings or as bare numbers depending on the endpoint.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

async fn read_api_response(operation: &str, resp: Response) -> Result<Value, TransportError> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| TransportError::network(SERVICE, e))?;

    if !status.is_success() {
        return Err(TransportError::Status {
            service: SERVICE.into(),
            status: status.as_u16(),
            body,
        });
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    let json: Value = serde_json::from_str(&body).map_err(|e| {
        TransportError::invalid_response(SERVICE, format!("{operation} returned invalid JSON: {e}"))
    })?;

    // Envelope status, e.g. {"status": {"code": 500, "description": "..."}}
    if let Some(code) = json["status"]["code"].as_u64()
        && !(200..300).contains(&code)
    {
        return Err(TransportError::Status {
            service: SERVICE.into(),
            status: u16::try_from(code).unwrap_or(u16::MAX),
            body: json["status"]["description"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
        });
    }
    Ok(json)
}
