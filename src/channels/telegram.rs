//! Telegram channel: long-polls the Bot API for updates.
//!
//! Each Telegram chat is a session. `/start` (or the first message from a
//! chat) starts it and `/end` ends it.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::channels::{Channel, ChannelEvent, EventStream, IncomingMessage, OutgoingResponse};
use crate::error::ChannelError;
use crate::session::SessionId;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

const CHANNEL_NAME: &str = "telegram";

/// Telegram channel: connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: String,
    allowed_users: Vec<String>,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: String, allowed_users: Vec<String>) -> Self {
        Self {
            bot_token,
            allowed_users,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        api_url(&self.bot_token, method)
    }

    /// Check if a username is in the allowed list.
    pub fn is_user_allowed(&self, username: &str) -> bool {
        check_user_allowed(&self.allowed_users, [username])
    }

    /// Send a text message, trying Markdown first with plain text fallback.
    /// Splits long messages that exceed Telegram's 4096 char limit.
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        for chunk in &split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH) {
            self.send_message_chunk(chat_id, chunk).await?;
        }
        Ok(())
    }

    /// Send a single message chunk (≤4096 chars), Markdown-first with fallback.
    async fn send_message_chunk(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let markdown_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown"
        });

        let markdown_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&markdown_body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: CHANNEL_NAME.into(),
                reason: e.to_string(),
            })?;

        if markdown_resp.status().is_success() {
            return Ok(());
        }

        let markdown_status = markdown_resp.status();
        tracing::warn!(
            status = ?markdown_status,
            "Telegram sendMessage with Markdown failed; retrying without parse_mode"
        );

        let plain_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        let plain_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&plain_body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: CHANNEL_NAME.into(),
                reason: e.to_string(),
            })?;

        if !plain_resp.status().is_success() {
            let plain_err = plain_resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: CHANNEL_NAME.into(),
                reason: format!(
                    "sendMessage failed (markdown: {}, plain: {})",
                    markdown_status, plain_err
                ),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let bot_token = self.bot_token.clone();
        let allowed_users = self.allowed_users.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;
            let mut active_chats: HashSet<String> = HashSet::new();

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": 30,
                    "allowed_updates": ["message"]
                });

                let resp = match client
                    .post(api_url(&bot_token, "getUpdates"))
                    .json(&body)
                    .send()
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: serde_json::Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let results = match parse_updates(&data) {
                    Ok(results) => results,
                    Err(reason) => {
                        tracing::warn!("Telegram getUpdates rejected: {reason}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                for update in results {
                    if let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64)
                    {
                        offset = uid + 1;
                    }

                    let Some(message) = update.get("message") else {
                        continue;
                    };
                    let Some(text) = message.get("text").and_then(serde_json::Value::as_str)
                    else {
                        continue;
                    };

                    let username = message
                        .get("from")
                        .and_then(|f| f.get("username"))
                        .and_then(|u| u.as_str())
                        .unwrap_or("unknown");
                    let user_id = message
                        .get("from")
                        .and_then(|f| f.get("id"))
                        .and_then(serde_json::Value::as_i64)
                        .map(|id| id.to_string());

                    let mut identities = vec![username];
                    if let Some(ref id) = user_id {
                        identities.push(id.as_str());
                    }
                    if !check_user_allowed(&allowed_users, identities) {
                        tracing::warn!(
                            "Telegram: ignoring message from unauthorized user: \
                             username={username}, user_id={}",
                            user_id.as_deref().unwrap_or("unknown")
                        );
                        continue;
                    }

                    let Some(chat_id) = message
                        .get("chat")
                        .and_then(|c| c.get("id"))
                        .and_then(serde_json::Value::as_i64)
                        .map(|id| id.to_string())
                    else {
                        continue;
                    };

                    let first_name = message
                        .get("from")
                        .and_then(|f| f.get("first_name"))
                        .and_then(|n| n.as_str())
                        .unwrap_or(username);

                    let session = SessionId::new(CHANNEL_NAME, &chat_id);
                    let was_active = active_chats.contains(&chat_id);
                    let (events, now_active) = route_text(&session, text, was_active, first_name);
                    if now_active {
                        active_chats.insert(chat_id);
                    } else {
                        active_chats.remove(&chat_id);
                    }

                    for event in events {
                        if tx.send(event).is_err() {
                            tracing::info!("Telegram listener channel closed");
                            return;
                        }
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send(
        &self,
        session: &SessionId,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        self.send_message(&session.id, &response.content).await
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Telegram getMe request failed");
                ChannelError::HealthCheckFailed {
                    name: CHANNEL_NAME.into(),
                }
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            tracing::warn!(status = %resp.status(), "Telegram getMe rejected");
            Err(ChannelError::HealthCheckFailed {
                name: CHANNEL_NAME.into(),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn api_url(bot_token: &str, method: &str) -> String {
    format!("https://api.telegram.org/bot{bot_token}/{method}")
}

/// The update list from a getUpdates body, or the API's error description.
fn parse_updates(data: &serde_json::Value) -> Result<&[serde_json::Value], String> {
    let ok = data.get("ok").and_then(serde_json::Value::as_bool);
    match data.get("result").and_then(serde_json::Value::as_array) {
        Some(results) if ok != Some(false) => Ok(results),
        _ => {
            let code = data
                .get("error_code")
                .and_then(serde_json::Value::as_i64)
                .map_or_else(|| "none".to_string(), |c| c.to_string());
            let description = data
                .get("description")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("response has no result");
            Err(format!("error_code={code}, description={description}"))
        }
    }
}

/// Check if any identity in the iterator matches the allowed users list.
fn check_user_allowed<'a>(
    allowed_users: &[String],
    identities: impl IntoIterator<Item = &'a str>,
) -> bool {
    let ids: Vec<&str> = identities.into_iter().collect();
    allowed_users
        .iter()
        .any(|u| u == "*" || ids.contains(&u.as_str()))
}

/// Map a chat message onto session events.
///
/// Returns the events to emit and whether the chat has a live session
/// afterwards. The first plain message from an inactive chat only starts the
/// session, so the greeting's name question is answered by the next message.
fn route_text(
    session: &SessionId,
    text: &str,
    active: bool,
    user_name: &str,
) -> (Vec<ChannelEvent>, bool) {
    let command = text.trim().split('@').next().unwrap_or_default();
    match command {
        "/start" => {
            let mut events = Vec::new();
            if active {
                events.push(ChannelEvent::SessionEnded(session.clone()));
            }
            events.push(ChannelEvent::SessionStarted(session.clone()));
            (events, true)
        }
        "/end" => {
            if active {
                (vec![ChannelEvent::SessionEnded(session.clone())], false)
            } else {
                (Vec::new(), false)
            }
        }
        _ if !active => (vec![ChannelEvent::SessionStarted(session.clone())], true),
        _ => {
            let msg = IncomingMessage::new(session.clone(), text).with_user_name(user_name);
            (vec![ChannelEvent::Message(msg)], true)
        }
    }
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let mut boundary = max_len;
        while !remaining.is_char_boundary(boundary) {
            boundary -= 1;
        }
        let chunk = &remaining[..boundary];
        // Drop only the separator itself; a split at position 0 would loop.
        let (split_at, separator_len) = match chunk.rfind('\n').or_else(|| chunk.rfind(' ')) {
            Some(i) if i > 0 => (i, 1),
            _ => (boundary, 0),
        };

        chunks.push(remaining[..split_at].to_string());
        remaining = &remaining[split_at + separator_len..];
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
