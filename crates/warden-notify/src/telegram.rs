//! Telegram Bot API channel.
//!
//! Every message is broadcast to all configured chats. The returned
//! correlation id packs the per-chat message ids as `chat:message` pairs
//! separated by `;`, so a later edit reaches every copy.

use std::fmt;
use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use warden_proto::CorrelationId;

use crate::channel::NotificationChannel;
use crate::error::{ChannelError, EditFailure, Result};

const CHANNEL_NAME: &str = "telegram";

/// Configuration for the Telegram channel.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token issued by `@BotFather`.
    pub bot_token: String,
    /// Chats every message is delivered to.
    pub chat_ids: Vec<i64>,
    /// Base URL of the Bot API.
    pub api_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_ids", &self.chat_ids)
            .field("api_url", &self.api_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl TelegramConfig {
    /// Creates a configuration against the public Bot API.
    #[must_use]
    pub fn new(bot_token: impl Into<String>, chat_ids: Vec<i64>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_ids,
            api_url: "https://api.telegram.org".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Sets the Bot API base URL.
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// One delivered copy of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    /// Chat the copy lives in.
    pub chat_id: i64,
    /// Message id within that chat.
    pub message_id: i64,
}

/// Packs delivered copies into a correlation id.
///
/// # Errors
///
/// Returns [`ChannelError::Send`] if `refs` is empty.
pub fn encode_handle(refs: &[MessageRef]) -> Result<CorrelationId> {
    let joined = refs
        .iter()
        .map(|r| format!("{}:{}", r.chat_id, r.message_id))
        .collect::<Vec<_>>()
        .join(";");
    CorrelationId::new(joined).map_err(|e| ChannelError::send(CHANNEL_NAME, e.to_string()))
}

/// Unpacks a correlation id produced by [`encode_handle`].
///
/// # Errors
///
/// Returns an edit error classified as not found if the handle is malformed:
/// such a message can never be edited.
pub fn decode_handle(id: &CorrelationId) -> Result<Vec<MessageRef>> {
    id.as_str()
        .split(';')
        .map(|pair| {
            let (chat, message) = pair.split_once(':').ok_or_else(|| malformed(id))?;
            Ok(MessageRef {
                chat_id: chat.trim().parse().map_err(|_| malformed(id))?,
                message_id: message.trim().parse().map_err(|_| malformed(id))?,
            })
        })
        .collect()
}

fn malformed(id: &CorrelationId) -> ChannelError {
    ChannelError::edit(
        CHANNEL_NAME,
        EditFailure::NotFound,
        format!("malformed message handle '{id}'"),
    )
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
struct EditMessageRequest<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Outcome of one edit call against one chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditOutcome {
    Edited,
    Failed(EditFailure),
}

/// Classifies an edit error description returned by the Bot API.
fn classify_edit_error(description: &str) -> EditOutcome {
    let description = description.to_ascii_lowercase();
    if description.contains("message is not modified") {
        EditOutcome::Edited
    } else if description.contains("message to edit not found")
        || description.contains("message can't be edited")
        || description.contains("chat not found")
    {
        EditOutcome::Failed(EditFailure::NotFound)
    } else {
        EditOutcome::Failed(EditFailure::Transient)
    }
}

/// Channel delivering messages through the Telegram Bot API.
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramChannel")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TelegramChannel {
    /// Creates a new Telegram channel.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Config`] if the token or chat list is empty,
    /// or the HTTP client cannot be built.
    pub fn new(config: TelegramConfig) -> Result<Self> {
        if config.bot_token.trim().is_empty() {
            return Err(ChannelError::Config("bot token cannot be empty".to_string()));
        }
        if config.chat_ids.is_empty() {
            return Err(ChannelError::Config("at least one chat id is required".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChannelError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Returns the configured chats.
    #[must_use]
    pub fn chat_ids(&self) -> &[i64] {
        &self.config.chat_ids
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.config.api_url.trim_end_matches('/'),
            self.config.bot_token
        )
    }

    async fn send_to(&self, chat_id: i64, text: &str) -> std::result::Result<MessageRef, String> {
        let request = SendMessageRequest {
            chat_id,
            text,
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e.without_url()))?;

        let status = response.status();
        let body: ApiResponse<SentMessage> = response
            .json()
            .await
            .map_err(|e| format!("unreadable response ({status}): {}", e.without_url()))?;

        match body.result {
            Some(sent) if body.ok => Ok(MessageRef {
                chat_id,
                message_id: sent.message_id,
            }),
            _ => Err(format!(
                "api error {}: {}",
                body.error_code.unwrap_or(status.as_u16()),
                body.description.unwrap_or_default()
            )),
        }
    }

    async fn edit_one(&self, target: MessageRef, text: &str) -> (EditOutcome, String) {
        let request = EditMessageRequest {
            chat_id: target.chat_id,
            message_id: target.message_id,
            text,
            disable_web_page_preview: true,
        };

        let response = match self
            .client
            .post(self.method_url("editMessageText"))
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return (
                    EditOutcome::Failed(EditFailure::Transient),
                    format!("request failed: {}", e.without_url()),
                );
            }
        };

        let status = response.status();
        match response.json::<ApiResponse<serde_json::Value>>().await {
            Ok(body) if body.ok => (EditOutcome::Edited, String::new()),
            Ok(body) => {
                let description = body.description.unwrap_or_default();
                (classify_edit_error(&description), description)
            }
            Err(e) => (
                EditOutcome::Failed(EditFailure::Transient),
                format!("unreadable response ({status}): {}", e.without_url()),
            ),
        }
    }
}

impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    fn send<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<CorrelationId>> {
        Box::pin(async move {
            let results = join_all(
                self.config
                    .chat_ids
                    .iter()
                    .map(|&chat_id| self.send_to(chat_id, text)),
            )
            .await;

            let mut delivered = Vec::new();
            let mut errors = Vec::new();
            for (chat_id, result) in self.config.chat_ids.iter().zip(results) {
                match result {
                    Ok(sent) => delivered.push(sent),
                    Err(reason) => {
                        warn!(channel = CHANNEL_NAME, chat_id, error = %reason, "sendMessage failed");
                        errors.push(format!("chat {chat_id}: {reason}"));
                    }
                }
            }

            if delivered.is_empty() {
                return Err(ChannelError::send(CHANNEL_NAME, errors.join("; ")));
            }

            let id = encode_handle(&delivered)?;
            debug!(channel = CHANNEL_NAME, correlation_id = %id, "Message sent");
            Ok(id)
        })
    }

    fn edit<'a>(&'a self, id: &'a CorrelationId, text: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let targets = decode_handle(id)?;
            let results = join_all(targets.iter().map(|&t| self.edit_one(t, text))).await;

            let mut edited = 0usize;
            let mut not_found = 0usize;
            let mut reasons = Vec::new();
            for (target, (outcome, reason)) in targets.iter().zip(results) {
                match outcome {
                    EditOutcome::Edited => edited += 1,
                    EditOutcome::Failed(failure) => {
                        warn!(
                            channel = CHANNEL_NAME,
                            chat_id = target.chat_id,
                            message_id = target.message_id,
                            failure = %failure,
                            error = %reason,
                            "editMessageText failed"
                        );
                        if failure == EditFailure::NotFound {
                            not_found += 1;
                        }
                        reasons.push(format!("chat {}: {reason}", target.chat_id));
                    }
                }
            }

            if edited > 0 {
                return Ok(());
            }
            let failure = if not_found == targets.len() {
                EditFailure::NotFound
            } else {
                EditFailure::Transient
            };
            Err(ChannelError::edit(CHANNEL_NAME, failure, reasons.join("; ")))
        })
    }
}
