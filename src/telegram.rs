//! Telegram Bot API transport
//!
//! Long-polls `getUpdates` for inbound updates and implements [`Transport`]
//! for replies.

use crate::runtime::{Button, Reply, Transport, TransportError};
use crate::state_machine::{ConversationId, Update};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

const API_BASE: &str = "https://api.telegram.org";

/// Longest caption Telegram accepts on a photo
const MAX_CAPTION_CHARS: usize = 1024;

pub struct TelegramClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl TelegramClient {
    pub fn new(token: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_base_url(API_BASE, token, timeout)
    }

    pub fn with_base_url(base: &str, token: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{token}", base.trim_end_matches('/')),
            timeout,
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    /// Wait up to `poll_timeout` for updates after `offset`.
    ///
    /// Returns the offset to poll from next and the updates that carry
    /// something to handle; anything else is skipped but still acknowledged
    /// through the offset.
    pub async fn poll_updates(
        &self,
        offset: i64,
        poll_timeout: Duration,
    ) -> Result<(i64, Vec<Update>), TransportError> {
        let body = json!({
            "offset": offset,
            "timeout": poll_timeout.as_secs(),
            "allowed_updates": ["message", "callback_query"],
        });
        let raw: Vec<RawUpdate> = self
            .call_with_timeout("getUpdates", &body, poll_timeout + self.timeout)
            .await?;

        let next_offset = raw
            .iter()
            .map(|u| u.update_id + 1)
            .max()
            .unwrap_or(offset);
        let updates = raw.into_iter().filter_map(RawUpdate::into_update).collect();
        Ok((next_offset, updates))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, TransportError> {
        self.call_with_timeout(method, body, self.timeout).await
    }

    async fn call_with_timeout<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .post(self.url(method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError(format!("{method}: {e}")))?;
        Self::decode(method, response).await
    }

    async fn decode<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<T, TransportError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError(format!("{method}: {e}")))?;
        let envelope: ApiResponse<T> = serde_json::from_str(&text)
            .map_err(|e| TransportError(format!("{method}: HTTP {status}: invalid response: {e}")))?;

        match envelope.result {
            Some(result) if envelope.ok => Ok(result),
            _ => Err(TransportError(format!(
                "{method}: HTTP {status}: {}",
                envelope.description.unwrap_or_else(|| "no description".to_string())
            ))),
        }
    }

    async fn send_photo(
        &self,
        conversation_id: ConversationId,
        photo: Vec<u8>,
        caption: Option<&Reply>,
    ) -> Result<(), TransportError> {
        let mut form = Form::new()
            .text("chat_id", conversation_id.to_string())
            .part("photo", Part::bytes(photo).file_name("photo.jpg"));
        if let Some(reply) = caption {
            form = form.text("caption", reply.text.clone());
            if !reply.keyboard.is_empty() {
                form = form.text("reply_markup", keyboard_markup(&reply.keyboard).to_string());
            }
        }

        let response = self
            .client
            .post(self.url("sendPhoto"))
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError(format!("sendPhoto: {e}")))?;
        let _: serde_json::Value = Self::decode("sendPhoto", response).await?;
        Ok(())
    }

    async fn send_message(
        &self,
        conversation_id: ConversationId,
        reply: &Reply,
    ) -> Result<(), TransportError> {
        let mut body = json!({
            "chat_id": conversation_id.0,
            "text": reply.text,
        });
        if !reply.keyboard.is_empty() {
            body["reply_markup"] = keyboard_markup(&reply.keyboard);
        }
        let _: serde_json::Value = self.call("sendMessage", &body).await?;
        Ok(())
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send(&self, conversation_id: ConversationId, reply: &Reply) -> Result<(), TransportError> {
        match &reply.photo {
            None => self.send_message(conversation_id, reply).await,
            Some(photo) if reply.text.chars().count() <= MAX_CAPTION_CHARS => {
                self.send_photo(conversation_id, photo.clone(), Some(reply))
                    .await
            }
            Some(photo) => {
                self.send_photo(conversation_id, photo.clone(), None).await?;
                self.send_message(conversation_id, reply).await
            }
        }
    }

    async fn delete_message(
        &self,
        conversation_id: ConversationId,
        message_id: i64,
    ) -> Result<(), TransportError> {
        let body = json!({ "chat_id": conversation_id.0, "message_id": message_id });
        let _: bool = self.call("deleteMessage", &body).await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        let body = json!({ "callback_query_id": callback_id });
        let _: bool = self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }
}

fn keyboard_markup(rows: &[Vec<Button>]) -> serde_json::Value {
    let inline_keyboard: Vec<Vec<InlineButton<'_>>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| InlineButton {
                    text: &b.label,
                    callback_data: &b.payload,
                })
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": inline_keyboard })
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Serialize)]
struct InlineButton<'a> {
    text: &'a str,
    callback_data: &'a str,
}

#[derive(Debug, Deserialize)]
struct RawUpdate {
    update_id: i64,
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    callback_query: Option<RawCallback>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    message_id: i64,
    chat: RawChat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct RawCallback {
    id: String,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    message: Option<RawMessage>,
}

impl RawUpdate {
    fn into_update(self) -> Option<Update> {
        if let Some(callback) = self.callback_query {
            let message = callback.message?;
            return Some(Update::Callback {
                conversation_id: ConversationId(message.chat.id),
                payload: callback.data?,
                source_message_id: message.message_id,
                callback_id: Some(callback.id),
            });
        }

        let message = self.message?;
        Some(Update::Message {
            conversation_id: ConversationId(message.chat.id),
            text: message.text?,
        })
    }
}
