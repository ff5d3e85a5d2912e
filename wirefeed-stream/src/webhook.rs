//! Forwarding stream content to a chat webhook.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value, json};
use url::Url;

use crate::message::StreamMessage;
use crate::observer::{ObserverError, StreamObserver};

/// Chat embed title limit, in characters.
pub const EMBED_TITLE_LIMIT: usize = 256;

/// Chat embed description limit, in characters.
pub const EMBED_DESCRIPTION_LIMIT: usize = 4096;

/// Turns a message into a webhook body, or `None` to skip it.
pub type Formatter = fn(&StreamMessage) -> Option<Value>;

/// Posts formatted content messages to a webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookForwarder {
    client: Client,
    url: Url,
    formatter: Formatter,
}

impl WebhookForwarder {
    /// Forwards posts and articles as chat embeds.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self::with_http_client(url, Client::new())
    }

    /// Same as [`new`](Self::new) with a custom HTTP client.
    #[must_use]
    pub fn with_http_client(url: Url, client: Client) -> Self {
        Self {
            client,
            url,
            formatter: chat_embed,
        }
    }

    /// Replaces the formatter.
    #[must_use]
    pub fn with_formatter(mut self, formatter: Formatter) -> Self {
        self.formatter = formatter;
        self
    }
}

#[async_trait]
impl StreamObserver for WebhookForwarder {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn on_message(&self, message: &StreamMessage) -> Result<(), ObserverError> {
        let Some(body) = (self.formatter)(message) else {
            return Ok(());
        };
        let response = self.client.post(self.url.clone()).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("webhook returned {status}: {text}").into());
        }
        tracing::debug!(kind = message.kind(), "Forwarded to webhook");
        Ok(())
    }
}

/// Formats posts and articles as a single chat embed.
///
/// Other messages are skipped. Title and description are cut to the embed
/// limits; absent fields are left out.
#[must_use]
pub fn chat_embed(message: &StreamMessage) -> Option<Value> {
    if !message.is_content() {
        return None;
    }
    let mut embed = Map::new();
    if let Some(title) = message.title() {
        embed.insert("title".into(), truncate(title, EMBED_TITLE_LIMIT).into());
    }
    if let Some(body) = message.body() {
        embed.insert(
            "description".into(),
            truncate(body, EMBED_DESCRIPTION_LIMIT).into(),
        );
    }
    if let Some(url) = message.url() {
        embed.insert("url".into(), url.into());
    }
    if let Some(author) = message.author() {
        embed.insert("author".into(), json!({ "name": author }));
    }
    if let Some(source) = message.source() {
        embed.insert("footer".into(), json!({ "text": source }));
    }
    if let Some(timestamp) = message.timestamp() {
        embed.insert("timestamp".into(), timestamp.into());
    }
    Some(json!({ "embeds": [embed] }))
}

fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => text[..end].to_owned(),
        None => text.to_owned(),
    }
}
