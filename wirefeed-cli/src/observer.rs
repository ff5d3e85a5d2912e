//! Logging observer for the stream.

use async_trait::async_trait;
use wirefeed::{Error, Session};
use wirefeed_stream::{ObserverError, StreamMessage, StreamObserver};

/// Logs content at `info` and control traffic at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

#[async_trait]
impl StreamObserver for LogObserver {
    fn name(&self) -> &str {
        "log"
    }

    async fn on_open(&self) -> Result<(), ObserverError> {
        tracing::info!("Stream open");
        Ok(())
    }

    async fn on_message(&self, message: &StreamMessage) -> Result<(), ObserverError> {
        match message {
            StreamMessage::Post(_) | StreamMessage::Article(_) => tracing::info!(
                kind = message.kind(),
                title = message.title().unwrap_or_default(),
                source = message.source().or_else(|| message.author()).unwrap_or_default(),
                url = message.url().unwrap_or_default(),
                "{}",
                message.body().unwrap_or_default()
            ),
            StreamMessage::ExpiryWarning { seconds_remaining } => {
                tracing::info!(?seconds_remaining, "Session expiry warning");
            }
            other => {
                tracing::debug!(kind = other.kind(), payload = ?other.json(), "Control message");
            }
        }
        Ok(())
    }

    async fn on_error(&self, error: &str) -> Result<(), ObserverError> {
        tracing::warn!(%error, "Stream error");
        Ok(())
    }

    async fn on_close(&self, code: Option<u16>, reason: Option<&str>) -> Result<(), ObserverError> {
        tracing::info!(?code, reason = reason.unwrap_or_default(), "Stream closed");
        Ok(())
    }

    async fn on_renewed(&self, session: &Session) -> Result<(), ObserverError> {
        tracing::info!(expires_at = session.expires_at(), "Session renewed");
        Ok(())
    }

    async fn on_renewal_failed(&self, error: &Error) -> Result<(), ObserverError> {
        tracing::error!(%error, "Session renewal failed; the stream ends when the session expires");
        Ok(())
    }
}
