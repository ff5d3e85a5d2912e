//! WebSocket transport over `tokio-tungstenite`.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;
use wirefeed::Error;

use crate::connection::{Connector, Frame, Socket};

/// Opens WebSocket connections, with TLS for `wss` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    /// Creates a connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Socket>, Error> {
        let (stream, response) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::Transport(format!("websocket connect failed: {e}")))?;
        tracing::debug!(status = %response.status(), "WebSocket handshake complete");
        Ok(Box::new(TungsteniteSocket { stream }))
    }
}

struct TungsteniteSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Socket for TungsteniteSocket {
    async fn next_frame(&mut self) -> Option<Result<Frame, Error>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(err) => return Some(Err(Error::Transport(err.to_string()))),
            };
            let frame = match message {
                Message::Text(text) => Frame::Text(text.as_str().to_owned()),
                Message::Binary(bytes) => Frame::Text(String::from_utf8_lossy(&bytes).into_owned()),
                Message::Close(close) => Frame::Close {
                    code: close.as_ref().map(|c| u16::from(c.code)),
                    reason: close
                        .map(|c| c.reason.as_str().to_owned())
                        .filter(|r| !r.is_empty()),
                },
                // Pongs are queued by tungstenite itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };
            return Some(Ok(frame));
        }
    }

    async fn close(&mut self) -> Result<(), Error> {
        match self.stream.close(None).await {
            Ok(()) | Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(err) => Err(Error::Transport(err.to_string())),
        }
    }
}
