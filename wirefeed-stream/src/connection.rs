//! One persistent stream connection.
//!
//! [`StreamConnection`] owns at most one live socket. A reader task pulls
//! frames from it, classifies them and forwards [`StreamEvent`]s to the
//! owner's channel. Tearing a socket down always waits for its reader task
//! to finish, so two sockets never coexist.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;
use wirefeed::Error;

use crate::message::StreamMessage;

/// A frame read from a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A UTF-8 text frame.
    Text(String),
    /// The peer closed the connection.
    Close {
        /// Close code, if sent.
        code: Option<u16>,
        /// Close reason, if sent.
        reason: Option<String>,
    },
}

/// An open socket.
#[async_trait]
pub trait Socket: Send {
    /// Next frame, or `None` once the stream has ended.
    async fn next_frame(&mut self) -> Option<Result<Frame, Error>>;

    /// Closes the socket.
    async fn close(&mut self) -> Result<(), Error>;
}

/// Opens sockets.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects to `url`.
    async fn connect(&self, url: &Url) -> Result<Box<dyn Socket>, Error>;
}

/// Lifecycle and data signals of a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The socket is open.
    Opened,
    /// A classified frame.
    Message(StreamMessage),
    /// A read error. The socket is closed right after.
    Error(String),
    /// The peer closed the socket or the stream ended.
    Closed {
        /// Close code, if sent.
        code: Option<u16>,
        /// Close reason, if sent.
        reason: Option<String>,
    },
}

/// Appends the access token to a stream endpoint.
#[must_use]
pub fn stream_url(endpoint: &Url, token: &str) -> Url {
    let mut url = endpoint.clone();
    url.query_pairs_mut().append_pair("token", token);
    url
}

#[derive(Debug)]
struct Reader {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    // Cleared by the reader before it reports `Closed`.
    open: Arc<AtomicBool>,
}

/// A stream connection that can swap its access token in place.
pub struct StreamConnection {
    connector: Arc<dyn Connector>,
    events: mpsc::UnboundedSender<StreamEvent>,
    endpoint: Option<Url>,
    token: Option<String>,
    reader: Option<Reader>,
}

impl std::fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConnection")
            .field("endpoint", &self.endpoint.as_ref().map(Url::as_str))
            .field("is_open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl StreamConnection {
    /// Creates a closed connection that reports to `events`.
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>, events: mpsc::UnboundedSender<StreamEvent>) -> Self {
        Self {
            connector,
            events,
            endpoint: None,
            token: None,
            reader: None,
        }
    }

    /// Opens `endpoint` with `token`, replacing any open socket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the socket cannot be opened.
    pub async fn connect(&mut self, endpoint: Url, token: &str) -> Result<(), Error> {
        self.disconnect().await;
        self.endpoint = Some(endpoint);
        self.token = Some(token.to_owned());
        self.open().await
    }

    async fn open(&mut self) -> Result<(), Error> {
        let (Some(endpoint), Some(token)) = (&self.endpoint, &self.token) else {
            return Err(Error::Transport("no stream endpoint to connect to".to_owned()));
        };
        let url = stream_url(endpoint, token);
        let socket = self.connector.connect(&url).await?;
        tracing::info!(endpoint = %endpoint, "Stream connected");

        let cancel = CancellationToken::new();
        let open = Arc::new(AtomicBool::new(true));
        let handle = tokio::spawn(read_frames(
            socket,
            self.events.clone(),
            cancel.clone(),
            open.clone(),
        ));
        self.reader = Some(Reader {
            cancel,
            handle,
            open,
        });
        Ok(())
    }

    /// Replaces the access token.
    ///
    /// An open connection is closed, waited for, and reopened with the new
    /// token. A closed connection only stores it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if reopening fails. The new token is kept.
    pub async fn update_token(&mut self, token: &str) -> Result<(), Error> {
        let was_open = self.is_open();
        self.token = Some(token.to_owned());
        if !was_open {
            return Ok(());
        }
        self.disconnect().await;
        self.open().await
    }

    /// Closes the socket and waits for its reader to stop. No-op when closed.
    pub async fn disconnect(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.cancel.cancel();
            if let Err(err) = reader.handle.await {
                tracing::warn!(error = %err, "Stream reader ended abnormally");
            }
        }
    }

    /// Returns `true` while a socket is open.
    ///
    /// Turns `false` before the `Closed` event of the current socket is sent,
    /// so a `Closed` event seen while this is `true` belongs to a socket that
    /// was already replaced.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.reader
            .as_ref()
            .is_some_and(|r| r.open.load(Ordering::SeqCst) && !r.handle.is_finished())
    }

    /// The current access token.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

async fn read_frames(
    mut socket: Box<dyn Socket>,
    events: mpsc::UnboundedSender<StreamEvent>,
    cancel: CancellationToken,
    open: Arc<AtomicBool>,
) {
    let _ = events.send(StreamEvent::Opened);
    loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => {
                open.store(false, Ordering::SeqCst);
                if let Err(err) = socket.close().await {
                    tracing::debug!(error = %err, "Stream close failed");
                }
                return;
            }
            frame = socket.next_frame() => frame,
        };
        let event = match frame {
            Some(Ok(Frame::Text(text))) => StreamEvent::Message(StreamMessage::classify(&text)),
            Some(Ok(Frame::Close { code, reason })) => {
                open.store(false, Ordering::SeqCst);
                let _ = events.send(StreamEvent::Closed { code, reason });
                return;
            }
            Some(Err(err)) => {
                open.store(false, Ordering::SeqCst);
                let _ = events.send(StreamEvent::Error(err.to_string()));
                let _ = events.send(StreamEvent::Closed {
                    code: None,
                    reason: None,
                });
                return;
            }
            None => {
                open.store(false, Ordering::SeqCst);
                let _ = events.send(StreamEvent::Closed {
                    code: None,
                    reason: None,
                });
                return;
            }
        };
        if events.send(event).is_err() {
            return;
        }
    }
}
