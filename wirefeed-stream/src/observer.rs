//! Observers of a stream session.
//!
//! Observers are called one at a time, in registration order. A callback
//! that returns an error or panics is logged under the observer's name,
//! counted in [`ObserverList::failures`], and the remaining observers still
//! run.

use async_trait::async_trait;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use wirefeed::{Error, Session};

use crate::message::StreamMessage;

/// Error returned by an observer callback.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Receives session and stream events. Every callback defaults to a no-op.
#[async_trait]
pub trait StreamObserver: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// The stream connection opened.
    async fn on_open(&self) -> Result<(), ObserverError> {
        Ok(())
    }

    /// A frame arrived, of any kind.
    async fn on_message(&self, _message: &StreamMessage) -> Result<(), ObserverError> {
        Ok(())
    }

    /// The connection reported an error.
    async fn on_error(&self, _error: &str) -> Result<(), ObserverError> {
        Ok(())
    }

    /// The connection closed.
    async fn on_close(
        &self,
        _code: Option<u16>,
        _reason: Option<&str>,
    ) -> Result<(), ObserverError> {
        Ok(())
    }

    /// The session was renewed and the stream switched to the new token.
    async fn on_renewed(&self, _session: &Session) -> Result<(), ObserverError> {
        Ok(())
    }

    /// Every renewal attempt failed.
    async fn on_renewal_failed(&self, _error: &Error) -> Result<(), ObserverError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Event<'a> {
    Open,
    Message(&'a StreamMessage),
    Error(&'a str),
    Close(Option<u16>, Option<&'a str>),
    Renewed(&'a Session),
    RenewalFailed(&'a Error),
}

impl Event<'_> {
    const fn name(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Message(_) => "message",
            Self::Error(_) => "error",
            Self::Close(..) => "close",
            Self::Renewed(_) => "renewed",
            Self::RenewalFailed(_) => "renewal_failed",
        }
    }
}

#[derive(Clone)]
struct Entry {
    observer: Arc<dyn StreamObserver>,
    failures: Arc<AtomicU64>,
}

/// Ordered observers with per-observer failure isolation.
#[derive(Clone, Default)]
pub struct ObserverList {
    observers: Vec<Entry>,
}

impl std::fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.observers.iter().map(|e| e.observer.name()))
            .finish()
    }
}

impl ObserverList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an observer.
    pub fn push(&mut self, observer: Arc<dyn StreamObserver>) {
        self.observers.push(Entry {
            observer,
            failures: Arc::new(AtomicU64::new(0)),
        });
    }

    /// Number of observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Returns `true` if no observer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Failed or panicked callbacks so far, per observer name, in
    /// registration order. Observers that never failed are left out.
    #[must_use]
    pub fn failures(&self) -> Vec<(String, u64)> {
        self.observers
            .iter()
            .map(|e| (e.observer.name().to_owned(), e.failures.load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    async fn dispatch(&self, event: Event<'_>) {
        for Entry { observer, failures } in &self.observers {
            let call = match event {
                Event::Open => observer.on_open(),
                Event::Message(message) => observer.on_message(message),
                Event::Error(error) => observer.on_error(error),
                Event::Close(code, reason) => observer.on_close(code, reason),
                Event::Renewed(session) => observer.on_renewed(session),
                Event::RenewalFailed(error) => observer.on_renewal_failed(error),
            };
            match AssertUnwindSafe(call).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        observer = observer.name(),
                        event = event.name(),
                        error = %err,
                        "Observer failed"
                    );
                }
                Err(_) => {
                    failures.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        observer = observer.name(),
                        event = event.name(),
                        "Observer panicked"
                    );
                }
            }
        }
    }

    /// Notifies every observer that the stream opened.
    pub async fn opened(&self) {
        self.dispatch(Event::Open).await;
    }

    /// Delivers a message to every observer.
    pub async fn message(&self, message: &StreamMessage) {
        self.dispatch(Event::Message(message)).await;
    }

    /// Reports a connection error to every observer.
    pub async fn error(&self, error: &str) {
        self.dispatch(Event::Error(error)).await;
    }

    /// Reports a close to every observer.
    pub async fn closed(&self, code: Option<u16>, reason: Option<&str>) {
        self.dispatch(Event::Close(code, reason)).await;
    }

    /// Reports a renewed session to every observer.
    pub async fn renewed(&self, session: &Session) {
        self.dispatch(Event::Renewed(session)).await;
    }

    /// Reports renewal exhaustion to every observer.
    pub async fn renewal_failed(&self, error: &Error) {
        self.dispatch(Event::RenewalFailed(error)).await;
    }
}
