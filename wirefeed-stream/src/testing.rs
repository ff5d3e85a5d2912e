use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;
use wirefeed::{Error, Invoice, Session};
use wirefeed_http::Operation;

use crate::connection::{Connector, Frame, Socket};
use crate::observer::{ObserverError, StreamObserver};
use crate::session::SessionGateway;
use crate::message::StreamMessage;

/// Connector handing out in-memory sockets fed by test-held senders.
#[derive(Debug, Default)]
pub struct FakeConnector {
    refuse: bool,
    urls: Mutex<Vec<String>>,
    senders: Mutex<Vec<mpsc::UnboundedSender<Frame>>>,
    closes: Arc<AtomicUsize>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn refusing() -> Arc<Self> {
        Arc::new(Self {
            refuse: true,
            ..Self::default()
        })
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.senders.lock().unwrap().len()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Frame sender of the `index`-th socket.
    pub fn frames(&self, index: usize) -> mpsc::UnboundedSender<Frame> {
        self.senders.lock().unwrap()[index].clone()
    }

    pub fn latest_frames(&self) -> mpsc::UnboundedSender<Frame> {
        self.senders.lock().unwrap().last().unwrap().clone()
    }
}

struct FakeSocket {
    frames: mpsc::UnboundedReceiver<Frame>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl Socket for FakeSocket {
    async fn next_frame(&mut self) -> Option<Result<Frame, Error>> {
        self.frames.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), Error> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Socket>, Error> {
        if self.refuse {
            return Err(Error::Transport("connection refused".to_owned()));
        }
        self.urls.lock().unwrap().push(url.to_string());
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().unwrap().push(tx);
        Ok(Box::new(FakeSocket {
            frames: rx,
            closes: self.closes.clone(),
        }))
    }
}

/// Gateway answering from scripted results and recording call times.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    connect: Mutex<VecDeque<Result<Session, Error>>>,
    extend: Mutex<VecDeque<Result<Session, Error>>>,
    extend_calls: Mutex<Vec<(Instant, String)>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_connect(self, result: Result<Session, Error>) -> Self {
        self.connect.lock().unwrap().push_back(result);
        self
    }

    pub fn on_extend(self, result: Result<Session, Error>) -> Self {
        self.extend.lock().unwrap().push_back(result);
        self
    }

    pub fn extend_calls(&self) -> Vec<(Instant, String)> {
        self.extend_calls.lock().unwrap().clone()
    }
}

pub fn invoice() -> Invoice {
    Invoice::from_payment_required(serde_json::json!({
        "scheme": "exact",
        "network": "solana",
        "asset": "Mint1",
        "payTo": "Addr1",
        "maxAmountRequired": "17500",
        "extra": { "feePayer": "Fee1" }
    }))
    .unwrap()
}

#[async_trait]
impl SessionGateway for ScriptedGateway {
    async fn invoice(&self, operation: &Operation) -> Result<Invoice, Error> {
        if let Operation::Extend { access_token, .. } = operation {
            self.extend_calls
                .lock()
                .unwrap()
                .push((Instant::now(), access_token.clone()));
        }
        Ok(invoice())
    }

    async fn settle(&self, operation: &Operation, _invoice: &Invoice) -> Result<Session, Error> {
        let queue = match operation {
            Operation::Connect { .. } => &self.connect,
            _ => &self.extend,
        };
        queue.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(Error::UnexpectedStatus {
                status: 402,
                body: r#"{"error":"transaction_simulation_failed"}"#.to_owned(),
            })
        })
    }
}

/// Gateway whose invoice request never answers.
#[derive(Debug, Default)]
pub struct HangingGateway;

#[async_trait]
impl SessionGateway for HangingGateway {
    async fn invoice(&self, _operation: &Operation) -> Result<Invoice, Error> {
        std::future::pending().await
    }

    async fn settle(&self, _operation: &Operation, _invoice: &Invoice) -> Result<Session, Error> {
        std::future::pending().await
    }
}

/// Observer that records every callback.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl StreamObserver for RecordingObserver {
    async fn on_open(&self) -> Result<(), ObserverError> {
        self.push("open".to_owned());
        Ok(())
    }

    async fn on_message(&self, message: &StreamMessage) -> Result<(), ObserverError> {
        self.push(format!("message:{}", message.kind()));
        Ok(())
    }

    async fn on_close(
        &self,
        code: Option<u16>,
        _reason: Option<&str>,
    ) -> Result<(), ObserverError> {
        self.push(format!("close:{code:?}"));
        Ok(())
    }

    async fn on_renewed(&self, session: &Session) -> Result<(), ObserverError> {
        self.push(format!("renewed:{}", session.access_token()));
        Ok(())
    }

    async fn on_renewal_failed(&self, error: &Error) -> Result<(), ObserverError> {
        self.push(format!("renewal_failed:{error}"));
        Ok(())
    }
}
