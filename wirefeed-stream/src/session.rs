//! Paid stream sessions with automatic renewal.
//!
//! [`SessionManager`] buys a session (`connect`), opens the stream with its
//! token and delivers every frame to the registered observers. When the
//! server warns that the session is about to expire, the manager buys an
//! extension (`extend`) in the background, retrying with exponential
//! backoff, and moves the stream to the new token.
//!
//! ```text
//! Idle -> Invoicing -> Paying -> Connecting -> Active
//! Active --expiry warning--> Renewing { attempt } --ok--> Active
//!                                                 --exhausted--> Expired
//! any --stop--> Idle
//! ```

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;
use wirefeed::config::ClientConfig;
use wirefeed::{Error, Invoice, InvoicePayer, Session};
use wirefeed_http::protocol::{http_client, settlement_failure_marker};
use wirefeed_http::{FeePayerResolver, Operation, PaymentProtocolClient};

use crate::connection::{Connector, StreamConnection, StreamEvent};
use crate::message::StreamMessage;
use crate::observer::{ObserverList, StreamObserver};
use crate::retry::RetryPolicy;
use crate::tungstenite::TungsteniteConnector;

/// The two halves of a paid session purchase.
///
/// [`HttpSessionGateway`] talks to the vendor API. Tests substitute an
/// in-memory gateway.
#[async_trait]
pub trait SessionGateway: Send + Sync {
    /// Requests the invoice for `operation`.
    async fn invoice(&self, operation: &Operation) -> Result<Invoice, Error>;

    /// Pays `invoice` and returns the session bought by `operation`.
    async fn settle(&self, operation: &Operation, invoice: &Invoice) -> Result<Session, Error>;
}

/// Buys sessions from the vendor API.
pub struct HttpSessionGateway {
    protocol: PaymentProtocolClient,
    fee_payers: FeePayerResolver,
    payer: Arc<dyn InvoicePayer>,
}

impl std::fmt::Debug for HttpSessionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSessionGateway")
            .field("protocol", &self.protocol)
            .field("payer", &self.payer.payer_address())
            .finish_non_exhaustive()
    }
}

impl HttpSessionGateway {
    /// Creates a gateway paying with `payer`.
    #[must_use]
    pub fn new(
        protocol: PaymentProtocolClient,
        fee_payers: FeePayerResolver,
        payer: Arc<dyn InvoicePayer>,
    ) -> Self {
        Self {
            protocol,
            fee_payers,
            payer,
        }
    }
}

#[async_trait]
impl SessionGateway for HttpSessionGateway {
    async fn invoice(&self, operation: &Operation) -> Result<Invoice, Error> {
        self.protocol.request_invoice(operation).await
    }

    async fn settle(&self, operation: &Operation, invoice: &Invoice) -> Result<Session, Error> {
        let fee_payer = self.fee_payers.resolve(invoice).await?;
        let header = self.payer.pay(invoice, &fee_payer).await?;
        self.protocol.submit_payment(operation, header).await
    }
}

/// Where a [`SessionManager`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session.
    Idle,
    /// Waiting for the `connect` invoice.
    Invoicing,
    /// Paying the `connect` invoice.
    Paying,
    /// Opening the stream.
    Connecting,
    /// Streaming with a valid session.
    Active,
    /// Buying an extension.
    Renewing {
        /// Current attempt, starting at 1.
        attempt: u32,
    },
    /// Renewal gave up. The stream runs until the server closes it.
    Expired,
}

/// Stops a running [`SessionManager`] from another task.
#[derive(Debug, Clone)]
pub struct StopHandle(CancellationToken);

impl StopHandle {
    /// Requests a stop. A pending `start` or `run` tears the session down
    /// and returns.
    pub fn stop(&self) {
        self.0.cancel();
    }

    /// Returns `true` once a stop was requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.is_cancelled()
    }
}

type Renewal = BoxFuture<'static, Result<Session, Error>>;

/// Owns one paid session and its stream connection.
pub struct SessionManager {
    gateway: Option<Arc<dyn SessionGateway>>,
    connection: StreamConnection,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    observers: ObserverList,
    policy: RetryPolicy,
    duration_minutes: u64,
    endpoint: Url,
    state: SessionState,
    renewal_attempt: Arc<AtomicU32>,
    session: Option<Session>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("endpoint", &self.endpoint.as_str())
            .field("state", &self.state())
            .field("observers", &self.observers)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Creates an idle manager without a gateway.
    ///
    /// Until [`with_gateway`](Self::with_gateway) is called,
    /// [`start`](Self::start) fails with [`Error::MissingWallet`].
    #[must_use]
    pub fn new(endpoint: Url, connector: Arc<dyn Connector>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            gateway: None,
            connection: StreamConnection::new(connector, tx),
            events: rx,
            observers: ObserverList::new(),
            policy: RetryPolicy::default(),
            duration_minutes: wirefeed::config::DEFAULT_DURATION_MINUTES,
            endpoint,
            state: SessionState::Idle,
            renewal_attempt: Arc::new(AtomicU32::new(0)),
            session: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Builds a manager from configuration, streaming over WebSocket.
    ///
    /// Without a `payer` the manager is created but cannot start.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client, the facilitator URL or the
    /// stream endpoint is invalid.
    pub fn from_config(
        config: &ClientConfig,
        payer: Option<Arc<dyn InvoicePayer>>,
    ) -> Result<Self, Error> {
        let endpoint = config.stream_endpoint()?;
        let mut manager = Self::new(endpoint, Arc::new(TungsteniteConnector::new()))
            .with_retry_policy(config.renewal.into())
            .with_duration_minutes(config.duration_minutes);
        if let Some(payer) = payer {
            let client = http_client(config)?;
            let protocol =
                PaymentProtocolClient::with_http_client(config.api_url.clone(), client.clone());
            let fee_payers = FeePayerResolver::from_config(config, client)?;
            manager = manager.with_gateway(Arc::new(HttpSessionGateway::new(
                protocol, fee_payers, payer,
            )));
        }
        Ok(manager)
    }

    /// Sets the gateway sessions are bought from.
    #[must_use]
    pub fn with_gateway(mut self, gateway: Arc<dyn SessionGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Sets the renewal backoff.
    #[must_use]
    pub const fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the minutes bought by `connect` and by each `extend`.
    #[must_use]
    pub const fn with_duration_minutes(mut self, minutes: u64) -> Self {
        self.duration_minutes = minutes;
        self
    }

    /// Registers an observer. Observers are called in registration order.
    pub fn add_observer(&mut self, observer: Arc<dyn StreamObserver>) {
        self.observers.push(observer);
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        match self.state {
            SessionState::Renewing { .. } => SessionState::Renewing {
                attempt: self.renewal_attempt.load(Ordering::SeqCst),
            },
            state => state,
        }
    }

    /// The current session, if any.
    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Returns `true` while the stream socket is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_open()
    }

    /// Failed observer callbacks so far, per observer name.
    ///
    /// Webhook delivery failures show up here under `"webhook"`.
    #[must_use]
    pub fn observer_failures(&self) -> Vec<(String, u64)> {
        self.observers.failures()
    }

    /// A handle that stops [`run`](Self::run) from another task.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(self.shutdown.clone())
    }

    /// Buys a session and opens the stream.
    ///
    /// Returns once the stream reports open. A manager that already holds a
    /// session is stopped first. A stop requested through a [`StopHandle`]
    /// before the stream opens abandons the purchase; `start` then returns
    /// `Ok` with the manager idle and [`run`](Self::run) returns at once.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingWallet`] if no gateway is configured
    /// - any invoice, payment or settlement error from the gateway
    /// - [`Error::Transport`] if the stream cannot be opened
    ///
    /// The manager is back to [`SessionState::Idle`] after an error.
    pub async fn start(&mut self) -> Result<(), Error> {
        let gateway = self.gateway.clone().ok_or(Error::MissingWallet)?;
        if self.state != SessionState::Idle {
            self.teardown().await;
        }
        let shutdown = self.shutdown.clone();
        let opened = tokio::select! {
            biased;
            () = shutdown.cancelled() => None,
            result = self.open_session(gateway.as_ref()) => Some(result),
        };
        match opened {
            Some(Ok(())) => Ok(()),
            Some(Err(err)) => {
                tracing::error!(error = %err, "Session start failed");
                self.teardown().await;
                Err(err)
            }
            None => {
                tracing::info!(state = ?self.state, "Stop requested, session start abandoned");
                self.teardown().await;
                Ok(())
            }
        }
    }

    async fn open_session(&mut self, gateway: &dyn SessionGateway) -> Result<(), Error> {
        let operation = Operation::Connect {
            duration_minutes: self.duration_minutes,
        };
        self.state = SessionState::Invoicing;
        let invoice = gateway.invoice(&operation).await?;
        tracing::debug!(
            amount = invoice.amount(),
            pay_to = %invoice.pay_to,
            "Connect invoice received"
        );

        self.state = SessionState::Paying;
        let session = gateway
            .settle(&operation, &invoice)
            .await
            .inspect_err(|err| log_settlement_failure(&operation, err))?
            .with_duration_minutes(self.duration_minutes);
        tracing::info!(expires_at = session.expires_at(), "Session purchased");

        self.state = SessionState::Connecting;
        self.connection
            .connect(self.endpoint.clone(), session.access_token())
            .await?;
        self.session = Some(session);

        match self.events.recv().await {
            Some(StreamEvent::Opened) => {
                self.state = SessionState::Active;
                self.observers.opened().await;
                Ok(())
            }
            Some(other) => Err(Error::Transport(format!("stream did not open: {other:?}"))),
            None => Err(Error::Transport("stream event channel closed".to_owned())),
        }
    }

    /// Delivers stream events until the stream closes or a stop is requested.
    ///
    /// Renewal runs concurrently with delivery, so frames keep flowing while
    /// an extension is being paid for. Returns immediately when idle.
    ///
    /// # Errors
    ///
    /// Returns the error if a renewed session was bought but the stream could
    /// not be moved to its token. The session is torn down first.
    pub async fn run(&mut self) -> Result<(), Error> {
        if self.session.is_none() {
            return Ok(());
        }
        let shutdown = self.shutdown.clone();
        let mut renewal: Option<Renewal> = None;
        let mut closed_while_renewing = false;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    drop(renewal.take());
                    self.stop().await;
                    return Ok(());
                }
                result = poll_renewal(&mut renewal), if renewal.is_some() => {
                    renewal = None;
                    self.finish_renewal(result).await?;
                    if closed_while_renewing && !self.connection.is_open() {
                        self.end_session().await;
                        return Ok(());
                    }
                    closed_while_renewing = false;
                }
                event = self.events.recv() => {
                    let Some(event) = event else {
                        self.end_session().await;
                        return Ok(());
                    };
                    match event {
                        StreamEvent::Opened => self.observers.opened().await,
                        StreamEvent::Message(message) => {
                            self.observers.message(&message).await;
                            if let StreamMessage::ExpiryWarning { seconds_remaining } = message {
                                if renewal.is_none() && self.state == SessionState::Active {
                                    tracing::info!(
                                        ?seconds_remaining,
                                        "Session expiring, renewing"
                                    );
                                    renewal = self.begin_renewal();
                                } else {
                                    tracing::debug!(
                                        state = ?self.state(),
                                        "Expiry warning ignored"
                                    );
                                }
                            }
                        }
                        StreamEvent::Error(error) => {
                            tracing::warn!(%error, "Stream error");
                            self.observers.error(&error).await;
                        }
                        StreamEvent::Closed { code, reason } => {
                            if self.connection.is_open() {
                                tracing::debug!(?code, "Close of a replaced socket ignored");
                                continue;
                            }
                            tracing::info!(?code, ?reason, "Stream closed");
                            self.observers.closed(code, reason.as_deref()).await;
                            if renewal.is_none() {
                                self.end_session().await;
                                return Ok(());
                            }
                            closed_while_renewing = true;
                        }
                    }
                }
            }
        }
    }

    fn begin_renewal(&mut self) -> Option<Renewal> {
        let gateway = self.gateway.clone()?;
        let token = self.session.as_ref()?.access_token().to_owned();
        self.renewal_attempt.store(1, Ordering::SeqCst);
        self.state = SessionState::Renewing { attempt: 1 };
        Some(
            renew(
                gateway,
                token,
                self.duration_minutes,
                self.policy,
                self.renewal_attempt.clone(),
            )
            .boxed(),
        )
    }

    async fn finish_renewal(&mut self, result: Result<Session, Error>) -> Result<(), Error> {
        match result {
            Ok(session) => {
                let token = session.access_token().to_owned();
                let switched = if self.connection.is_open() {
                    self.connection.update_token(&token).await
                } else {
                    self.connection.connect(self.endpoint.clone(), &token).await
                };
                if let Err(err) = switched {
                    tracing::error!(error = %err, "Reconnect with renewed token failed");
                    self.observers.error(&err.to_string()).await;
                    self.teardown().await;
                    return Err(err);
                }
                tracing::info!(
                    expires_at = session.expires_at(),
                    "Stream moved to renewed session"
                );
                self.state = SessionState::Active;
                self.observers.renewed(&session).await;
                self.session = Some(session);
            }
            Err(err) => {
                tracing::error!(error = %err, "Session renewal gave up");
                self.state = SessionState::Expired;
                self.observers.renewal_failed(&err).await;
            }
        }
        Ok(())
    }

    // The stream ended on its own. An expired manager stays expired.
    async fn end_session(&mut self) {
        self.connection.disconnect().await;
        self.session = None;
        if self.state != SessionState::Expired {
            self.state = SessionState::Idle;
        }
    }

    async fn teardown(&mut self) {
        self.connection.disconnect().await;
        while self.events.try_recv().is_ok() {}
        self.session = None;
        self.state = SessionState::Idle;
    }

    /// Closes the stream and forgets the session. Safe in any state.
    ///
    /// A renewal in flight is abandoned when [`run`](Self::run) observes the
    /// stop; its result is never applied. Existing [`StopHandle`]s are
    /// spent; take a new one before the next [`start`](Self::start).
    pub async fn stop(&mut self) {
        self.shutdown.cancel();
        self.teardown().await;
        self.shutdown = CancellationToken::new();
        tracing::info!("Session stopped");
    }
}

async fn poll_renewal(renewal: &mut Option<Renewal>) -> Result<Session, Error> {
    match renewal.as_mut() {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

async fn renew(
    gateway: Arc<dyn SessionGateway>,
    access_token: String,
    duration_minutes: u64,
    policy: RetryPolicy,
    attempt_counter: Arc<AtomicU32>,
) -> Result<Session, Error> {
    let operation = Operation::Extend {
        duration_minutes,
        access_token,
    };
    let mut attempt = 1;
    loop {
        attempt_counter.store(attempt, Ordering::SeqCst);
        let result = async {
            let invoice = gateway.invoice(&operation).await?;
            gateway.settle(&operation, &invoice).await
        }
        .await;
        match result {
            Ok(session) => {
                tracing::info!(attempt, "Session renewed");
                return Ok(session.with_duration_minutes(duration_minutes));
            }
            Err(err) => {
                log_settlement_failure(&operation, &err);
                let Some(delay) = policy.delay_after(attempt) else {
                    tracing::warn!(
                        attempt,
                        error = %err,
                        payment_failure = err.is_payment_failure(),
                        "Last renewal attempt failed"
                    );
                    return Err(Error::RenewalExhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    });
                };
                tracing::warn!(attempt, error = %err, ?delay, "Renewal attempt failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

fn log_settlement_failure(operation: &Operation, err: &Error) {
    if let Some(marker) = settlement_failure_marker(err) {
        tracing::warn!(
            operation = operation.name(),
            marker,
            "Payment rejected at settlement; check the payer's token balance, the fee payer and the blockhash"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Frame;
    use crate::testing::{FakeConnector, HangingGateway, RecordingObserver, ScriptedGateway};
    use std::time::Duration;

    fn endpoint() -> Url {
        "wss://news.example.com/stream".parse().unwrap()
    }

    fn fixture(
        gateway: ScriptedGateway,
        connector: Arc<FakeConnector>,
    ) -> (SessionManager, Arc<ScriptedGateway>, Arc<RecordingObserver>) {
        let gateway = Arc::new(gateway);
        let recorder = Arc::new(RecordingObserver::default());
        let mut manager = SessionManager::new(endpoint(), connector)
            .with_gateway(gateway.clone())
            .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(1000)));
        manager.add_observer(recorder.clone());
        (manager, gateway, recorder)
    }

    fn expiry_frame() -> Frame {
        Frame::Text(r#"{"type":"expiry_warning","seconds_remaining":30}"#.to_owned())
    }

    fn close_frame() -> Frame {
        Frame::Close {
            code: Some(1000),
            reason: None,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn start_without_payer_is_missing_wallet() {
        let connector = FakeConnector::new();
        let mut manager = SessionManager::new(endpoint(), connector.clone());

        let err = manager.start().await.unwrap_err();
        assert!(matches!(err, Error::MissingWallet));
        assert_eq!(connector.connects(), 0);
        assert_eq!(manager.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn configured_manager_without_wallet_cannot_start() {
        let mut manager = SessionManager::from_config(&ClientConfig::default(), None).unwrap();
        assert!(matches!(manager.start().await, Err(Error::MissingWallet)));
    }

    #[tokio::test]
    async fn start_opens_stream_with_purchased_token() {
        let connector = FakeConnector::new();
        let gateway = ScriptedGateway::new().on_connect(Ok(Session::new("tok-1", "soon")));
        let (mut manager, _, recorder) = fixture(gateway, connector.clone());

        manager.start().await.unwrap();

        assert_eq!(manager.state(), SessionState::Active);
        assert_eq!(manager.session().unwrap().access_token(), "tok-1");
        assert_eq!(manager.session().unwrap().duration_minutes(), Some(60));
        assert!(connector.urls()[0].ends_with("?token=tok-1"));
        assert_eq!(recorder.events(), vec!["open"]);
    }

    #[tokio::test]
    async fn failed_payment_leaves_manager_idle() {
        let connector = FakeConnector::new();
        let (mut manager, _, _) = fixture(ScriptedGateway::new(), connector.clone());

        let err = manager.start().await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedStatus { status: 402, .. }));
        assert_eq!(manager.state(), SessionState::Idle);
        assert!(manager.session().is_none());
        assert_eq!(connector.connects(), 0);
    }

    #[tokio::test]
    async fn refused_stream_leaves_manager_idle() {
        let connector = FakeConnector::refusing();
        let gateway = ScriptedGateway::new().on_connect(Ok(Session::new("tok-1", "soon")));
        let (mut manager, _, _) = fixture(gateway, connector);

        let err = manager.start().await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(manager.state(), SessionState::Idle);
        assert!(manager.session().is_none());
    }

    #[tokio::test]
    async fn run_when_idle_returns_immediately() {
        let (mut manager, _, _) = fixture(ScriptedGateway::new(), FakeConnector::new());
        manager.run().await.unwrap();
        assert_eq!(manager.state(), SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn every_frame_reaches_observers_until_close() {
        let connector = FakeConnector::new();
        let gateway = ScriptedGateway::new().on_connect(Ok(Session::new("tok-1", "soon")));
        let (mut manager, _, recorder) = fixture(gateway, connector.clone());
        manager.start().await.unwrap();

        let frames = connector.frames(0);
        frames.send(Frame::Text(r#"{"type":"status","state":"ok"}"#.to_owned())).unwrap();
        frames.send(Frame::Text(r#"{"id":7}"#.to_owned())).unwrap();
        frames.send(Frame::Text("plain text".to_owned())).unwrap();
        frames.send(close_frame()).unwrap();

        manager.run().await.unwrap();

        assert_eq!(
            recorder.events(),
            vec![
                "open",
                "message:status",
                "message:unknown",
                "message:text",
                "close:Some(1000)"
            ]
        );
        assert_eq!(manager.state(), SessionState::Idle);
        assert!(manager.session().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_warning_renews_and_moves_stream_to_new_token() {
        let connector = FakeConnector::new();
        let gateway = ScriptedGateway::new()
            .on_connect(Ok(Session::new("tok-1", "soon")))
            .on_extend(Ok(Session::new("tok-2", "later")));
        let (mut manager, gateway, recorder) = fixture(gateway, connector.clone());
        manager.start().await.unwrap();
        let run = tokio::spawn(async move {
            let result = manager.run().await;
            (manager, result)
        });

        connector.frames(0).send(expiry_frame()).unwrap();
        settle().await;

        assert_eq!(gateway.extend_calls().len(), 1);
        assert_eq!(gateway.extend_calls()[0].1, "tok-1");
        assert_eq!(connector.connects(), 2);
        assert_eq!(connector.closes(), 1);
        assert!(connector.urls()[1].ends_with("?token=tok-2"));

        connector.latest_frames().send(close_frame()).unwrap();
        let (manager, result) = run.await.unwrap();
        result.unwrap();

        let events = recorder.events();
        assert_eq!(events[..2], ["open", "message:expiry_warning"]);
        assert!(events.contains(&"renewed:tok-2".to_owned()));
        assert_eq!(events.iter().filter(|e| *e == "open").count(), 2);
        assert_eq!(events.last().map(String::as_str), Some("close:Some(1000)"));
        assert_eq!(manager.state(), SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn renewal_backs_off_then_expires() {
        let connector = FakeConnector::new();
        let gateway = ScriptedGateway::new().on_connect(Ok(Session::new("tok-1", "soon")));
        let (mut manager, gateway, recorder) = fixture(gateway, connector.clone());
        manager.start().await.unwrap();
        let run = tokio::spawn(async move {
            let result = manager.run().await;
            (manager, result)
        });

        let frames = connector.frames(0);
        frames.send(expiry_frame()).unwrap();
        // Warnings during renewal and after expiry start nothing new.
        frames.send(expiry_frame()).unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        frames.send(expiry_frame()).unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;

        let calls = gateway.extend_calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].0 - calls[0].0, Duration::from_millis(1000));
        assert_eq!(calls[2].0 - calls[1].0, Duration::from_millis(2000));
        assert_eq!(connector.connects(), 1);

        frames.send(close_frame()).unwrap();
        let (manager, result) = run.await.unwrap();
        result.unwrap();

        assert_eq!(manager.state(), SessionState::Expired);
        assert!(manager.session().is_none());
        let events = recorder.events();
        let failure = events
            .iter()
            .find(|e| e.starts_with("renewal_failed:"))
            .unwrap();
        assert!(failure.contains("after 3 attempts"));
        assert!(failure.contains("402"));
        assert!(failure.contains("transaction_simulation_failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn close_during_renewal_reconnects_with_renewed_token() {
        let connector = FakeConnector::new();
        let gateway = ScriptedGateway::new()
            .on_connect(Ok(Session::new("tok-1", "soon")))
            .on_extend(Err(Error::Transport("timeout".to_owned())))
            .on_extend(Ok(Session::new("tok-2", "later")));
        let (mut manager, _, recorder) = fixture(gateway, connector.clone());
        manager.start().await.unwrap();
        let run = tokio::spawn(async move {
            let result = manager.run().await;
            (manager, result)
        });

        let frames = connector.frames(0);
        frames.send(expiry_frame()).unwrap();
        settle().await;
        frames.send(close_frame()).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(connector.connects(), 2);
        assert!(connector.urls()[1].ends_with("?token=tok-2"));

        connector.latest_frames().send(close_frame()).unwrap();
        let (_, result) = run.await.unwrap();
        result.unwrap();
        assert!(recorder.events().contains(&"renewed:tok-2".to_owned()));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_abandons_renewal_in_flight() {
        let connector = FakeConnector::new();
        let gateway = ScriptedGateway::new().on_connect(Ok(Session::new("tok-1", "soon")));
        let (mut manager, gateway, _) = fixture(gateway, connector.clone());
        manager.start().await.unwrap();
        let stop = manager.stop_handle();
        let run = tokio::spawn(async move {
            let result = manager.run().await;
            (manager, result)
        });

        connector.frames(0).send(expiry_frame()).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        stop.stop();
        let (manager, result) = run.await.unwrap();
        result.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(gateway.extend_calls().len(), 1);
        assert_eq!(connector.closes(), 1);
        assert_eq!(manager.state(), SessionState::Idle);
        assert!(manager.session().is_none());
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn stop_is_safe_when_idle_and_manager_restarts() {
        let connector = FakeConnector::new();
        let gateway = ScriptedGateway::new()
            .on_connect(Ok(Session::new("tok-1", "soon")))
            .on_connect(Ok(Session::new("tok-2", "soon")));
        let (mut manager, _, _) = fixture(gateway, connector.clone());

        manager.stop().await;
        manager.start().await.unwrap();
        manager.stop().await;
        assert_eq!(manager.state(), SessionState::Idle);

        manager.start().await.unwrap();
        assert_eq!(manager.state(), SessionState::Active);
        assert_eq!(manager.session().unwrap().access_token(), "tok-2");
        assert!(!manager.stop_handle().is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_handle_interrupts_a_start_stuck_on_the_invoice() {
        let connector = FakeConnector::new();
        let mut manager = SessionManager::new(endpoint(), connector.clone())
            .with_gateway(Arc::new(HangingGateway));
        let stop = manager.stop_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stop.stop();
        });

        tokio::time::timeout(Duration::from_secs(2), manager.start())
            .await
            .expect("start returns once stopped")
            .unwrap();

        assert_eq!(manager.state(), SessionState::Idle);
        assert!(manager.session().is_none());
        assert_eq!(connector.connects(), 0);
        manager.run().await.unwrap();
    }

    #[tokio::test]
    async fn stop_requested_before_start_is_kept() {
        let connector = FakeConnector::new();
        let gateway = ScriptedGateway::new().on_connect(Ok(Session::new("tok-1", "soon")));
        let (mut manager, _, recorder) = fixture(gateway, connector.clone());
        let stop = manager.stop_handle();

        stop.stop();
        manager.start().await.unwrap();
        assert_eq!(manager.state(), SessionState::Idle);
        assert_eq!(connector.connects(), 0);
        assert!(recorder.events().is_empty());
        assert!(stop.is_stopped());

        manager.stop().await;
        manager.start().await.unwrap();
        assert_eq!(manager.state(), SessionState::Active);
    }
}
