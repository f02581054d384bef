//! Resilient streaming market-data client
//!
//! One `StreamClient` per venue keeps a single websocket alive, fans inbound
//! frames out to topic handlers and heals itself:
//!
//! - a read task dispatches frames and reports transport failures,
//! - a heartbeat task sends sequenced liveness probes and closes the socket
//!   when acknowledgments stop arriving (half-open links produce no read error),
//! - a supervisor task waits on a capacity-1 reconnect signal, backs off,
//!   redials and replays every registered subscription in order.
//!
//! Venue differences (topic names, probe frames, envelope shapes) live behind
//! [`StreamProtocol`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::value::RawValue;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::shared::health::{ConnectionHealth, ConnectionState, HealthSnapshot};
use crate::adapters::shared::reconnect::{Backoff, ReconnectConfig};
use crate::adapters::shared::websocket::{connect_with_timeout, WsReader, WsWriter};
use crate::adapters::types::TopOfBook;

/// Upper bound on sending a close frame while tearing a socket down
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);
/// Upper bound on waiting for background tasks in `close()`
const TASK_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// Protocol
// =============================================================================

/// Classification of one inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Liveness acknowledgment for probe `seq`
    Ack(u64),
    /// Application message; `payload` is the raw, undecoded JSON of the data segment
    Data { topic: String, payload: String },
    /// Anything else (subscription confirmations, unknown shapes, binary)
    Ignore,
}

/// Venue-specific framing used by the shared stream machinery
pub trait StreamProtocol: Send + Sync + 'static {
    /// Venue name for logs
    fn venue(&self) -> &'static str;

    /// Topic carrying best bid/ask for `symbol`
    fn book_topic(&self, symbol: &str) -> String;

    /// Frame requesting `topic`
    fn subscribe_frame(&self, topic: &str) -> Message {
        Message::Text(serde_json::json!({ "op": "subscribe", "args": [topic] }).to_string())
    }

    /// Liveness probe carrying `seq`
    fn probe_frame(&self, seq: u64) -> Message;

    /// Classify an inbound frame. Must not fail: unknown input is `Ignore`.
    fn classify(&self, frame: &Message) -> Inbound;

    /// Decode a book payload. `Ok(None)` means a partial update to skip.
    fn decode_book(&self, payload: &str) -> ExchangeResult<Option<TopOfBook>>;
}

/// Tagged envelope shared by both venues: `{"topic": ..., "data": <raw>}`
#[derive(Debug, Deserialize)]
struct Envelope {
    topic: Option<String>,
    data: Option<Box<RawValue>>,
}

/// Parse a text frame as a topic envelope. Frames without a non-empty topic or
/// without a data segment are `Ignore`.
pub fn parse_envelope(text: &str) -> Inbound {
    match serde_json::from_str::<Envelope>(text) {
        Ok(Envelope {
            topic: Some(topic),
            data: Some(data),
        }) if !topic.is_empty() => Inbound::Data {
            topic,
            payload: data.get().to_string(),
        },
        _ => Inbound::Ignore,
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Stream tunables
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamConfig {
    pub dial_timeout: Duration,
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
    pub reconnect: ReconnectConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            dial_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(20),
            pong_timeout: Duration::from_secs(10),
            reconnect: ReconnectConfig::default(),
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// Raw payload handler registered for a topic
pub type Handler = Arc<dyn Fn(&str) + Send + Sync>;

/// One registered topic. The registry is append-only.
#[derive(Clone)]
pub struct Subscription {
    pub topic: String,
    pub handler: Handler,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("topic", &self.topic).finish()
    }
}

/// Write half tagged with the connection it belongs to
struct LinkWriter {
    link_id: u64,
    sink: WsWriter,
}

/// One physical connection. The first failure reported by either task wins.
struct Link {
    id: u64,
    token: CancellationToken,
    failed: AtomicBool,
}

impl Link {
    fn fail(&self, inner: &StreamInner, reason: &str) {
        self.fail_as(inner, reason, ConnectionState::Disconnected);
    }

    /// `state` is what the health record shows until the supervisor picks up
    fn fail_as(&self, inner: &StreamInner, reason: &str, state: ConnectionState) {
        if self.failed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.token.cancel();
        if inner.shutdown.is_cancelled() {
            return;
        }
        inner.health.on_link_lost(state);
        warn!(
            venue = inner.protocol.venue(),
            link = self.id,
            reason = %reason,
            "[RECONNECT] Connection lost"
        );
        // Capacity 1: a pending signal already covers this failure
        let _ = inner.reconnect_tx.try_send(());
    }
}

struct StreamInner {
    url: String,
    config: StreamConfig,
    protocol: Arc<dyn StreamProtocol>,
    health: ConnectionHealth,
    subscriptions: RwLock<Vec<Subscription>>,
    writer: Mutex<Option<LinkWriter>>,
    shutdown: CancellationToken,
    closed: AtomicBool,
    reconnect_tx: mpsc::Sender<()>,
    reconnect_rx: StdMutex<Option<mpsc::Receiver<()>>>,
    link_seq: AtomicU64,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

/// Self-healing websocket client for one venue
#[derive(Clone)]
pub struct StreamClient {
    inner: Arc<StreamInner>,
}

impl StreamClient {
    pub fn new(url: impl Into<String>, protocol: Arc<dyn StreamProtocol>, config: StreamConfig) -> Self {
        let (reconnect_tx, reconnect_rx) = mpsc::channel(1);
        Self {
            inner: Arc::new(StreamInner {
                url: url.into(),
                config,
                protocol,
                health: ConnectionHealth::new(),
                subscriptions: RwLock::new(Vec::new()),
                writer: Mutex::new(None),
                shutdown: CancellationToken::new(),
                closed: AtomicBool::new(false),
                reconnect_tx,
                reconnect_rx: StdMutex::new(Some(reconnect_rx)),
                link_seq: AtomicU64::new(0),
                tasks: StdMutex::new(Vec::new()),
            }),
        }
    }

    /// Dial once and start background recovery.
    ///
    /// Fails if the first dial fails (the client may be connected again
    /// afterwards), if the client is already running, or if it was closed.
    pub async fn connect(&self) -> ExchangeResult<()> {
        if self.inner.shutdown.is_cancelled() {
            return Err(ExchangeError::Closed);
        }
        let signals = self
            .inner
            .reconnect_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| ExchangeError::ConnectionFailed("stream already running".into()))?;

        if let Err(e) = self.inner.dial().await {
            *self.inner.reconnect_rx.lock().unwrap_or_else(|e| e.into_inner()) = Some(signals);
            return Err(e);
        }

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(supervise(inner, signals));
        self.inner.track(handle);

        info!(
            venue = self.inner.protocol.venue(),
            url = %self.inner.url,
            "Stream connected"
        );
        Ok(())
    }

    /// Register `topic` and request it from the venue.
    ///
    /// The registration is kept even if the request cannot be sent right now;
    /// it is replayed after the next reconnect.
    pub async fn subscribe<F>(&self, topic: impl Into<String>, handler: F) -> ExchangeResult<()>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let topic = topic.into();
        self.inner
            .subscriptions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Subscription {
                topic: topic.clone(),
                handler: Arc::new(handler),
            });
        self.inner.send_subscribe(&topic).await?;
        debug!(venue = self.inner.protocol.venue(), topic = %topic, "Subscribed");
        Ok(())
    }

    /// Subscribe to the venue's top-of-book feed for `symbol`.
    ///
    /// Malformed payloads are logged and dropped; partial updates are skipped.
    pub async fn subscribe_order_book<F>(&self, symbol: &str, on_book: F) -> ExchangeResult<()>
    where
        F: Fn(TopOfBook) + Send + Sync + 'static,
    {
        let protocol = Arc::clone(&self.inner.protocol);
        let topic = protocol.book_topic(symbol);
        self.subscribe(topic, move |payload| match protocol.decode_book(payload) {
            Ok(Some(book)) => on_book(book),
            Ok(None) => {}
            Err(e) => warn!(
                venue = protocol.venue(),
                error = %e,
                "Dropping malformed book payload"
            ),
        })
        .await
    }

    /// Currently connected
    pub fn is_ready(&self) -> bool {
        self.inner.health.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.health.state()
    }

    pub fn health(&self) -> HealthSnapshot {
        self.inner.health.snapshot()
    }

    /// Registered topics in registration order
    pub fn subscribed_topics(&self) -> Vec<String> {
        self.inner
            .subscriptions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|s| s.topic.clone())
            .collect()
    }

    pub fn venue(&self) -> &'static str {
        self.inner.protocol.venue()
    }

    /// Stop all background work and close the socket. Idempotent.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.shutdown.cancel();
        self.inner.health.mark_closed();

        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            let _ = tokio::time::timeout(CLOSE_TIMEOUT, writer.sink.close()).await;
        }

        let handles: Vec<_> = std::mem::take(&mut *self.inner.tasks.lock().unwrap_or_else(|e| e.into_inner()));
        for handle in handles {
            let _ = tokio::time::timeout(TASK_JOIN_TIMEOUT, handle).await;
        }

        info!(venue = self.inner.protocol.venue(), "Stream closed");
    }
}

impl StreamInner {
    /// Open a new connection and start its reader and heartbeat
    async fn dial(self: &Arc<Self>) -> ExchangeResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(ExchangeError::Closed);
        }
        self.health.transition(ConnectionState::Connecting);

        let stream = match connect_with_timeout(&self.url, self.config.dial_timeout).await {
            Ok(stream) => stream,
            Err(e) => {
                self.health.on_disconnected();
                return Err(e);
            }
        };
        let (sink, reader) = stream.split();
        let link = Arc::new(Link {
            id: self.link_seq.fetch_add(1, Ordering::SeqCst) + 1,
            token: self.shutdown.child_token(),
            failed: AtomicBool::new(false),
        });

        {
            let mut writer = self.writer.lock().await;
            // close() may have run while we were dialing
            if self.shutdown.is_cancelled() {
                return Err(ExchangeError::Closed);
            }
            *writer = Some(LinkWriter {
                link_id: link.id,
                sink,
            });
        }
        self.health.on_connected();

        let reader_task = tokio::spawn(read_loop(Arc::clone(self), Arc::clone(&link), reader));
        let heartbeat_task = tokio::spawn(heartbeat_loop(Arc::clone(self), link));
        self.track(reader_task);
        self.track(heartbeat_task);
        Ok(())
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    /// Send on whatever connection is current
    async fn send(&self, frame: Message) -> ExchangeResult<()> {
        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(w) => Ok(w.sink.send(frame).await?),
            None => Err(ExchangeError::ConnectionFailed("not connected".into())),
        }
    }

    /// Send only if `link_id` is still the current connection
    async fn send_on(&self, link_id: u64, frame: Message) -> ExchangeResult<()> {
        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(w) if w.link_id == link_id => Ok(w.sink.send(frame).await?),
            _ => Err(ExchangeError::ConnectionFailed("connection replaced".into())),
        }
    }

    /// Drop the write half of `link_id`, sending a close frame if possible
    async fn close_writer(&self, link_id: u64) {
        let mut writer = self.writer.lock().await;
        if writer.as_ref().map(|w| w.link_id) == Some(link_id) {
            if let Some(mut w) = writer.take() {
                let _ = tokio::time::timeout(CLOSE_TIMEOUT, w.sink.close()).await;
            }
        }
    }

    async fn send_subscribe(&self, topic: &str) -> ExchangeResult<()> {
        self.send(self.protocol.subscribe_frame(topic))
            .await
            .map_err(|e| ExchangeError::SubscriptionFailed {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    /// Replay the registry in registration order. Returns the number of failures.
    async fn resubscribe_all(&self) -> usize {
        let topics: Vec<String> = self
            .subscriptions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|s| s.topic.clone())
            .collect();

        let mut failures = 0;
        for topic in &topics {
            if let Err(e) = self.send_subscribe(topic).await {
                failures += 1;
                warn!(
                    venue = self.protocol.venue(),
                    topic = %topic,
                    error = %e,
                    "[RECONNECT] Resubscribe failed"
                );
            }
        }
        failures
    }

    fn handle_frame(&self, frame: &Message) {
        match self.protocol.classify(frame) {
            Inbound::Ack(seq) => match self.health.on_ack(seq) {
                Some(rtt) => trace!(venue = self.protocol.venue(), seq, rtt_us = rtt.as_micros() as u64, "Pong"),
                None => debug!(venue = self.protocol.venue(), seq, "Ignoring unmatched pong"),
            },
            Inbound::Data { topic, payload } => self.dispatch(&topic, &payload),
            Inbound::Ignore => {}
        }
    }

    /// First registration with an equal topic wins
    fn dispatch(&self, topic: &str, payload: &str) {
        let handler = self
            .subscriptions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|s| s.topic == topic)
            .map(|s| Arc::clone(&s.handler));
        if let Some(handler) = handler {
            handler(payload);
        }
    }
}

// =============================================================================
// Background tasks
// =============================================================================

async fn read_loop(inner: Arc<StreamInner>, link: Arc<Link>, mut reader: WsReader) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = link.token.cancelled() => return,
            frame = reader.next() => frame,
        };
        match frame {
            Some(Ok(Message::Close(close))) => {
                inner.health.touch_message();
                let reason = close
                    .map(|c| format!("server close: {} {}", c.code, c.reason))
                    .unwrap_or_else(|| "server close".to_string());
                link.fail(&inner, &reason);
                return;
            }
            Some(Ok(frame)) => {
                inner.health.touch_message();
                inner.handle_frame(&frame);
            }
            Some(Err(e)) => {
                link.fail_as(&inner, &format!("read error: {}", e), ConnectionState::Error);
                return;
            }
            None => {
                link.fail(&inner, "stream ended");
                return;
            }
        }
    }
}

async fn heartbeat_loop(inner: Arc<StreamInner>, link: Arc<Link>) {
    let interval = inner.config.ping_interval;
    let pong_timeout = inner.config.pong_timeout;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = link.token.cancelled() => return,
            _ = ticker.tick() => {}
        }

        if inner.health.is_stale(interval, pong_timeout) {
            warn!(
                venue = inner.protocol.venue(),
                link = link.id,
                last_pong_ms = inner.health.last_pong_age().as_millis() as u64,
                "[RECONNECT] Heartbeat timeout, closing stale connection"
            );
            inner.close_writer(link.id).await;
            link.fail_as(&inner, "heartbeat timeout", ConnectionState::Stale);
            return;
        }

        let seq = inner.health.next_probe();
        if let Err(e) = inner.send_on(link.id, inner.protocol.probe_frame(seq)).await {
            link.fail_as(&inner, &format!("ping send failed: {}", e), ConnectionState::Error);
            return;
        }
    }
}

async fn supervise(inner: Arc<StreamInner>, mut signals: mpsc::Receiver<()>) {
    let venue = inner.protocol.venue();
    let mut backoff = Backoff::new(inner.config.reconnect);

    loop {
        tokio::select! {
            biased;
            _ = inner.shutdown.cancelled() => break,
            signal = signals.recv() => {
                if signal.is_none() {
                    break;
                }
            }
        }

        let attempt = inner.health.on_reconnect_attempt();
        let delay = backoff.current();
        info!(
            venue,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "[RECONNECT] Reconnecting"
        );

        tokio::select! {
            biased;
            _ = inner.shutdown.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        match inner.dial().await {
            Ok(()) => {
                let failures = inner.resubscribe_all().await;
                let next = settle(&mut backoff, Some(failures));
                if failures == 0 {
                    info!(venue, attempt, "[RECONNECT] Connection restored");
                } else {
                    warn!(
                        venue,
                        attempt,
                        failures,
                        next_delay_ms = next.as_millis() as u64,
                        "[RECONNECT] Reconnected with failed resubscriptions"
                    );
                }
            }
            Err(ExchangeError::Closed) => break,
            Err(e) => {
                let next = settle(&mut backoff, None);
                warn!(
                    venue,
                    attempt,
                    error = %e,
                    next_delay_ms = next.as_millis() as u64,
                    "[RECONNECT] Redial failed"
                );
                let _ = inner.reconnect_tx.try_send(());
            }
        }
    }
    debug!(venue, "Stream supervisor exited");
}

/// Backoff bookkeeping for one recovery attempt. `resubscribe_failures` is
/// `None` when the redial itself failed. Only a redial with every topic
/// re-sent brings the delay back to the floor. Returns the next delay.
fn settle(backoff: &mut Backoff, resubscribe_failures: Option<usize>) -> Duration {
    match resubscribe_failures {
        Some(0) => {
            backoff.reset();
            backoff.current()
        }
        _ => backoff.escalate(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullProtocol;

    impl StreamProtocol for NullProtocol {
        fn venue(&self) -> &'static str {
            "null"
        }
        fn book_topic(&self, symbol: &str) -> String {
            format!("book.{}", symbol)
        }
        fn probe_frame(&self, seq: u64) -> Message {
            Message::Ping(seq.to_string().into_bytes())
        }
        fn classify(&self, frame: &Message) -> Inbound {
            match frame {
                Message::Text(text) => parse_envelope(text),
                _ => Inbound::Ignore,
            }
        }
        fn decode_book(&self, _payload: &str) -> ExchangeResult<Option<TopOfBook>> {
            Ok(None)
        }
    }

    fn client() -> StreamClient {
        StreamClient::new("ws://127.0.0.1:9", Arc::new(NullProtocol), StreamConfig::default())
    }

    #[test]
    fn test_parse_envelope_data() {
        let inbound = parse_envelope(r#"{"topic":"orderbook.1.BTCUSDT","type":"snapshot","data":{"b":[["1","2"]]}}"#);
        assert_eq!(
            inbound,
            Inbound::Data {
                topic: "orderbook.1.BTCUSDT".into(),
                payload: r#"{"b":[["1","2"]]}"#.into(),
            }
        );
    }

    #[test]
    fn test_parse_envelope_ignores_non_topic_frames() {
        assert_eq!(parse_envelope(r#"{"success":true,"op":"subscribe"}"#), Inbound::Ignore);
        assert_eq!(parse_envelope(r#"{"topic":"","data":{}}"#), Inbound::Ignore);
        assert_eq!(parse_envelope(r#"{"topic":"x"}"#), Inbound::Ignore);
        assert_eq!(parse_envelope("not json"), Inbound::Ignore);
    }

    #[test]
    fn test_dispatch_first_match_wins() {
        let client = client();
        let hits = Arc::new(AtomicU64::new(0));
        let h1 = Arc::clone(&hits);
        let h2 = Arc::clone(&hits);
        {
            let mut subs = client.inner.subscriptions.write().unwrap();
            subs.push(Subscription {
                topic: "t".into(),
                handler: Arc::new(move |_: &str| {
                    h1.fetch_add(1, Ordering::SeqCst);
                }),
            });
            subs.push(Subscription {
                topic: "t".into(),
                handler: Arc::new(move |_: &str| {
                    h2.fetch_add(100, Ordering::SeqCst);
                }),
            });
        }
        client.inner.dispatch("t", "{}");
        client.inner.dispatch("unknown", "{}");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    fn backoff() -> Backoff {
        Backoff::new(ReconnectConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(800),
        })
    }

    #[test]
    fn test_settle_escalates_while_resubscription_fails() {
        let mut backoff = backoff();
        assert_eq!(settle(&mut backoff, Some(1)), Duration::from_millis(200));
        assert_eq!(settle(&mut backoff, Some(2)), Duration::from_millis(400));
        assert_eq!(backoff.current(), Duration::from_millis(400));
        assert_eq!(backoff.attempt(), 2);
    }

    #[test]
    fn test_settle_escalates_on_failed_redial() {
        let mut backoff = backoff();
        settle(&mut backoff, None);
        settle(&mut backoff, None);
        settle(&mut backoff, None);
        assert_eq!(settle(&mut backoff, None), Duration::from_millis(800));
    }

    #[test]
    fn test_settle_resets_only_after_full_resubscribe() {
        let mut backoff = backoff();
        settle(&mut backoff, None);
        settle(&mut backoff, Some(1));
        assert_eq!(backoff.current(), Duration::from_millis(400));

        assert_eq!(settle(&mut backoff, Some(0)), Duration::from_millis(100));
        assert_eq!(backoff.attempt(), 0);

        // A partial recovery after the reset escalates from the floor again
        assert_eq!(settle(&mut backoff, Some(1)), Duration::from_millis(200));
    }

    fn link(id: u64) -> Link {
        Link {
            id,
            token: CancellationToken::new(),
            failed: AtomicBool::new(false),
        }
    }

    #[tokio::test]
    async fn test_stale_link_reports_stale_and_signals_once() {
        let client = client();
        let mut signals = client.inner.reconnect_rx.lock().unwrap().take().unwrap();
        client.inner.health.on_connected();

        let link = link(1);
        link.fail_as(&client.inner, "heartbeat timeout", ConnectionState::Stale);
        // The reader noticing the torn-down socket afterwards changes nothing
        link.fail(&client.inner, "stream ended");

        assert!(link.token.is_cancelled());
        assert_eq!(client.state(), ConnectionState::Stale);
        assert!(!client.is_ready());
        assert!(signals.try_recv().is_ok());
        assert!(signals.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_link_failure_kinds_are_reported() {
        let client = client();
        client.inner.health.on_connected();
        link(2).fail_as(&client.inner, "read error: reset", ConnectionState::Error);
        assert_eq!(client.state(), ConnectionState::Error);

        client.inner.health.on_connected();
        link(3).fail(&client.inner, "server close");
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_subscribe_while_disconnected_keeps_registration() {
        let client = client();
        let result = client.subscribe("book.BTC", |_| {}).await;
        assert!(matches!(result, Err(ExchangeError::SubscriptionFailed { .. })));
        assert_eq!(client.subscribed_topics(), vec!["book.BTC".to_string()]);
        assert!(!client.is_ready());
    }

    #[tokio::test]
    async fn test_connect_after_close_is_error() {
        let client = client();
        client.close().await;
        client.close().await;
        assert!(matches!(client.connect().await, Err(ExchangeError::Closed)));
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_failed_first_dial_allows_retry() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = StreamClient::new(format!("ws://{}", addr), Arc::new(NullProtocol), StreamConfig::default());
        assert!(client.connect().await.is_err());
        // Receiver was handed back, so a second attempt fails on dial, not on "already running"
        let second = client.connect().await;
        assert!(!matches!(second, Err(ExchangeError::ConnectionFailed(ref m)) if m.contains("already running")));
    }
}
