//! Connection health tracking for venue streams
//!
//! `ConnectionHealth` is written by the stream's background tasks (reader,
//! heartbeat, supervisor) and read by anyone holding the client, e.g. the
//! status reporter. All timestamps are monotonic offsets from the moment the
//! health record was created.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

/// Sentinel for "no round trip measured yet"
const NO_RTT: u64 = u64::MAX;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No socket, nothing in flight
    #[default]
    Disconnected,
    /// Dial in progress
    Connecting,
    /// Socket up, reader and heartbeat running
    Connected,
    /// Heartbeat went unanswered; the link was torn down
    Stale,
    /// Read or write failed on the socket
    Error,
    /// Failure observed, supervisor is backing off before redialing
    Reconnecting,
    /// Terminal; no further reconnects
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Stale => "stale",
            ConnectionState::Error => "error",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Outstanding liveness probes keyed by sequence number.
///
/// `ack` removes and returns in one step so a late acknowledgment racing a
/// reconnect can never be matched twice.
#[derive(Debug, Default)]
pub struct PendingProbes {
    inner: Mutex<HashMap<u64, Instant>>,
}

impl PendingProbes {
    pub fn insert(&self, seq: u64, sent_at: Instant) {
        self.lock().insert(seq, sent_at);
    }

    /// Remove `seq` and return the elapsed time since it was sent
    pub fn ack(&self, seq: u64) -> Option<Duration> {
        self.lock().remove(&seq).map(|sent_at| sent_at.elapsed())
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Instant>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Point-in-time copy of a stream's health, for logging
#[derive(Debug, Clone, PartialEq)]
pub struct HealthSnapshot {
    pub state: ConnectionState,
    pub connected: bool,
    pub reconnect_count: u64,
    pub last_message_age: Duration,
    pub last_pong_age: Duration,
    pub round_trip: Option<Duration>,
    pub outstanding_probes: usize,
}

/// Shared connection health state
#[derive(Debug)]
pub struct ConnectionHealth {
    epoch: Instant,
    state: RwLock<ConnectionState>,
    connected: AtomicBool,
    reconnect_count: AtomicU64,
    /// Microseconds since `epoch`
    last_message_us: AtomicU64,
    /// Microseconds since `epoch`
    last_pong_us: AtomicU64,
    round_trip_us: AtomicU64,
    next_seq: AtomicU64,
    pending: PendingProbes,
}

impl ConnectionHealth {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            state: RwLock::new(ConnectionState::Disconnected),
            connected: AtomicBool::new(false),
            reconnect_count: AtomicU64::new(0),
            last_message_us: AtomicU64::new(0),
            last_pong_us: AtomicU64::new(0),
            round_trip_us: AtomicU64::new(NO_RTT),
            next_seq: AtomicU64::new(0),
            pending: PendingProbes::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Move to `next` unless the client is already closed. Returns whether the
    /// transition happened.
    pub fn transition(&self, next: ConnectionState) -> bool {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if *state == ConnectionState::Closed {
            return false;
        }
        *state = next;
        true
    }

    pub fn mark_closed(&self) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = ConnectionState::Closed;
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// A dial succeeded. The stale clock starts now, and probes from the
    /// previous socket are forgotten.
    pub fn on_connected(&self) {
        let now = self.now_us();
        self.last_message_us.store(now, Ordering::SeqCst);
        self.last_pong_us.store(now, Ordering::SeqCst);
        self.pending.clear();
        if self.transition(ConnectionState::Connected) {
            self.connected.store(true, Ordering::SeqCst);
        }
    }

    pub fn on_disconnected(&self) {
        self.on_link_lost(ConnectionState::Disconnected);
    }

    /// A live link died. `state` says how: `Stale`, `Error` or plain
    /// `Disconnected` for a server close.
    pub fn on_link_lost(&self, state: ConnectionState) {
        self.connected.store(false, Ordering::SeqCst);
        self.transition(state);
    }

    /// The supervisor is starting a recovery attempt
    pub fn on_reconnect_attempt(&self) -> u64 {
        self.connected.store(false, Ordering::SeqCst);
        self.transition(ConnectionState::Reconnecting);
        self.reconnect_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Any inbound frame, control or application
    pub fn touch_message(&self) {
        self.last_message_us.store(self.now_us(), Ordering::SeqCst);
    }

    /// Allocate the next probe sequence and record it as outstanding
    pub fn next_probe(&self) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.pending.insert(seq, Instant::now());
        seq
    }

    /// Match an acknowledgment. Unknown sequences are ignored and leave the
    /// pong clock and round trip untouched.
    pub fn on_ack(&self, seq: u64) -> Option<Duration> {
        let rtt = self.pending.ack(seq)?;
        self.last_pong_us.store(self.now_us(), Ordering::SeqCst);
        self.round_trip_us
            .store(rtt.as_micros().min(u128::from(NO_RTT - 1)) as u64, Ordering::SeqCst);
        Some(rtt)
    }

    pub fn last_message_age(&self) -> Duration {
        self.age_of(self.last_message_us.load(Ordering::SeqCst))
    }

    pub fn last_pong_age(&self) -> Duration {
        self.age_of(self.last_pong_us.load(Ordering::SeqCst))
    }

    pub fn round_trip(&self) -> Option<Duration> {
        match self.round_trip_us.load(Ordering::SeqCst) {
            NO_RTT => None,
            us => Some(Duration::from_micros(us)),
        }
    }

    /// No acknowledgment for longer than `interval + pong_timeout`
    pub fn is_stale(&self, interval: Duration, pong_timeout: Duration) -> bool {
        self.last_pong_age() > interval + pong_timeout
    }

    pub fn reconnect_count(&self) -> u64 {
        self.reconnect_count.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            state: self.state(),
            connected: self.is_connected(),
            reconnect_count: self.reconnect_count(),
            last_message_age: self.last_message_age(),
            last_pong_age: self.last_pong_age(),
            round_trip: self.round_trip(),
            outstanding_probes: self.pending.len(),
        }
    }

    fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    fn age_of(&self, stamp_us: u64) -> Duration {
        Duration::from_micros(self.now_us().saturating_sub(stamp_us))
    }
}

impl Default for ConnectionHealth {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_default() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert_eq!(ConnectionHealth::new().state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_unmatched_ack_is_ignored() {
        let health = ConnectionHealth::new();
        health.on_connected();
        assert_eq!(health.on_ack(42), None);
        assert_eq!(health.round_trip(), None);
    }

    #[test]
    fn test_matched_ack_records_round_trip() {
        let health = ConnectionHealth::new();
        health.on_connected();
        let seq = health.next_probe();
        assert_eq!(health.snapshot().outstanding_probes, 1);

        assert!(health.on_ack(seq).is_some());
        assert!(health.round_trip().is_some());
        assert_eq!(health.snapshot().outstanding_probes, 0);

        // Second ack for the same probe matches nothing
        assert_eq!(health.on_ack(seq), None);
    }

    #[test]
    fn test_probe_sequence_increases() {
        let health = ConnectionHealth::new();
        let a = health.next_probe();
        let b = health.next_probe();
        assert!(b > a);
    }

    #[test]
    fn test_reconnect_forgets_old_probes() {
        let health = ConnectionHealth::new();
        health.on_connected();
        let seq = health.next_probe();
        health.on_disconnected();
        health.on_connected();
        assert_eq!(health.on_ack(seq), None);
    }

    #[test]
    fn test_stale_after_silence() {
        let health = ConnectionHealth::new();
        health.on_connected();
        assert!(!health.is_stale(Duration::from_secs(20), Duration::from_secs(10)));
        std::thread::sleep(Duration::from_millis(5));
        assert!(health.is_stale(Duration::from_millis(1), Duration::from_millis(1)));
    }

    #[test]
    fn test_stale_is_distinct_from_disconnected() {
        let health = ConnectionHealth::new();
        health.on_connected();
        health.on_link_lost(ConnectionState::Stale);
        assert_eq!(health.state(), ConnectionState::Stale);
        assert!(!health.is_connected());
        assert_eq!(ConnectionState::Stale.to_string(), "stale");

        health.on_reconnect_attempt();
        assert_eq!(health.state(), ConnectionState::Reconnecting);

        health.on_connected();
        health.on_link_lost(ConnectionState::Error);
        assert_eq!(health.state(), ConnectionState::Error);

        health.mark_closed();
        health.on_link_lost(ConnectionState::Stale);
        assert_eq!(health.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_closed_is_terminal() {
        let health = ConnectionHealth::new();
        health.on_connected();
        health.mark_closed();
        assert!(!health.transition(ConnectionState::Reconnecting));
        health.on_connected();
        assert_eq!(health.state(), ConnectionState::Closed);
        assert!(!health.is_connected());
    }

    #[test]
    fn test_reconnect_attempt_counts() {
        let health = ConnectionHealth::new();
        assert_eq!(health.on_reconnect_attempt(), 1);
        assert_eq!(health.on_reconnect_attempt(), 2);
        assert_eq!(health.state(), ConnectionState::Reconnecting);
    }
}
