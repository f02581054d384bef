//! Reconnection backoff
//!
//! Deterministic exponential backoff: the delay starts at a floor, doubles
//! after every failed attempt and never exceeds the ceiling. A successful
//! recovery resets it to the floor.

use std::time::Duration;

/// Backoff tunables
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectConfig {
    /// First delay after a drop
    pub initial_delay: Duration,
    /// Delay cap
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Exponential backoff state owned by a stream supervisor
#[derive(Debug, Clone)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    current: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: ReconnectConfig) -> Self {
        // A ceiling below the floor would make escalate() shrink the delay
        let ceiling = config.max_delay.max(config.initial_delay);
        Self {
            floor: config.initial_delay,
            ceiling,
            current: config.initial_delay,
            attempt: 0,
        }
    }

    /// Delay to wait before the next attempt
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Record a failed attempt: double the delay, capped at the ceiling
    pub fn escalate(&mut self) -> Duration {
        self.current = self.current.saturating_mul(2).min(self.ceiling);
        self.attempt = self.attempt.saturating_add(1);
        self.current
    }

    /// Record a full recovery
    pub fn reset(&mut self) {
        self.current = self.floor;
        self.attempt = 0;
    }

    /// Failed attempts since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(ReconnectConfig::default())
    }
}
