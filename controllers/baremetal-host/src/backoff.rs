//! # Fibonacci Backoff
//!
//! Provides a Fibonacci-based backoff for hosts whose steps keep failing.
//! It grows more slowly than exponential backoff, so a host with a flaky BMC
//! is retried often enough to recover quickly without hammering the backend.
//!
//! Default sequence: 5s, 5s, 10s, 15s, 25s, 40s, 65s, 105s, 170s, 275s, 300s (max).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Fibonacci backoff calculator
///
/// Each backoff is the sum of the previous two, capped at `max`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Minimum backoff in seconds (for reset)
    min_secs: u64,
    /// Previous backoff in seconds
    prev_secs: u64,
    /// Current backoff in seconds
    current_secs: u64,
    /// Maximum backoff in seconds
    max_secs: u64,
}

impl FibonacciBackoff {
    /// Create a backoff starting at `min` and capped at `max`
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        let min_secs = min.as_secs().max(1);
        Self {
            min_secs,
            prev_secs: 0,
            current_secs: min_secs,
            max_secs: max.as_secs().max(min_secs),
        }
    }

    /// Get the next backoff and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current_secs;

        let next = self.prev_secs + self.current_secs;
        self.prev_secs = self.current_secs;
        self.current_secs = std::cmp::min(next, self.max_secs);

        Duration::from_secs(result)
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev_secs = 0;
        self.current_secs = self.min_secs;
    }
}

/// Backoff state for one host
#[derive(Debug, Clone)]
pub struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    /// Minimum delay between retries of a failing host
    pub const MIN: Duration = Duration::from_secs(5);
    /// Maximum delay between retries of a failing host
    pub const MAX: Duration = Duration::from_secs(300);

    /// Fresh state with no errors
    pub fn new() -> Self {
        Self {
            backoff: FibonacciBackoff::new(Self::MIN, Self::MAX),
            error_count: 0,
        }
    }

    /// Record one more consecutive error
    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    /// Consecutive errors recorded so far
    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    /// Next delay in the sequence
    pub fn next_backoff(&mut self) -> Duration {
        self.backoff.next_backoff()
    }

    /// Forget all errors
    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

impl Default for BackoffState {
    fn default() -> Self {
        Self::new()
    }
}

/// Backoff states of all hosts, keyed by `namespace/name`
#[derive(Debug, Clone, Default)]
pub struct HostBackoffs {
    states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl HostBackoffs {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error for `key` and returns how long to wait before retrying
    pub fn next_backoff(&self, key: &str) -> Duration {
        match self.states.lock() {
            Ok(mut states) => {
                let state = states.entry(key.to_string()).or_default();
                state.increment_error();
                let delay = state.next_backoff();
                debug!(host = key, errors = state.error_count(), ?delay, "Backing off");
                delay
            }
            Err(e) => {
                warn!("Failed to lock backoff states: {}, using default backoff", e);
                BackoffState::MIN
            }
        }
    }

    /// Reset the error count for `key` (on a successful step)
    pub fn reset(&self, key: &str) {
        if let Ok(mut states) = self.states.lock() {
            if let Some(state) = states.get_mut(key) {
                state.reset();
            }
        }
    }

    /// Drop all state for `key` once the host is gone
    pub fn forget(&self, key: &str) {
        if let Ok(mut states) = self.states.lock() {
            states.remove(key);
        }
    }

    /// Consecutive errors recorded for `key`
    pub fn error_count(&self, key: &str) -> u32 {
        self.states
            .lock()
            .ok()
            .and_then(|states| states.get(key).map(BackoffState::error_count))
            .unwrap_or(0)
    }

    /// Number of hosts with tracked state
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.states.lock().map(|states| states.len()).unwrap_or(0)
    }
}
