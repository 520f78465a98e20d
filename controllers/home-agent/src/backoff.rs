//! # Fibonacci Backoff
//!
//! Progressive backoff for reconciliations that fail with an error. Grows
//! more slowly than exponential backoff: 1s, 1s, 2s, 3s, 5s, 8s, ... capped
//! at a maximum.
//!
//! Convergence waits do not go through here; they use the fixed requeue
//! delay returned by the reconciler.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

/// Fibonacci backoff calculator
///
/// Each backoff is the sum of the previous two, starting from `min_secs`
/// twice and capped at `max_secs`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Minimum backoff value in seconds (for reset)
    min_secs: u64,
    /// Previous backoff value in seconds
    prev_secs: u64,
    /// Current backoff value in seconds
    current_secs: u64,
    /// Maximum backoff value in seconds
    max_secs: u64,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff with minimum and maximum values in seconds
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs,
            prev_secs: 0,
            current_secs: min_secs,
            max_secs,
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current_secs;

        let next_secs = self.prev_secs.saturating_add(self.current_secs);
        self.prev_secs = self.current_secs;
        self.current_secs = std::cmp::min(next_secs, self.max_secs);

        Duration::from_secs(result)
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.prev_secs = 0;
        self.current_secs = self.min_secs;
    }
}

/// Per-object error backoff, keyed by `namespace/name`.
///
/// Owned by the dispatcher; entries are dropped once an object reconciles
/// successfully.
#[derive(Debug)]
pub struct ErrorBackoffs {
    states: Mutex<HashMap<String, FibonacciBackoff>>,
    min_secs: u64,
    max_secs: u64,
}

impl ErrorBackoffs {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            min_secs,
            max_secs,
        }
    }

    /// Backoff to apply after another failure of `key`
    pub fn next_for(&self, key: &str) -> Duration {
        match self.states.lock() {
            Ok(mut states) => states
                .entry(key.to_string())
                .or_insert_with(|| FibonacciBackoff::new(self.min_secs, self.max_secs))
                .next_backoff(),
            Err(e) => {
                warn!("Failed to lock backoff states: {}, using default backoff", e);
                Duration::from_secs(self.min_secs)
            }
        }
    }

    /// Forget the failure history of `key`
    pub fn reset(&self, key: &str) {
        if let Ok(mut states) = self.states.lock() {
            states.remove(key);
        }
    }
}

impl Default for ErrorBackoffs {
    fn default() -> Self {
        Self::new(1, 300)
    }
}
