//! [`CircuitBreaker`] – guards a synchronous link (oracle, actuators) called
//! from the control loop.
//!
//! A call that fails, or succeeds but takes longer than the latency budget,
//! counts as a fault.  After `failure_threshold` consecutive faults the
//! breaker opens: for the next `cooldown_ticks` calls to
//! [`CircuitBreaker::allow`] the link is not touched and
//! [`RoverError::CircuitOpen`] is returned instead.  Once the cool-down has
//! elapsed a single trial call is let through; a fault on that trial reopens
//! the breaker immediately, a success closes it.
//!
//! # Example
//!
//! ```
//! use rover_kernel::breaker::{BreakerConfig, CircuitBreaker};
//! use rover_types::RoverError;
//!
//! let mut breaker = CircuitBreaker::new("oracle", BreakerConfig {
//!     failure_threshold: 2,
//!     cooldown_ticks: 3,
//!     ..BreakerConfig::default()
//! });
//!
//! let fail = || Err::<(), _>(RoverError::OracleFailed("timeout".into()));
//! assert!(breaker.call(fail).is_err());
//! assert!(breaker.call(fail).is_err());
//! assert!(breaker.is_open());
//!
//! // While open the closure is never run.
//! let result = breaker.call(|| -> Result<(), RoverError> { unreachable!() });
//! assert!(matches!(result, Err(RoverError::CircuitOpen(_))));
//! ```

use std::time::{Duration, Instant};

use rover_types::RoverError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Thresholds of a [`CircuitBreaker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive faults that open the breaker.
    pub failure_threshold: u32,
    /// Calls refused while open before a trial call is allowed.
    pub cooldown_ticks: u32,
    /// Calls slower than this count as faults.
    pub latency_budget_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_ticks: 8,
            latency_budget_ms: 50,
        }
    }
}

impl BreakerConfig {
    pub fn latency_budget(&self) -> Duration {
        Duration::from_millis(self.latency_budget_ms)
    }
}

/// Observable state of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls go through.
    Closed,
    /// Calls are refused for `remaining` more ticks.
    Open { remaining: u32 },
}

// ────────────────────────────────────────────────────────────────────────────
// CircuitBreaker
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct CircuitBreaker {
    link: String,
    config: BreakerConfig,
    consecutive_failures: u32,
    state: BreakerState,
}

impl CircuitBreaker {
    pub fn new(link: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            link: link.into(),
            config,
            consecutive_failures: 0,
            state: BreakerState::Closed,
        }
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, BreakerState::Open { .. })
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Ask permission for one call.  While open this consumes one tick of
    /// the cool-down.
    pub fn allow(&mut self) -> Result<(), RoverError> {
        match self.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open { remaining } if remaining > 1 => {
                self.state = BreakerState::Open {
                    remaining: remaining - 1,
                };
                Err(RoverError::CircuitOpen(self.link.clone()))
            }
            BreakerState::Open { .. } => {
                // Last refused tick; the next call is the trial.
                self.state = BreakerState::Closed;
                self.consecutive_failures = self.config.failure_threshold.saturating_sub(1);
                info!(link = %self.link, "circuit half-open, next call is a trial");
                Err(RoverError::CircuitOpen(self.link.clone()))
            }
        }
    }

    /// Record a completed call that took `elapsed`.
    pub fn record_success(&mut self, elapsed: Duration) {
        if elapsed > self.config.latency_budget() {
            warn!(
                link = %self.link,
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = self.config.latency_budget_ms,
                "call exceeded latency budget"
            );
            self.record_failure();
        } else {
            if self.consecutive_failures > 0 {
                info!(link = %self.link, "circuit closed");
            }
            self.consecutive_failures = 0;
        }
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.config.failure_threshold && !self.is_open() {
            warn!(
                link = %self.link,
                failures = self.consecutive_failures,
                cooldown_ticks = self.config.cooldown_ticks,
                "circuit opened"
            );
            self.state = BreakerState::Open {
                remaining: self.config.cooldown_ticks.max(1),
            };
        }
    }

    /// Run `f` if the breaker allows it, timing it and recording the
    /// outcome.
    pub fn call<T>(&mut self, f: impl FnOnce() -> Result<T, RoverError>) -> Result<T, RoverError> {
        self.allow()?;
        let started = Instant::now();
        let result = f();
        match &result {
            Ok(_) => self.record_success(started.elapsed()),
            Err(_) => self.record_failure(),
        }
        result
    }
}
