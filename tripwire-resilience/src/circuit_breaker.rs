//! Consecutive-error circuit breaker
//!
//! The breaker counts back-to-back failures. Reaching the threshold opens it
//! and new work is held for a fixed cooldown. After the cooldown it is
//! half-open and exactly one trial attempt is admitted: a success closes it
//! and clears the streak, a failure opens it again for another cooldown.
//! Other callers keep deferring until the trial reports back.
//!
//! Time comes from `tokio::time::Instant` so paused-clock tests can drive
//! the cooldown.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// How long callers wait before asking again while a half-open trial is out
pub const TRIAL_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Requests flow
    Closed,
    /// Cooling down, requests are held back
    Open,
    /// Cooldown over; the next request decides
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Back-to-back failures that open the breaker
    pub failure_threshold: u32,

    /// How long an open breaker holds work
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 10,
            cooldown: Duration::from_secs(10),
        }
    }
}

/// Outcome counters since creation or the last reset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CircuitMetrics {
    pub total_requests: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    /// Attempts held back while open
    pub total_deferred: u64,
    pub times_opened: u64,
    pub consecutive_failures: u32,
}

/// Shared handle; clones observe the same breaker
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: Arc<CircuitBreakerConfig>,
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    metrics: CircuitMetrics,
}

impl Inner {
    /// Move an expired open breaker to half-open
    fn refresh(&mut self, cooldown: Duration) {
        if self.state != CircuitState::Open {
            return;
        }
        if let Some(opened_at) = self.opened_at {
            if opened_at.elapsed() >= cooldown {
                self.state = CircuitState::HalfOpen;
                log::info!("Circuit breaker cooldown over, half-open");
            }
        }
    }

    fn open(&mut self, cooldown: Duration) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.trial_in_flight = false;
        self.metrics.times_opened += 1;
        log::warn!(
            "Circuit breaker opened after {} consecutive failures, holding work for {:?}",
            self.metrics.consecutive_failures,
            cooldown
        );
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config: Arc::new(config),
            inner: Arc::new(Mutex::new(Inner {
                state: CircuitState::Closed,
                opened_at: None,
                trial_in_flight: false,
                metrics: CircuitMetrics::default(),
            })),
        }
    }

    /// Threshold 10, cooldown 10s
    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        inner.refresh(self.config.cooldown);
        inner.state
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Time left before an open breaker lets work through.
    ///
    /// `None` means a request may be attempted now.
    pub fn remaining_cooldown(&self) -> Option<Duration> {
        let mut inner = self.inner.lock();
        inner.refresh(self.config.cooldown);
        match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(opened_at)) => {
                Some(self.config.cooldown.saturating_sub(opened_at.elapsed()))
            }
            _ => None,
        }
    }

    /// Ask to send a request now.
    ///
    /// `None` admits the caller. `Some(wait)` means hold the request and ask
    /// again after `wait`. A half-open breaker admits one trial and defers
    /// everyone else until that trial is recorded as a success or failure.
    pub fn try_acquire(&self) -> Option<Duration> {
        let mut inner = self.inner.lock();
        inner.refresh(self.config.cooldown);
        match inner.state {
            CircuitState::Closed => None,
            CircuitState::Open => Some(
                inner
                    .opened_at
                    .map(|at| self.config.cooldown.saturating_sub(at.elapsed()))
                    .unwrap_or(self.config.cooldown),
            ),
            CircuitState::HalfOpen if inner.trial_in_flight => Some(TRIAL_POLL),
            CircuitState::HalfOpen => {
                inner.trial_in_flight = true;
                log::debug!("Circuit breaker admitting half-open trial");
                None
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.refresh(self.config.cooldown);
        inner.trial_in_flight = false;
        inner.metrics.total_requests += 1;
        inner.metrics.total_successes += 1;
        inner.metrics.consecutive_failures = 0;
        if inner.state != CircuitState::Closed {
            inner.state = CircuitState::Closed;
            inner.opened_at = None;
            log::info!("Circuit breaker closed after a successful request");
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.refresh(self.config.cooldown);
        inner.trial_in_flight = false;
        inner.metrics.total_requests += 1;
        inner.metrics.total_failures += 1;
        inner.metrics.consecutive_failures += 1;
        match inner.state {
            CircuitState::Closed
                if inner.metrics.consecutive_failures >= self.config.failure_threshold =>
            {
                inner.open(self.config.cooldown)
            }
            CircuitState::HalfOpen => inner.open(self.config.cooldown),
            // Open: a request already in flight when the breaker opened
            _ => {}
        }
    }

    /// Count an attempt that was held back by the open breaker
    pub fn record_deferral(&self) {
        self.inner.lock().metrics.total_deferred += 1;
    }

    pub fn metrics(&self) -> CircuitMetrics {
        self.inner.lock().metrics.clone()
    }

    pub fn times_opened(&self) -> u64 {
        self.inner.lock().metrics.times_opened
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().metrics.consecutive_failures
    }

    /// Close the breaker and clear all counters
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.opened_at = None;
        inner.trial_in_flight = false;
        inner.metrics = CircuitMetrics::default();
    }
}
