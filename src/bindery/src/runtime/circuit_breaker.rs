use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::info;

/// When a [`CircuitBreaker`] trips and how long it stays off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures tripping the breaker.
    pub threshold: u32,
    /// How long a tripped breaker stays off before it re-arms itself.
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 1,
            timeout: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Suppresses a failing service for a while.
///
/// The breaker is on while failures stay below the threshold. Once tripped
/// it is off until the timeout elapses or it is turned on explicitly. Any
/// success resets the count of failures.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

#[derive(Debug)]
struct BreakerState {
    countdown: u32,
    tripped_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState {
                countdown: config.threshold,
                tripped_at: None,
            }),
        }
    }

    pub fn config(&self) -> CircuitBreakerConfig {
        self.config
    }

    /// Returns true if calls may go through, re-arming a tripped breaker
    /// whose timeout has elapsed.
    pub fn is_on(&self) -> bool {
        let mut state = self.state.lock();
        match state.tripped_at {
            None => true,
            Some(tripped_at) if tripped_at.elapsed() >= self.config.timeout => {
                self.reset(&mut state);
                info!(circuit_breaker = %self.name, "circuit breaker re-armed after timeout");
                true
            }
            Some(_) => false,
        }
    }

    pub fn success(&self) {
        let mut state = self.state.lock();
        if state.tripped_at.is_none() {
            state.countdown = self.config.threshold;
        }
    }

    /// Counts a failure, tripping the breaker once the threshold is reached.
    pub fn failure(&self) {
        let mut state = self.state.lock();
        if state.tripped_at.is_some() {
            return;
        }
        state.countdown = state.countdown.saturating_sub(1);
        if state.countdown == 0 {
            state.tripped_at = Some(Instant::now());
            info!(
                circuit_breaker = %self.name,
                threshold = self.config.threshold,
                "circuit breaker tripped"
            );
        }
    }

    pub fn trip(&self) {
        let mut state = self.state.lock();
        if state.tripped_at.is_none() {
            state.countdown = 0;
            state.tripped_at = Some(Instant::now());
            info!(circuit_breaker = %self.name, "circuit breaker tripped manually");
        }
    }

    pub fn turn_on(&self) {
        let mut state = self.state.lock();
        if state.tripped_at.is_some() {
            self.reset(&mut state);
            info!(circuit_breaker = %self.name, "circuit breaker turned on");
        }
    }

    fn reset(&self, state: &mut BreakerState) {
        state.countdown = self.config.threshold;
        state.tripped_at = None;
    }
}
