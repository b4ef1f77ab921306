// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Three-state circuit breaker gating a fallible capability, with a
//! rolling latency window on top of the usual failure counter. The latency
//! ring only trips the breaker once it holds at least 10 samples, avoiding
//! a false trip off a cold-start outlier.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::clock::Clock;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub reset_timeout: Duration,
    pub latency_threshold_ms: u64,
    pub latency_ring_capacity: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(30),
            latency_threshold_ms: 500,
            latency_ring_capacity: 100,
        }
    }
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure: Option<Instant>,
    latency_ring: VecDeque<u64>,
}

/// A named, independently-configured circuit breaker instance.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

/// Error returned when a gated call is refused or fails.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CircuitError<E> {
    #[error("circuit open")]
    Open,
    #[error("call failed: {0}")]
    CallFailed(E),
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            config,
            clock,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                last_failure: None,
                latency_ring: VecDeque::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, lazily transitioning Open → HalfOpen if the reset
    /// timeout has elapsed since the last recorded failure.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.maybe_reset(&mut inner);
        inner.state
    }

    fn maybe_reset(&self, inner: &mut Inner) {
        if inner.state == CircuitState::Open {
            let elapsed_ok = match inner.last_failure {
                None => true,
                Some(last) => self.clock.now().duration_since(last) >= self.config.reset_timeout,
            };
            if elapsed_ok {
                inner.state = CircuitState::HalfOpen;
                inner.consecutive_successes = 0;
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.state() != CircuitState::Open
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        self.maybe_reset(&mut inner);
        match inner.state {
            CircuitState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.consecutive_successes = 0;
                }
            }
            _ => {
                inner.consecutive_failures = 0;
            }
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        self.maybe_reset(&mut inner);
        inner.consecutive_failures += 1;
        inner.last_failure = Some(self.clock.now());
        if inner.state == CircuitState::HalfOpen {
            self.trip_open(&mut inner);
        } else if inner.consecutive_failures >= self.config.failure_threshold {
            self.trip_open(&mut inner);
        }
    }

    fn trip_open(&self, inner: &mut Inner) {
        if inner.state != CircuitState::Open {
            tracing::warn!(circuit = %self.name, "circuit breaker tripped open");
        }
        inner.state = CircuitState::Open;
        inner.last_failure = Some(self.clock.now());
    }

    /// Append a latency sample (drop-oldest once the ring is full). If the
    /// ring holds at least 10 samples and the mean exceeds the latency
    /// threshold, that is treated as a failure.
    pub fn record_latency(&self, latency_ms: u64) {
        let mut inner = self.inner.lock();
        self.maybe_reset(&mut inner);
        if inner.latency_ring.len() >= self.config.latency_ring_capacity {
            inner.latency_ring.pop_front();
        }
        inner.latency_ring.push_back(latency_ms);

        if latency_ms > self.config.latency_threshold_ms {
            // A single slow call trips the breaker outright, independent of
            // the consecutive-failure counter.
            inner.consecutive_failures += 1;
            inner.last_failure = Some(self.clock.now());
            self.trip_open(&mut inner);
            return;
        }

        if inner.latency_ring.len() >= 10 {
            let mean: u64 =
                inner.latency_ring.iter().sum::<u64>() / inner.latency_ring.len() as u64;
            if mean > self.config.latency_threshold_ms {
                inner.consecutive_failures += 1;
                inner.last_failure = Some(self.clock.now());
                self.trip_open(&mut inner);
            }
        }
    }

    /// Manual override: forces Open regardless of the failure/latency
    /// counters. Used by the `/ml/circuit-breaker/toggle` operator escape
    /// hatch, the mirror image of `reset()`.
    pub fn force_open(&self) {
        let mut inner = self.inner.lock();
        self.trip_open(&mut inner);
    }

    /// Manual reset: forces Closed and clears all counters/the latency ring.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
        inner.last_failure = None;
        inner.latency_ring.clear();
    }

    /// Gate a synchronous call: fail fast if Open, else time the call and
    /// record success/failure + latency.
    pub fn execute<T, E>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<T, CircuitError<E>> {
        if !self.is_available() {
            return Err(CircuitError::Open);
        }
        let start = self.clock.now();
        match f() {
            Ok(value) => {
                let elapsed_ms = self.clock.now().duration_since(start).as_millis() as u64;
                self.record_latency(elapsed_ms);
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(CircuitError::CallFailed(e))
            }
        }
    }

    /// Async counterpart of `execute`.
    pub async fn execute_async<T, E, Fut>(
        &self,
        f: impl FnOnce() -> Fut,
    ) -> Result<T, CircuitError<E>>
    where
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if !self.is_available() {
            return Err(CircuitError::Open);
        }
        let start = self.clock.now();
        match f().await {
            Ok(value) => {
                let elapsed_ms = self.clock.now().duration_since(start).as_millis() as u64;
                self.record_latency(elapsed_ms);
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                self.record_failure();
                Err(CircuitError::CallFailed(e))
            }
        }
    }

    pub fn stats(&self) -> CircuitStats {
        let inner = self.inner.lock();
        CircuitStats {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            consecutive_successes: inner.consecutive_successes,
            latency_samples: inner.latency_ring.len(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CircuitStats {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub latency_samples: usize,
}
