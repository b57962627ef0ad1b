// crates/merge-pilot-core/src/reliability/breaker.rs
// ============================================================================
// Module: Merge Pilot Circuit Breaker
// Description: Closed/Open/HalfOpen state machine over a rolling window.
// Purpose: Fail fast against a degraded downstream instead of piling on.
// Dependencies: crate::core::time, thiserror
// ============================================================================

//! ## Overview
//! One breaker guards one named downstream. Failures inside the rolling
//! window trip the breaker Closed to Open; after the reset timeout the first
//! call probes HalfOpen; consecutive successes close it again, any HalfOpen
//! failure reopens it. While Open, calls fail fast with a `circuit open`
//! error carrying the remaining reset time. The breaker never retries by
//! itself; the retry engine composes it when desired.
//!
//! Time is supplied by the caller as explicit [`Timestamp`] values so the
//! state machine is deterministic under test.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Failures within the rolling window that trip the breaker.
    pub failure_threshold: u32,
    /// Consecutive HalfOpen successes required to close.
    pub success_threshold: u32,
    /// Time Open before the first HalfOpen probe, in milliseconds.
    pub reset_timeout_ms: u64,
    /// Width of the rolling failure window, in milliseconds.
    pub rolling_window_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout_ms: 30_000,
            rolling_window_ms: 60_000,
        }
    }
}

// ============================================================================
// SECTION: States and Errors
// ============================================================================

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls flow; failures are counted in the rolling window.
    Closed,
    /// Calls fail fast until the reset timeout elapses.
    Open,
    /// Probe state; successes close, any failure reopens.
    HalfOpen,
}

/// Fail-fast error raised while the breaker is Open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit open for `{downstream}`; retry in {time_until_reset_ms} ms")]
pub struct CircuitOpenError {
    /// Guarded downstream name.
    pub downstream: String,
    /// Milliseconds until the first HalfOpen probe is admitted.
    pub time_until_reset_ms: u64,
}

/// Internal mutex-poisoning failure.
#[derive(Debug, Error)]
#[error("circuit breaker mutex poisoned for `{downstream}`")]
pub struct BreakerPoisoned {
    /// Guarded downstream name.
    pub downstream: String,
}

/// Errors returned by breaker admission.
#[derive(Debug, Error)]
pub enum BreakerError {
    /// The breaker is Open and the call was rejected.
    #[error(transparent)]
    Open(#[from] CircuitOpenError),
    /// The breaker state was poisoned by a panicking holder.
    #[error(transparent)]
    Poisoned(#[from] BreakerPoisoned),
}

// ============================================================================
// SECTION: Circuit Breaker
// ============================================================================

/// Mutable breaker state behind the mutex.
#[derive(Debug)]
struct BreakerInner {
    /// Current state.
    state: BreakerState,
    /// Failure timestamps within the rolling window, in milliseconds.
    failures: VecDeque<i64>,
    /// Consecutive successes observed in HalfOpen.
    half_open_successes: u32,
    /// Timestamp of the most recent failure, in milliseconds.
    last_failure_ms: Option<i64>,
}

/// Circuit breaker scoped to one named downstream.
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Guarded downstream name.
    downstream: String,
    /// Breaker configuration.
    config: BreakerConfig,
    /// Mutable state under a single mutex.
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a breaker for a named downstream.
    #[must_use]
    pub fn new(downstream: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            downstream: downstream.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failures: VecDeque::new(),
                half_open_successes: 0,
                last_failure_ms: None,
            }),
        }
    }

    /// Returns the guarded downstream name.
    #[must_use]
    pub fn downstream(&self) -> &str {
        &self.downstream
    }

    /// Returns the current state.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerPoisoned`] when the state mutex is poisoned.
    pub fn state(&self) -> Result<BreakerState, BreakerPoisoned> {
        Ok(self.lock()?.state)
    }

    /// Admits or rejects a call at the given time.
    ///
    /// While Open, the first call after the reset timeout flips the breaker
    /// to HalfOpen and is admitted as the probe.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::Open`] when the call is rejected.
    pub fn admit(&self, now: Timestamp) -> Result<(), BreakerError> {
        let now_ms = now.millis_scale();
        let mut inner = self.lock()?;
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
            BreakerState::Open => {
                let last = inner.last_failure_ms.unwrap_or(now_ms);
                let elapsed = now_ms.saturating_sub(last).max(0);
                let reset = i64::try_from(self.config.reset_timeout_ms).unwrap_or(i64::MAX);
                if elapsed >= reset {
                    debug!(downstream = %self.downstream, "circuit breaker half-open probe");
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_successes = 0;
                    Ok(())
                } else {
                    let remaining = u64::try_from(reset - elapsed).unwrap_or(u64::MAX);
                    Err(CircuitOpenError {
                        downstream: self.downstream.clone(),
                        time_until_reset_ms: remaining,
                    }
                    .into())
                }
            }
        }
    }

    /// Records a successful call.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerPoisoned`] when the state mutex is poisoned.
    pub fn record_success(&self, _now: Timestamp) -> Result<(), BreakerPoisoned> {
        let mut inner = self.lock()?;
        match inner.state {
            BreakerState::Closed => {
                inner.failures.clear();
            }
            BreakerState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.success_threshold {
                    debug!(downstream = %self.downstream, "circuit breaker closed");
                    inner.state = BreakerState::Closed;
                    inner.failures.clear();
                    inner.half_open_successes = 0;
                    inner.last_failure_ms = None;
                }
            }
            BreakerState::Open => {}
        }
        Ok(())
    }

    /// Records a failed call.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerPoisoned`] when the state mutex is poisoned.
    pub fn record_failure(&self, now: Timestamp) -> Result<(), BreakerPoisoned> {
        let now_ms = now.millis_scale();
        let mut inner = self.lock()?;
        inner.last_failure_ms = Some(now_ms);
        match inner.state {
            BreakerState::Closed => {
                let window = i64::try_from(self.config.rolling_window_ms).unwrap_or(i64::MAX);
                inner.failures.push_back(now_ms);
                while let Some(oldest) = inner.failures.front() {
                    if now_ms.saturating_sub(*oldest) > window {
                        inner.failures.pop_front();
                    } else {
                        break;
                    }
                }
                let threshold = usize::try_from(self.config.failure_threshold).unwrap_or(usize::MAX);
                if inner.failures.len() >= threshold {
                    debug!(downstream = %self.downstream, "circuit breaker opened");
                    inner.state = BreakerState::Open;
                }
            }
            BreakerState::HalfOpen => {
                debug!(downstream = %self.downstream, "circuit breaker reopened");
                inner.state = BreakerState::Open;
                inner.half_open_successes = 0;
            }
            BreakerState::Open => {}
        }
        Ok(())
    }

    /// Locks the breaker state, mapping poisoning to a typed error.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BreakerInner>, BreakerPoisoned> {
        self.inner.lock().map_err(|_| BreakerPoisoned {
            downstream: self.downstream.clone(),
        })
    }
}
