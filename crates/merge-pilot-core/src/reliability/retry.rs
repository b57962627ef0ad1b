// crates/merge-pilot-core/src/reliability/retry.rs
// ============================================================================
// Module: Merge Pilot Retry Engine
// Description: Bounded retry with exponential backoff, jitter, and timeouts.
// Purpose: Re-run transient failures without hiding permanent ones.
// Dependencies: crate::{interfaces, reliability::classify, runtime::cancel}
// ============================================================================

//! ## Overview
//! The retry engine wraps an async operation and re-invokes it while its
//! failures classify as retryable, up to a configured attempt bound. Delays
//! follow `min(initial * multiplier^(n-1), max)` with optional uniform
//! jitter in `[0, 0.1 * delay]`. All sleeping goes through the [`Clock`]
//! capability so tests run instantly, and cancellation is observed before
//! every sleep and every re-invocation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;

use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::interfaces::Clock;
use crate::reliability::classify::classify;
use crate::runtime::cancel::CancelToken;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Retry engine configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum attempts, including the first (`>= 1`).
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Multiplier applied per attempt.
    pub backoff_multiplier: f64,
    /// Whether to add uniform jitter in `[0, 0.1 * delay]`.
    pub jitter: bool,
    /// Optional per-attempt wall-clock timeout, in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
            timeout_ms: None,
        }
    }
}

impl RetryConfig {
    /// Computes the pre-jitter delay before attempt `n + 1` (1-indexed `n`).
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss,
        reason = "The scaled delay is clamped to max_delay_ms before the cast."
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1);
        let scaled =
            (self.initial_delay_ms as f64) * self.backoff_multiplier.powi(exponent.min(63) as i32);
        if scaled.is_finite() && scaled < self.max_delay_ms as f64 {
            scaled.max(0.0) as u64
        } else {
            self.max_delay_ms
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failure of one attempt inside the retry loop.
#[derive(Debug, Error)]
pub enum AttemptFailure<E: StdError + Send + Sync + 'static> {
    /// The wrapped operation returned an error.
    #[error(transparent)]
    Operation(E),
    /// The attempt exceeded the per-attempt timeout.
    #[error("attempt timed out after {timeout_ms} ms")]
    Timeout {
        /// Configured per-attempt timeout.
        timeout_ms: u64,
    },
}

/// Terminal retry-loop outcomes.
#[derive(Debug, Error)]
pub enum RetryError<E: StdError + Send + Sync + 'static> {
    /// Every attempt failed with a retryable error.
    #[error("`{context}` failed after {attempts} attempt(s)")]
    Exhausted {
        /// Operation context label.
        context: String,
        /// Attempts performed.
        attempts: u32,
        /// Failure of the final attempt.
        #[source]
        source: AttemptFailure<E>,
    },
    /// An attempt failed with a non-retryable classification.
    #[error("`{context}` failed with a non-retryable error ({code})")]
    NonRetryable {
        /// Operation context label.
        context: String,
        /// Attempts performed.
        attempts: u32,
        /// Stable classification code.
        code: String,
        /// Failure that stopped the loop.
        #[source]
        source: AttemptFailure<E>,
    },
    /// The cancellation signal fired.
    #[error("`{context}` cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// Operation context label.
        context: String,
        /// Attempts performed before cancellation.
        attempts: u32,
    },
}

impl<E: StdError + Send + Sync + 'static> RetryError<E> {
    /// Returns the number of attempts the loop performed.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted {
                attempts, ..
            }
            | Self::NonRetryable {
                attempts, ..
            }
            | Self::Cancelled {
                attempts, ..
            } => *attempts,
        }
    }
}

// ============================================================================
// SECTION: Retry Engine
// ============================================================================

/// Retry engine over an injected clock.
pub struct RetryEngine {
    /// Retry configuration.
    config: RetryConfig,
    /// Clock used for delays and per-attempt timers.
    clock: Arc<dyn Clock>,
}

impl RetryEngine {
    /// Creates a new retry engine.
    #[must_use]
    pub fn new(config: RetryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs an operation with retry, backoff, and per-attempt timeouts.
    ///
    /// The operation receives the 1-indexed attempt number. Retries stop on
    /// a non-retryable classification, on attempt exhaustion, or on
    /// cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError`] describing why the loop terminated.
    pub async fn run<T, E, F, Fut>(
        &self,
        context: &str,
        cancel: &CancelToken,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        E: StdError + Send + Sync + 'static,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0_u32;

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled {
                    context: context.to_string(),
                    attempts: attempt,
                });
            }

            attempt += 1;
            let failure = match self.attempt_once(&mut operation, attempt).await {
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };

            let (retryable, code) = match &failure {
                AttemptFailure::Timeout {
                    ..
                } => (true, "TIMEOUT_ERROR".to_string()),
                AttemptFailure::Operation(err) => {
                    let classification = classify(err);
                    (classification.retryable, classification.code)
                }
            };

            if !retryable {
                return Err(RetryError::NonRetryable {
                    context: context.to_string(),
                    attempts: attempt,
                    code,
                    source: failure,
                });
            }
            if attempt >= self.config.max_attempts {
                return Err(RetryError::Exhausted {
                    context: context.to_string(),
                    attempts: attempt,
                    source: failure,
                });
            }

            let delay_ms = self.jittered_delay(attempt);
            debug!(context, attempt, delay_ms, code = %code, "retrying after transient failure");
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled {
                    context: context.to_string(),
                    attempts: attempt,
                });
            }
            if delay_ms > 0 {
                self.clock.sleep(delay_ms).await;
            }
        }
    }

    /// Runs one attempt, racing it against the per-attempt timer.
    async fn attempt_once<T, E, F, Fut>(
        &self,
        operation: &mut F,
        attempt: u32,
    ) -> Result<T, AttemptFailure<E>>
    where
        E: StdError + Send + Sync + 'static,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.config.timeout_ms {
            None => operation(attempt).await.map_err(AttemptFailure::Operation),
            Some(timeout_ms) => {
                // Biased so a ready operation always beats the timer; this
                // keeps runs with instant test clocks deterministic.
                tokio::select! {
                    biased;
                    result = operation(attempt) => result.map_err(AttemptFailure::Operation),
                    () = self.clock.sleep(timeout_ms) => Err(AttemptFailure::Timeout {
                        timeout_ms,
                    }),
                }
            }
        }
    }

    /// Applies jitter to the configured delay for an attempt.
    fn jittered_delay(&self, attempt: u32) -> u64 {
        let base = self.config.delay_for_attempt(attempt);
        if !self.config.jitter || base == 0 {
            return base;
        }
        let spread = base / 10;
        if spread == 0 {
            return base;
        }
        base + rand::thread_rng().gen_range(0..=spread)
    }
}
