// crates/merge-pilot-core/tests/retry.rs
// ============================================================================
// Module: Retry Engine Tests
// Description: Backoff, classification, timeout, and cancellation behavior.
// ============================================================================
//! ## Overview
//! Validates the retry loop against a deterministic logical clock: attempt
//! bounds, the delay formula, non-retryable short-circuits, per-attempt
//! timeouts, and cancellation.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use merge_pilot_core::CancelToken;
use merge_pilot_core::ManualClock;
use merge_pilot_core::RetryConfig;
use merge_pilot_core::RetryEngine;
use merge_pilot_core::RetryError;
use merge_pilot_core::Timestamp;
use merge_pilot_core::interfaces::Clock;

/// Text error used to drive classification.
#[derive(Debug)]
struct TextError(&'static str);

impl fmt::Display for TextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for TextError {}

/// Builds a jitter-free config for deterministic assertions.
const fn config(max_attempts: u32, initial_delay_ms: u64) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay_ms,
        max_delay_ms: 30_000,
        backoff_multiplier: 2.0,
        jitter: false,
        timeout_ms: None,
    }
}

#[test]
fn delay_formula_doubles_and_caps() {
    let config = RetryConfig {
        max_attempts: 10,
        initial_delay_ms: 100,
        max_delay_ms: 500,
        backoff_multiplier: 2.0,
        jitter: false,
        timeout_ms: None,
    };
    assert_eq!(config.delay_for_attempt(1), 100);
    assert_eq!(config.delay_for_attempt(2), 200);
    assert_eq!(config.delay_for_attempt(3), 400);
    assert_eq!(config.delay_for_attempt(4), 500);
    assert_eq!(config.delay_for_attempt(9), 500);
}

#[tokio::test]
async fn succeeds_without_retrying() -> Result<(), Box<dyn std::error::Error>> {
    let clock = Arc::new(ManualClock::new());
    let engine = RetryEngine::new(config(3, 1_000), clock.clone());
    let cancel = CancelToken::new();

    let value = engine
        .run("op", &cancel, |_attempt| async { Ok::<_, TextError>(42_u32) })
        .await?;

    assert_eq!(value, 42);
    assert_eq!(clock.now(), Timestamp::Logical(0));
    Ok(())
}

#[tokio::test]
async fn transient_failures_retry_until_success() -> Result<(), Box<dyn std::error::Error>> {
    let clock = Arc::new(ManualClock::new());
    let engine = RetryEngine::new(config(5, 100), clock.clone());
    let cancel = CancelToken::new();
    let attempts = AtomicU32::new(0);

    let value = engine
        .run("op", &cancel, |attempt| {
            attempts.store(attempt, Ordering::SeqCst);
            async move {
                if attempt < 3 { Err(TextError("ETIMEDOUT")) } else { Ok(attempt) }
            }
        })
        .await?;

    assert_eq!(value, 3);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    // Two sleeps: 100 ms then 200 ms.
    assert_eq!(clock.now(), Timestamp::Logical(300));
    Ok(())
}

#[tokio::test]
async fn max_attempts_one_disables_retry() {
    let clock = Arc::new(ManualClock::new());
    let engine = RetryEngine::new(config(1, 1_000), clock.clone());
    let cancel = CancelToken::new();

    let result: Result<u32, _> = engine
        .run("op", &cancel, |_attempt| async { Err::<u32, _>(TextError("network down")) })
        .await;

    let Err(RetryError::Exhausted {
        attempts, ..
    }) = result
    else {
        panic!("expected exhaustion");
    };
    assert_eq!(attempts, 1);
    assert_eq!(clock.now(), Timestamp::Logical(0));
}

#[tokio::test]
async fn non_retryable_errors_stop_immediately() {
    let clock = Arc::new(ManualClock::new());
    let engine = RetryEngine::new(config(5, 100), clock);
    let cancel = CancelToken::new();
    let attempts = AtomicU32::new(0);

    let result: Result<u32, _> = engine
        .run("op", &cancel, |attempt| {
            attempts.store(attempt, Ordering::SeqCst);
            async { Err::<u32, _>(TextError("401 unauthorized")) }
        })
        .await;

    let Err(RetryError::NonRetryable {
        attempts: reported,
        code,
        ..
    }) = result
    else {
        panic!("expected non-retryable stop");
    };
    assert_eq!(reported, 1);
    assert_eq!(code, "AUTH_ERROR");
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn per_attempt_timeout_raises_timeout_failures() {
    let clock = Arc::new(ManualClock::new());
    let engine_config = RetryConfig {
        timeout_ms: Some(50),
        ..config(3, 10)
    };
    let engine = RetryEngine::new(engine_config, clock);
    let cancel = CancelToken::new();

    let result: Result<u32, _> = engine
        .run("op", &cancel, |_attempt| async {
            std::future::pending::<()>().await;
            Ok::<u32, TextError>(0)
        })
        .await;

    let Err(RetryError::Exhausted {
        attempts, ..
    }) = result
    else {
        panic!("expected exhaustion through timeouts");
    };
    assert_eq!(attempts, 3);
}

#[tokio::test]
async fn cancellation_stops_before_invocation() {
    let clock = Arc::new(ManualClock::new());
    let engine = RetryEngine::new(config(3, 100), clock);
    let cancel = CancelToken::new();
    cancel.fire();

    let result: Result<u32, _> = engine
        .run("op", &cancel, |_attempt| async { Ok::<_, TextError>(1) })
        .await;

    assert!(matches!(result, Err(RetryError::Cancelled { attempts: 0, .. })));
}
