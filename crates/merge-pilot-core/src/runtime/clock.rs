// crates/merge-pilot-core/src/runtime/clock.rs
// ============================================================================
// Module: Merge Pilot Clock Implementations
// Description: Wall-clock and deterministic logical clock capabilities.
// Purpose: Provide the Clock capability for production and for tests.
// Dependencies: crate::{core::time, interfaces}, tokio
// ============================================================================

//! ## Overview
//! [`SystemClock`] reads the host wall clock and sleeps for real; it is the
//! production capability. [`ManualClock`] advances a logical counter instead
//! of sleeping, which makes retry and breaker behavior instant and
//! replayable in tests and local demos.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;

use crate::core::time::Timestamp;
use crate::interfaces::Clock;

// ============================================================================
// SECTION: System Clock
// ============================================================================

/// Wall-clock capability backed by the host clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    /// Creates a new system clock.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Timestamp::UnixMillis(millis)
    }

    async fn sleep(&self, duration_ms: u64) {
        tokio::time::sleep(Duration::from_millis(duration_ms)).await;
    }
}

// ============================================================================
// SECTION: Manual Clock
// ============================================================================

/// Deterministic logical clock for tests and local demos.
///
/// `sleep` advances the logical counter and returns immediately; `now`
/// reports the counter as [`Timestamp::Logical`]. Not intended for
/// production use.
#[derive(Debug, Default)]
pub struct ManualClock {
    /// Logical time counter, in milliseconds.
    now_ms: AtomicU64,
}

impl ManualClock {
    /// Creates a manual clock starting at logical zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            now_ms: AtomicU64::new(0),
        }
    }

    /// Advances the logical counter without sleeping.
    pub fn advance(&self, duration_ms: u64) {
        self.now_ms.fetch_add(duration_ms, Ordering::SeqCst);
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::Logical(self.now_ms.load(Ordering::SeqCst))
    }

    async fn sleep(&self, duration_ms: u64) {
        self.advance(duration_ms);
        tokio::task::yield_now().await;
    }
}
