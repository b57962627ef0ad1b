// crates/merge-pilot-core/src/core/time.rs
// ============================================================================
// Module: Merge Pilot Time Model
// Description: Explicit time values for gate results, audits, and windows.
// Purpose: Keep plan replay deterministic across clock implementations.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Gate results, override records, and breaker windows carry explicit time
//! values instead of reading the wall clock, so a plan replayed with
//! deterministic capabilities produces byte-identical artifacts. The host
//! picks the scale through its [`Clock`]: wall-clock `UnixMillis` in
//! production, `Logical` ticks under test clocks. The engine only orders
//! and subtracts these values; it never interprets them as calendar time.
//!
//! [`Clock`]: crate::interfaces::Clock

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Explicit timestamp attached to run records.
///
/// # Invariants
/// - Values come from the injected clock; the engine never reads wall-clock
///   time directly.
/// - A single run uses one variant throughout; mixing scales makes window
///   arithmetic meaningless, and no validation guards against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Timestamp {
    /// Unix epoch milliseconds, produced by the system clock.
    UnixMillis(i64),
    /// Monotonic logical ticks, produced by deterministic test clocks.
    Logical(u64),
}

impl Timestamp {
    /// Projects the timestamp onto a single millisecond axis.
    ///
    /// Rolling failure windows and reset timeouts subtract timestamps, so
    /// they need one ordered scale regardless of which clock the host
    /// injected. Logical ticks are treated as milliseconds, matching how
    /// [`ManualClock`] advances one tick per slept millisecond; logical
    /// values beyond the axis saturate instead of wrapping.
    ///
    /// [`ManualClock`]: crate::runtime::clock::ManualClock
    #[must_use]
    pub fn millis_scale(&self) -> i64 {
        match self {
            Self::UnixMillis(value) => *value,
            Self::Logical(value) => i64::try_from(*value).unwrap_or(i64::MAX),
        }
    }
}
