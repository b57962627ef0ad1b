// crates/merge-pilot-core/src/core/status.rs
// ============================================================================
// Module: Merge Pilot Execution Records
// Description: Gate and item result records with closed status enums.
// Purpose: Capture deterministic run evolution for reporting and audit.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! Execution records are the append-oriented facts of a run: one
//! [`GateResult`] per gate attempt set, one [`NodeResult`] per item, and one
//! [`OverrideRecord`] per accepted admin override. Statuses are closed enums
//! so every consumer dispatches exhaustively.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ActorId;
use crate::core::identifiers::GateName;
use crate::core::identifiers::ItemName;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Status Enums
// ============================================================================

/// Outcome of one gate attempt set.
///
/// # Invariants
/// - Variants are stable for serialization and report matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    /// Gate completed with exit code zero.
    Pass,
    /// Gate completed with a non-zero exit code or exhausted retries.
    Fail,
    /// Gate was not run because an upstream failure blocked the item.
    Blocked,
    /// Gate was never dispatched (cancellation or non-local runtime).
    Skipped,
    /// Gate is dispatched and has not reached a terminal outcome.
    Retrying,
}

/// Aggregate status of one plan item.
///
/// # Invariants
/// - `Pass` requires every required or blocking gate to pass and every
///   dependency to pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Every gate completed and none of them blocked the item.
    Pass,
    /// A required or blocking gate failed.
    Fail,
    /// A dependency failed or was itself blocked.
    Blocked,
    /// Item was never dispatched or was cancelled before dispatch.
    Skipped,
    /// Item is dispatched and gates are still running.
    Retrying,
}

impl NodeStatus {
    /// Returns true for statuses that end an item's participation in the run.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Pass | Self::Fail | Self::Blocked | Self::Skipped)
    }
}

// ============================================================================
// SECTION: Gate Results
// ============================================================================

/// Outcome of one gate attempt set.
///
/// # Invariants
/// - `attempts >= 1` and never exceeds the policy attempt bound for the gate.
/// - `artifacts` paths are sorted lexicographically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResult {
    /// Gate name.
    pub gate: GateName,
    /// Final status across all attempts.
    pub status: GateStatus,
    /// Exit code of the last attempt, when the subprocess ran.
    pub exit_code: Option<i32>,
    /// Wall-clock duration of the last attempt, in milliseconds.
    pub duration_ms: u64,
    /// Captured stdout of the last attempt (possibly truncated).
    pub stdout: String,
    /// Captured stderr of the last attempt (possibly truncated).
    pub stderr: String,
    /// Resolved artifact paths relative to the gate working directory.
    pub artifacts: Vec<String>,
    /// Number of attempts performed (`>= 1`).
    pub attempts: u32,
    /// Timestamp of the last attempt.
    pub last_attempt: Timestamp,
}

// ============================================================================
// SECTION: Node Results
// ============================================================================

/// Per-item aggregate result.
///
/// # Invariants
/// - `gates` holds at most one result per gate, in plan-declared order.
/// - `blocked_by` is non-empty exactly when `status` is `Blocked`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
    /// Item name.
    pub name: ItemName,
    /// Aggregate item status.
    pub status: NodeStatus,
    /// Gate results in plan-declared order.
    pub gates: Vec<GateResult>,
    /// Upstream items that forced this item to `Blocked`.
    pub blocked_by: BTreeSet<ItemName>,
    /// Whether the eligibility evaluator cleared this item for merge.
    pub eligible_for_merge: bool,
    /// Reason the item was skipped, when it never reached dispatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl NodeResult {
    /// Creates the initial record for an item before dispatch.
    #[must_use]
    pub const fn initial(name: ItemName) -> Self {
        Self {
            name,
            status: NodeStatus::Skipped,
            gates: Vec::new(),
            blocked_by: BTreeSet::new(),
            eligible_for_merge: false,
            skip_reason: None,
        }
    }

    /// Returns the result for a gate, when recorded.
    #[must_use]
    pub fn gate(&self, name: &GateName) -> Option<&GateResult> {
        self.gates.iter().find(|result| &result.gate == name)
    }
}

// ============================================================================
// SECTION: Override Records
// ============================================================================

/// Audit entry for an accepted admin override.
///
/// # Invariants
/// - Records are append-only; acceptance rules are enforced before creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideRecord {
    /// Item the override applies to.
    pub item_name: ItemName,
    /// Actor who requested the override.
    pub actor: ActorId,
    /// Stated reason (possibly empty when policy does not require one).
    pub reason: String,
    /// Acceptance timestamp.
    pub timestamp: Timestamp,
}
