// crates/merge-pilot-core/src/core/policy.rs
// ============================================================================
// Module: Merge Pilot Policy Model
// Description: Plan-level execution rules for gates, retries, and overrides.
// Purpose: Define the policy document with documented defaults.
// Dependencies: crate::core::identifiers, serde
// ============================================================================

//! ## Overview
//! The policy controls which gates gate merging (required / optional /
//! blocking), how wide the worker pool runs, which gates retry and how, and
//! whether admin overrides are admissible. A missing policy in the plan
//! document resolves to [`Policy::default`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ActorId;
use crate::core::identifiers::GateName;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Plan-level execution policy.
///
/// # Invariants
/// - `max_workers >= 1`.
/// - Retry specs satisfy `max_attempts >= 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Policy {
    /// Gates that must pass for an item to be eligible.
    #[serde(default)]
    pub required_gates: BTreeSet<GateName>,
    /// Gates whose failure never blocks eligibility.
    #[serde(default)]
    pub optional_gates: BTreeSet<GateName>,
    /// Gates whose failure blocks even when not required.
    #[serde(default)]
    pub block_on: BTreeSet<GateName>,
    /// Maximum number of items executing concurrently.
    #[serde(default = "default_max_workers")]
    pub max_workers: u32,
    /// Per-gate retry configuration.
    #[serde(default)]
    pub retries: BTreeMap<GateName, RetrySpec>,
    /// Override admissibility configuration.
    #[serde(default)]
    pub overrides: OverridePolicy,
    /// Merge decision rule.
    #[serde(default)]
    pub merge_rule: MergeRule,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            required_gates: BTreeSet::new(),
            optional_gates: BTreeSet::new(),
            block_on: BTreeSet::new(),
            max_workers: default_max_workers(),
            retries: BTreeMap::new(),
            overrides: OverridePolicy::default(),
            merge_rule: MergeRule::default(),
        }
    }
}

impl Policy {
    /// Returns the retry spec for a gate, when configured.
    #[must_use]
    pub fn retry_for(&self, gate: &GateName) -> Option<&RetrySpec> {
        self.retries.get(gate)
    }

    /// Returns the attempt bound for a gate (`1` when no retry is configured).
    #[must_use]
    pub fn max_attempts_for(&self, gate: &GateName) -> u32 {
        self.retry_for(gate).map_or(1, |spec| spec.max_attempts)
    }

    /// Returns true when a failure of this gate blocks the item.
    #[must_use]
    pub fn gate_blocks_item(&self, gate: &GateName) -> bool {
        self.required_gates.contains(gate) || self.block_on.contains(gate)
    }
}

/// Default worker pool width.
const fn default_max_workers() -> u32 {
    1
}

// ============================================================================
// SECTION: Retry Specification
// ============================================================================

/// Retry configuration for one gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RetrySpec {
    /// Maximum attempts, including the first (`>= 1`).
    pub max_attempts: u32,
    /// Base backoff between attempts, in seconds (`>= 0`).
    #[serde(default)]
    pub backoff_seconds: u64,
}

// ============================================================================
// SECTION: Overrides
// ============================================================================

/// Override admissibility configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OverridePolicy {
    /// Admin-green override configuration; absent means overrides are
    /// rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_green: Option<AdminGreenSpec>,
}

/// Admin-green override rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AdminGreenSpec {
    /// Actors permitted to override; absent permits any actor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_users: Option<BTreeSet<ActorId>>,
    /// Whether a non-blank reason is mandatory.
    #[serde(default)]
    pub require_reason: bool,
}

// ============================================================================
// SECTION: Merge Rule
// ============================================================================

/// Merge decision rule applied by the eligibility evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeRule {
    /// Every required gate must pass and every dependency must be eligible.
    #[default]
    StrictRequired,
}
