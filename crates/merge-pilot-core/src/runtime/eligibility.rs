// crates/merge-pilot-core/src/runtime/eligibility.rs
// ============================================================================
// Module: Merge Pilot Eligibility Evaluator
// Description: Policy-based merge decisions with auditable admin overrides.
// Purpose: Decide per-item merge eligibility over an execution snapshot.
// Dependencies: crate::{core, runtime::state}, serde, thiserror
// ============================================================================

//! ## Overview
//! Eligibility is a pure computation over an execution-state snapshot and
//! the plan policy: an item is eligible when its declared required gates
//! passed, no blocking gate failed, and every dependency is itself eligible.
//! Accepted admin overrides are stored as side records (never as synthetic
//! gate passes) and flip subsequent evaluations for the overridden item.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::ActorId;
use crate::core::GateName;
use crate::core::GateStatus;
use crate::core::ItemName;
use crate::core::NodeStatus;
use crate::core::OverrideRecord;
use crate::core::Plan;
use crate::core::Policy;
use crate::core::Timestamp;
use crate::runtime::state::StateSnapshot;

// ============================================================================
// SECTION: Decisions
// ============================================================================

/// Merge decision for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityDecision {
    /// Whether the item may merge.
    pub eligible: bool,
    /// Short human reason; on failure, the first missing condition.
    pub reason: String,
    /// True when a policy-admissible override could flip the decision.
    pub requires_override: bool,
    /// Item names responsible when blocked transitively.
    pub blocked_by: BTreeSet<ItemName>,
}

/// Partition of all items by decision outcome.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilitySummary {
    /// Items cleared for merge.
    pub eligible: Vec<ItemName>,
    /// Items that failed gates.
    pub failed: Vec<ItemName>,
    /// Items blocked by upstream failures.
    pub blocked: Vec<ItemName>,
    /// Items never executed to completion.
    pub skipped: Vec<ItemName>,
}

/// Full evaluation output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityReport {
    /// Decision per item.
    pub decisions: BTreeMap<ItemName, EligibilityDecision>,
    /// Summary partition.
    pub summary: EligibilitySummary,
}

// ============================================================================
// SECTION: Override Errors
// ============================================================================

/// Override request rejections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverrideError {
    /// The policy does not configure admin-green overrides.
    #[error("admin-green overrides are not configured by policy")]
    NotConfigured,
    /// The actor is not in the allowed-users set.
    #[error("actor `{0}` is not permitted to override")]
    ActorNotAllowed(String),
    /// The policy requires a non-blank reason.
    #[error("override reason is required by policy")]
    ReasonRequired,
}

// ============================================================================
// SECTION: Evaluator
// ============================================================================

/// Policy-driven eligibility evaluator with an override side table.
#[derive(Debug)]
pub struct EligibilityEvaluator {
    /// Plan policy.
    policy: Policy,
    /// Item names in plan-declared order.
    order: Vec<ItemName>,
    /// Dependency edges per item.
    deps: BTreeMap<ItemName, BTreeSet<ItemName>>,
    /// Gate names each item declares.
    declared_gates: BTreeMap<ItemName, BTreeSet<GateName>>,
    /// Accepted override records, append-only.
    overrides: Vec<OverrideRecord>,
}

impl EligibilityEvaluator {
    /// Creates an evaluator for one plan.
    #[must_use]
    pub fn new(plan: &Plan) -> Self {
        let mut order = Vec::with_capacity(plan.items.len());
        let mut deps = BTreeMap::new();
        let mut declared_gates = BTreeMap::new();
        for item in &plan.items {
            order.push(item.name.clone());
            deps.insert(item.name.clone(), item.deps.clone());
            declared_gates.insert(
                item.name.clone(),
                item.gates.iter().map(|gate| gate.name.clone()).collect(),
            );
        }
        Self {
            policy: plan.policy.clone(),
            order,
            deps,
            declared_gates,
            overrides: Vec::new(),
        }
    }

    /// Returns the accepted override records.
    #[must_use]
    pub fn overrides(&self) -> &[OverrideRecord] {
        &self.overrides
    }

    /// Requests an admin override for an item.
    ///
    /// # Errors
    ///
    /// Returns [`OverrideError`] when policy rejects the request.
    pub fn request_override(
        &mut self,
        item: &ItemName,
        actor: &ActorId,
        reason: &str,
        now: Timestamp,
    ) -> Result<OverrideRecord, OverrideError> {
        let Some(admin_green) = &self.policy.overrides.admin_green else {
            return Err(OverrideError::NotConfigured);
        };

        if let Some(allowed) = &admin_green.allowed_users
            && !allowed.is_empty()
            && !allowed.contains(actor)
        {
            return Err(OverrideError::ActorNotAllowed(actor.to_string()));
        }

        if admin_green.require_reason && reason.trim().is_empty() {
            return Err(OverrideError::ReasonRequired);
        }

        let record = OverrideRecord {
            item_name: item.clone(),
            actor: actor.clone(),
            reason: reason.to_string(),
            timestamp: now,
        };
        self.overrides.push(record.clone());
        Ok(record)
    }

    /// Evaluates every item against the snapshot.
    ///
    /// Items are decided dependencies-first regardless of plan order; a
    /// defensive fallback decides any remainder in plan order, so malformed
    /// graphs still terminate.
    #[must_use]
    pub fn evaluate(&self, snapshot: &StateSnapshot) -> EligibilityReport {
        let mut decisions: BTreeMap<ItemName, EligibilityDecision> = BTreeMap::new();

        let mut progressed = true;
        while progressed {
            progressed = false;
            for name in &self.order {
                if decisions.contains_key(name) {
                    continue;
                }
                let deps_ready = self
                    .deps
                    .get(name)
                    .is_none_or(|deps| deps.iter().all(|dep| decisions.contains_key(dep)));
                if deps_ready {
                    let decision = self.decide(name, snapshot, &decisions);
                    decisions.insert(name.clone(), decision);
                    progressed = true;
                }
            }
        }
        for name in &self.order {
            if !decisions.contains_key(name) {
                let decision = self.decide(name, snapshot, &decisions);
                decisions.insert(name.clone(), decision);
            }
        }

        let mut summary = EligibilitySummary::default();
        for name in &self.order {
            let Some(decision) = decisions.get(name) else {
                continue;
            };
            if decision.eligible {
                summary.eligible.push(name.clone());
                continue;
            }
            let status =
                snapshot.result(name).map_or(NodeStatus::Skipped, |result| result.status);
            match status {
                NodeStatus::Fail => summary.failed.push(name.clone()),
                NodeStatus::Blocked => summary.blocked.push(name.clone()),
                NodeStatus::Pass | NodeStatus::Skipped | NodeStatus::Retrying => {
                    summary.skipped.push(name.clone());
                }
            }
        }

        EligibilityReport {
            decisions,
            summary,
        }
    }

    /// Decides one item given the decisions of its dependencies.
    ///
    /// [`Self::evaluate`] calls this dependencies-first; a dependency with
    /// no decision yet counts as ineligible.
    fn decide(
        &self,
        name: &ItemName,
        snapshot: &StateSnapshot,
        decided: &BTreeMap<ItemName, EligibilityDecision>,
    ) -> EligibilityDecision {
        if let Some(record) = self.overrides.iter().find(|record| &record.item_name == name) {
            return EligibilityDecision {
                eligible: true,
                reason: format!("Manual override by {}", record.actor),
                requires_override: false,
                blocked_by: BTreeSet::new(),
            };
        }

        let Some(node) = snapshot.result(name) else {
            return EligibilityDecision {
                eligible: false,
                reason: "No results recorded".to_string(),
                requires_override: false,
                blocked_by: BTreeSet::new(),
            };
        };

        let deps = self.deps.get(name).cloned().unwrap_or_default();
        let ineligible_deps: BTreeSet<ItemName> = deps
            .iter()
            .filter(|dep| decided.get(*dep).is_none_or(|decision| !decision.eligible))
            .cloned()
            .collect();
        if !ineligible_deps.is_empty() {
            let mut blocked_by = node.blocked_by.clone();
            blocked_by.extend(ineligible_deps.iter().cloned());
            return EligibilityDecision {
                eligible: false,
                reason: "Blocked by failed dependencies".to_string(),
                requires_override: true,
                blocked_by,
            };
        }

        let declared = self.declared_gates.get(name).cloned().unwrap_or_default();

        if node.gates.is_empty() && !declared.is_empty() {
            return EligibilityDecision {
                eligible: false,
                reason: "No gate results".to_string(),
                requires_override: false,
                blocked_by: node.blocked_by.clone(),
            };
        }

        let unmet_required: Vec<String> = declared
            .iter()
            .filter(|gate| self.policy.required_gates.contains(*gate))
            .filter(|gate| {
                node.gate(gate).is_none_or(|result| result.status != GateStatus::Pass)
            })
            .map(ToString::to_string)
            .collect();
        if !unmet_required.is_empty() {
            return EligibilityDecision {
                eligible: false,
                reason: format!("Failed required gates: {}", unmet_required.join(", ")),
                requires_override: true,
                blocked_by: BTreeSet::new(),
            };
        }

        let failed_blocking: Vec<String> = node
            .gates
            .iter()
            .filter(|result| {
                result.status == GateStatus::Fail && self.policy.block_on.contains(&result.gate)
            })
            .map(|result| result.gate.to_string())
            .collect();
        if !failed_blocking.is_empty() {
            return EligibilityDecision {
                eligible: false,
                reason: format!("Blocking gates failed: {}", failed_blocking.join(", ")),
                requires_override: true,
                blocked_by: BTreeSet::new(),
            };
        }

        EligibilityDecision {
            eligible: true,
            reason: "All required gates passed".to_string(),
            requires_override: false,
            blocked_by: BTreeSet::new(),
        }
    }
}
