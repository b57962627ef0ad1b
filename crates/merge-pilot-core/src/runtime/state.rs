// crates/merge-pilot-core/src/runtime/state.rs
// ============================================================================
// Module: Merge Pilot Execution State
// Description: Single mutable store of per-item and per-gate status.
// Purpose: Track run evolution with failure propagation under one mutex.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! The execution state is the only mutable shared structure in the engine.
//! The scheduler is its sole writer; every read returns copies, and no
//! callback ever runs with the lock held. Item status recomputes from the
//! recorded gates and dependency statuses on every update, and blocked
//! propagation is idempotent and deterministic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::MutexGuard;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::GateName;
use crate::core::GateResult;
use crate::core::GateStatus;
use crate::core::ItemName;
use crate::core::NodeResult;
use crate::core::NodeStatus;
use crate::core::Plan;
use crate::core::Policy;

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// Immutable view of every node result, in plan order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    /// Node results in plan-declared order.
    pub results: Vec<NodeResult>,
}

impl StateSnapshot {
    /// Returns the result for an item, when present.
    #[must_use]
    pub fn result(&self, name: &ItemName) -> Option<&NodeResult> {
        self.results.iter().find(|result| &result.name == name)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Execution state operation errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// The item is not part of the plan.
    #[error("unknown item: {0}")]
    UnknownItem(String),
    /// The gate is not declared by the item.
    #[error("unknown gate `{gate}` for item `{item}`")]
    UnknownGate {
        /// Item the gate was recorded against.
        item: String,
        /// Undeclared gate name.
        gate: String,
    },
    /// The state mutex was poisoned by a panicking holder.
    #[error("execution state mutex poisoned")]
    Poisoned,
}

// ============================================================================
// SECTION: Execution State
// ============================================================================

/// Mutable state behind the mutex.
#[derive(Debug)]
struct StateInner {
    /// Node results keyed by item name.
    nodes: BTreeMap<ItemName, NodeResult>,
    /// Item names in plan-declared order.
    order: Vec<ItemName>,
    /// Dependency edges per item.
    deps: BTreeMap<ItemName, BTreeSet<ItemName>>,
    /// Declared gate order per item.
    gate_order: BTreeMap<ItemName, Vec<GateName>>,
    /// Plan policy used for status recomputation.
    policy: Policy,
}

/// The engine's single mutable store.
#[derive(Debug)]
pub struct ExecutionState {
    /// Whole-store mutex; concurrency is at the item level, not per field.
    inner: Mutex<StateInner>,
}

impl ExecutionState {
    /// Initializes the state from a plan: every item starts `skipped` and
    /// not eligible.
    #[must_use]
    pub fn init(plan: &Plan) -> Self {
        let mut nodes = BTreeMap::new();
        let mut order = Vec::with_capacity(plan.items.len());
        let mut deps = BTreeMap::new();
        let mut gate_order = BTreeMap::new();

        for item in &plan.items {
            nodes.insert(item.name.clone(), NodeResult::initial(item.name.clone()));
            order.push(item.name.clone());
            deps.insert(item.name.clone(), item.deps.clone());
            gate_order
                .insert(item.name.clone(), item.gates.iter().map(|gate| gate.name.clone()).collect());
        }

        Self {
            inner: Mutex::new(StateInner {
                nodes,
                order,
                deps,
                gate_order,
                policy: plan.policy.clone(),
            }),
        }
    }

    /// Marks an item dispatched (first gate about to run).
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] when the item is unknown or the lock poisoned.
    pub fn mark_dispatched(&self, item: &ItemName) -> Result<(), StateError> {
        let mut inner = self.lock()?;
        let node = node_mut(&mut inner, item)?;
        node.status = NodeStatus::Retrying;
        Ok(())
    }

    /// Marks an item skipped with a cancellation (or dispatch) reason.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] when the item is unknown or the lock poisoned.
    pub fn mark_skipped(&self, item: &ItemName, reason: &str) -> Result<(), StateError> {
        let mut inner = self.lock()?;
        let node = node_mut(&mut inner, item)?;
        node.status = NodeStatus::Skipped;
        node.skip_reason = Some(reason.to_string());
        Ok(())
    }

    /// Appends or replaces a gate result and recomputes the item status.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] when the item or gate is unknown or the lock
    /// poisoned.
    pub fn record_gate(&self, item: &ItemName, result: GateResult) -> Result<(), StateError> {
        let mut inner = self.lock()?;

        let declared = inner.gate_order.get(item).ok_or_else(|| {
            StateError::UnknownItem(item.to_string())
        })?;
        let declared_index =
            declared.iter().position(|gate| gate == &result.gate).ok_or_else(|| {
                StateError::UnknownGate {
                    item: item.to_string(),
                    gate: result.gate.to_string(),
                }
            })?;
        let declared = declared.clone();

        let node = node_mut(&mut inner, item)?;
        if let Some(existing) = node.gates.iter_mut().find(|gate| gate.gate == result.gate) {
            *existing = result;
        } else {
            let insert_at = node
                .gates
                .iter()
                .filter(|gate| {
                    declared.iter().position(|name| name == &gate.gate).unwrap_or(usize::MAX)
                        < declared_index
                })
                .count();
            node.gates.insert(insert_at, result);
        }

        recompute_status(&mut inner, item)?;
        Ok(())
    }

    /// Recomputes an item's status from its gates and dependencies.
    ///
    /// Used directly for items with no gates, which complete vacuously.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] when the item is unknown or the lock poisoned.
    pub fn complete_item(&self, item: &ItemName) -> Result<(), StateError> {
        let mut inner = self.lock()?;
        recompute_status(&mut inner, item)?;
        Ok(())
    }

    /// Marks every item whose dependencies failed or blocked as `blocked`.
    ///
    /// Runs to a fixpoint in dependency order; idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Poisoned`] when the lock is poisoned.
    pub fn propagate_blocked(&self) -> Result<(), StateError> {
        let mut inner = self.lock()?;
        let order = inner.order.clone();

        let mut changed = true;
        while changed {
            changed = false;
            for name in &order {
                let offending = offending_deps(&inner, name);
                if offending.is_empty() {
                    continue;
                }
                let node = node_mut(&mut inner, name)?;
                if node.status != NodeStatus::Blocked || node.blocked_by != offending {
                    node.status = NodeStatus::Blocked;
                    node.blocked_by = offending;
                    changed = true;
                }
            }
        }
        Ok(())
    }

    /// Stores the evaluator's eligibility decision for an item.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] when the item is unknown or the lock poisoned.
    pub fn set_eligibility(&self, item: &ItemName, eligible: bool) -> Result<(), StateError> {
        let mut inner = self.lock()?;
        let node = node_mut(&mut inner, item)?;
        node.eligible_for_merge = eligible;
        Ok(())
    }

    /// Returns the status of one item.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] when the item is unknown or the lock poisoned.
    pub fn status_of(&self, item: &ItemName) -> Result<NodeStatus, StateError> {
        let inner = self.lock()?;
        inner
            .nodes
            .get(item)
            .map(|node| node.status)
            .ok_or_else(|| StateError::UnknownItem(item.to_string()))
    }

    /// Returns an immutable deep copy of every node result, in plan order.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Poisoned`] when the lock is poisoned.
    pub fn snapshot(&self) -> Result<StateSnapshot, StateError> {
        let inner = self.lock()?;
        let results = inner
            .order
            .iter()
            .filter_map(|name| inner.nodes.get(name))
            .cloned()
            .collect();
        Ok(StateSnapshot {
            results,
        })
    }

    /// Locks the store, mapping poisoning to a typed error.
    fn lock(&self) -> Result<MutexGuard<'_, StateInner>, StateError> {
        self.inner.lock().map_err(|_| StateError::Poisoned)
    }
}

// ============================================================================
// SECTION: Recomputation Helpers
// ============================================================================

/// Returns a mutable node reference or an unknown-item error.
fn node_mut<'a>(
    inner: &'a mut StateInner,
    item: &ItemName,
) -> Result<&'a mut NodeResult, StateError> {
    inner.nodes.get_mut(item).ok_or_else(|| StateError::UnknownItem(item.to_string()))
}

/// Collects the failed or blocked dependencies of an item.
fn offending_deps(inner: &StateInner, item: &ItemName) -> BTreeSet<ItemName> {
    let Some(deps) = inner.deps.get(item) else {
        return BTreeSet::new();
    };
    deps.iter()
        .filter(|dep| {
            inner
                .nodes
                .get(*dep)
                .is_some_and(|node| matches!(node.status, NodeStatus::Fail | NodeStatus::Blocked))
        })
        .cloned()
        .collect()
}

/// Recomputes one item's status from dependencies and recorded gates.
fn recompute_status(inner: &mut StateInner, item: &ItemName) -> Result<(), StateError> {
    let offending = offending_deps(inner, item);
    if !offending.is_empty() {
        let node = node_mut(inner, item)?;
        node.status = NodeStatus::Blocked;
        node.blocked_by = offending;
        return Ok(());
    }

    let declared = inner
        .gate_order
        .get(item)
        .cloned()
        .ok_or_else(|| StateError::UnknownItem(item.to_string()))?;
    let policy = inner.policy.clone();
    let node = node_mut(inner, item)?;

    let blocking_failure = node
        .gates
        .iter()
        .any(|gate| gate.status == GateStatus::Fail && policy.gate_blocks_item(&gate.gate));
    if blocking_failure {
        node.status = NodeStatus::Fail;
        return Ok(());
    }

    let all_terminal = declared.iter().all(|gate| {
        node.gate(gate).is_some_and(|result| {
            matches!(result.status, GateStatus::Pass | GateStatus::Fail | GateStatus::Skipped)
        })
    });
    node.status = if all_terminal { NodeStatus::Pass } else { NodeStatus::Retrying };
    Ok(())
}
