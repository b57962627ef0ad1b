// crates/merge-pilot-core/src/core/plan.rs
// ============================================================================
// Module: Merge Pilot Plan Model
// Description: Plan, item, and gate specifications for an integration run.
// Purpose: Define the canonical plan document with validation helpers.
// Dependencies: crate::core::{identifiers, policy}, serde
// ============================================================================

//! ## Overview
//! A plan describes the change units to integrate into a target branch, the
//! dependency edges between them, and the validation gates each unit must
//! clear. Plans are validated at load time to enforce invariants such as
//! unique item names and resolvable, non-reflexive dependencies. The engine
//! consumes plans read-only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::GateName;
use crate::core::identifiers::ItemName;
use crate::core::policy::Policy;

// ============================================================================
// SECTION: Schema Version
// ============================================================================

/// Major schema version prefix accepted by this engine.
pub const SCHEMA_VERSION_PREFIX: &str = "1.";

// ============================================================================
// SECTION: Plan
// ============================================================================

/// Root plan document for one integration run.
///
/// # Invariants
/// - `schema_version` begins with [`SCHEMA_VERSION_PREFIX`].
/// - Item names are unique; every dependency resolves to another item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Plan {
    /// Schema version string (`1.x.y`).
    pub schema_version: String,
    /// Target branch the items integrate into.
    pub target: String,
    /// Plan-level execution policy.
    #[serde(default)]
    pub policy: Policy,
    /// Ordered change units.
    #[serde(default)]
    pub items: Vec<PlanItem>,
}

impl Plan {
    /// Validates the plan's structural invariants.
    ///
    /// Dependency edges pointing at unknown items are left to the DAG
    /// resolver, which reports them with full pair detail.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError`] when validation fails.
    pub fn validate(&self) -> Result<(), PlanError> {
        if !self.schema_version.starts_with(SCHEMA_VERSION_PREFIX) {
            return Err(PlanError::UnsupportedSchemaVersion(self.schema_version.clone()));
        }

        ensure_unique_item_names(&self.items)?;
        ensure_no_self_dependencies(&self.items)?;
        ensure_unique_gate_names(&self.items)?;

        Ok(())
    }

    /// Looks up an item by name.
    #[must_use]
    pub fn item(&self, name: &ItemName) -> Option<&PlanItem> {
        self.items.iter().find(|item| &item.name == name)
    }
}

// ============================================================================
// SECTION: Plan Items
// ============================================================================

/// A uniquely named change unit with dependencies and gates.
///
/// # Invariants
/// - `name` does not appear in `deps`.
/// - Gate names are unique within the item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlanItem {
    /// Item name, unique within the plan.
    pub name: ItemName,
    /// Names of items this item depends on.
    #[serde(default)]
    pub deps: BTreeSet<ItemName>,
    /// Validation gates, executed in declared order.
    #[serde(default)]
    pub gates: Vec<Gate>,
}

// ============================================================================
// SECTION: Gates
// ============================================================================

/// A single validation step attached to an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Gate {
    /// Gate name, unique within the item.
    pub name: GateName,
    /// Command line executed through the platform shell.
    pub run: String,
    /// Optional working directory, resolved against the item root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Environment overlay applied on top of the process environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Execution runtime for the gate.
    #[serde(default)]
    pub runtime: GateRuntime,
    /// Path globs resolved against the gate working directory after the run.
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Container settings, used only when `runtime` is `container`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerSpec>,
}

/// Gate execution runtime.
///
/// Only `local` executes in the core engine; the other runtimes are accepted
/// by the schema and recorded as skipped by the dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GateRuntime {
    /// Subprocess on the runner host.
    #[default]
    Local,
    /// Containerized execution.
    Container,
    /// Delegated to an external CI service.
    CiService,
}

/// Container image settings for `container` runtime gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContainerSpec {
    /// Container image reference.
    pub image: String,
    /// Optional entrypoint override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    /// Host-to-container mount specifications.
    #[serde(default)]
    pub mounts: Vec<String>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Plan structural validation errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Schema version is outside the supported major line.
    #[error("unsupported schema version: {0}")]
    UnsupportedSchemaVersion(String),
    /// Duplicate item names detected.
    #[error("duplicate item name: {0}")]
    DuplicateItemName(String),
    /// An item lists itself as a dependency.
    #[error("item depends on itself: {0}")]
    SelfDependency(String),
    /// Duplicate gate names within one item.
    #[error("duplicate gate name in item {item}: {gate}")]
    DuplicateGateName {
        /// Item carrying the duplicate gate.
        item: String,
        /// Duplicated gate name.
        gate: String,
    },
}

// ============================================================================
// SECTION: Validation Helpers
// ============================================================================

/// Ensures item names are unique within the plan.
fn ensure_unique_item_names(items: &[PlanItem]) -> Result<(), PlanError> {
    for (index, item) in items.iter().enumerate() {
        if items.iter().skip(index + 1).any(|other| other.name == item.name) {
            return Err(PlanError::DuplicateItemName(item.name.to_string()));
        }
    }
    Ok(())
}

/// Ensures no item lists itself as a dependency.
fn ensure_no_self_dependencies(items: &[PlanItem]) -> Result<(), PlanError> {
    for item in items {
        if item.deps.contains(&item.name) {
            return Err(PlanError::SelfDependency(item.name.to_string()));
        }
    }
    Ok(())
}

/// Ensures gate names are unique within each item.
fn ensure_unique_gate_names(items: &[PlanItem]) -> Result<(), PlanError> {
    for item in items {
        for (index, gate) in item.gates.iter().enumerate() {
            if item.gates.iter().skip(index + 1).any(|other| other.name == gate.name) {
                return Err(PlanError::DuplicateGateName {
                    item: item.name.to_string(),
                    gate: gate.name.to_string(),
                });
            }
        }
    }
    Ok(())
}
