// crates/merge-pilot-core/src/dag/mod.rs
// ============================================================================
// Module: Merge Pilot Dependency Resolver
// Description: Topological layering of plan items into execution levels.
// Purpose: Compute deterministic levels, detect cycles and unknown deps.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The resolver turns a plan's dependency edges into a sequence of levels:
//! level `k` holds exactly the items whose dependencies all live in levels
//! `0..k-1`. Layering is Kahn-style; items within a level are ordered
//! lexicographically by name so two resolutions of the same plan are
//! byte-identical. Self-loops are cycles.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::core::ItemName;
use crate::core::Plan;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Dependency cycle among plan items.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct CycleError {
    /// Names participating in (or downstream of) the cycle, sorted.
    pub participants: Vec<ItemName>,
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dependency cycle involving: {}", join_names(&self.participants))
    }
}

/// Dependencies referencing items absent from the plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct UnknownDependencyError {
    /// `(item, missing dependency)` pairs, sorted.
    pub edges: Vec<(ItemName, ItemName)>,
}

impl fmt::Display for UnknownDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .edges
            .iter()
            .map(|(item, missing)| format!("{item} -> {missing}"))
            .collect();
        write!(f, "unknown dependencies: {}", rendered.join(", "))
    }
}

/// Resolution failures.
#[derive(Debug, Error)]
pub enum DagError {
    /// The dependency graph contains a cycle or self-loop.
    #[error(transparent)]
    Cycle(#[from] CycleError),
    /// A dependency references an item absent from the plan.
    #[error(transparent)]
    UnknownDependency(#[from] UnknownDependencyError),
}

// ============================================================================
// SECTION: Level Resolution
// ============================================================================

/// Computes the topologically ordered execution levels for a plan.
///
/// An empty plan resolves to an empty level sequence.
///
/// # Errors
///
/// Returns [`DagError::UnknownDependency`] when a dependency does not
/// resolve, and [`DagError::Cycle`] when the graph is not acyclic.
pub fn resolve_levels(plan: &Plan) -> Result<Vec<Vec<ItemName>>, DagError> {
    let known: BTreeSet<&ItemName> = plan.items.iter().map(|item| &item.name).collect();

    let mut unknown: Vec<(ItemName, ItemName)> = Vec::new();
    for item in &plan.items {
        for dep in &item.deps {
            if !known.contains(dep) {
                unknown.push((item.name.clone(), dep.clone()));
            }
        }
    }
    if !unknown.is_empty() {
        unknown.sort();
        return Err(UnknownDependencyError {
            edges: unknown,
        }
        .into());
    }

    let mut in_degree: BTreeMap<&ItemName, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&ItemName, Vec<&ItemName>> = BTreeMap::new();
    for item in &plan.items {
        in_degree.insert(&item.name, item.deps.len());
        for dep in &item.deps {
            dependents.entry(dep).or_default().push(&item.name);
        }
    }

    let mut levels: Vec<Vec<ItemName>> = Vec::new();
    let mut resolved = 0_usize;
    // BTreeMap iteration keeps every level lexicographic without an extra sort.
    let mut ready: Vec<&ItemName> =
        in_degree.iter().filter(|(_, degree)| **degree == 0).map(|(name, _)| *name).collect();

    while !ready.is_empty() {
        let level: Vec<ItemName> = ready.iter().map(|name| (*name).clone()).collect();
        let mut next: BTreeSet<&ItemName> = BTreeSet::new();
        for name in ready {
            resolved += 1;
            if let Some(children) = dependents.get(name) {
                for child in children {
                    if let Some(degree) = in_degree.get_mut(child) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.insert(*child);
                        }
                    }
                }
            }
        }
        levels.push(level);
        ready = next.into_iter().collect();
    }

    if resolved < plan.items.len() {
        let mut participants: Vec<ItemName> = in_degree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(name, _)| (*name).clone())
            .collect();
        participants.sort();
        return Err(CycleError {
            participants,
        }
        .into());
    }

    Ok(levels)
}

/// Returns the level index of every item, keyed by name.
#[must_use]
pub fn level_index(levels: &[Vec<ItemName>]) -> BTreeMap<ItemName, usize> {
    let mut index = BTreeMap::new();
    for (depth, level) in levels.iter().enumerate() {
        for name in level {
            index.insert(name.clone(), depth);
        }
    }
    index
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Renders a sorted name list for error display.
fn join_names(names: &[ItemName]) -> String {
    let rendered: Vec<&str> = names.iter().map(ItemName::as_str).collect();
    rendered.join(", ")
}
