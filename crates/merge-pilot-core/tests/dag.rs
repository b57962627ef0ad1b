// crates/merge-pilot-core/tests/dag.rs
// ============================================================================
// Module: Dependency Resolver Tests
// Description: Level layering, cycle detection, and unknown dependencies.
// ============================================================================
//! ## Overview
//! Validates deterministic topological layering and the resolver's error
//! surfaces, including the universal coverage property over random DAGs.

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

mod common;

use std::collections::BTreeSet;

use merge_pilot_core::ItemName;
use merge_pilot_core::dag::DagError;
use merge_pilot_core::dag::level_index;
use merge_pilot_core::dag::resolve_levels;
use proptest::prelude::*;

use common::item;
use common::plan;

/// Renders levels as plain strings for compact assertions.
fn level_names(levels: &[Vec<ItemName>]) -> Vec<Vec<String>> {
    levels
        .iter()
        .map(|level| level.iter().map(ToString::to_string).collect())
        .collect()
}

/// Empty plan resolves to an empty level sequence.
#[test]
fn empty_plan_yields_empty_levels() -> Result<(), Box<dyn std::error::Error>> {
    let levels = resolve_levels(&plan(Vec::new()))?;
    assert!(levels.is_empty());
    Ok(())
}

/// A single item with no deps occupies one single-item level.
#[test]
fn single_item_yields_one_level() -> Result<(), Box<dyn std::error::Error>> {
    let levels = resolve_levels(&plan(vec![item("only", &[], Vec::new())]))?;
    assert_eq!(level_names(&levels), vec![vec!["only".to_string()]]);
    Ok(())
}

/// Linear chain A -> B -> C resolves to three singleton levels.
#[test]
fn linear_chain_levels() -> Result<(), Box<dyn std::error::Error>> {
    let levels = resolve_levels(&plan(vec![
        item("A", &[], Vec::new()),
        item("B", &["A"], Vec::new()),
        item("C", &["B"], Vec::new()),
    ]))?;
    assert_eq!(level_names(&levels), vec![vec!["A"], vec!["B"], vec!["C"]]);
    Ok(())
}

/// Diamond layering orders the middle level lexicographically.
#[test]
fn diamond_levels_order_lexicographically() -> Result<(), Box<dyn std::error::Error>> {
    let levels = resolve_levels(&plan(vec![
        item("top", &["left", "right"], Vec::new()),
        item("right", &["base"], Vec::new()),
        item("left", &["base"], Vec::new()),
        item("base", &[], Vec::new()),
    ]))?;
    assert_eq!(level_names(&levels), vec![vec!["base"], vec!["left", "right"], vec!["top"]]);
    Ok(())
}

/// A two-item cycle is reported with both participants.
#[test]
fn two_item_cycle_lists_both_names() {
    let result =
        resolve_levels(&plan(vec![item("A", &["B"], Vec::new()), item("B", &["A"], Vec::new())]));
    let Err(DagError::Cycle(cycle)) = result else {
        panic!("expected cycle error");
    };
    let names: Vec<String> = cycle.participants.iter().map(ToString::to_string).collect();
    assert_eq!(names, vec!["A", "B"]);
}

/// A self-loop is always a cycle.
#[test]
fn self_loop_is_a_cycle() {
    let result = resolve_levels(&plan(vec![item("A", &["A"], Vec::new())]));
    assert!(matches!(result, Err(DagError::Cycle(_))));
}

/// Unknown dependencies report sorted (item, missing) pairs.
#[test]
fn unknown_dependencies_report_pairs() {
    let result = resolve_levels(&plan(vec![
        item("B", &["ghost", "A"], Vec::new()),
        item("A", &["phantom"], Vec::new()),
    ]));
    let Err(DagError::UnknownDependency(unknown)) = result else {
        panic!("expected unknown dependency error");
    };
    let pairs: Vec<(String, String)> = unknown
        .edges
        .iter()
        .map(|(item, missing)| (item.to_string(), missing.to_string()))
        .collect();
    assert_eq!(
        pairs,
        vec![("A".to_string(), "phantom".to_string()), ("B".to_string(), "ghost".to_string())]
    );
}

/// Level index maps every item to its level depth.
#[test]
fn level_index_matches_levels() -> Result<(), Box<dyn std::error::Error>> {
    let levels = resolve_levels(&plan(vec![
        item("a", &[], Vec::new()),
        item("b", &["a"], Vec::new()),
    ]))?;
    let index = level_index(&levels);
    assert_eq!(index.get(&ItemName::new("a")), Some(&0));
    assert_eq!(index.get(&ItemName::new("b")), Some(&1));
    Ok(())
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    /// Levels cover every item exactly once and respect every edge.
    #[test]
    fn levels_cover_items_and_respect_edges(edges in prop::collection::vec((0_usize..12, 0_usize..12), 0..40)) {
        // Edges are forced forward (dep < item) so the graph is acyclic by
        // construction.
        let mut deps: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); 12];
        for (a, b) in edges {
            if a < b {
                deps[b].insert(a);
            } else if b < a {
                deps[a].insert(b);
            }
        }

        let items: Vec<_> = (0..12)
            .map(|index| {
                let dep_names: Vec<String> =
                    deps[index].iter().map(|dep| format!("item-{dep:02}")).collect();
                let dep_refs: Vec<&str> = dep_names.iter().map(String::as_str).collect();
                item(&format!("item-{index:02}"), &dep_refs, Vec::new())
            })
            .collect();

        let the_plan = plan(items);
        let levels = resolve_levels(&the_plan).expect("acyclic by construction");

        let mut seen: BTreeSet<ItemName> = BTreeSet::new();
        for level in &levels {
            for name in level {
                prop_assert!(seen.insert(name.clone()), "item appears twice: {name}");
            }
        }
        prop_assert_eq!(seen.len(), 12);

        let index = level_index(&levels);
        for item_spec in &the_plan.items {
            for dep in &item_spec.deps {
                prop_assert!(index[dep] < index[&item_spec.name]);
            }
        }
    }
}
