// crates/merge-pilot-core/tests/report.rs
// ============================================================================
// Module: Report Aggregator Tests
// Description: Report folding, allGreen semantics, and stable rendering.
// ============================================================================
//! ## Overview
//! Validates the report tree built from snapshots and eligibility output,
//! the `allGreen` verdict, plan hashing, and Markdown stability.

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

use merge_pilot_core::GateName;
use merge_pilot_core::GateResult;
use merge_pilot_core::GateStatus;
use merge_pilot_core::ItemName;
use merge_pilot_core::Policy;
use merge_pilot_core::Timestamp;
use merge_pilot_core::runtime::EligibilityEvaluator;
use merge_pilot_core::runtime::ExecutionState;
use merge_pilot_core::runtime::build_report;

use common::gate;
use common::item;
use common::plan;
use common::plan_with_policy;

/// Builds a passing gate result.
fn passing(name: &str) -> GateResult {
    GateResult {
        gate: GateName::new(name),
        status: GateStatus::Pass,
        exit_code: Some(0),
        duration_ms: 11,
        stdout: String::new(),
        stderr: String::new(),
        artifacts: Vec::new(),
        attempts: 1,
        last_attempt: Timestamp::Logical(0),
    }
}

#[test]
fn empty_plan_report_is_all_green() -> Result<(), Box<dyn std::error::Error>> {
    let the_plan = plan(Vec::new());
    let state = ExecutionState::init(&the_plan);
    let snapshot = state.snapshot()?;
    let evaluator = EligibilityEvaluator::new(&the_plan);
    let eligibility = evaluator.evaluate(&snapshot);

    let report = build_report(&the_plan, &snapshot, &eligibility)?;
    assert!(report.all_green);
    assert_eq!(report.plan.item_count, 0);
    assert!(report.execution.results.is_empty());
    Ok(())
}

#[test]
fn report_folds_gates_and_eligibility() -> Result<(), Box<dyn std::error::Error>> {
    let mut policy = Policy::default();
    policy.required_gates = [GateName::new("test")].into_iter().collect();
    let the_plan =
        plan_with_policy(vec![item("a", &[], vec![gate("test", "echo ok")])], policy);
    let state = ExecutionState::init(&the_plan);
    let a = ItemName::new("a");
    state.mark_dispatched(&a)?;
    state.record_gate(&a, passing("test"))?;

    let snapshot = state.snapshot()?;
    let evaluator = EligibilityEvaluator::new(&the_plan);
    let eligibility = evaluator.evaluate(&snapshot);
    let report = build_report(&the_plan, &snapshot, &eligibility)?;

    assert!(report.all_green);
    assert_eq!(report.plan.item_count, 1);
    assert_eq!(report.plan.target, "main");
    assert_eq!(report.execution.results[0].gates[0].duration_ms, 11);
    assert_eq!(report.merge_eligibility.eligible, vec![a]);
    assert!(report.merge_eligibility.failed.is_empty());
    Ok(())
}

#[test]
fn missing_required_result_is_not_green() -> Result<(), Box<dyn std::error::Error>> {
    let mut policy = Policy::default();
    policy.required_gates = [GateName::new("test")].into_iter().collect();
    let the_plan =
        plan_with_policy(vec![item("a", &[], vec![gate("test", "echo ok")])], policy);
    let state = ExecutionState::init(&the_plan);

    let snapshot = state.snapshot()?;
    let evaluator = EligibilityEvaluator::new(&the_plan);
    let eligibility = evaluator.evaluate(&snapshot);
    let report = build_report(&the_plan, &snapshot, &eligibility)?;

    assert!(!report.all_green);
    Ok(())
}

#[test]
fn canonical_bytes_are_stable_across_builds() -> Result<(), Box<dyn std::error::Error>> {
    let the_plan = plan(vec![item("a", &[], vec![gate("test", "echo ok")])]);
    let state = ExecutionState::init(&the_plan);
    let snapshot = state.snapshot()?;
    let evaluator = EligibilityEvaluator::new(&the_plan);
    let eligibility = evaluator.evaluate(&snapshot);

    let first = build_report(&the_plan, &snapshot, &eligibility)?.to_canonical_bytes()?;
    let second = build_report(&the_plan, &snapshot, &eligibility)?.to_canonical_bytes()?;
    assert_eq!(first, second);
    assert_eq!(first.last(), Some(&b'\n'));
    Ok(())
}

#[test]
fn markdown_rendering_is_stable_and_complete() -> Result<(), Box<dyn std::error::Error>> {
    let the_plan = plan(vec![item("a", &[], vec![gate("test", "echo ok")])]);
    let state = ExecutionState::init(&the_plan);
    let a = ItemName::new("a");
    state.mark_dispatched(&a)?;
    state.record_gate(&a, passing("test"))?;

    let snapshot = state.snapshot()?;
    let evaluator = EligibilityEvaluator::new(&the_plan);
    let eligibility = evaluator.evaluate(&snapshot);
    let report = build_report(&the_plan, &snapshot, &eligibility)?;

    let markdown = report.render_markdown();
    assert!(markdown.starts_with("# Merge Pilot Report"));
    assert!(markdown.contains("| a | pass |"));
    assert!(markdown.contains("- Eligible: a"));
    assert_eq!(markdown, report.render_markdown());
    Ok(())
}
