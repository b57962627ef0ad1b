// crates/merge-pilot-core/tests/plan_model.rs
// ============================================================================
// Module: Plan Model Tests
// Description: Structural invariants and wire-form serialization.
// ============================================================================
//! ## Overview
//! Validates `Plan::validate` invariants and the camelCase wire form of the
//! plan document types.

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

use merge_pilot_core::GateRuntime;
use merge_pilot_core::Plan;
use merge_pilot_core::PlanError;

use common::gate;
use common::item;
use common::plan;

#[test]
fn valid_plan_passes_validation() -> Result<(), Box<dyn std::error::Error>> {
    let the_plan = plan(vec![
        item("a", &[], vec![gate("test", "true")]),
        item("b", &["a"], Vec::new()),
    ]);
    the_plan.validate()?;
    Ok(())
}

#[test]
fn wrong_major_version_is_rejected() {
    let mut the_plan = plan(Vec::new());
    the_plan.schema_version = "2.0.0".to_string();
    assert!(matches!(the_plan.validate(), Err(PlanError::UnsupportedSchemaVersion(_))));
}

#[test]
fn duplicate_item_names_are_rejected() {
    let the_plan = plan(vec![item("a", &[], Vec::new()), item("a", &[], Vec::new())]);
    assert!(matches!(the_plan.validate(), Err(PlanError::DuplicateItemName(_))));
}

#[test]
fn self_dependencies_are_rejected() {
    let the_plan = plan(vec![item("a", &["a"], Vec::new())]);
    assert!(matches!(the_plan.validate(), Err(PlanError::SelfDependency(_))));
}

#[test]
fn duplicate_gate_names_are_rejected() {
    let the_plan =
        plan(vec![item("a", &[], vec![gate("g", "one"), gate("g", "two")])]);
    assert!(matches!(the_plan.validate(), Err(PlanError::DuplicateGateName { .. })));
}

#[test]
fn wire_form_uses_camel_case_fields() -> Result<(), Box<dyn std::error::Error>> {
    let the_plan = plan(vec![item("a", &[], vec![gate("test", "true")])]);
    let value = serde_json::to_value(&the_plan)?;

    assert!(value.get("schemaVersion").is_some());
    let policy = value.get("policy").ok_or("missing policy")?;
    assert!(policy.get("requiredGates").is_some());
    assert!(policy.get("maxWorkers").is_some());
    assert!(policy.get("mergeRule").is_some());
    assert_eq!(
        policy.get("mergeRule").and_then(serde_json::Value::as_str),
        Some("strict-required")
    );
    Ok(())
}

#[test]
fn gate_runtime_parses_kebab_case() -> Result<(), Box<dyn std::error::Error>> {
    let runtime: GateRuntime = serde_json::from_str("\"ci-service\"")?;
    assert_eq!(runtime, GateRuntime::CiService);
    let default_runtime = GateRuntime::default();
    assert_eq!(default_runtime, GateRuntime::Local);
    Ok(())
}

#[test]
fn unknown_wire_fields_fail_typed_decoding() {
    let result: Result<Plan, _> = serde_json::from_str(
        r#"{"schemaVersion":"1.0.0","target":"main","items":[],"extra":1}"#,
    );
    assert!(result.is_err());
}
