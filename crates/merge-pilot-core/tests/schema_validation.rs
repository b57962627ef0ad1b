// crates/merge-pilot-core/tests/schema_validation.rs
// ============================================================================
// Module: Schema Validator Tests
// Description: Structural validation of raw plan documents.
// ============================================================================
//! ## Overview
//! Validates defaults, unknown-field rejection, version checking, and the
//! stable issue codes of the schema validator.

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

use merge_pilot_core::MergeRule;
use merge_pilot_core::core::schema::codes;
use merge_pilot_core::core::schema::validate_plan;
use serde_json::json;

/// Minimal plan: defaults fill policy, deps, and gates.
#[test]
fn defaults_apply_to_minimal_plan() -> Result<(), Box<dyn std::error::Error>> {
    let document = json!({
        "schemaVersion": "1.0.0",
        "target": "main",
        "items": [{"name": "a"}]
    });

    let plan = validate_plan(&document)?;
    assert_eq!(plan.policy.max_workers, 1);
    assert_eq!(plan.policy.merge_rule, MergeRule::StrictRequired);
    assert!(plan.policy.required_gates.is_empty());
    assert!(plan.items[0].deps.is_empty());
    assert!(plan.items[0].gates.is_empty());
    Ok(())
}

/// Unknown fields are rejected at the plan level.
#[test]
fn unknown_plan_field_is_rejected() {
    let document = json!({
        "schemaVersion": "1.0.0",
        "target": "main",
        "surprise": true
    });

    let Err(error) = validate_plan(&document) else {
        panic!("expected rejection");
    };
    assert!(error
        .issues
        .iter()
        .any(|issue| issue.code == codes::UNKNOWN_FIELD && issue.path == "/surprise"));
}

/// Unknown fields are rejected at the item and gate levels.
#[test]
fn unknown_item_and_gate_fields_are_rejected() {
    let document = json!({
        "schemaVersion": "1.0.0",
        "target": "main",
        "items": [{
            "name": "a",
            "mystery": 1,
            "gates": [{"name": "test", "run": "true", "shadow": {}}]
        }]
    });

    let Err(error) = validate_plan(&document) else {
        panic!("expected rejection");
    };
    assert!(error.issues.iter().any(|issue| issue.path == "/items/0/mystery"));
    assert!(error.issues.iter().any(|issue| issue.path == "/items/0/gates/0/shadow"));
}

/// Versions outside the `1.` line are rejected with a stable code.
#[test]
fn version_outside_major_line_is_rejected() {
    let document = json!({"schemaVersion": "2.0.0", "target": "main"});
    let Err(error) = validate_plan(&document) else {
        panic!("expected rejection");
    };
    assert!(error.issues.iter().any(|issue| issue.code == codes::UNSUPPORTED_VERSION));
}

/// Duplicate item names and gate names are schema issues.
#[test]
fn duplicate_names_are_rejected() {
    let document = json!({
        "schemaVersion": "1.0.0",
        "target": "main",
        "items": [
            {"name": "a", "gates": [{"name": "g", "run": "true"}, {"name": "g", "run": "false"}]},
            {"name": "a"}
        ]
    });

    let Err(error) = validate_plan(&document) else {
        panic!("expected rejection");
    };
    let duplicates: Vec<_> =
        error.issues.iter().filter(|issue| issue.code == codes::DUPLICATE_NAME).collect();
    assert_eq!(duplicates.len(), 2);
}

/// An item naming itself as a dependency is rejected.
#[test]
fn self_dependency_is_rejected() {
    let document = json!({
        "schemaVersion": "1.0.0",
        "target": "main",
        "items": [{"name": "a", "deps": ["a"]}]
    });

    let Err(error) = validate_plan(&document) else {
        panic!("expected rejection");
    };
    assert!(error.issues.iter().any(|issue| issue.code == codes::SELF_DEPENDENCY));
}

/// Retry specs require `maxAttempts >= 1`.
#[test]
fn retry_spec_bounds_are_enforced() {
    let document = json!({
        "schemaVersion": "1.0.0",
        "target": "main",
        "policy": {"retries": {"test": {"maxAttempts": 0}}},
        "items": []
    });

    let Err(error) = validate_plan(&document) else {
        panic!("expected rejection");
    };
    assert!(error.issues.iter().any(|issue| {
        issue.code == codes::INVALID_VALUE && issue.path == "/policy/retries/test/maxAttempts"
    }));
}

/// `maxWorkers` must be a positive integer.
#[test]
fn max_workers_zero_is_rejected() {
    let document = json!({
        "schemaVersion": "1.0.0",
        "target": "main",
        "policy": {"maxWorkers": 0},
        "items": []
    });

    let Err(error) = validate_plan(&document) else {
        panic!("expected rejection");
    };
    assert!(error.issues.iter().any(|issue| issue.path == "/policy/maxWorkers"));
}

/// A fully specified policy round-trips into the typed model.
#[test]
fn full_policy_parses() -> Result<(), Box<dyn std::error::Error>> {
    let document = json!({
        "schemaVersion": "1.2.3",
        "target": "release",
        "policy": {
            "requiredGates": ["test", "lint"],
            "optionalGates": ["bench"],
            "blockOn": ["security"],
            "maxWorkers": 4,
            "retries": {"test": {"maxAttempts": 3, "backoffSeconds": 2}},
            "overrides": {"adminGreen": {"allowedUsers": ["alice"], "requireReason": true}},
            "mergeRule": "strict-required"
        },
        "items": [{"name": "a", "gates": [{"name": "test", "run": "make test"}]}]
    });

    let plan = validate_plan(&document)?;
    assert_eq!(plan.policy.max_workers, 4);
    assert_eq!(plan.policy.retries.len(), 1);
    let admin = plan.policy.overrides.admin_green.as_ref().ok_or("missing adminGreen")?;
    assert!(admin.require_reason);
    Ok(())
}

/// Multiple issues are reported in one pass.
#[test]
fn all_issues_reported_together() {
    let document = json!({
        "schemaVersion": "2.0.0",
        "items": [{"deps": "nope"}]
    });

    let Err(error) = validate_plan(&document) else {
        panic!("expected rejection");
    };
    assert!(error.issues.len() >= 3);
    assert!(error.issues.iter().any(|issue| issue.code == codes::MISSING_FIELD));
    assert!(error.issues.iter().any(|issue| issue.code == codes::INVALID_TYPE));
}

/// Non-object documents fail with a root issue.
#[test]
fn non_object_document_is_rejected() {
    let Err(error) = validate_plan(&json!([1, 2, 3])) else {
        panic!("expected rejection");
    };
    assert_eq!(error.issues[0].path, "");
}
