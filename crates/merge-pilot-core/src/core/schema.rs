// crates/merge-pilot-core/src/core/schema.rs
// ============================================================================
// Module: Merge Pilot Schema Validator
// Description: Structural validation of raw plan documents.
// Purpose: Turn untrusted JSON into a typed Plan or a structured issue list.
// Dependencies: crate::core::plan, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The schema validator is a pure function over a decoded JSON document. It
//! checks the plan shape of the `1.x.y` schema line: field types, documented
//! defaults, unknown-field rejection at the plan, item, and gate levels, and
//! name uniqueness. Failures carry every detected issue, each with a JSON
//! pointer path and a stable machine code, so callers can render all
//! problems in one pass.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde_json::Value;
use thiserror::Error;

use crate::core::plan::Plan;
use crate::core::plan::SCHEMA_VERSION_PREFIX;

// ============================================================================
// SECTION: Issue Codes
// ============================================================================

/// Stable machine codes attached to schema issues.
pub mod codes {
    /// A required field is absent.
    pub const MISSING_FIELD: &str = "missing_field";
    /// A field holds a value of the wrong JSON type.
    pub const INVALID_TYPE: &str = "invalid_type";
    /// A field holds a well-typed but out-of-domain value.
    pub const INVALID_VALUE: &str = "invalid_value";
    /// An object carries a field the schema does not define.
    pub const UNKNOWN_FIELD: &str = "unknown_field";
    /// The schema version is outside the supported major line.
    pub const UNSUPPORTED_VERSION: &str = "unsupported_version";
    /// An item or gate name collides with a sibling.
    pub const DUPLICATE_NAME: &str = "duplicate_name";
    /// An item lists itself as a dependency.
    pub const SELF_DEPENDENCY: &str = "self_dependency";
}

// ============================================================================
// SECTION: Issues and Errors
// ============================================================================

/// One structural problem found in a plan document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    /// JSON pointer to the offending value.
    pub path: String,
    /// Human-readable description.
    pub message: String,
    /// Stable machine code from [`codes`].
    pub code: &'static str,
}

impl SchemaIssue {
    /// Creates a new issue record.
    fn new(path: impl Into<String>, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            code,
        }
    }
}

/// Schema validation failure carrying every detected issue.
#[derive(Debug, Error)]
#[error("plan document failed schema validation with {} issue(s)", issues.len())]
pub struct SchemaValidationError {
    /// Detected issues in document order.
    pub issues: Vec<SchemaIssue>,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Validates a decoded plan document and produces the typed plan.
///
/// Documented defaults are applied during typing: a missing `deps` becomes
/// the empty set, a missing `policy` becomes [`Policy::default`], and so on.
///
/// # Errors
///
/// Returns [`SchemaValidationError`] listing every structural issue found.
///
/// [`Policy::default`]: crate::core::policy::Policy::default
pub fn validate_plan(document: &Value) -> Result<Plan, SchemaValidationError> {
    let mut issues = Vec::new();

    let Some(root) = document.as_object() else {
        issues.push(SchemaIssue::new("", "plan document must be an object", codes::INVALID_TYPE));
        return Err(SchemaValidationError {
            issues,
        });
    };

    ensure_known_fields(root, "", PLAN_FIELDS, &mut issues);
    ensure_schema_version(root, &mut issues);
    ensure_target(root, &mut issues);
    if let Some(policy) = root.get("policy") {
        ensure_policy(policy, &mut issues);
    }
    if let Some(items) = root.get("items") {
        ensure_items(items, &mut issues);
    }

    if !issues.is_empty() {
        return Err(SchemaValidationError {
            issues,
        });
    }

    match serde_json::from_value::<Plan>(document.clone()) {
        Ok(plan) => Ok(plan),
        Err(err) => Err(SchemaValidationError {
            issues: vec![SchemaIssue::new("", err.to_string(), codes::INVALID_TYPE)],
        }),
    }
}

// ============================================================================
// SECTION: Field Tables
// ============================================================================

/// Fields defined at the plan level.
const PLAN_FIELDS: &[&str] = &["schemaVersion", "target", "policy", "items"];

/// Fields defined at the item level.
const ITEM_FIELDS: &[&str] = &["name", "deps", "gates"];

/// Fields defined at the gate level.
const GATE_FIELDS: &[&str] = &["name", "run", "cwd", "env", "runtime", "artifacts", "container"];

/// Fields defined at the policy level.
const POLICY_FIELDS: &[&str] = &[
    "requiredGates",
    "optionalGates",
    "blockOn",
    "maxWorkers",
    "retries",
    "overrides",
    "mergeRule",
];

/// Accepted gate runtime strings.
const RUNTIME_VALUES: &[&str] = &["local", "container", "ci-service"];

// ============================================================================
// SECTION: Plan-Level Checks
// ============================================================================

/// Rejects fields outside the allowed set for one object level.
fn ensure_known_fields(
    object: &serde_json::Map<String, Value>,
    path: &str,
    allowed: &[&str],
    issues: &mut Vec<SchemaIssue>,
) {
    for key in object.keys() {
        if !allowed.contains(&key.as_str()) {
            issues.push(SchemaIssue::new(
                format!("{path}/{key}"),
                format!("unknown field `{key}`"),
                codes::UNKNOWN_FIELD,
            ));
        }
    }
}

/// Checks the schema version field and its major line.
fn ensure_schema_version(root: &serde_json::Map<String, Value>, issues: &mut Vec<SchemaIssue>) {
    match root.get("schemaVersion") {
        None => issues.push(SchemaIssue::new(
            "/schemaVersion",
            "missing required field `schemaVersion`",
            codes::MISSING_FIELD,
        )),
        Some(Value::String(version)) => {
            if !version.starts_with(SCHEMA_VERSION_PREFIX) {
                issues.push(SchemaIssue::new(
                    "/schemaVersion",
                    format!("unsupported schema version `{version}` (expected 1.x.y)"),
                    codes::UNSUPPORTED_VERSION,
                ));
            }
        }
        Some(_) => issues.push(SchemaIssue::new(
            "/schemaVersion",
            "`schemaVersion` must be a string",
            codes::INVALID_TYPE,
        )),
    }
}

/// Checks the target branch field.
fn ensure_target(root: &serde_json::Map<String, Value>, issues: &mut Vec<SchemaIssue>) {
    match root.get("target") {
        None => issues.push(SchemaIssue::new(
            "/target",
            "missing required field `target`",
            codes::MISSING_FIELD,
        )),
        Some(Value::String(target)) => {
            if target.trim().is_empty() {
                issues.push(SchemaIssue::new(
                    "/target",
                    "`target` must be a non-empty branch name",
                    codes::INVALID_VALUE,
                ));
            }
        }
        Some(_) => issues.push(SchemaIssue::new(
            "/target",
            "`target` must be a string",
            codes::INVALID_TYPE,
        )),
    }
}

// ============================================================================
// SECTION: Policy Checks
// ============================================================================

/// Checks the policy object when present.
fn ensure_policy(policy: &Value, issues: &mut Vec<SchemaIssue>) {
    let Some(object) = policy.as_object() else {
        issues.push(SchemaIssue::new("/policy", "`policy` must be an object", codes::INVALID_TYPE));
        return;
    };

    ensure_known_fields(object, "/policy", POLICY_FIELDS, issues);

    for set_field in ["requiredGates", "optionalGates", "blockOn"] {
        if let Some(value) = object.get(set_field) {
            ensure_string_array(value, &format!("/policy/{set_field}"), issues);
        }
    }

    if let Some(value) = object.get("maxWorkers") {
        match value.as_u64() {
            Some(workers) if workers >= 1 => {}
            _ => issues.push(SchemaIssue::new(
                "/policy/maxWorkers",
                "`maxWorkers` must be an integer >= 1",
                codes::INVALID_VALUE,
            )),
        }
    }

    if let Some(value) = object.get("retries") {
        ensure_retries(value, issues);
    }

    if let Some(value) = object.get("overrides") {
        ensure_overrides(value, issues);
    }

    if let Some(value) = object.get("mergeRule") {
        match value.as_str() {
            Some("strict-required") => {}
            Some(other) => issues.push(SchemaIssue::new(
                "/policy/mergeRule",
                format!("unknown merge rule `{other}`"),
                codes::INVALID_VALUE,
            )),
            None => issues.push(SchemaIssue::new(
                "/policy/mergeRule",
                "`mergeRule` must be a string",
                codes::INVALID_TYPE,
            )),
        }
    }
}

/// Checks the per-gate retry table.
fn ensure_retries(retries: &Value, issues: &mut Vec<SchemaIssue>) {
    let Some(object) = retries.as_object() else {
        issues.push(SchemaIssue::new(
            "/policy/retries",
            "`retries` must be an object keyed by gate name",
            codes::INVALID_TYPE,
        ));
        return;
    };

    for (gate, spec) in object {
        let path = format!("/policy/retries/{gate}");
        let Some(spec_object) = spec.as_object() else {
            issues.push(SchemaIssue::new(path, "retry spec must be an object", codes::INVALID_TYPE));
            continue;
        };
        match spec_object.get("maxAttempts").and_then(Value::as_u64) {
            Some(attempts) if attempts >= 1 => {}
            _ => issues.push(SchemaIssue::new(
                format!("{path}/maxAttempts"),
                "`maxAttempts` must be an integer >= 1",
                codes::INVALID_VALUE,
            )),
        }
        if let Some(backoff) = spec_object.get("backoffSeconds")
            && backoff.as_u64().is_none()
        {
            issues.push(SchemaIssue::new(
                format!("{path}/backoffSeconds"),
                "`backoffSeconds` must be an integer >= 0",
                codes::INVALID_VALUE,
            ));
        }
    }
}

/// Checks the override policy object.
fn ensure_overrides(overrides: &Value, issues: &mut Vec<SchemaIssue>) {
    let Some(object) = overrides.as_object() else {
        issues.push(SchemaIssue::new(
            "/policy/overrides",
            "`overrides` must be an object",
            codes::INVALID_TYPE,
        ));
        return;
    };

    let Some(admin_green) = object.get("adminGreen") else {
        return;
    };
    let Some(admin_object) = admin_green.as_object() else {
        issues.push(SchemaIssue::new(
            "/policy/overrides/adminGreen",
            "`adminGreen` must be an object",
            codes::INVALID_TYPE,
        ));
        return;
    };

    if let Some(users) = admin_object.get("allowedUsers") {
        ensure_string_array(users, "/policy/overrides/adminGreen/allowedUsers", issues);
    }
    if let Some(require_reason) = admin_object.get("requireReason")
        && !require_reason.is_boolean()
    {
        issues.push(SchemaIssue::new(
            "/policy/overrides/adminGreen/requireReason",
            "`requireReason` must be a boolean",
            codes::INVALID_TYPE,
        ));
    }
}

// ============================================================================
// SECTION: Item and Gate Checks
// ============================================================================

/// Checks the items array and every item within it.
fn ensure_items(items: &Value, issues: &mut Vec<SchemaIssue>) {
    let Some(array) = items.as_array() else {
        issues.push(SchemaIssue::new("/items", "`items` must be an array", codes::INVALID_TYPE));
        return;
    };

    let mut seen_names: BTreeSet<&str> = BTreeSet::new();
    for (index, item) in array.iter().enumerate() {
        let path = format!("/items/{index}");
        let Some(object) = item.as_object() else {
            issues.push(SchemaIssue::new(path, "item must be an object", codes::INVALID_TYPE));
            continue;
        };

        ensure_known_fields(object, &path, ITEM_FIELDS, issues);

        let name = match object.get("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => {
                if !seen_names.insert(name.as_str()) {
                    issues.push(SchemaIssue::new(
                        format!("{path}/name"),
                        format!("duplicate item name `{name}`"),
                        codes::DUPLICATE_NAME,
                    ));
                }
                Some(name.as_str())
            }
            Some(Value::String(_)) => {
                issues.push(SchemaIssue::new(
                    format!("{path}/name"),
                    "item `name` must be non-empty",
                    codes::INVALID_VALUE,
                ));
                None
            }
            Some(_) => {
                issues.push(SchemaIssue::new(
                    format!("{path}/name"),
                    "item `name` must be a string",
                    codes::INVALID_TYPE,
                ));
                None
            }
            None => {
                issues.push(SchemaIssue::new(
                    format!("{path}/name"),
                    "missing required field `name`",
                    codes::MISSING_FIELD,
                ));
                None
            }
        };

        if let Some(deps) = object.get("deps") {
            ensure_deps(deps, name, &path, issues);
        }
        if let Some(gates) = object.get("gates") {
            ensure_gates(gates, &path, issues);
        }
    }
}

/// Checks one item's dependency list.
fn ensure_deps(deps: &Value, item_name: Option<&str>, path: &str, issues: &mut Vec<SchemaIssue>) {
    let deps_path = format!("{path}/deps");
    let Some(array) = deps.as_array() else {
        issues.push(SchemaIssue::new(
            deps_path,
            "`deps` must be an array of item names",
            codes::INVALID_TYPE,
        ));
        return;
    };

    for (index, dep) in array.iter().enumerate() {
        match dep.as_str() {
            Some(dep_name) => {
                if Some(dep_name) == item_name {
                    issues.push(SchemaIssue::new(
                        format!("{deps_path}/{index}"),
                        format!("item `{dep_name}` depends on itself"),
                        codes::SELF_DEPENDENCY,
                    ));
                }
            }
            None => issues.push(SchemaIssue::new(
                format!("{deps_path}/{index}"),
                "dependency must be a string",
                codes::INVALID_TYPE,
            )),
        }
    }
}

/// Checks one item's gate list.
fn ensure_gates(gates: &Value, path: &str, issues: &mut Vec<SchemaIssue>) {
    let gates_path = format!("{path}/gates");
    let Some(array) = gates.as_array() else {
        issues.push(SchemaIssue::new(gates_path, "`gates` must be an array", codes::INVALID_TYPE));
        return;
    };

    let mut seen_gates: BTreeSet<&str> = BTreeSet::new();
    for (index, gate) in array.iter().enumerate() {
        let gate_path = format!("{gates_path}/{index}");
        let Some(object) = gate.as_object() else {
            issues.push(SchemaIssue::new(gate_path, "gate must be an object", codes::INVALID_TYPE));
            continue;
        };

        ensure_known_fields(object, &gate_path, GATE_FIELDS, issues);

        match object.get("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => {
                if !seen_gates.insert(name.as_str()) {
                    issues.push(SchemaIssue::new(
                        format!("{gate_path}/name"),
                        format!("duplicate gate name `{name}`"),
                        codes::DUPLICATE_NAME,
                    ));
                }
            }
            Some(_) => issues.push(SchemaIssue::new(
                format!("{gate_path}/name"),
                "gate `name` must be a non-empty string",
                codes::INVALID_VALUE,
            )),
            None => issues.push(SchemaIssue::new(
                format!("{gate_path}/name"),
                "missing required field `name`",
                codes::MISSING_FIELD,
            )),
        }

        match object.get("run") {
            Some(Value::String(run)) if !run.trim().is_empty() => {}
            Some(_) => issues.push(SchemaIssue::new(
                format!("{gate_path}/run"),
                "gate `run` must be a non-empty string",
                codes::INVALID_VALUE,
            )),
            None => issues.push(SchemaIssue::new(
                format!("{gate_path}/run"),
                "missing required field `run`",
                codes::MISSING_FIELD,
            )),
        }

        if let Some(env) = object.get("env") {
            ensure_env(env, &gate_path, issues);
        }

        if let Some(runtime) = object.get("runtime") {
            match runtime.as_str() {
                Some(value) if RUNTIME_VALUES.contains(&value) => {}
                Some(other) => issues.push(SchemaIssue::new(
                    format!("{gate_path}/runtime"),
                    format!("unknown runtime `{other}`"),
                    codes::INVALID_VALUE,
                )),
                None => issues.push(SchemaIssue::new(
                    format!("{gate_path}/runtime"),
                    "`runtime` must be a string",
                    codes::INVALID_TYPE,
                )),
            }
        }

        if let Some(artifacts) = object.get("artifacts") {
            ensure_string_array(artifacts, &format!("{gate_path}/artifacts"), issues);
        }
    }
}

/// Checks one gate's environment overlay.
fn ensure_env(env: &Value, gate_path: &str, issues: &mut Vec<SchemaIssue>) {
    let env_path = format!("{gate_path}/env");
    let Some(object) = env.as_object() else {
        issues.push(SchemaIssue::new(
            env_path,
            "`env` must be an object of string values",
            codes::INVALID_TYPE,
        ));
        return;
    };

    for (key, value) in object {
        if !value.is_string() {
            issues.push(SchemaIssue::new(
                format!("{env_path}/{key}"),
                format!("environment value for `{key}` must be a string"),
                codes::INVALID_TYPE,
            ));
        }
    }
}

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Checks that a value is an array of strings.
fn ensure_string_array(value: &Value, path: &str, issues: &mut Vec<SchemaIssue>) {
    let Some(array) = value.as_array() else {
        issues.push(SchemaIssue::new(
            path.to_string(),
            "expected an array of strings",
            codes::INVALID_TYPE,
        ));
        return;
    };
    for (index, entry) in array.iter().enumerate() {
        if !entry.is_string() {
            issues.push(SchemaIssue::new(
                format!("{path}/{index}"),
                "expected a string entry",
                codes::INVALID_TYPE,
            ));
        }
    }
}
