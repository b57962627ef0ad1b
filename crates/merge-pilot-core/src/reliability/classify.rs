// crates/merge-pilot-core/src/reliability/classify.rs
// ============================================================================
// Module: Merge Pilot Error Classification
// Description: Ordered rule table mapping errors to retry classifications.
// Purpose: Decide retryability, severity, and recovery guidance for failures.
// Dependencies: crate::core::schema, serde
// ============================================================================

//! ## Overview
//! Classification is a pure function from an error value to a record of
//! `{kind, severity, retryable, code, recovery_actions}`. The rules live in
//! an ordered data table; the first matching rule wins, and an unmatched
//! error classifies as unknown and non-retryable. Keeping the rules as data
//! lets tests enumerate coverage and makes adding a kind a one-line change.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::schema::SchemaValidationError;

// ============================================================================
// SECTION: Classification Records
// ============================================================================

/// Broad failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Retry can plausibly succeed.
    Transient,
    /// Retry cannot succeed without intervention.
    Permanent,
    /// The error did not match any rule.
    Unknown,
}

/// Failure severity for rendering and triage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Run-stopping failure requiring operator attention.
    Critical,
    /// Failure likely to affect the whole run.
    High,
    /// Failure scoped to one operation.
    Medium,
    /// Informational failure.
    Low,
}

/// Classification result for one error value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    /// Broad failure kind.
    pub kind: ErrorKind,
    /// Failure severity.
    pub severity: Severity,
    /// Whether a retry can plausibly succeed.
    pub retryable: bool,
    /// Stable machine code for the matched rule.
    pub code: String,
    /// Human recovery suggestions, most useful first.
    pub recovery_actions: Vec<String>,
    /// Additional key/value context.
    pub metadata: BTreeMap<String, String>,
}

// ============================================================================
// SECTION: Rule Table
// ============================================================================

/// Matcher applied by one classification rule.
#[derive(Debug, Clone, Copy)]
enum Matcher {
    /// Matches when the rendered error chain contains any needle.
    MessageContains(&'static [&'static str]),
    /// Matches schema-validation failures via downcast or message.
    ValidationMarker,
}

/// One entry in the ordered classification table.
#[derive(Debug, Clone, Copy)]
struct ClassificationRule {
    /// Stable machine code emitted on match.
    code: &'static str,
    /// Matcher for this rule.
    matcher: Matcher,
    /// Kind emitted on match.
    kind: ErrorKind,
    /// Severity emitted on match.
    severity: Severity,
    /// Retryability emitted on match.
    retryable: bool,
    /// Recovery suggestions emitted on match.
    recovery: &'static [&'static str],
}

/// Ordered classification rules; the first match wins.
const RULES: &[ClassificationRule] = &[
    ClassificationRule {
        code: "RATE_LIMIT",
        matcher: Matcher::MessageContains(&["rate limit", "rate-limit", "429", "too many requests"]),
        kind: ErrorKind::Transient,
        severity: Severity::Medium,
        retryable: true,
        recovery: &["Wait for the limit window to pass", "Reduce request concurrency"],
    },
    ClassificationRule {
        code: "NETWORK_ERROR",
        matcher: Matcher::MessageContains(&[
            "econnrefused",
            "enotfound",
            "etimedout",
            "network",
            "fetch failed",
        ]),
        kind: ErrorKind::Transient,
        severity: Severity::Medium,
        retryable: true,
        recovery: &["Check network connectivity", "Verify the remote endpoint is reachable"],
    },
    ClassificationRule {
        code: "AUTH_ERROR",
        matcher: Matcher::MessageContains(&["unauthorized", "authentication"]),
        kind: ErrorKind::Permanent,
        severity: Severity::Critical,
        retryable: false,
        recovery: &["Verify the credential is set", "Check credential expiry and scopes"],
    },
    ClassificationRule {
        code: "VALIDATION_ERROR",
        matcher: Matcher::ValidationMarker,
        kind: ErrorKind::Permanent,
        severity: Severity::High,
        retryable: false,
        recovery: &["Fix the reported plan issues and re-run"],
    },
    ClassificationRule {
        code: "TIMEOUT_ERROR",
        matcher: Matcher::MessageContains(&["timeout", "timed out"]),
        kind: ErrorKind::Transient,
        severity: Severity::Medium,
        retryable: true,
        recovery: &["Retry the operation", "Raise the timeout if the workload is legitimate"],
    },
    ClassificationRule {
        code: "SERVICE_UNAVAILABLE",
        matcher: Matcher::MessageContains(&["503", "502", "service unavailable", "bad gateway"]),
        kind: ErrorKind::Transient,
        severity: Severity::Medium,
        retryable: true,
        recovery: &["Retry after a short delay", "Check the downstream status page"],
    },
    ClassificationRule {
        code: "CIRCUIT_OPEN",
        matcher: Matcher::MessageContains(&["circuit open"]),
        kind: ErrorKind::Transient,
        severity: Severity::Medium,
        retryable: true,
        recovery: &["Wait for the breaker reset window"],
    },
    ClassificationRule {
        code: "GATE_FAILURE",
        matcher: Matcher::MessageContains(&["gate failed"]),
        kind: ErrorKind::Transient,
        severity: Severity::Medium,
        retryable: true,
        recovery: &["Inspect the gate's stdout and stderr artifacts"],
    },
];

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Classifies an error value against the ordered rule table.
#[must_use]
pub fn classify(error: &(dyn StdError + 'static)) -> Classification {
    let message = render_chain(error).to_lowercase();

    for rule in RULES {
        let matched = match rule.matcher {
            Matcher::MessageContains(needles) => {
                needles.iter().any(|needle| message.contains(needle))
            }
            Matcher::ValidationMarker => {
                has_validation_marker(error) || message.contains("validation")
            }
        };
        if matched {
            return Classification {
                kind: rule.kind,
                severity: rule.severity,
                retryable: rule.retryable,
                code: rule.code.to_string(),
                recovery_actions: rule.recovery.iter().map(ToString::to_string).collect(),
                metadata: BTreeMap::new(),
            };
        }
    }

    Classification {
        kind: ErrorKind::Unknown,
        severity: Severity::High,
        retryable: false,
        code: "UNKNOWN".to_string(),
        recovery_actions: vec!["Inspect the error message and artifacts".to_string()],
        metadata: BTreeMap::new(),
    }
}

/// Walks the source chain looking for a schema-validation marker.
fn has_validation_marker(error: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(err) = current {
        if err.is::<SchemaValidationError>() {
            return true;
        }
        current = err.source();
    }
    false
}

/// Renders the full error chain into one string.
fn render_chain(error: &(dyn StdError + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut current = error.source();
    while let Some(err) = current {
        rendered.push_str(": ");
        rendered.push_str(&err.to_string());
        current = err.source();
    }
    rendered
}

// ============================================================================
// SECTION: User-Facing Rendering
// ============================================================================

/// Fully rendered failure record shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFacingError {
    /// Operation context, e.g. `plan validation`.
    pub context: String,
    /// One-sentence diagnosis.
    pub message: String,
    /// Broad failure kind.
    pub kind: ErrorKind,
    /// Whether a retry can plausibly succeed.
    pub retryable: bool,
    /// Failure severity.
    pub severity: Severity,
    /// Recovery suggestions, most useful first.
    pub recovery_actions: Vec<String>,
}

impl UserFacingError {
    /// Builds the user-facing record for an error in a given context.
    #[must_use]
    pub fn from_error(context: impl Into<String>, error: &(dyn StdError + 'static)) -> Self {
        let classification = classify(error);
        Self {
            context: context.into(),
            message: error.to_string(),
            kind: classification.kind,
            retryable: classification.retryable,
            severity: classification.severity,
            recovery_actions: classification.recovery_actions,
        }
    }
}

impl fmt::Display for UserFacingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}", self.context, self.message)?;
        for action in &self.recovery_actions {
            writeln!(f, "  - {action}")?;
        }
        Ok(())
    }
}
