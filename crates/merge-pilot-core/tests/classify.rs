// crates/merge-pilot-core/tests/classify.rs
// ============================================================================
// Module: Error Classification Tests
// Description: Ordered rule-table coverage for the error classifier.
// ============================================================================
//! ## Overview
//! Validates the classification table rule by rule, the first-match-wins
//! ordering, the validation marker, and the unknown fallback.

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

use std::fmt;

use merge_pilot_core::SchemaValidationError;
use merge_pilot_core::UserFacingError;
use merge_pilot_core::classify;
use merge_pilot_core::reliability::ErrorKind;
use merge_pilot_core::reliability::Severity;

/// Minimal error wrapper with a fixed message.
#[derive(Debug)]
struct TextError(String);

impl fmt::Display for TextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for TextError {}

/// Error carrying a schema-validation source.
#[derive(Debug)]
struct WrappedValidation(SchemaValidationError);

impl fmt::Display for WrappedValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plan rejected")
    }
}

impl std::error::Error for WrappedValidation {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// Classifies a plain message.
fn classify_message(message: &str) -> merge_pilot_core::Classification {
    classify(&TextError(message.to_string()))
}

#[test]
fn rate_limit_classifies_first() {
    let classification = classify_message("429 too many requests; network degraded");
    assert_eq!(classification.code, "RATE_LIMIT");
    assert_eq!(classification.kind, ErrorKind::Transient);
    assert!(classification.retryable);
}

#[test]
fn network_errors_are_transient() {
    for message in ["ECONNREFUSED", "ENOTFOUND host", "ETIMEDOUT", "fetch failed"] {
        let classification = classify_message(message);
        assert_eq!(classification.code, "NETWORK_ERROR", "message: {message}");
        assert!(classification.retryable);
    }
}

#[test]
fn auth_errors_are_permanent_and_critical() {
    let classification = classify_message("401 unauthorized");
    assert_eq!(classification.code, "AUTH_ERROR");
    assert_eq!(classification.kind, ErrorKind::Permanent);
    assert_eq!(classification.severity, Severity::Critical);
    assert!(!classification.retryable);
    assert!(!classification.recovery_actions.is_empty());
}

#[test]
fn validation_marker_is_detected_through_the_chain() {
    let error = WrappedValidation(SchemaValidationError {
        issues: Vec::new(),
    });
    let classification = classify(&error);
    assert_eq!(classification.code, "VALIDATION_ERROR");
    assert!(!classification.retryable);
}

#[test]
fn timeouts_are_retryable() {
    let classification = classify_message("operation timed out");
    assert_eq!(classification.code, "TIMEOUT_ERROR");
    assert!(classification.retryable);
}

#[test]
fn service_unavailable_is_transient() {
    let classification = classify_message("upstream returned 503");
    assert_eq!(classification.code, "SERVICE_UNAVAILABLE");
    assert!(classification.retryable);
}

#[test]
fn circuit_open_is_transient() {
    let classification = classify_message("circuit open for `hosting`; retry in 250 ms");
    assert_eq!(classification.code, "CIRCUIT_OPEN");
    assert!(classification.retryable);
}

#[test]
fn unmatched_errors_are_unknown_and_not_retryable() {
    let classification = classify_message("segmentation fault");
    assert_eq!(classification.code, "UNKNOWN");
    assert_eq!(classification.kind, ErrorKind::Unknown);
    assert!(!classification.retryable);
}

#[test]
fn user_facing_rendering_leads_with_the_diagnosis() {
    let rendered =
        UserFacingError::from_error("plan validation", &TextError("unauthorized".to_string()));
    let text = rendered.to_string();
    let first_line = text.lines().next().unwrap_or("");
    assert_eq!(first_line, "plan validation: unauthorized");
    assert!(text.lines().count() > 1);
}
