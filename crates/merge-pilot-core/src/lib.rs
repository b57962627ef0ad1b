// crates/merge-pilot-core/src/lib.rs
// ============================================================================
// Module: Merge Pilot Core Library
// Description: Public API surface for the Merge Pilot engine.
// Purpose: Expose core types, interfaces, and runtime helpers.
// Dependencies: crate::{core, dag, interfaces, reliability, runtime}
// ============================================================================

//! ## Overview
//! Merge Pilot core is the deterministic planning-and-execution engine for
//! integrating interdependent change units into a target branch: plan
//! validation with canonical serialization, dependency-level resolution,
//! bounded-concurrency gate execution with retry, failure propagation, and
//! policy-based merge eligibility with auditable overrides. The engine is
//! backend-agnostic and integrates through explicit capability interfaces.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod dag;
pub mod interfaces;
pub mod reliability;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use dag::CycleError;
pub use dag::DagError;
pub use dag::UnknownDependencyError;
pub use dag::resolve_levels;
pub use interfaces::Clock;
pub use interfaces::CodeHost;
pub use interfaces::CodeHostError;
pub use interfaces::SpawnError;
pub use interfaces::SpawnOutput;
pub use interfaces::SpawnRequest;
pub use interfaces::Subprocess;
pub use reliability::BreakerConfig;
pub use reliability::BreakerState;
pub use reliability::CircuitBreaker;
pub use reliability::CircuitOpenError;
pub use reliability::Classification;
pub use reliability::RetryConfig;
pub use reliability::RetryEngine;
pub use reliability::RetryError;
pub use reliability::UserFacingError;
pub use reliability::classify;
pub use runtime::CancelToken;
pub use runtime::EligibilityEvaluator;
pub use runtime::ExecutionState;
pub use runtime::GateExecutor;
pub use runtime::ManualClock;
pub use runtime::PlanRunner;
pub use runtime::Report;
pub use runtime::RunOptions;
pub use runtime::RunOutcome;
pub use runtime::Scheduler;
pub use runtime::ShellSubprocess;
pub use runtime::SystemClock;
