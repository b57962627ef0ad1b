// crates/merge-pilot-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared plan builders and deterministic capability shims.
// Purpose: Provide reusable infrastructure for deterministic engine tests.
// Dependencies: merge-pilot-core
// ============================================================================

//! ## Overview
//! Shared fixtures for the engine tests: small plan builders and a
//! deterministic [`Subprocess`] shim whose outputs depend only on the
//! command line, so two runs of the same plan are byte-identical.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::unwrap_in_result,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Mutex;

use async_trait::async_trait;
use merge_pilot_core::Gate;
use merge_pilot_core::GateName;
use merge_pilot_core::GateRuntime;
use merge_pilot_core::ItemName;
use merge_pilot_core::Plan;
use merge_pilot_core::PlanItem;
use merge_pilot_core::Policy;
use merge_pilot_core::SpawnError;
use merge_pilot_core::SpawnOutput;
use merge_pilot_core::SpawnRequest;
use merge_pilot_core::Subprocess;

// ============================================================================
// SECTION: Plan Builders
// ============================================================================

/// Builds a local gate with no overlay and no artifacts.
pub fn gate(name: &str, run: &str) -> Gate {
    Gate {
        name: GateName::new(name),
        run: run.to_string(),
        cwd: None,
        env: BTreeMap::new(),
        runtime: GateRuntime::Local,
        artifacts: Vec::new(),
        container: None,
    }
}

/// Builds a plan item with dependencies and gates.
pub fn item(name: &str, deps: &[&str], gates: Vec<Gate>) -> PlanItem {
    PlanItem {
        name: ItemName::new(name),
        deps: deps.iter().map(|dep| ItemName::new(*dep)).collect::<BTreeSet<_>>(),
        gates,
    }
}

/// Builds a `1.0.0` plan targeting `main` with the default policy.
pub fn plan(items: Vec<PlanItem>) -> Plan {
    plan_with_policy(items, Policy::default())
}

/// Builds a `1.0.0` plan targeting `main` with an explicit policy.
pub fn plan_with_policy(items: Vec<PlanItem>, policy: Policy) -> Plan {
    Plan {
        schema_version: "1.0.0".to_string(),
        target: "main".to_string(),
        policy,
        items,
    }
}

// ============================================================================
// SECTION: Deterministic Subprocess Shim
// ============================================================================

/// Deterministic subprocess shim keyed by command line.
///
/// Commands not present in the exit-code table succeed with exit zero. Every
/// completion reports the same duration, and stdout echoes the command, so
/// identical plans produce identical artifacts.
pub struct FakeSubprocess {
    /// Exit code overrides per command line.
    exit_codes: BTreeMap<String, i32>,
    /// Spawn counts per command line.
    calls: Mutex<BTreeMap<String, u32>>,
}

impl FakeSubprocess {
    /// Creates a shim where every command exits zero.
    pub fn passing() -> Self {
        Self {
            exit_codes: BTreeMap::new(),
            calls: Mutex::new(BTreeMap::new()),
        }
    }

    /// Creates a shim with explicit exit codes per command line.
    pub fn with_exit_codes(exit_codes: &[(&str, i32)]) -> Self {
        Self {
            exit_codes: exit_codes
                .iter()
                .map(|(command, code)| ((*command).to_string(), *code))
                .collect(),
            calls: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns how many times a command was spawned.
    pub fn call_count(&self, command: &str) -> u32 {
        self.calls.lock().expect("calls lock").get(command).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Subprocess for FakeSubprocess {
    async fn spawn(&self, request: &SpawnRequest) -> Result<SpawnOutput, SpawnError> {
        *self
            .calls
            .lock()
            .expect("calls lock")
            .entry(request.command.clone())
            .or_insert(0) += 1;

        let exit_code = self.exit_codes.get(&request.command).copied().unwrap_or(0);
        Ok(SpawnOutput {
            exit_code,
            stdout: format!("{}\n", request.command).into_bytes(),
            stderr: Vec::new(),
            duration_ms: 7,
        })
    }
}

/// Subprocess shim that never completes; used for cancellation tests.
pub struct HangingSubprocess;

#[async_trait]
impl Subprocess for HangingSubprocess {
    async fn spawn(&self, _request: &SpawnRequest) -> Result<SpawnOutput, SpawnError> {
        std::future::pending::<()>().await;
        Err(SpawnError::Cancelled)
    }
}
