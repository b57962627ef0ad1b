// crates/merge-pilot-core/examples/minimal.rs
// ============================================================================
// Module: Merge Pilot Minimal Example
// Description: Minimal end-to-end plan run using a deterministic subprocess.
// Purpose: Demonstrate plan construction, execution, and report folding.
// Dependencies: merge-pilot-core
// ============================================================================

//! ## Overview
//! Runs a two-item plan through the engine with an in-memory subprocess
//! shim and a logical clock. Backend-agnostic and suitable for quick
//! verification.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use merge_pilot_core::CancelToken;
use merge_pilot_core::Gate;
use merge_pilot_core::GateName;
use merge_pilot_core::GateRuntime;
use merge_pilot_core::ItemName;
use merge_pilot_core::ManualClock;
use merge_pilot_core::Plan;
use merge_pilot_core::PlanItem;
use merge_pilot_core::PlanRunner;
use merge_pilot_core::Policy;
use merge_pilot_core::RunOptions;
use merge_pilot_core::SpawnError;
use merge_pilot_core::SpawnOutput;
use merge_pilot_core::SpawnRequest;
use merge_pilot_core::Subprocess;
use merge_pilot_core::runtime::ExecutorConfig;
use merge_pilot_core::runtime::SchedulerConfig;

/// Subprocess shim that succeeds with a fixed duration.
struct ExampleSubprocess;

#[async_trait]
impl Subprocess for ExampleSubprocess {
    async fn spawn(&self, request: &SpawnRequest) -> Result<SpawnOutput, SpawnError> {
        Ok(SpawnOutput {
            exit_code: 0,
            stdout: format!("{}\n", request.command).into_bytes(),
            stderr: Vec::new(),
            duration_ms: 5,
        })
    }
}

/// Builds a two-item plan with one gate each.
fn build_plan() -> Plan {
    let gate = |name: &str, run: &str| Gate {
        name: GateName::new(name),
        run: run.to_string(),
        cwd: None,
        env: BTreeMap::new(),
        runtime: GateRuntime::Local,
        artifacts: Vec::new(),
        container: None,
    };

    Plan {
        schema_version: "1.0.0".to_string(),
        target: "main".to_string(),
        policy: Policy::default(),
        items: vec![
            PlanItem {
                name: ItemName::new("base"),
                deps: std::collections::BTreeSet::new(),
                gates: vec![gate("test", "echo base")],
            },
            PlanItem {
                name: ItemName::new("feature"),
                deps: [ItemName::new("base")].into_iter().collect(),
                gates: vec![gate("test", "echo feature")],
            },
        ],
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let plan = build_plan();
    let runner = PlanRunner::new(Arc::new(ManualClock::new()), Arc::new(ExampleSubprocess));

    let output_dir = std::env::temp_dir().join("merge-pilot-minimal");
    let options = RunOptions {
        output_dir,
        scheduler: SchedulerConfig::default(),
        executor: ExecutorConfig::default(),
    };

    let outcome = runner.run(&plan, &options, &CancelToken::new()).await?;
    let _ = outcome;
    Ok(())
}
