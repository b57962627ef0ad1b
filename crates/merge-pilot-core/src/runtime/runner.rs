// crates/merge-pilot-core/src/runtime/runner.rs
// ============================================================================
// Module: Merge Pilot Plan Runner
// Description: Single entry point wiring validation, execution, and reports.
// Purpose: Run one plan end to end and flush the artifact set.
// Dependencies: crate::{core, dag, runtime}
// ============================================================================

//! ## Overview
//! The runner is the canonical execution path for one plan: validate the
//! structure, resolve the DAG, write the canonical plan artifact, schedule
//! every level, evaluate eligibility, and flush the state and report
//! artifacts. Validation failures surface synchronously before any gate
//! runs; partial artifacts are still flushed on cancellation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::core::EncodingError;
use crate::core::Plan;
use crate::core::PlanError;
use crate::dag::DagError;
use crate::dag::resolve_levels;
use crate::interfaces::Clock;
use crate::interfaces::Subprocess;
use crate::runtime::artifacts::ArtifactError;
use crate::runtime::artifacts::ArtifactLayout;
use crate::runtime::cancel::CancelToken;
use crate::runtime::eligibility::EligibilityEvaluator;
use crate::runtime::eligibility::EligibilityReport;
use crate::runtime::executor::ExecutorConfig;
use crate::runtime::executor::GateExecutor;
use crate::runtime::report::Report;
use crate::runtime::report::build_report;
use crate::runtime::scheduler::Scheduler;
use crate::runtime::scheduler::SchedulerConfig;
use crate::runtime::scheduler::SchedulerError;
use crate::runtime::state::ExecutionState;
use crate::runtime::state::StateError;
use crate::runtime::state::StateSnapshot;

// ============================================================================
// SECTION: Options and Outcome
// ============================================================================

/// Options for one plan run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Output directory for the artifact layout.
    pub output_dir: PathBuf,
    /// Scheduler configuration.
    pub scheduler: SchedulerConfig,
    /// Executor configuration.
    pub executor: ExecutorConfig,
}

/// Outcome of one plan run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Final report artifact.
    pub report: Report,
    /// Final execution-state snapshot.
    pub snapshot: StateSnapshot,
    /// Eligibility decisions and summary.
    pub eligibility: EligibilityReport,
    /// True when the cancellation signal fired during the run.
    pub cancelled: bool,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Runner failures.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Plan structural validation failed.
    #[error(transparent)]
    Plan(#[from] PlanError),
    /// Dependency resolution failed.
    #[error(transparent)]
    Dag(#[from] DagError),
    /// Scheduling failed internally.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    /// Execution state rejected an update.
    #[error(transparent)]
    State(#[from] StateError),
    /// Artifact writing failed.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    /// Canonical encoding failed.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

// ============================================================================
// SECTION: Plan Runner
// ============================================================================

/// End-to-end plan runner over injected capabilities.
pub struct PlanRunner {
    /// Clock capability.
    clock: Arc<dyn Clock>,
    /// Subprocess capability.
    subprocess: Arc<dyn Subprocess>,
}

impl PlanRunner {
    /// Creates a runner with the given capabilities.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, subprocess: Arc<dyn Subprocess>) -> Self {
        Self {
            clock,
            subprocess,
        }
    }

    /// Runs one plan end to end.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] for validation failures, spawn-level gate
    /// execution faults, internal state errors, and artifact failures.
    /// Failing gates (non-zero exits, timeouts) never surface here; they
    /// are recorded in the state and report.
    pub async fn run(
        &self,
        plan: &Plan,
        options: &RunOptions,
        cancel: &CancelToken,
    ) -> Result<RunOutcome, RunnerError> {
        plan.validate()?;
        let levels = resolve_levels(plan)?;
        info!(items = plan.items.len(), levels = levels.len(), "plan validated");

        let layout = ArtifactLayout::create(&options.output_dir)?;
        layout.write_canonical(&layout.plan_path(), plan)?;

        let state = Arc::new(ExecutionState::init(plan));
        let executor = Arc::new(GateExecutor::new(
            Arc::clone(&self.subprocess),
            Arc::clone(&self.clock),
            options.executor,
        ));
        let scheduler =
            Scheduler::new(executor, Arc::clone(&self.clock), options.scheduler.clone());

        let run_result = scheduler.run(plan, &state, &layout, cancel).await;

        // Partial artifacts are still flushed when scheduling failed.
        let evaluator = EligibilityEvaluator::new(plan);
        let eligibility = evaluator.evaluate(&state.snapshot()?);
        for (name, decision) in &eligibility.decisions {
            state.set_eligibility(name, decision.eligible)?;
        }

        let snapshot = state.snapshot()?;
        let report = build_report(plan, &snapshot, &eligibility)?;
        layout.write_canonical(&layout.state_path(), &snapshot)?;
        layout.write_canonical(&layout.report_path(), &report)?;
        layout.write_text(&layout.report_markdown_path(), &report.render_markdown())?;

        run_result?;

        Ok(RunOutcome {
            report,
            snapshot,
            eligibility,
            cancelled: cancel.is_cancelled(),
        })
    }
}
