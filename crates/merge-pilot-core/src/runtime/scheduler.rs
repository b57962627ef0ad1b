// crates/merge-pilot-core/src/runtime/scheduler.rs
// ============================================================================
// Module: Merge Pilot Scheduler
// Description: Bounded-concurrency execution of plan items across DAG levels.
// Purpose: Drive gate execution level by level with retry and cancellation.
// Dependencies: crate::{core, dag, reliability, runtime}, tokio
// ============================================================================

//! ## Overview
//! The scheduler iterates DAG levels in order with a hard barrier between
//! levels: no item starts until every item in lower levels reached a
//! terminal status. Within a level, items run as independent tasks bounded
//! by a worker semaphore of `policy.max_workers` slots. Within an item,
//! gates run strictly in declared order and stop early on the first failure
//! that blocks the item. Gates named in `policy.retries` run through the
//! retry engine with jitter disabled so identical plans under deterministic
//! capabilities replay byte-identically.
//!
//! The scheduler mutates only the execution state and performs no I/O to
//! external collaborators.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::core::Gate;
use crate::core::GateResult;
use crate::core::GateRuntime;
use crate::core::GateStatus;
use crate::core::NodeStatus;
use crate::core::Plan;
use crate::core::PlanItem;
use crate::core::Policy;
use crate::core::RetrySpec;
use crate::core::Timestamp;
use crate::dag::DagError;
use crate::dag::resolve_levels;
use crate::interfaces::Clock;
use crate::reliability::retry::AttemptFailure;
use crate::reliability::retry::RetryConfig;
use crate::reliability::retry::RetryEngine;
use crate::reliability::retry::RetryError;
use crate::runtime::artifacts::ArtifactLayout;
use crate::runtime::cancel::CancelToken;
use crate::runtime::executor::ExecError;
use crate::runtime::executor::GateExecutor;
use crate::runtime::executor::GateRun;
use crate::runtime::state::ExecutionState;
use crate::runtime::state::StateError;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Scheduler configuration supplied by the embedding layer.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Root directory gates resolve their working directories against.
    pub workspace_root: PathBuf,
    /// Hard wall-clock timeout applied to every gate attempt, in ms.
    pub gate_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("."),
            gate_timeout_ms: 30 * 60 * 1_000,
        }
    }
}

/// Upper bound applied to retry backoff delays, in milliseconds.
const MAX_BACKOFF_MS: u64 = 60_000;

/// Skip reason recorded for items cancelled before dispatch.
const CANCELLED_BEFORE_DISPATCH: &str = "cancelled before dispatch";

/// Skip reason recorded for items cancelled while running.
const CANCELLED_IN_FLIGHT: &str = "cancelled during execution";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Scheduler failures.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The plan's dependency graph does not resolve.
    #[error(transparent)]
    Dag(#[from] DagError),
    /// The execution state rejected an update.
    #[error(transparent)]
    State(#[from] StateError),
    /// A gate subprocess could not be spawned or managed at all.
    ///
    /// Distinct from a failing gate: a non-zero exit code is a normal
    /// outcome recorded on the gate result, while this is an environment
    /// fault raised to the caller.
    #[error("gate `{gate}` of item `{item}` could not be executed")]
    GateExec {
        /// Item whose gate could not run.
        item: String,
        /// Gate that could not run.
        gate: String,
        /// Underlying executor failure.
        #[source]
        source: ExecError,
    },
    /// A worker task aborted unexpectedly.
    #[error("worker task aborted: {0}")]
    WorkerAborted(String),
}

// ============================================================================
// SECTION: Scheduler
// ============================================================================

/// Bounded-concurrency DAG scheduler.
pub struct Scheduler {
    /// Gate executor shared across worker tasks.
    executor: Arc<GateExecutor>,
    /// Clock capability for retry backoff and timestamps.
    clock: Arc<dyn Clock>,
    /// Scheduler configuration.
    config: SchedulerConfig,
}

impl Scheduler {
    /// Creates a new scheduler.
    #[must_use]
    pub fn new(executor: Arc<GateExecutor>, clock: Arc<dyn Clock>, config: SchedulerConfig) -> Self {
        Self {
            executor,
            clock,
            config,
        }
    }

    /// Executes a validated plan against the execution state.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError`] for DAG resolution failures and internal
    /// state errors. Gate failures are recorded in the state, never raised.
    pub async fn run(
        &self,
        plan: &Plan,
        state: &Arc<ExecutionState>,
        layout: &ArtifactLayout,
        cancel: &CancelToken,
    ) -> Result<(), SchedulerError> {
        let levels = resolve_levels(plan)?;
        let max_workers = usize::try_from(plan.policy.max_workers).unwrap_or(1).max(1);
        let semaphore = Arc::new(Semaphore::new(max_workers));
        let policy = Arc::new(plan.policy.clone());

        for (depth, level) in levels.iter().enumerate() {
            if cancel.is_cancelled() {
                for name in level {
                    state.mark_skipped(name, CANCELLED_BEFORE_DISPATCH)?;
                }
                continue;
            }

            debug!(depth, width = level.len(), "dispatching level");
            let mut tasks: JoinSet<Result<(), SchedulerError>> = JoinSet::new();

            for name in level {
                let Some(item) = plan.item(name) else {
                    continue;
                };
                if !deps_all_passed(state, item)? {
                    // Propagation after the level barrier records blockers.
                    continue;
                }

                let task = ItemTask {
                    item: item.clone(),
                    policy: Arc::clone(&policy),
                    state: Arc::clone(state),
                    executor: Arc::clone(&self.executor),
                    clock: Arc::clone(&self.clock),
                    semaphore: Arc::clone(&semaphore),
                    cancel: cancel.clone(),
                    workspace_root: self.config.workspace_root.clone(),
                    gate_timeout_ms: self.config.gate_timeout_ms,
                    layout: layout.clone(),
                };
                tasks.spawn(run_item(task));
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(result) => result?,
                    Err(err) => return Err(SchedulerError::WorkerAborted(err.to_string())),
                }
            }

            state.propagate_blocked()?;
        }

        Ok(())
    }
}

/// Returns true when every dependency of an item has passed.
fn deps_all_passed(state: &Arc<ExecutionState>, item: &PlanItem) -> Result<bool, StateError> {
    for dep in &item.deps {
        if state.status_of(dep)? != NodeStatus::Pass {
            return Ok(false);
        }
    }
    Ok(true)
}

// ============================================================================
// SECTION: Item Tasks
// ============================================================================

/// Owned context for one item's worker task.
struct ItemTask {
    /// Item under execution.
    item: PlanItem,
    /// Plan policy.
    policy: Arc<Policy>,
    /// Shared execution state.
    state: Arc<ExecutionState>,
    /// Shared gate executor.
    executor: Arc<GateExecutor>,
    /// Clock capability.
    clock: Arc<dyn Clock>,
    /// Worker-slot semaphore.
    semaphore: Arc<Semaphore>,
    /// Cancellation signal.
    cancel: CancelToken,
    /// Root directory for gate working directories.
    workspace_root: PathBuf,
    /// Per-attempt gate timeout, in milliseconds.
    gate_timeout_ms: u64,
    /// Artifact layout for gate stream files.
    layout: ArtifactLayout,
}

/// Runs all gates of one item sequentially.
async fn run_item(task: ItemTask) -> Result<(), SchedulerError> {
    let name = task.item.name.clone();

    let permit = tokio::select! {
        biased;
        permit = Arc::clone(&task.semaphore).acquire_owned() => permit,
        () = task.cancel.cancelled() => {
            task.state.mark_skipped(&name, CANCELLED_BEFORE_DISPATCH)?;
            return Ok(());
        }
    };
    let Ok(_permit) = permit else {
        // The semaphore only closes when the scheduler is torn down.
        task.state.mark_skipped(&name, CANCELLED_BEFORE_DISPATCH)?;
        return Ok(());
    };

    if task.cancel.is_cancelled() {
        task.state.mark_skipped(&name, CANCELLED_BEFORE_DISPATCH)?;
        return Ok(());
    }

    task.state.mark_dispatched(&name)?;
    info!(item = %name, gates = task.item.gates.len(), "item dispatched");

    for gate in &task.item.gates {
        if task.cancel.is_cancelled() {
            task.state.mark_skipped(&name, CANCELLED_IN_FLIGHT)?;
            return Ok(());
        }

        let outcome = match run_gate(&task, gate).await {
            Ok(outcome) => outcome,
            Err(source) => {
                warn!(item = %name, gate = %gate.name, error = %source, "gate could not be executed");
                return Err(SchedulerError::GateExec {
                    item: name.to_string(),
                    gate: gate.name.to_string(),
                    source,
                });
            }
        };
        let result = match outcome {
            GateOutcome::Completed(result) => result,
            GateOutcome::Cancelled => {
                task.state.mark_skipped(&name, CANCELLED_IN_FLIGHT)?;
                return Ok(());
            }
        };

        let failed = result.status == GateStatus::Fail;
        let blocks = task.policy.gate_blocks_item(&gate.name);
        task.state.record_gate(&name, result)?;

        if failed && blocks {
            info!(item = %name, gate = %gate.name, "blocking gate failed; stopping item early");
            return Ok(());
        }
    }

    task.state.complete_item(&name)?;
    Ok(())
}

// ============================================================================
// SECTION: Gate Dispatch
// ============================================================================

/// Outcome of one gate dispatch from the item loop's perspective.
enum GateOutcome {
    /// The gate produced a result (pass, fail, or skipped).
    Completed(GateResult),
    /// Cancellation interrupted the gate.
    Cancelled,
}

/// Error type threaded through the retry engine for one gate.
#[derive(Debug, Error)]
enum GateAttemptError {
    /// The gate ran and failed; retry when the policy allows.
    #[error("gate failed with exit code {}", code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    Failed {
        /// Exit code of the failing attempt.
        code: Option<i32>,
        /// Full result of the failing attempt.
        result: Box<GateResult>,
    },
    /// Spawn-level executor failure.
    #[error(transparent)]
    Exec(ExecError),
}

/// Runs one gate, composing the retry engine when policy declares it.
///
/// # Errors
///
/// Returns [`ExecError`] when the gate subprocess could not be spawned or
/// managed; the caller raises it as a scheduler failure.
async fn run_gate(task: &ItemTask, gate: &Gate) -> Result<GateOutcome, ExecError> {
    if gate.runtime != GateRuntime::Local {
        debug!(gate = %gate.name, runtime = ?gate.runtime, "non-local runtime recorded as skipped");
        return Ok(GateOutcome::Completed(skipped_result(gate, task.clock.now())));
    }

    let gate_dir = task.layout.gate_dir(&task.item.name, &gate.name);
    match task.policy.retry_for(&gate.name) {
        None => run_gate_once(task, gate, gate_dir).await,
        Some(spec) => run_gate_with_retry(task, gate, gate_dir, *spec).await,
    }
}

/// Runs a gate exactly once.
async fn run_gate_once(
    task: &ItemTask,
    gate: &Gate,
    gate_dir: PathBuf,
) -> Result<GateOutcome, ExecError> {
    let run = GateRun {
        gate,
        item_root: task.workspace_root.clone(),
        gate_dir,
        timeout_ms: task.gate_timeout_ms,
        attempt: 1,
    };
    match task.executor.execute(&run, &task.cancel).await {
        Ok(result) => Ok(GateOutcome::Completed(result)),
        Err(ExecError::Cancelled) => Ok(GateOutcome::Cancelled),
        Err(err) => Err(err),
    }
}

/// Runs a gate through the retry engine.
async fn run_gate_with_retry(
    task: &ItemTask,
    gate: &Gate,
    gate_dir: PathBuf,
    spec: RetrySpec,
) -> Result<GateOutcome, ExecError> {
    // Jitter stays off so identical plans replay byte-identically under
    // deterministic capabilities.
    let config = RetryConfig {
        max_attempts: spec.max_attempts,
        initial_delay_ms: spec.backoff_seconds.saturating_mul(1_000),
        max_delay_ms: MAX_BACKOFF_MS.max(spec.backoff_seconds.saturating_mul(1_000)),
        backoff_multiplier: 2.0,
        jitter: false,
        timeout_ms: None,
    };
    let engine = RetryEngine::new(config, Arc::clone(&task.clock));
    let context = format!("{}/{}", task.item.name, gate.name);

    let outcome = engine
        .run(&context, &task.cancel, |attempt| {
            let run = GateRun {
                gate,
                item_root: task.workspace_root.clone(),
                gate_dir: gate_dir.clone(),
                timeout_ms: task.gate_timeout_ms,
                attempt,
            };
            let executor = Arc::clone(&task.executor);
            let cancel = task.cancel.clone();
            async move {
                match executor.execute(&run, &cancel).await {
                    Ok(mut result) => {
                        result.attempts = attempt;
                        if result.status == GateStatus::Pass {
                            Ok(result)
                        } else {
                            Err(GateAttemptError::Failed {
                                code: result.exit_code,
                                result: Box::new(result),
                            })
                        }
                    }
                    Err(err) => Err(GateAttemptError::Exec(err)),
                }
            }
        })
        .await;

    match outcome {
        Ok(result) => Ok(GateOutcome::Completed(result)),
        Err(RetryError::Cancelled {
            ..
        }) => Ok(GateOutcome::Cancelled),
        Err(
            RetryError::Exhausted {
                attempts,
                source,
                ..
            }
            | RetryError::NonRetryable {
                attempts,
                source,
                ..
            },
        ) => match source {
            AttemptFailure::Operation(GateAttemptError::Failed {
                result, ..
            }) => Ok(GateOutcome::Completed(*result)),
            AttemptFailure::Operation(GateAttemptError::Exec(ExecError::Cancelled)) => {
                Ok(GateOutcome::Cancelled)
            }
            AttemptFailure::Operation(GateAttemptError::Exec(err)) => Err(err),
            AttemptFailure::Timeout {
                timeout_ms,
            } => Ok(GateOutcome::Completed(failed_result(
                gate,
                attempts,
                task.clock.now(),
                &format!("attempt timed out after {timeout_ms} ms"),
            ))),
        },
    }
}

// ============================================================================
// SECTION: Result Builders
// ============================================================================

/// Builds a skipped result for non-local runtimes.
fn skipped_result(gate: &Gate, now: Timestamp) -> GateResult {
    let runtime = match gate.runtime {
        GateRuntime::Local => "local",
        GateRuntime::Container => "container",
        GateRuntime::CiService => "ci-service",
    };
    GateResult {
        gate: gate.name.clone(),
        status: GateStatus::Skipped,
        exit_code: None,
        duration_ms: 0,
        stdout: String::new(),
        stderr: format!("runtime `{runtime}` is not executed by the core engine"),
        artifacts: Vec::new(),
        attempts: 1,
        last_attempt: now,
    }
}

/// Builds a failed result for attempts that exhausted on timeouts.
fn failed_result(gate: &Gate, attempts: u32, now: Timestamp, message: &str) -> GateResult {
    GateResult {
        gate: gate.name.clone(),
        status: GateStatus::Fail,
        exit_code: None,
        duration_ms: 0,
        stdout: String::new(),
        stderr: message.to_string(),
        artifacts: Vec::new(),
        attempts,
        last_attempt: now,
    }
}
