#![cfg_attr(
    test,
    allow(
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
    )
)]
// crates/merge-pilot-cli/src/main.rs
// ============================================================================
// Module: Merge Pilot CLI Entry Point
// Description: Command dispatcher for plan validation and execution.
// Purpose: Embed the core engine behind a small, exit-code-stable CLI.
// Dependencies: clap, merge-pilot-core, serde_json, tokio, tracing-subscriber
// ============================================================================

//! ## Overview
//! The Merge Pilot CLI loads a plan document, validates it, runs the engine
//! with the system capabilities, and maps outcomes to stable exit codes:
//! `0` every required gate passed, `1` at least one item not eligible,
//! `2` schema or DAG validation failed, `3` cancelled, `64` internal error.
//! Ctrl-C fires the engine's cancellation signal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use merge_pilot_core::CancelToken;
use merge_pilot_core::Plan;
use merge_pilot_core::PlanRunner;
use merge_pilot_core::RunOptions;
use merge_pilot_core::RunOutcome;
use merge_pilot_core::ShellSubprocess;
use merge_pilot_core::SystemClock;
use merge_pilot_core::UserFacingError;
use merge_pilot_core::core::schema::validate_plan;
use merge_pilot_core::dag::resolve_levels;
use merge_pilot_core::runtime::ExecutorConfig;
use merge_pilot_core::runtime::RunnerError;
use merge_pilot_core::runtime::SchedulerConfig;
use thiserror::Error;

// ============================================================================
// SECTION: Exit Codes
// ============================================================================

/// Every required gate passed and every item is eligible.
const EXIT_OK: u8 = 0;
/// The run completed but at least one item is not eligible.
const EXIT_NOT_ELIGIBLE: u8 = 1;
/// Schema or DAG validation failed.
const EXIT_VALIDATION: u8 = 2;
/// The run was cancelled.
const EXIT_CANCELLED: u8 = 3;
/// Internal error.
const EXIT_INTERNAL: u8 = 64;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "merge-pilot", version, arg_required_else_help = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a plan document's schema and dependency graph.
    Validate(ValidateCommand),
    /// Execute a plan and write the run artifacts.
    Run(RunCommand),
}

/// Arguments for plan validation.
#[derive(Args, Debug)]
struct ValidateCommand {
    /// Path to the plan JSON document.
    #[arg(long, value_name = "PATH")]
    plan: PathBuf,
}

/// Arguments for plan execution.
#[derive(Args, Debug)]
struct RunCommand {
    /// Path to the plan JSON document.
    #[arg(long, value_name = "PATH")]
    plan: PathBuf,
    /// Output directory for run artifacts.
    #[arg(long, value_name = "DIR")]
    out: PathBuf,
    /// Root directory gate working directories resolve against.
    #[arg(long, value_name = "DIR", default_value = ".")]
    workspace: PathBuf,
    /// Hard wall-clock timeout per gate attempt, in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 30 * 60 * 1_000)]
    gate_timeout_ms: u64,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI failures with their exit-code mapping.
#[derive(Debug, Error)]
enum CliError {
    /// The plan file could not be read or decoded.
    #[error("failed to read plan {path}: {reason}")]
    PlanRead {
        /// Offending path.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },
    /// Schema or DAG validation failed.
    #[error("plan validation failed")]
    Validation {
        /// Rendered issue lines.
        issues: Vec<String>,
    },
    /// The run was cancelled.
    #[error("run cancelled")]
    Cancelled,
    /// Internal engine failure.
    #[error(transparent)]
    Internal(#[from] RunnerError),
}

impl CliError {
    /// Maps the error to its stable exit code.
    const fn exit_code(&self) -> u8 {
        match self {
            Self::PlanRead {
                ..
            }
            | Self::Validation {
                ..
            } => EXIT_VALIDATION,
            Self::Cancelled => EXIT_CANCELLED,
            Self::Internal(_) => EXIT_INTERNAL,
        }
    }
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Process entry point.
fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            report_failure("runtime initialization", &err);
            return ExitCode::from(EXIT_INTERNAL);
        }
    };

    match runtime.block_on(dispatch(cli)) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            render_cli_error(&err);
            ExitCode::from(err.exit_code())
        }
    }
}

/// Dispatches the parsed CLI command.
async fn dispatch(cli: Cli) -> Result<u8, CliError> {
    match cli.command {
        Commands::Validate(command) => validate(&command),
        Commands::Run(command) => run(command).await,
    }
}

// ============================================================================
// SECTION: Validate Command
// ============================================================================

/// Validates a plan document and its dependency graph.
fn validate(command: &ValidateCommand) -> Result<u8, CliError> {
    let plan = load_plan(&command.plan)?;
    let levels = resolve_levels(&plan).map_err(|err| CliError::Validation {
        issues: vec![err.to_string()],
    })?;

    emit(&format!(
        "plan ok: {} item(s) across {} level(s), target `{}`\n",
        plan.items.len(),
        levels.len(),
        plan.target
    ));
    Ok(EXIT_OK)
}

// ============================================================================
// SECTION: Run Command
// ============================================================================

/// Executes a plan and writes the artifact set.
async fn run(command: RunCommand) -> Result<u8, CliError> {
    let plan = load_plan(&command.plan)?;

    let cancel = CancelToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.fire();
        }
    });

    let runner = PlanRunner::new(Arc::new(SystemClock::new()), Arc::new(ShellSubprocess::new()));
    let options = RunOptions {
        output_dir: command.out.clone(),
        scheduler: SchedulerConfig {
            workspace_root: command.workspace.clone(),
            gate_timeout_ms: command.gate_timeout_ms,
        },
        executor: ExecutorConfig::default(),
    };

    let outcome = match runner.run(&plan, &options, &cancel).await {
        Ok(outcome) => outcome,
        Err(err @ (RunnerError::Plan(_) | RunnerError::Dag(_))) => {
            return Err(CliError::Validation {
                issues: vec![err.to_string()],
            });
        }
        Err(err) => return Err(CliError::Internal(err)),
    };

    render_outcome(&outcome, &command.out);

    if outcome.cancelled {
        return Err(CliError::Cancelled);
    }
    Ok(exit_code_for(&outcome))
}

/// Maps a completed run outcome onto the exit-code contract.
fn exit_code_for(outcome: &RunOutcome) -> u8 {
    let all_eligible =
        outcome.eligibility.decisions.values().all(|decision| decision.eligible);
    if outcome.report.all_green && all_eligible {
        EXIT_OK
    } else {
        EXIT_NOT_ELIGIBLE
    }
}

// ============================================================================
// SECTION: Plan Loading
// ============================================================================

/// Reads and validates the plan document.
fn load_plan(path: &PathBuf) -> Result<Plan, CliError> {
    let bytes = fs::read(path).map_err(|err| CliError::PlanRead {
        path: path.clone(),
        reason: err.to_string(),
    })?;
    let document: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|err| CliError::PlanRead {
            path: path.clone(),
            reason: err.to_string(),
        })?;
    validate_plan(&document).map_err(|err| CliError::Validation {
        issues: err
            .issues
            .iter()
            .map(|issue| format!("{} [{}]: {}", issue.path, issue.code, issue.message))
            .collect(),
    })
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Writes a line to stdout.
fn emit(text: &str) {
    let mut stdout = std::io::stdout();
    let _ = stdout.write_all(text.as_bytes());
}

/// Writes a line to stderr.
fn emit_err(text: &str) {
    let mut stderr = std::io::stderr();
    let _ = stderr.write_all(text.as_bytes());
}

/// Renders a run outcome summary.
fn render_outcome(outcome: &RunOutcome, out_dir: &PathBuf) {
    let summary = &outcome.eligibility.summary;
    emit(&format!(
        "run complete: {} eligible, {} failed, {} blocked, {} skipped (allGreen={})\n",
        summary.eligible.len(),
        summary.failed.len(),
        summary.blocked.len(),
        summary.skipped.len(),
        outcome.report.all_green
    ));
    emit(&format!("artifacts written under {}\n", out_dir.display()));
}

/// Renders a CLI error with its issue list.
fn render_cli_error(error: &CliError) {
    if let CliError::Validation {
        issues,
    } = error
    {
        emit_err("plan validation failed:\n");
        for issue in issues {
            emit_err(&format!("  {issue}\n"));
        }
        return;
    }
    report_failure("merge-pilot", error);
}

/// Renders the user-facing failure record for an error.
fn report_failure(context: &str, error: &(dyn std::error::Error + 'static)) {
    let rendered = UserFacingError::from_error(context, error);
    emit_err(&rendered.to_string());
}

// ============================================================================
// SECTION: Tests
// ============================================================================
