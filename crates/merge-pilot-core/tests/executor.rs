// crates/merge-pilot-core/tests/executor.rs
// ============================================================================
// Module: Gate Executor Tests
// Description: Capture, spill, stream files, artifacts, and timeouts.
// ============================================================================
//! ## Overview
//! Validates single-attempt gate execution against deterministic subprocess
//! shims: result mapping, stream files on disk, capture truncation,
//! artifact glob resolution, attempt rotation, and cancellation.

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

mod common;

use std::fs;
use std::sync::Arc;

use async_trait::async_trait;
use merge_pilot_core::CancelToken;
use merge_pilot_core::GateStatus;
use merge_pilot_core::ManualClock;
use merge_pilot_core::SpawnError;
use merge_pilot_core::SpawnOutput;
use merge_pilot_core::SpawnRequest;
use merge_pilot_core::Subprocess;
use merge_pilot_core::runtime::ExecError;
use merge_pilot_core::runtime::ExecutorConfig;
use merge_pilot_core::runtime::GateExecutor;
use merge_pilot_core::runtime::GateRun;

use common::FakeSubprocess;
use common::HangingSubprocess;
use common::gate;

/// Subprocess shim that always times out.
struct TimeoutSubprocess;

#[async_trait]
impl Subprocess for TimeoutSubprocess {
    async fn spawn(&self, request: &SpawnRequest) -> Result<SpawnOutput, SpawnError> {
        Err(SpawnError::TimedOut {
            timeout_ms: request.timeout_ms,
        })
    }
}

/// Subprocess shim that cannot spawn.
struct BrokenSubprocess;

#[async_trait]
impl Subprocess for BrokenSubprocess {
    async fn spawn(&self, request: &SpawnRequest) -> Result<SpawnOutput, SpawnError> {
        Err(SpawnError::SpawnFailed {
            command: request.command.clone(),
            reason: "no such executable".to_string(),
        })
    }
}

/// Builds an executor over the given subprocess shim.
fn executor(subprocess: Arc<dyn Subprocess>, config: ExecutorConfig) -> GateExecutor {
    GateExecutor::new(subprocess, Arc::new(ManualClock::new()), config)
}

#[tokio::test]
async fn passing_gate_produces_pass_result() -> Result<(), Box<dyn std::error::Error>> {
    let workspace = tempfile::tempdir()?;
    let out = tempfile::tempdir()?;
    let executor = executor(Arc::new(FakeSubprocess::passing()), ExecutorConfig::default());
    let gate = gate("test", "echo ok");

    let run = GateRun {
        gate: &gate,
        item_root: workspace.path().to_path_buf(),
        gate_dir: out.path().join("gates").join("test"),
        timeout_ms: 1_000,
        attempt: 1,
    };
    let result = executor.execute(&run, &CancelToken::new()).await?;

    assert_eq!(result.status, GateStatus::Pass);
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.attempts, 1);
    assert_eq!(result.stdout, "echo ok\n");
    assert_eq!(fs::read_to_string(run.gate_dir.join("stdout"))?, "echo ok\n");
    assert_eq!(fs::read_to_string(run.gate_dir.join("exit"))?, "0");
    assert_eq!(fs::read_to_string(run.gate_dir.join("duration.ms"))?, "7");
    Ok(())
}

#[tokio::test]
async fn failing_gate_produces_fail_result() -> Result<(), Box<dyn std::error::Error>> {
    let workspace = tempfile::tempdir()?;
    let out = tempfile::tempdir()?;
    let executor = executor(
        Arc::new(FakeSubprocess::with_exit_codes(&[("false", 1)])),
        ExecutorConfig::default(),
    );
    let gate = gate("test", "false");

    let run = GateRun {
        gate: &gate,
        item_root: workspace.path().to_path_buf(),
        gate_dir: out.path().join("g"),
        timeout_ms: 1_000,
        attempt: 1,
    };
    let result = executor.execute(&run, &CancelToken::new()).await?;

    assert_eq!(result.status, GateStatus::Fail);
    assert_eq!(result.exit_code, Some(1));
    Ok(())
}

#[tokio::test]
async fn timeout_is_a_normal_fail_outcome() -> Result<(), Box<dyn std::error::Error>> {
    let workspace = tempfile::tempdir()?;
    let out = tempfile::tempdir()?;
    let executor = executor(Arc::new(TimeoutSubprocess), ExecutorConfig::default());
    let gate = gate("slow", "sleep 999");

    let run = GateRun {
        gate: &gate,
        item_root: workspace.path().to_path_buf(),
        gate_dir: out.path().join("g"),
        timeout_ms: 250,
        attempt: 1,
    };
    let result = executor.execute(&run, &CancelToken::new()).await?;

    assert_eq!(result.status, GateStatus::Fail);
    assert_eq!(result.exit_code, None);
    assert!(result.stderr.contains("timed out after 250 ms"));
    assert_eq!(fs::read_to_string(run.gate_dir.join("exit"))?, "timeout");
    Ok(())
}

#[tokio::test]
async fn spawn_failure_raises_exec_error() -> Result<(), Box<dyn std::error::Error>> {
    let workspace = tempfile::tempdir()?;
    let out = tempfile::tempdir()?;
    let executor = executor(Arc::new(BrokenSubprocess), ExecutorConfig::default());
    let gate = gate("test", "missing-binary");

    let run = GateRun {
        gate: &gate,
        item_root: workspace.path().to_path_buf(),
        gate_dir: out.path().join("g"),
        timeout_ms: 1_000,
        attempt: 1,
    };
    let result = executor.execute(&run, &CancelToken::new()).await;

    assert!(matches!(result, Err(ExecError::Spawn(_))));
    Ok(())
}

#[tokio::test]
async fn capture_truncates_in_memory_but_spills_full_stream(
) -> Result<(), Box<dyn std::error::Error>> {
    let workspace = tempfile::tempdir()?;
    let out = tempfile::tempdir()?;
    let config = ExecutorConfig {
        capture_limit_bytes: 8,
    };
    let executor = executor(Arc::new(FakeSubprocess::passing()), config);
    let gate = gate("test", "emit a long command line");

    let run = GateRun {
        gate: &gate,
        item_root: workspace.path().to_path_buf(),
        gate_dir: out.path().join("g"),
        timeout_ms: 1_000,
        attempt: 1,
    };
    let result = executor.execute(&run, &CancelToken::new()).await?;

    assert!(result.stdout.ends_with("[truncated]"));
    assert!(result.stdout.starts_with("emit a l"));
    assert_eq!(
        fs::read_to_string(run.gate_dir.join("stdout"))?,
        "emit a long command line\n"
    );
    Ok(())
}

#[tokio::test]
async fn artifacts_resolve_in_lexicographic_order() -> Result<(), Box<dyn std::error::Error>> {
    let workspace = tempfile::tempdir()?;
    let out = tempfile::tempdir()?;
    fs::create_dir_all(workspace.path().join("reports"))?;
    fs::write(workspace.path().join("reports/b.xml"), "b")?;
    fs::write(workspace.path().join("reports/a.xml"), "a")?;
    fs::write(workspace.path().join("reports/skip.log"), "log")?;

    let executor = executor(Arc::new(FakeSubprocess::passing()), ExecutorConfig::default());
    let mut gate = gate("test", "echo ok");
    gate.artifacts = vec!["reports/*.xml".to_string()];

    let run = GateRun {
        gate: &gate,
        item_root: workspace.path().to_path_buf(),
        gate_dir: out.path().join("g"),
        timeout_ms: 1_000,
        attempt: 1,
    };
    let result = executor.execute(&run, &CancelToken::new()).await?;

    assert_eq!(result.artifacts, vec!["reports/a.xml", "reports/b.xml"]);
    assert_eq!(
        fs::read_to_string(run.gate_dir.join("artifacts/reports/a.xml"))?,
        "a"
    );
    Ok(())
}

#[tokio::test]
async fn second_attempt_rotates_stream_files() -> Result<(), Box<dyn std::error::Error>> {
    let workspace = tempfile::tempdir()?;
    let out = tempfile::tempdir()?;
    let executor = executor(Arc::new(FakeSubprocess::passing()), ExecutorConfig::default());
    let gate = gate("test", "echo ok");

    let first = GateRun {
        gate: &gate,
        item_root: workspace.path().to_path_buf(),
        gate_dir: out.path().join("g"),
        timeout_ms: 1_000,
        attempt: 1,
    };
    executor.execute(&first, &CancelToken::new()).await?;

    let second = GateRun {
        attempt: 2,
        ..first.clone()
    };
    executor.execute(&second, &CancelToken::new()).await?;

    assert!(second.gate_dir.join("stdout").exists());
    assert!(second.gate_dir.join("stdout.attempt-1").exists());
    Ok(())
}

#[tokio::test]
async fn cancellation_interrupts_a_hanging_gate() -> Result<(), Box<dyn std::error::Error>> {
    let workspace = tempfile::tempdir()?;
    let out = tempfile::tempdir()?;
    let executor = executor(Arc::new(HangingSubprocess), ExecutorConfig::default());
    let gate = gate("hang", "sleep forever");

    let cancel = CancelToken::new();
    let run = GateRun {
        gate: &gate,
        item_root: workspace.path().to_path_buf(),
        gate_dir: out.path().join("g"),
        timeout_ms: 60_000,
        attempt: 1,
    };

    let fire = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        fire.fire();
    });

    let result = executor.execute(&run, &cancel).await;
    assert!(matches!(result, Err(ExecError::Cancelled)));
    Ok(())
}
