// crates/merge-pilot-core/src/runtime/executor.rs
// ============================================================================
// Module: Merge Pilot Gate Executor
// Description: Single-gate execution with capture, spill, and artifacts.
// Purpose: Turn one gate invocation into a deterministic GateResult.
// Dependencies: crate::{core, interfaces, runtime::cancel}, globset
// ============================================================================

//! ## Overview
//! The executor runs exactly one local gate attempt: it resolves the working
//! directory and environment overlay, spawns the command through the
//! [`Subprocess`] capability under a hard wall-clock timeout, captures both
//! streams with a bounded in-memory record (the full stream always lands on
//! disk under the gate directory), resolves artifact globs in lexicographic
//! order, and produces a [`GateResult`] with `attempts = 1`.
//!
//! The executor never retries; the scheduler wraps it with the retry engine
//! when policy declares the gate retryable. A non-zero exit code and a
//! timeout are normal `fail` outcomes; spawn-level failures raise
//! [`ExecError`] to the caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;
use thiserror::Error;
use tracing::debug;

use crate::core::Gate;
use crate::core::GateResult;
use crate::core::GateStatus;
use crate::interfaces::Clock;
use crate::interfaces::SpawnError;
use crate::interfaces::SpawnRequest;
use crate::interfaces::Subprocess;
use crate::runtime::cancel::CancelToken;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Gate executor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// In-memory capture limit per stream, in bytes; the full stream is
    /// always written to disk.
    pub capture_limit_bytes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            capture_limit_bytes: 1024 * 1024,
        }
    }
}

/// Marker appended to a truncated in-memory capture.
const TRUNCATION_MARKER: &str = "\n… [truncated]";

// ============================================================================
// SECTION: Gate Run Description
// ============================================================================

/// One gate attempt to execute.
#[derive(Debug, Clone)]
pub struct GateRun<'a> {
    /// Gate specification.
    pub gate: &'a Gate,
    /// Item root the gate working directory resolves against.
    pub item_root: PathBuf,
    /// Gate directory for stream files and matched artifacts.
    pub gate_dir: PathBuf,
    /// Hard wall-clock timeout for this attempt, in milliseconds.
    pub timeout_ms: u64,
    /// 1-indexed attempt number, used to rotate stream files.
    pub attempt: u32,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Executor failures distinct from a failing gate.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The subprocess could not be spawned.
    #[error(transparent)]
    Spawn(SpawnError),
    /// Filesystem work under the gate directory failed.
    #[error("gate artifact io failed at {path}: {reason}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },
    /// An artifact glob pattern does not parse.
    #[error("invalid artifact glob `{pattern}`: {reason}")]
    BadGlob {
        /// Offending pattern.
        pattern: String,
        /// Underlying reason.
        reason: String,
    },
    /// The run was cancelled while the gate was in flight.
    #[error("gate execution cancelled")]
    Cancelled,
}

// ============================================================================
// SECTION: Gate Executor
// ============================================================================

/// Executes single gate attempts through injected capabilities.
pub struct GateExecutor {
    /// Subprocess capability.
    subprocess: Arc<dyn Subprocess>,
    /// Clock capability for attempt timestamps.
    clock: Arc<dyn Clock>,
    /// Executor configuration.
    config: ExecutorConfig,
}

impl GateExecutor {
    /// Creates a new gate executor.
    #[must_use]
    pub fn new(
        subprocess: Arc<dyn Subprocess>,
        clock: Arc<dyn Clock>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            subprocess,
            clock,
            config,
        }
    }

    /// Executes one gate attempt.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] for spawn-level failures, filesystem failures
    /// under the gate directory, or cancellation. A non-zero exit code and a
    /// timeout are `Ok` results with `status = fail`.
    pub async fn execute(
        &self,
        run: &GateRun<'_>,
        cancel: &CancelToken,
    ) -> Result<GateResult, ExecError> {
        let cwd = run
            .gate
            .cwd
            .as_ref()
            .map_or_else(|| run.item_root.clone(), |sub| run.item_root.join(sub));

        let request = SpawnRequest {
            command: run.gate.run.clone(),
            cwd: cwd.clone(),
            env: overlay_environment(&run.gate.env),
            timeout_ms: run.timeout_ms,
        };

        debug!(gate = %run.gate.name, attempt = run.attempt, "dispatching gate subprocess");

        // Dropping the spawn future on cancellation kills the child through
        // the capability's kill-on-drop contract.
        let spawned = tokio::select! {
            biased;
            output = self.subprocess.spawn(&request) => output,
            () = cancel.cancelled() => return Err(ExecError::Cancelled),
        };

        let now = self.clock.now();
        let (status, exit_code, duration_ms, stdout_bytes, stderr_bytes) = match spawned {
            Ok(output) => {
                let status =
                    if output.exit_code == 0 { GateStatus::Pass } else { GateStatus::Fail };
                (status, Some(output.exit_code), output.duration_ms, output.stdout, output.stderr)
            }
            Err(SpawnError::TimedOut {
                timeout_ms,
            }) => {
                let message = format!("command timed out after {timeout_ms} ms");
                (GateStatus::Fail, None, timeout_ms, Vec::new(), message.into_bytes())
            }
            Err(SpawnError::Cancelled) => return Err(ExecError::Cancelled),
            Err(err) => return Err(ExecError::Spawn(err)),
        };

        rotate_stream_files(&run.gate_dir, run.attempt)?;
        write_stream_files(&run.gate_dir, &stdout_bytes, &stderr_bytes, exit_code, duration_ms)?;

        let artifacts = resolve_artifacts(&cwd, &run.gate.artifacts, &run.gate_dir)?;

        Ok(GateResult {
            gate: run.gate.name.clone(),
            status,
            exit_code,
            duration_ms,
            stdout: bounded_capture(&stdout_bytes, self.config.capture_limit_bytes),
            stderr: bounded_capture(&stderr_bytes, self.config.capture_limit_bytes),
            artifacts,
            attempts: 1,
            last_attempt: now,
        })
    }
}

// ============================================================================
// SECTION: Environment
// ============================================================================

/// Overlays the gate environment on top of the caller environment.
///
/// Variables that are not valid UTF-8 are dropped rather than panicking the
/// worker task.
fn overlay_environment(overlay: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut env: BTreeMap<String, String> = std::env::vars_os()
        .filter_map(|(key, value)| {
            Some((key.into_string().ok()?, value.into_string().ok()?))
        })
        .collect();
    for (key, value) in overlay {
        env.insert(key.clone(), value.clone());
    }
    env
}

// ============================================================================
// SECTION: Capture
// ============================================================================

/// Bounds an in-memory capture, marking the truncation.
fn bounded_capture(bytes: &[u8], limit: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= limit {
        return text.into_owned();
    }
    let mut cut = limit;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut out = text[..cut].to_string();
    out.push_str(TRUNCATION_MARKER);
    out
}

// ============================================================================
// SECTION: Stream Files
// ============================================================================

/// Moves the previous attempt's stream files to suffixed names.
fn rotate_stream_files(gate_dir: &Path, attempt: u32) -> Result<(), ExecError> {
    if attempt <= 1 {
        return Ok(());
    }
    let previous = attempt - 1;
    for name in ["stdout", "stderr", "exit", "duration.ms"] {
        let current = gate_dir.join(name);
        if current.exists() {
            let rotated = gate_dir.join(format!("{name}.attempt-{previous}"));
            fs::rename(&current, &rotated).map_err(|err| ExecError::Io {
                path: rotated,
                reason: err.to_string(),
            })?;
        }
    }
    Ok(())
}

/// Writes the attempt's stream and outcome files under the gate directory.
fn write_stream_files(
    gate_dir: &Path,
    stdout: &[u8],
    stderr: &[u8],
    exit_code: Option<i32>,
    duration_ms: u64,
) -> Result<(), ExecError> {
    fs::create_dir_all(gate_dir).map_err(|err| ExecError::Io {
        path: gate_dir.to_path_buf(),
        reason: err.to_string(),
    })?;

    let exit_rendered = exit_code.map_or_else(|| "timeout".to_string(), |code| code.to_string());
    let duration_rendered = duration_ms.to_string();
    let entries: [(&str, &[u8]); 4] = [
        ("stdout", stdout),
        ("stderr", stderr),
        ("exit", exit_rendered.as_bytes()),
        ("duration.ms", duration_rendered.as_bytes()),
    ];
    for (name, bytes) in entries {
        let path = gate_dir.join(name);
        fs::write(&path, bytes).map_err(|err| ExecError::Io {
            path,
            reason: err.to_string(),
        })?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Artifact Resolution
// ============================================================================

/// Resolves artifact globs against the gate working directory.
///
/// Matched files are copied under `<gate_dir>/artifacts/` preserving their
/// relative layout; the returned paths are sorted lexicographically.
fn resolve_artifacts(
    cwd: &Path,
    patterns: &[String],
    gate_dir: &Path,
) -> Result<Vec<String>, ExecError> {
    if patterns.is_empty() {
        return Ok(Vec::new());
    }

    let glob_set = build_glob_set(patterns)?;
    let mut matched = Vec::new();
    collect_matches(cwd, cwd, &glob_set, &mut matched)?;
    matched.sort();

    let artifact_root = gate_dir.join("artifacts");
    for relative in &matched {
        let source = cwd.join(relative);
        let destination = artifact_root.join(relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|err| ExecError::Io {
                path: parent.to_path_buf(),
                reason: err.to_string(),
            })?;
        }
        fs::copy(&source, &destination).map_err(|err| ExecError::Io {
            path: destination.clone(),
            reason: err.to_string(),
        })?;
    }

    Ok(matched)
}

/// Compiles the artifact glob patterns.
fn build_glob_set(patterns: &[String]) -> Result<GlobSet, ExecError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|err| ExecError::BadGlob {
            pattern: pattern.clone(),
            reason: err.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|err| ExecError::BadGlob {
        pattern: patterns.join(","),
        reason: err.to_string(),
    })
}

/// Recursively collects files under `root` matching the glob set.
fn collect_matches(
    root: &Path,
    dir: &Path,
    glob_set: &GlobSet,
    matched: &mut Vec<String>,
) -> Result<(), ExecError> {
    let entries = fs::read_dir(dir).map_err(|err| ExecError::Io {
        path: dir.to_path_buf(),
        reason: err.to_string(),
    })?;
    for entry in entries {
        let entry = entry.map_err(|err| ExecError::Io {
            path: dir.to_path_buf(),
            reason: err.to_string(),
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_matches(root, &path, glob_set, matched)?;
        } else if let Ok(relative) = path.strip_prefix(root)
            && glob_set.is_match(relative)
        {
            matched.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}
