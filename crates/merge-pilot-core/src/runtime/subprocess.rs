// crates/merge-pilot-core/src/runtime/subprocess.rs
// ============================================================================
// Module: Merge Pilot Shell Subprocess
// Description: Local subprocess capability over the platform shell.
// Purpose: Run gate commands with capture, timeout, and tree termination.
// Dependencies: crate::interfaces, tokio
// ============================================================================

//! ## Overview
//! [`ShellSubprocess`] is the production [`Subprocess`] capability: it runs
//! the gate command line through the platform shell, captures stdout and
//! stderr, and enforces the caller's wall-clock timeout. On timeout the
//! process receives a termination request, a grace period, then a kill.
//! Dropping the in-flight future also kills the child (kill-on-drop), which
//! is how cancellation reaches a running gate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::process::Stdio;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio::process::Command;

use crate::interfaces::SpawnError;
use crate::interfaces::SpawnOutput;
use crate::interfaces::SpawnRequest;
use crate::interfaces::Subprocess;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Grace period between the termination request and the kill, in ms.
const TERMINATION_GRACE_MS: u64 = 2_000;

// ============================================================================
// SECTION: Shell Subprocess
// ============================================================================

/// Subprocess capability running commands through the platform shell.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellSubprocess;

impl ShellSubprocess {
    /// Creates a new shell subprocess capability.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds the platform shell invocation for a command line.
    ///
    /// On Unix the child leads its own process group so termination signals
    /// reach the whole subprocess tree, not just the shell.
    fn shell_command(command_line: &str) -> Command {
        #[cfg(windows)]
        {
            let mut command = Command::new("cmd");
            command.arg("/C").arg(command_line);
            command
        }
        #[cfg(not(windows))]
        {
            let mut command = Command::new("sh");
            command.arg("-c").arg(command_line);
            #[cfg(unix)]
            command.process_group(0);
            command
        }
    }
}

#[async_trait]
impl Subprocess for ShellSubprocess {
    async fn spawn(&self, request: &SpawnRequest) -> Result<SpawnOutput, SpawnError> {
        if !request.cwd.is_dir() {
            return Err(SpawnError::BadWorkingDirectory {
                cwd: request.cwd.clone(),
                reason: "not a readable directory".to_string(),
            });
        }

        let mut command = Self::shell_command(&request.command);
        command
            .current_dir(&request.cwd)
            .env_clear()
            .envs(&request.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started = Instant::now();
        let mut child = command.spawn().map_err(|err| SpawnError::SpawnFailed {
            command: request.command.clone(),
            reason: err.to_string(),
        })?;

        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();
        let stdout_task = tokio::spawn(drain(stdout_handle));
        let stderr_task = tokio::spawn(drain(stderr_handle));

        let status = tokio::select! {
            status = child.wait() => status.map_err(|err| SpawnError::SpawnFailed {
                command: request.command.clone(),
                reason: err.to_string(),
            })?,
            () = tokio::time::sleep(Duration::from_millis(request.timeout_ms)) => {
                terminate(&mut child).await;
                return Err(SpawnError::TimedOut {
                    timeout_ms: request.timeout_ms,
                });
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        let duration_ms =
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        Ok(SpawnOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout,
            stderr,
            duration_ms,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads a captured stream to completion.
async fn drain<R: tokio::io::AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut bytes = Vec::new();
    if let Some(mut reader) = handle {
        let _ = reader.read_to_end(&mut bytes).await;
    }
    bytes
}

/// Terminates a child: termination signal, grace period, then kill.
///
/// On Unix the child's process group receives `SIGTERM` first, giving gate
/// commands a chance to trap it and flush state; only after the grace
/// period does the group receive `SIGKILL`.
async fn terminate(child: &mut Child) {
    request_termination(child);
    let graceful =
        tokio::time::timeout(Duration::from_millis(TERMINATION_GRACE_MS), child.wait()).await;
    if graceful.is_err() {
        force_kill(child).await;
    }
}

/// Delivers `SIGTERM` to the child's process group.
#[cfg(unix)]
#[allow(
    unsafe_code,
    reason = "kill(2) is the only way to deliver SIGTERM to the gate's process group."
)]
fn request_termination(child: &mut Child) {
    let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    // SAFETY: Signals the process group this runner created for the child;
    // no memory is accessed.
    unsafe {
        let _ = libc::kill(-pid, libc::SIGTERM);
    }
}

/// Requests termination through the runtime's kill primitive.
#[cfg(not(unix))]
fn request_termination(child: &mut Child) {
    let _ = child.start_kill();
}

/// Delivers the post-grace-period kill to the child.
#[cfg(unix)]
#[allow(
    unsafe_code,
    reason = "kill(2) is the only way to deliver SIGKILL to the gate's process group."
)]
async fn force_kill(child: &mut Child) {
    if let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) {
        // SAFETY: Signals the process group this runner created for the
        // child; no memory is accessed.
        unsafe {
            let _ = libc::kill(-pid, libc::SIGKILL);
        }
    }
    let _ = child.kill().await;
}

/// Delivers the post-grace-period kill to the child.
#[cfg(not(unix))]
async fn force_kill(child: &mut Child) {
    let _ = child.kill().await;
}
