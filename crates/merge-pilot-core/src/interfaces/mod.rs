// crates/merge-pilot-core/src/interfaces/mod.rs
// ============================================================================
// Module: Merge Pilot Interfaces
// Description: Backend-agnostic capabilities for time, subprocesses, and hosts.
// Purpose: Define the contract surfaces the engine and embedders depend on.
// Dependencies: crate::core, async-trait
// ============================================================================

//! ## Overview
//! Capabilities define how the engine touches the outside world without
//! embedding backend specifics. Tests substitute deterministic
//! implementations; two runs of the same plan with deterministic
//! capabilities must produce byte-identical artifacts.
//!
//! [`CodeHost`] is defined here for the embedding autopilot layer; the
//! engine itself never calls it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Time capability injected into retry, breaker, and scheduler paths.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Returns the current timestamp.
    fn now(&self) -> Timestamp;

    /// Suspends the caller for the given number of milliseconds.
    async fn sleep(&self, duration_ms: u64);
}

// ============================================================================
// SECTION: Subprocess
// ============================================================================

/// Subprocess spawn request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    /// Command line executed through the platform shell.
    pub command: String,
    /// Working directory for the subprocess.
    pub cwd: PathBuf,
    /// Full environment (caller environment overlaid with the gate overlay).
    pub env: BTreeMap<String, String>,
    /// Hard wall-clock timeout, in milliseconds.
    pub timeout_ms: u64,
}

/// Subprocess completion record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnOutput {
    /// Exit code reported by the subprocess.
    pub exit_code: i32,
    /// Raw captured stdout bytes.
    pub stdout: Vec<u8>,
    /// Raw captured stderr bytes.
    pub stderr: Vec<u8>,
    /// Wall-clock duration, in milliseconds.
    pub duration_ms: u64,
}

/// Subprocess capability errors, distinct from a non-zero exit.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The command could not be spawned at all.
    #[error("failed to spawn `{command}`: {reason}")]
    SpawnFailed {
        /// Command line that failed to spawn.
        command: String,
        /// Underlying reason.
        reason: String,
    },
    /// The working directory is missing or unreadable.
    #[error("unusable working directory {cwd}: {reason}")]
    BadWorkingDirectory {
        /// Offending directory.
        cwd: PathBuf,
        /// Underlying reason.
        reason: String,
    },
    /// The subprocess exceeded its wall-clock timeout and was terminated.
    #[error("command timed out after {timeout_ms} ms")]
    TimedOut {
        /// Configured timeout.
        timeout_ms: u64,
    },
    /// The run was cancelled while the subprocess was in flight.
    #[error("command cancelled")]
    Cancelled,
}

/// Subprocess capability.
///
/// Implementations own termination semantics: on timeout or cancellation the
/// subprocess tree receives a termination signal, then a kill after a grace
/// period.
#[async_trait]
pub trait Subprocess: Send + Sync {
    /// Spawns a command and waits for completion or timeout.
    ///
    /// A non-zero exit code is a normal completion, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError`] when the process cannot be spawned, times out,
    /// or is cancelled.
    async fn spawn(&self, request: &SpawnRequest) -> Result<SpawnOutput, SpawnError>;
}

// ============================================================================
// SECTION: Code Host
// ============================================================================

/// Query for listing open pull requests.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PullRequestQuery {
    /// Restrict to pull requests targeting this branch.
    pub target: Option<String>,
    /// Restrict to pull requests carrying all of these labels.
    pub labels: Vec<String>,
}

/// Pull request summary returned by list queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Host-assigned identifier.
    pub id: u64,
    /// Pull request title.
    pub title: String,
    /// Head branch name.
    pub head: String,
    /// Base branch name.
    pub base: String,
}

/// Detailed pull request view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestDetails {
    /// Summary fields.
    pub summary: PullRequest,
    /// Body text.
    pub body: String,
    /// Labels currently applied.
    pub labels: Vec<String>,
    /// Whether the host considers the pull request mergeable.
    pub mergeable: Option<bool>,
}

/// Code host capability errors.
#[derive(Debug, Error)]
pub enum CodeHostError {
    /// The host rejected the request.
    #[error("code host rejected request: {0}")]
    Rejected(String),
    /// Transport-level failure.
    #[error("code host transport error: {0}")]
    Transport(String),
}

/// Code hosting platform capability, consumed by the embedding layer.
#[async_trait]
pub trait CodeHost: Send + Sync {
    /// Lists open pull requests matching a query.
    ///
    /// # Errors
    ///
    /// Returns [`CodeHostError`] when the host cannot be queried.
    async fn list_pull_requests(
        &self,
        query: &PullRequestQuery,
    ) -> Result<Vec<PullRequest>, CodeHostError>;

    /// Fetches one pull request in detail.
    ///
    /// # Errors
    ///
    /// Returns [`CodeHostError`] when the host cannot be queried.
    async fn get_pull_request(&self, id: u64) -> Result<PullRequestDetails, CodeHostError>;

    /// Adds a label to a pull request.
    ///
    /// # Errors
    ///
    /// Returns [`CodeHostError`] when the mutation fails.
    async fn add_label(&self, id: u64, label: &str) -> Result<(), CodeHostError>;

    /// Removes a label from a pull request.
    ///
    /// # Errors
    ///
    /// Returns [`CodeHostError`] when the mutation fails.
    async fn remove_label(&self, id: u64, label: &str) -> Result<(), CodeHostError>;

    /// Returns the labels applied to a pull request.
    ///
    /// # Errors
    ///
    /// Returns [`CodeHostError`] when the host cannot be queried.
    async fn get_labels(&self, id: u64) -> Result<Vec<String>, CodeHostError>;

    /// Adds a comment to a pull request.
    ///
    /// # Errors
    ///
    /// Returns [`CodeHostError`] when the mutation fails.
    async fn add_comment(&self, id: u64, body: &str) -> Result<(), CodeHostError>;
}
