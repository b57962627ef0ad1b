// crates/merge-pilot-core/src/runtime/cancel.rs
// ============================================================================
// Module: Merge Pilot Cancellation Token
// Description: Single observable cancellation signal for a run.
// Purpose: Let every suspension point observe one shared stop request.
// Dependencies: tokio
// ============================================================================

//! ## Overview
//! One token is threaded from the embedding layer through the scheduler into
//! every suspension point: worker-slot acquisition, level barriers, retry
//! sleeps, and subprocess waits. Firing is idempotent and sticky; a token
//! never un-cancels.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use tokio::sync::watch;

// ============================================================================
// SECTION: Cancel Token
// ============================================================================

/// Shared cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    /// Broadcast sender; `true` means cancelled.
    sender: Arc<watch::Sender<bool>>,
    /// Receiver used for polling and awaiting.
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    /// Creates a new, un-fired token.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Fires the signal. Idempotent.
    pub fn fire(&self) {
        let _ = self.sender.send(true);
    }

    /// Returns true once the signal has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Suspends until the signal fires.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        // wait_for only errs when the sender is gone, which the Arc prevents
        // while any token clone is alive.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
