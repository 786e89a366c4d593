//! # Donation Workflow State Machine
//!
//! Guards every state change of one submission.

use crate::domain::{DonationError, DonationResult, SubmissionRecord, WorkflowState};
use tracing::trace;

/// State of one submission plus the states it went through.
#[derive(Clone, Debug, Default)]
pub struct WorkflowMachine {
    state: WorkflowState,
    history: Vec<WorkflowState>,
}

impl WorkflowMachine {
    /// Machine in `Idle`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// States left so far, oldest first.
    pub fn history(&self) -> &[WorkflowState] {
        &self.history
    }

    /// Move to `next`.
    ///
    /// `Recording` additionally requires the record to carry a transaction hash.
    pub fn transition_to(
        &mut self,
        next: WorkflowState,
        record: &SubmissionRecord,
    ) -> DonationResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(DonationError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        if next == WorkflowState::Recording && record.transaction_hash().is_none() {
            return Err(DonationError::InvalidRecordTransition(
                "recording without transaction hash",
            ));
        }

        trace!(
            correlation_id = %record.correlation_id(),
            from = %self.state,
            to = %next,
            "[gd-donation] State transition"
        );
        self.history.push(self.state);
        self.state = next;
        Ok(())
    }
}
