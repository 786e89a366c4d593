//! # Inbound Ports
//!
//! What the UI layer can ask of the workflow, and the lifecycle callbacks it
//! receives in return.

use crate::domain::{
    Amount, CancelReason, CurrentUser, DonationError, DonationIntent, DonationResult,
    FailureKind, RecordId, ResolvedGiver, Token, TxHash, WorkflowState,
};
use crate::reconciliation::PendingRecord;
use async_trait::async_trait;

/// Donation API - inbound port.
#[async_trait]
pub trait DonationApi: Send + Sync {
    /// Run one donation from intent to settlement.
    async fn submit(
        &self,
        intent: DonationIntent,
        current_user: CurrentUser,
    ) -> DonationResult<DonationOutcome>;

    /// Request cancellation. Returns false once the donation went to the signer.
    fn cancel(&self) -> bool;

    /// Current workflow state.
    fn state(&self) -> WorkflowState;
}

/// How a submission ended, when it did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DonationOutcome {
    /// Donation confirmed on-chain.
    Settled {
        /// Donation transaction.
        tx_hash: TxHash,
        /// Giver that owns the donation.
        giver: ResolvedGiver,
        /// Record-store id, `None` when the write was queued for retry.
        record_id: Option<RecordId>,
        /// Non-fatal reconciliation problems.
        warnings: Vec<DonationWarning>,
    },
    /// Nothing reached the chain.
    Cancelled(CancelReason),
}

impl DonationOutcome {
    /// Check if the donation settled.
    pub fn is_settled(&self) -> bool {
        matches!(self, DonationOutcome::Settled { .. })
    }
}

/// Non-fatal problem reported alongside a settled donation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DonationWarning {
    /// Off-chain record not written; queued for out-of-band retry.
    RecordWriteFailed(PendingRecord),
}

impl DonationWarning {
    /// Error view of the warning.
    pub fn to_error(&self) -> DonationError {
        match self {
            DonationWarning::RecordWriteFailed(pending) => DonationError::RecordWriteFailed {
                tx_hash: pending.payload.tx_hash,
                reason: pending.reason.clone(),
            },
        }
    }
}

/// Lifecycle callbacks for the UI layer. Every method defaults to a no-op.
pub trait DonationObserver: Send + Sync {
    /// An approval signature is about to be requested.
    fn on_approval_needed(&self, _token: &Token, _amount: Amount) {}

    /// The signer returned a hash; the dialog can close.
    fn on_submitted(&self, _tx_hash: TxHash, _tx_url: &str) {}

    /// The chain confirmed the donation.
    fn on_confirmed(&self, _tx_hash: TxHash) {}

    /// The off-chain record was written.
    fn on_recorded(&self, _record_id: &RecordId) {}

    /// The submission was cancelled.
    fn on_cancelled(&self, _reason: CancelReason) {}

    /// The submission failed.
    fn on_failed(&self, _kind: FailureKind, _detail: &str) {}

    /// A non-fatal warning was raised.
    fn on_warning(&self, _warning: &DonationWarning) {}
}

/// Observer that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl DonationObserver for NoopObserver {}
