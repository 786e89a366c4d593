//! # Domain Errors
//!
//! Error taxonomy for the donation workflow.

use primitive_types::{H160, H256, U256};
use thiserror::Error;

/// Account address (20-byte).
pub type Address = H160;

/// Transaction hash (32-byte).
pub type TxHash = H256;

/// Token amount in base units (wei for the native token).
pub type Amount = U256;

/// On-chain admin id of the campaign, milestone or DAC receiving the donation.
pub type AdminId = u64;

/// Identifier assigned by the record store.
pub type RecordId = String;

/// Donation workflow errors.
#[derive(Debug, Error)]
pub enum DonationError {
    /// User declined the allowance signature. Informational, not an error banner.
    #[error("Token approval was declined")]
    ApprovalRejected,

    /// The allowance transaction failed, or the donation failed for lack of allowance.
    #[error("Token approval failed: {reason}")]
    ApprovalFailed {
        /// Failure detail.
        reason: String,
    },

    /// User declined the donation signature before a hash existed.
    #[error("Donation signature was declined")]
    UserDeclinedSignature,

    /// Chain failure of the donation transaction.
    #[error("Ledger error (tx {tx_hash:?}): {reason}")]
    LedgerError {
        /// Transaction hash, if the signer produced one.
        tx_hash: Option<TxHash>,
        /// Failure detail.
        reason: String,
    },

    /// The donation stands on-chain but the off-chain mirror was not written.
    #[error("Record write failed for tx {tx_hash:?}: {reason}")]
    RecordWriteFailed {
        /// Transaction the record belongs to.
        tx_hash: TxHash,
        /// Failure detail.
        reason: String,
    },

    /// A submission is already running on this submitter.
    #[error("Submission already in progress")]
    SubmissionInProgress,

    /// The submitter reached a terminal state and cannot take a new intent.
    #[error("Submitter already finished in state {state}")]
    SubmitterSpent {
        /// Terminal state reached.
        state: String,
    },

    /// Amount is zero, negative, too precise or outside the donation limits.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Token symbol is not configured.
    #[error("Unsupported token: {0}")]
    UnsupportedToken(String),

    /// Invalid workflow state transition.
    #[error("Invalid workflow transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state
        from: String,
        /// Attempted state
        to: String,
    },

    /// Submission record mutated out of order.
    #[error("Invalid record update: {0}")]
    InvalidRecordTransition(&'static str),
}

impl DonationError {
    /// True for outcomes the user chose, which get a neutral message instead of an error.
    pub fn is_user_decline(&self) -> bool {
        matches!(
            self,
            DonationError::ApprovalRejected | DonationError::UserDeclinedSignature
        )
    }

    /// Transaction hash carried by the error, for explorer links.
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            DonationError::LedgerError { tx_hash, .. } => *tx_hash,
            DonationError::RecordWriteFailed { tx_hash, .. } => Some(*tx_hash),
            _ => None,
        }
    }
}

/// Result type for donation operations.
pub type DonationResult<T> = Result<T, DonationError>;
