//! # Domain Value Objects
//!
//! Immutable value types for the donation workflow.

use super::errors::{Address, TxHash};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimals of the chain's native currency.
pub const NATIVE_DECIMALS: u8 = 18;

/// What kind of asset a donation moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// The chain's base currency. Needs no allowance.
    Native,
    /// ERC20-style contract token.
    Contract {
        /// Token contract address.
        address: Address,
        /// Token decimals.
        decimals: u8,
    },
}

impl TokenKind {
    /// Decimals used to convert user amounts to base units.
    pub fn decimals(&self) -> u8 {
        match self {
            TokenKind::Native => NATIVE_DECIMALS,
            TokenKind::Contract { decimals, .. } => *decimals,
        }
    }

    /// Contract address, `None` for the native token.
    pub fn contract_address(&self) -> Option<Address> {
        match self {
            TokenKind::Native => None,
            TokenKind::Contract { address, .. } => Some(*address),
        }
    }

    /// Check if an allowance is required before donating.
    pub fn requires_allowance(&self) -> bool {
        matches!(self, TokenKind::Contract { .. })
    }
}

/// Token selected for a donation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    /// Display symbol (ETH, RBTC, DAI, ...).
    pub symbol: String,
    /// Native or contract token.
    pub kind: TokenKind,
}

impl Token {
    /// Native token with the configured display name.
    pub fn native(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            kind: TokenKind::Native,
        }
    }

    /// Contract token.
    pub fn contract(symbol: impl Into<String>, address: Address, decimals: u8) -> Self {
        Self {
            symbol: symbol.into(),
            kind: TokenKind::Contract { address, decimals },
        }
    }
}

/// On-chain giver id. Zero means "not registered" and is never wrapped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GiverId(u64);

impl GiverId {
    /// Wrap a raw id coming from the chain or the record store.
    pub fn registered(raw: u64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    /// Raw numeric id.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for GiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a terminal `Failed` state was reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// User declined the allowance signature.
    ApprovalRejected,
    /// Allowance transaction failed, or donation failed for lack of allowance.
    ApprovalFailed,
    /// Donation transaction failed.
    LedgerError,
}

impl FailureKind {
    /// Metric / log label.
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::ApprovalRejected => "approval_rejected",
            FailureKind::ApprovalFailed => "approval_failed",
            FailureKind::LedgerError => "ledger_error",
        }
    }
}

/// Why a submission ended in `Cancelled`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    /// `cancel()` was called before the donation was sent to the signer.
    UserCancelled,
    /// The donation signature prompt was declined.
    DeclinedSignature,
}

/// Donation workflow state machine.
///
/// ```text
/// Idle ──token──→ Approving ──→ Resolving ──→ Submitting ──hash──→ AwaitingConfirmation
///   │                              ↑                                        │
///   └──────────native──────────────┘                                   confirmed
///                                                                           ↓
///                                                     Settled ←────── Recording
///
/// Cancelled / Failed(kind) reachable from any non-terminal state.
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowState {
    /// No intent bound.
    #[default]
    Idle,
    /// Ensuring the token allowance.
    Approving,
    /// Resolving the giver identity.
    Resolving,
    /// Donation sent to the signer, waiting for a hash.
    Submitting,
    /// Hash known, waiting for the chain.
    AwaitingConfirmation,
    /// Writing the off-chain record.
    Recording,
    /// Donation confirmed (record write may have been queued for retry).
    Settled,
    /// Cancelled before anything reached the chain.
    Cancelled,
    /// Failed.
    Failed(FailureKind),
}

impl WorkflowState {
    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: WorkflowState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Self::Cancelled) | (_, Self::Failed(_)) => true,
            (Self::Idle, Self::Approving) => true,
            (Self::Idle, Self::Resolving) => true, // Native token skips approval
            (Self::Approving, Self::Resolving) => true,
            (Self::Resolving, Self::Submitting) => true,
            (Self::Submitting, Self::AwaitingConfirmation) => true,
            (Self::AwaitingConfirmation, Self::Recording) => true,
            (Self::Recording, Self::Settled) => true,
            _ => false,
        }
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled | Self::Cancelled | Self::Failed(_))
    }

    /// States in which a user-facing cancel is still honoured.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Idle | Self::Approving | Self::Resolving)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Failed(kind) => write!(f, "Failed({:?})", kind),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Idempotency key for record-store writes: the donation's transaction hash.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Key for a donation transaction.
    pub fn from_tx_hash(tx_hash: TxHash) -> Self {
        Self(format!("{:#x}", tx_hash))
    }

    /// Key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
