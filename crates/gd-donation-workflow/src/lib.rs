//! # Giving dApp Donation Workflow
//!
//! UI-agnostic orchestration of a single donation: token allowance, giver
//! resolution, the on-chain donation and its off-chain record.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Workflow
//!
//! ```text
//! Idle ─→ Approving ─→ Resolving ─→ Submitting ─hash─→ AwaitingConfirmation ─→ Recording ─→ Settled
//!          (tokens)                                          │                      │
//!                                             pending record written     failed write ─→ queued for retry
//! ```
//!
//! | Guarantee | Where |
//! |-----------|-------|
//! | One allowance read, at most one exact-amount approval | [`ApprovalGate`] |
//! | Lookup failures register a new giver | [`GiverResolver`] |
//! | Stale balance results are dropped | [`BalanceWatcher`] |
//! | No cancel once the signer has the donation | [`CancelHandle`] |
//! | Record writes keyed by transaction hash | [`ReconciliationQueue`] |
//!
//! ## Module Structure
//!
//! ```text
//! gd-donation-workflow/
//! ├── domain/          # Intent, giver, submission record, states, errors
//! ├── algorithms/      # Poller, approval gate, giver resolver, state machine
//! ├── ports/           # DonationApi, Ledger, RecordStore, Signer
//! ├── adapters/        # In-memory ledger, record store, signer
//! ├── service.rs       # DonationSubmitter
//! ├── reconciliation.rs
//! ├── config.rs
//! └── metrics.rs
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod reconciliation;
pub mod service;

// Re-exports
pub use algorithms::{
    poll_token_balance, start_polling, AllowanceRequest, ApprovalGate, ApprovalOutcome,
    BalanceWatcher, GiverResolver, PollHandle, WorkflowMachine,
};
pub use config::{ConfigError, DonationConfig, Environment, TokenConfig};
pub use domain::{
    format_base_units, to_base_units, Address, AdminId, Amount, CancelReason, CurrentUser,
    DonationError, DonationIntent, DonationLimits, DonationPayload, DonationResult, FailureKind,
    GiverId, GiverIdentity, IdempotencyKey, RecordId, ResolvedGiver, SubmissionRecord, Token,
    TokenAllowance, TokenKind, TxHash, UserRecord, WorkflowState, NATIVE_DECIMALS,
};
pub use ports::{
    DonationApi, DonationObserver, DonationOutcome, DonationWarning, Ledger, LedgerFault,
    NoopObserver, RecordStore, RecordStoreError, Signer, SignerOptions, TxEmitter, TxHandle,
    TxReceipt,
};
pub use reconciliation::{PendingRecord, ReconciliationQueue, RetryReport};
pub use service::{CancelHandle, DonationSubmitter};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
