//! # Donation Metrics
//!
//! Prometheus metrics for the donation workflow.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! gd-donation-workflow = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `gd_donations_submitted_total` - Donations sent to the signer
//! - `gd_donations_settled_total` - Donations confirmed on-chain
//! - `gd_donations_failed_total` - Failed submissions (by kind)
//! - `gd_donations_cancelled_total` - Cancelled submissions
//! - `gd_approvals_requested_total` - Token approvals requested
//! - `gd_record_write_failures_total` - Record writes queued for retry
//! - `gd_balance_polls_total` - Balance polls completed

#[cfg(feature = "metrics")]
use crate::domain::FailureKind;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Donations sent to the signer
    pub static ref DONATIONS_SUBMITTED: IntCounter = register_int_counter!(
        "gd_donations_submitted_total",
        "Total number of donations sent to the signer"
    )
    .expect("Failed to create DONATIONS_SUBMITTED metric");

    /// Donations confirmed on-chain
    pub static ref DONATIONS_SETTLED: IntCounter = register_int_counter!(
        "gd_donations_settled_total",
        "Total number of donations confirmed on-chain"
    )
    .expect("Failed to create DONATIONS_SETTLED metric");

    /// Failed submissions, labeled by failure kind
    pub static ref DONATIONS_FAILED: IntCounterVec = register_int_counter_vec!(
        "gd_donations_failed_total",
        "Total number of failed donation submissions",
        &["kind"]
    )
    .expect("Failed to create DONATIONS_FAILED metric");

    /// Cancelled submissions
    pub static ref DONATIONS_CANCELLED: IntCounter = register_int_counter!(
        "gd_donations_cancelled_total",
        "Total number of cancelled donation submissions"
    )
    .expect("Failed to create DONATIONS_CANCELLED metric");

    /// Token approvals requested
    pub static ref APPROVALS_REQUESTED: IntCounter = register_int_counter!(
        "gd_approvals_requested_total",
        "Total number of token approvals requested"
    )
    .expect("Failed to create APPROVALS_REQUESTED metric");

    /// Record writes that failed and were queued for retry
    pub static ref RECORD_WRITE_FAILURES: IntCounter = register_int_counter!(
        "gd_record_write_failures_total",
        "Total number of donation record writes queued for retry"
    )
    .expect("Failed to create RECORD_WRITE_FAILURES metric");

    /// Balance polls completed
    pub static ref BALANCE_POLLS: IntCounter = register_int_counter!(
        "gd_balance_polls_total",
        "Total number of balance polls completed"
    )
    .expect("Failed to create BALANCE_POLLS metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

/// Record a donation sent to the signer
#[cfg(feature = "metrics")]
pub fn record_submitted() {
    DONATIONS_SUBMITTED.inc();
}

/// Record a settled donation
#[cfg(feature = "metrics")]
pub fn record_settled() {
    DONATIONS_SETTLED.inc();
}

/// Record a failed submission
#[cfg(feature = "metrics")]
pub fn record_failed(kind: FailureKind) {
    DONATIONS_FAILED.with_label_values(&[kind.label()]).inc();
}

/// Record a cancelled submission
#[cfg(feature = "metrics")]
pub fn record_cancelled() {
    DONATIONS_CANCELLED.inc();
}

/// Record a token approval request
#[cfg(feature = "metrics")]
pub fn record_approval_requested() {
    APPROVALS_REQUESTED.inc();
}

/// Record a record write queued for retry
#[cfg(feature = "metrics")]
pub fn record_record_write_failure() {
    RECORD_WRITE_FAILURES.inc();
}

/// Record a completed balance poll
#[cfg(feature = "metrics")]
pub fn record_balance_poll() {
    BALANCE_POLLS.inc();
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_submitted() {}

#[cfg(not(feature = "metrics"))]
pub fn record_settled() {}

#[cfg(not(feature = "metrics"))]
pub fn record_failed(_kind: crate::domain::FailureKind) {}

#[cfg(not(feature = "metrics"))]
pub fn record_cancelled() {}

#[cfg(not(feature = "metrics"))]
pub fn record_approval_requested() {}

#[cfg(not(feature = "metrics"))]
pub fn record_record_write_failure() {}

#[cfg(not(feature = "metrics"))]
pub fn record_balance_poll() {}
