//! # Token Approval Gate
//!
//! Makes sure the ledger contract may move the donated tokens before the
//! donation is sent.

use crate::domain::{Address, Amount, DonationError, DonationResult, TokenAllowance, TxHash};
use crate::ports::outbound::{Ledger, LedgerFault, SignerOptions};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Allowance needed for one donation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllowanceRequest {
    /// Token contract.
    pub token: Address,
    /// Token owner (the payer).
    pub owner: Address,
    /// Spender (the ledger contract).
    pub spender: Address,
    /// Required amount in base units.
    pub required: Amount,
}

/// How the gate was passed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// The existing allowance already covered the amount.
    AlreadySufficient {
        /// Allowance read from the chain.
        current: Amount,
    },
    /// An approval for exactly the required amount was accepted by the signer.
    Approved {
        /// Approval transaction.
        tx_hash: TxHash,
    },
}

/// Token approval gate.
pub struct ApprovalGate<L: Ledger + ?Sized> {
    ledger: Arc<L>,
}

impl<L: Ledger + ?Sized> ApprovalGate<L> {
    /// Create a gate over the ledger.
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    /// Ensure the allowance covers `req.required`.
    pub async fn ensure_allowance(
        &self,
        req: &AllowanceRequest,
        opts: &SignerOptions,
    ) -> DonationResult<ApprovalOutcome> {
        self.ensure_allowance_notifying(req, opts, |_| {}).await
    }

    /// Same as [`ensure_allowance`](Self::ensure_allowance), calling
    /// `on_needed` right before the approval is sent to the signer.
    ///
    /// Reads the allowance once. Approves exactly the required amount and
    /// continues as soon as the signer returns a hash; confirmation of the
    /// approval is not awaited.
    pub async fn ensure_allowance_notifying<F>(
        &self,
        req: &AllowanceRequest,
        opts: &SignerOptions,
        on_needed: F,
    ) -> DonationResult<ApprovalOutcome>
    where
        F: FnOnce(Amount) + Send,
    {
        let current = self
            .ledger
            .allowance(req.token, req.owner, req.spender)
            .await
            .map_err(approval_error)?;

        let allowance = TokenAllowance {
            token: req.token,
            owner: req.owner,
            spender: req.spender,
            amount: current,
        };
        if allowance.covers(req.required) {
            debug!(
                allowance = %current,
                required = %req.required,
                "[gd-donation] Allowance sufficient, no approval needed"
            );
            return Ok(ApprovalOutcome::AlreadySufficient { current });
        }

        info!(
            allowance = %current,
            required = %req.required,
            "[gd-donation] Requesting token approval"
        );
        on_needed(req.required);
        crate::metrics::record_approval_requested();

        let mut handle = self
            .ledger
            .approve(req.token, req.spender, req.required, opts)
            .await
            .map_err(approval_error)?;
        let tx_hash = handle.transaction_hash().await.map_err(approval_error)?;

        info!(tx_hash = %tx_hash, "[gd-donation] Approval accepted by signer");
        Ok(ApprovalOutcome::Approved { tx_hash })
    }
}

fn approval_error(fault: LedgerFault) -> DonationError {
    if fault.is_declined() {
        info!("[gd-donation] Approval signature declined");
        DonationError::ApprovalRejected
    } else {
        warn!("[gd-donation] Approval failed: {}", fault);
        DonationError::ApprovalFailed {
            reason: fault.to_string(),
        }
    }
}
