//! Donation Submitter - the workflow orchestrator
//!
//! Sequences the approval gate, giver resolution, the donation transaction
//! and the record-store write for a single intent, reporting progress to a
//! [`DonationObserver`].

use crate::algorithms::{AllowanceRequest, ApprovalGate, ApprovalOutcome, GiverResolver, WorkflowMachine};
use crate::config::DonationConfig;
use crate::domain::{
    invariant_minimum_donation, Amount, CancelReason, CurrentUser, DonationError,
    DonationIntent, DonationResult, FailureKind, IdempotencyKey, ResolvedGiver,
    SubmissionRecord, TokenKind, TxHash, WorkflowState,
};
use crate::metrics;
use crate::ports::inbound::{DonationApi, DonationObserver, DonationOutcome, DonationWarning, NoopObserver};
use crate::ports::outbound::{Ledger, LedgerFault, RecordStore, Signer, TxHandle};
use crate::reconciliation::{PendingRecord, ReconciliationQueue};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

const GATE_OPEN: u8 = 0;
const GATE_REQUESTED: u8 = 1;
const GATE_LOCKED: u8 = 2;

#[derive(Debug, Default)]
struct CancelGate {
    state: AtomicU8,
    notify: Notify,
}

/// Cancels a submission from another task.
///
/// Cancellation is honoured until the donation is handed to the signer.
/// After that the gate is locked and `cancel` returns false.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    gate: Arc<CancelGate>,
}

impl CancelHandle {
    /// Request cancellation. Returns false once the gate is locked.
    pub fn cancel(&self) -> bool {
        match self.gate.state.compare_exchange(
            GATE_OPEN,
            GATE_REQUESTED,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {
                self.gate.notify.notify_waiters();
                true
            }
            Err(GATE_REQUESTED) => true,
            Err(_) => false,
        }
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.gate.state.load(Ordering::SeqCst) == GATE_REQUESTED
    }

    /// Lock the gate. Fails if cancellation was already requested.
    fn lock(&self) -> bool {
        match self.gate.state.compare_exchange(
            GATE_OPEN,
            GATE_LOCKED,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => true,
            Err(state) => state == GATE_LOCKED,
        }
    }

    /// Resolves once cancellation is requested.
    async fn requested(&self) {
        loop {
            let notified = self.gate.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Donation Submitter.
///
/// One instance runs one submission. Once it reaches `Settled`, `Cancelled`
/// or `Failed` it refuses further intents; create a new instance instead.
/// This includes failures before any transaction hash exists: a declined
/// approval or donation signature leaves the instance spent, so retrying
/// after a decline needs a fresh submitter.
///
/// The off-chain record is written as soon as the signer returns the hash,
/// with `ledger_confirmed = false`, and before the confirmation is awaited.
pub struct DonationSubmitter<L, R, S>
where
    L: Ledger,
    R: RecordStore,
    S: Signer,
{
    config: Arc<DonationConfig>,
    ledger: Arc<L>,
    store: Arc<R>,
    signer: Arc<S>,
    gate: ApprovalGate<L>,
    resolver: GiverResolver<R>,
    observer: Arc<dyn DonationObserver>,
    reconciliation: Option<Arc<ReconciliationQueue>>,
    machine: RwLock<WorkflowMachine>,
    cancel: CancelHandle,
}

impl<L, R, S> DonationSubmitter<L, R, S>
where
    L: Ledger,
    R: RecordStore,
    S: Signer,
{
    /// Create a submitter.
    pub fn new(config: Arc<DonationConfig>, ledger: Arc<L>, store: Arc<R>, signer: Arc<S>) -> Self {
        Self {
            config,
            gate: ApprovalGate::new(Arc::clone(&ledger)),
            resolver: GiverResolver::new(Arc::clone(&store)),
            ledger,
            store,
            signer,
            observer: Arc::new(NoopObserver),
            reconciliation: None,
            machine: RwLock::new(WorkflowMachine::new()),
            cancel: CancelHandle::default(),
        }
    }

    /// Report lifecycle events to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn DonationObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Queue failed record writes on `queue`.
    pub fn with_reconciliation(mut self, queue: Arc<ReconciliationQueue>) -> Self {
        self.reconciliation = Some(queue);
        self
    }

    /// Handle that cancels this submission from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// States this submission went through, current state last.
    pub fn history(&self) -> Vec<WorkflowState> {
        let machine = self.machine.read();
        let mut states = machine.history().to_vec();
        states.push(machine.state());
        states
    }

    async fn run(
        &self,
        correlation_id: Uuid,
        intent: DonationIntent,
        current_user: CurrentUser,
    ) -> DonationResult<DonationOutcome> {
        self.ensure_available()?;
        let amount = intent.base_units()?;
        invariant_minimum_donation(intent.amount, self.config.min_donation)?;

        let mut record = SubmissionRecord::new(correlation_id, intent);
        let token_kind = record.intent().token.kind;
        let first = if token_kind.requires_allowance() {
            WorkflowState::Approving
        } else {
            WorkflowState::Resolving
        };
        self.claim(first, &record)?;
        info!(
            token = %record.intent().token.symbol,
            amount = %record.intent().amount,
            admin_id = record.intent().beneficiary_admin_id,
            "[gd-donation] Submission started"
        );

        // Approving
        if let TokenKind::Contract { address, .. } = token_kind {
            let request = AllowanceRequest {
                token: address,
                owner: record.intent().payer_address,
                spender: self.config.ledger_address,
                required: amount,
            };
            let opts = self.signer.options();
            let token = record.intent().token.clone();
            let approval = self.gate.ensure_allowance_notifying(&request, &opts, |required| {
                self.observer.on_approval_needed(&token, required)
            });

            match self.unless_cancelled(approval).await {
                None => return self.finish_cancelled(&record, CancelReason::UserCancelled),
                Some(Ok(ApprovalOutcome::AlreadySufficient { .. })) => {}
                Some(Ok(ApprovalOutcome::Approved { tx_hash })) => {
                    debug!(approval_tx = %tx_hash, "[gd-donation] Continuing before approval confirms");
                }
                Some(Err(e)) => {
                    let kind = match e {
                        DonationError::ApprovalRejected => FailureKind::ApprovalRejected,
                        _ => FailureKind::ApprovalFailed,
                    };
                    return Err(self.fail(&record, kind, e));
                }
            }
            self.advance(WorkflowState::Resolving, &record)?;
        }

        // Resolving
        let resolution = self.resolver.resolve(record.intent(), &current_user);
        let giver = match self.unless_cancelled(resolution).await {
            Some(giver) => giver,
            None => return self.finish_cancelled(&record, CancelReason::UserCancelled),
        };
        record.set_giver(giver)?;
        debug!(
            giver = ?giver.address(),
            giver_id = ?giver.giver_id().map(|g| g.get()),
            is_new_giver = giver.is_new_giver,
            "[gd-donation] Giver resolved"
        );

        // Submitting
        if !self.cancel.lock() {
            return self.finish_cancelled(&record, CancelReason::UserCancelled);
        }
        self.advance(WorkflowState::Submitting, &record)?;
        metrics::record_submitted();

        let mut handle = match self.send_donation(&record, &giver, amount).await {
            Ok(handle) => handle,
            Err(fault) => return self.pre_hash_failure(&record, fault),
        };
        let tx_hash = match handle.transaction_hash().await {
            Ok(tx_hash) => tx_hash,
            Err(fault) => return self.pre_hash_failure(&record, fault),
        };

        // AwaitingConfirmation
        record.set_transaction_hash(tx_hash)?;
        self.advance(WorkflowState::AwaitingConfirmation, &record)?;
        let tx_url = self.config.transaction_url(tx_hash);
        info!(tx_hash = %tx_hash, url = %tx_url, "[gd-donation] Donation submitted");
        self.observer.on_submitted(tx_hash, &tx_url);
        let write_failure = self.write_pending_record(&mut record, tx_hash).await?;

        match handle.confirmation().await {
            Ok(receipt) => {
                record.mark_confirmed()?;
                info!(
                    tx_hash = %tx_hash,
                    block = receipt.block_number,
                    "[gd-donation] Donation confirmed"
                );
                self.observer.on_confirmed(tx_hash);
            }
            Err(fault) => {
                if let Some(reason) = write_failure {
                    if let Err(e) = self.queue_record(&record, tx_hash, reason) {
                        error!("[gd-donation] Could not queue record: {}", e);
                    }
                }
                let (kind, e) = post_hash_error(tx_hash, fault);
                return Err(self.fail(&record, kind, e));
            }
        }

        // Recording
        self.advance(WorkflowState::Recording, &record)?;
        let warnings = match write_failure {
            Some(reason) => vec![self.queue_record(&record, tx_hash, reason)?],
            None => Vec::new(),
        };

        self.advance(WorkflowState::Settled, &record)?;
        metrics::record_settled();
        info!(tx_hash = %tx_hash, "[gd-donation] Donation settled");

        Ok(DonationOutcome::Settled {
            tx_hash,
            giver,
            record_id: record.record_store_id().cloned(),
            warnings,
        })
    }

    /// Refuse the intent if a submission is running or already finished.
    fn ensure_available(&self) -> DonationResult<()> {
        available(self.machine.read().state())
    }

    /// Bind the submission to this instance.
    fn claim(&self, first: WorkflowState, record: &SubmissionRecord) -> DonationResult<()> {
        let mut machine = self.machine.write();
        available(machine.state())?;
        machine.transition_to(first, record)
    }

    fn advance(&self, next: WorkflowState, record: &SubmissionRecord) -> DonationResult<()> {
        self.machine.write().transition_to(next, record)
    }

    /// Run `fut` unless cancellation is requested first.
    async fn unless_cancelled<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.requested() => None,
            output = fut => Some(output),
        }
    }

    async fn send_donation(
        &self,
        record: &SubmissionRecord,
        giver: &ResolvedGiver,
        amount: Amount,
    ) -> Result<TxHandle, LedgerFault> {
        let intent = record.intent();
        let opts = self.signer.options();

        match giver.giver_id() {
            Some(giver_id) if !giver.is_new_giver => {
                self.ledger
                    .donate(
                        giver_id,
                        intent.beneficiary_admin_id,
                        &intent.token.kind,
                        amount,
                        &opts,
                    )
                    .await
            }
            _ => {
                self.ledger
                    .register_and_donate(
                        giver.address(),
                        intent.beneficiary_admin_id,
                        &intent.token.kind,
                        amount,
                        &opts,
                    )
                    .await
            }
        }
    }

    /// Mirror the hashed donation in the record store.
    ///
    /// Returns the failure reason when the write did not land.
    async fn write_pending_record(
        &self,
        record: &mut SubmissionRecord,
        tx_hash: TxHash,
    ) -> DonationResult<Option<String>> {
        let payload = record.payload()?;
        let key = IdempotencyKey::from_tx_hash(tx_hash);

        match self.store.create_donation_record(&key, &payload).await {
            Ok(record_id) => {
                record.set_record_store_id(record_id.clone())?;
                debug!(record_id = %record_id, "[gd-donation] Pending donation recorded");
                self.observer.on_recorded(&record_id);
                Ok(None)
            }
            Err(e) => {
                warn!(
                    tx_hash = %tx_hash,
                    "[gd-donation] Pending record write failed: {}",
                    e
                );
                Ok(Some(e.to_string()))
            }
        }
    }

    /// Queue the record for out-of-band retry and raise the warning.
    fn queue_record(
        &self,
        record: &SubmissionRecord,
        tx_hash: TxHash,
        reason: String,
    ) -> DonationResult<DonationWarning> {
        let key = IdempotencyKey::from_tx_hash(tx_hash);
        let pending = PendingRecord::new(key, record.payload()?, reason);
        metrics::record_record_write_failure();
        if let Some(queue) = &self.reconciliation {
            queue.push(pending.clone());
        }
        let warning = DonationWarning::RecordWriteFailed(pending);
        self.observer.on_warning(&warning);
        Ok(warning)
    }

    fn pre_hash_failure(
        &self,
        record: &SubmissionRecord,
        fault: LedgerFault,
    ) -> DonationResult<DonationOutcome> {
        match fault {
            LedgerFault::Declined => self.finish_cancelled(record, CancelReason::DeclinedSignature),
            LedgerFault::InsufficientAllowance(reason) => Err(self.fail(
                record,
                FailureKind::ApprovalFailed,
                DonationError::ApprovalFailed { reason },
            )),
            other => Err(self.fail(
                record,
                FailureKind::LedgerError,
                DonationError::LedgerError {
                    tx_hash: None,
                    reason: other.to_string(),
                },
            )),
        }
    }

    fn finish_cancelled(
        &self,
        record: &SubmissionRecord,
        reason: CancelReason,
    ) -> DonationResult<DonationOutcome> {
        self.advance(WorkflowState::Cancelled, record)?;
        metrics::record_cancelled();
        info!(?reason, "[gd-donation] Submission cancelled");
        self.observer.on_cancelled(reason);
        Ok(DonationOutcome::Cancelled(reason))
    }

    fn fail(&self, record: &SubmissionRecord, kind: FailureKind, e: DonationError) -> DonationError {
        self.cancel.lock();
        if let Err(transition) = self.advance(WorkflowState::Failed(kind), record) {
            error!("[gd-donation] Could not record failure: {}", transition);
        }
        metrics::record_failed(kind);

        let detail = match record.transaction_hash() {
            Some(tx_hash) => format!("{} ({})", e, self.config.transaction_url(tx_hash)),
            None => e.to_string(),
        };
        match kind {
            FailureKind::ApprovalRejected => info!("[gd-donation] {}", detail),
            _ => warn!(kind = kind.label(), "[gd-donation] Submission failed: {}", detail),
        }
        self.observer.on_failed(kind, &detail);
        e
    }
}

fn available(state: WorkflowState) -> DonationResult<()> {
    if state.is_terminal() {
        return Err(DonationError::SubmitterSpent {
            state: state.to_string(),
        });
    }
    if state != WorkflowState::Idle {
        return Err(DonationError::SubmissionInProgress);
    }
    Ok(())
}

fn post_hash_error(tx_hash: TxHash, fault: LedgerFault) -> (FailureKind, DonationError) {
    match fault {
        LedgerFault::InsufficientAllowance(reason) => {
            (FailureKind::ApprovalFailed, DonationError::ApprovalFailed { reason })
        }
        other => (
            FailureKind::LedgerError,
            DonationError::LedgerError {
                tx_hash: Some(tx_hash),
                reason: other.to_string(),
            },
        ),
    }
}

#[async_trait]
impl<L, R, S> DonationApi for DonationSubmitter<L, R, S>
where
    L: Ledger,
    R: RecordStore,
    S: Signer,
{
    async fn submit(
        &self,
        intent: DonationIntent,
        current_user: CurrentUser,
    ) -> DonationResult<DonationOutcome> {
        let correlation_id = Uuid::new_v4();
        let span = info_span!("donation", %correlation_id);
        self.run(correlation_id, intent, current_user)
            .instrument(span)
            .await
    }

    fn cancel(&self) -> bool {
        if !self.state().is_cancellable() {
            return false;
        }
        self.cancel.cancel()
    }

    fn state(&self) -> WorkflowState {
        self.machine.read().state()
    }
}
