//! Reconciliation queue for record writes that failed after the donation
//! settled on-chain.
//!
//! The chain is the source of truth: a failed write is never rolled back, it
//! waits here until [`ReconciliationQueue::retry`] replays it. Writes are keyed
//! by the transaction hash so a replay never duplicates a record.

use crate::domain::{DonationPayload, IdempotencyKey, RecordId};
use crate::ports::outbound::RecordStore;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// A record write waiting for retry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingRecord {
    /// Idempotency key (transaction hash).
    pub key: IdempotencyKey,
    /// Payload to write.
    pub payload: DonationPayload,
    /// Last failure.
    pub reason: String,
    /// Failed attempts so far.
    pub attempts: u32,
}

impl PendingRecord {
    /// Pending record after a first failed write.
    pub fn new(key: IdempotencyKey, payload: DonationPayload, reason: impl Into<String>) -> Self {
        Self {
            key,
            payload,
            reason: reason.into(),
            attempts: 1,
        }
    }
}

/// Outcome of a retry pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RetryReport {
    /// Records written during this pass.
    pub written: Vec<(IdempotencyKey, RecordId)>,
    /// Records still waiting.
    pub still_pending: usize,
}

/// Queue of record writes to replay out of band.
#[derive(Debug, Default)]
pub struct ReconciliationQueue {
    pending: Mutex<VecDeque<PendingRecord>>,
}

impl ReconciliationQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a failed write. A key already queued is replaced.
    pub fn push(&self, record: PendingRecord) {
        let mut pending = self.pending.lock();
        pending.retain(|queued| queued.key != record.key);
        debug!(key = %record.key, "[gd-donation] Queued record write for retry");
        pending.push_back(record);
    }

    /// Number of queued writes.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Copy of the queued writes.
    pub fn snapshot(&self) -> Vec<PendingRecord> {
        self.pending.lock().iter().cloned().collect()
    }

    /// Replay every queued write once. Failures go back on the queue.
    pub async fn retry<R: RecordStore + ?Sized>(&self, store: &R) -> RetryReport {
        let batch: Vec<PendingRecord> = self.pending.lock().drain(..).collect();
        let mut report = RetryReport::default();

        for mut record in batch {
            match store
                .create_donation_record(&record.key, &record.payload)
                .await
            {
                Ok(record_id) => {
                    info!(
                        key = %record.key,
                        record_id = %record_id,
                        "[gd-donation] Reconciled donation record"
                    );
                    report.written.push((record.key, record_id));
                }
                Err(e) => {
                    record.attempts += 1;
                    record.reason = e.to_string();
                    warn!(
                        key = %record.key,
                        attempts = record.attempts,
                        "[gd-donation] Record write retry failed: {}",
                        e
                    );
                    self.push(record);
                }
            }
        }

        report.still_pending = self.len();
        report
    }
}
