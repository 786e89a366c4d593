//! # Balance Poller
//!
//! Re-queries a balance on a self-rescheduling timer and reports changes.
//!
//! Every poller is tagged with a generation number. Cancelling bumps the
//! shared counter, and a result that comes back under an older generation is
//! dropped without reaching `on_change`.

use crate::domain::{Address, Amount, TokenKind};
use crate::ports::outbound::{Ledger, LedgerFault};
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Handle of a running poller. Dropping it cancels the poller.
#[derive(Debug)]
pub struct PollHandle {
    generation: Arc<AtomicU64>,
    issued: u64,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Stop scheduling. A query already in flight is discarded when it returns.
    ///
    /// Only the handle of the current generation can cancel, so a stale
    /// handle never stops a newer poller sharing the same counter.
    pub fn cancel(&self) {
        if self
            .generation
            .compare_exchange(
                self.issued,
                self.issued + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
        {
            debug!(generation = self.issued, "[gd-donation] Balance poller cancelled");
        }
    }

    /// Check if this poller is still the current generation and running.
    pub fn is_active(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.issued
            && self.task.as_ref().map_or(false, |t| !t.is_finished())
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Start polling `query` every `interval`, calling `on_change` when the value changes.
///
/// The first query runs immediately. The next one is scheduled only after the
/// previous one returned, so slow queries never overlap. A failed query counts
/// as a zero balance and polling continues.
pub fn start_polling<Q, Fut, E, F>(query: Q, on_change: F, interval: Duration) -> PollHandle
where
    Q: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Amount, E>> + Send + 'static,
    E: Display + Send + 'static,
    F: Fn(Amount) + Send + Sync + 'static,
{
    spawn_poller(Arc::new(AtomicU64::new(0)), query, on_change, interval)
}

/// Poll `owner`'s balance of `token` on the ledger.
pub fn poll_token_balance<L, F>(
    ledger: Arc<L>,
    token: TokenKind,
    owner: Address,
    on_change: F,
    interval: Duration,
) -> PollHandle
where
    L: Ledger + ?Sized + 'static,
    F: Fn(Amount) + Send + Sync + 'static,
{
    spawn_poller(
        Arc::new(AtomicU64::new(0)),
        balance_query(ledger, token, owner),
        on_change,
        interval,
    )
}

type BalanceFuture = Pin<Box<dyn Future<Output = Result<Amount, LedgerFault>> + Send>>;

fn balance_query<L>(
    ledger: Arc<L>,
    token: TokenKind,
    owner: Address,
) -> impl Fn() -> BalanceFuture + Send + Sync + 'static
where
    L: Ledger + ?Sized + 'static,
{
    move || -> BalanceFuture {
        let ledger = Arc::clone(&ledger);
        Box::pin(async move { ledger.balance_of(&token, owner).await })
    }
}

fn spawn_poller<Q, Fut, E, F>(
    generation: Arc<AtomicU64>,
    query: Q,
    on_change: F,
    interval: Duration,
) -> PollHandle
where
    Q: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Amount, E>> + Send + 'static,
    E: Display + Send + 'static,
    F: Fn(Amount) + Send + Sync + 'static,
{
    let issued = generation.fetch_add(1, Ordering::SeqCst) + 1;
    let current = Arc::clone(&generation);

    let task = tokio::spawn(async move {
        let mut last_emitted = Amount::zero();
        loop {
            if current.load(Ordering::SeqCst) != issued {
                break;
            }

            let value = match query().await {
                Ok(value) => value,
                Err(e) => {
                    debug!("[gd-donation] Balance query failed, reporting zero: {}", e);
                    Amount::zero()
                }
            };

            // Stale result
            if current.load(Ordering::SeqCst) != issued {
                trace!(generation = issued, "[gd-donation] Dropped stale balance");
                break;
            }

            crate::metrics::record_balance_poll();
            if value != last_emitted {
                last_emitted = value;
                on_change(value);
            }

            tokio::time::sleep(interval).await;
        }
    });

    PollHandle {
        generation,
        issued,
        task: Some(task),
    }
}

/// Keeps at most one balance poller alive for a UI context.
pub struct BalanceWatcher<L: Ledger + ?Sized + 'static> {
    ledger: Arc<L>,
    interval: Duration,
    generation: Arc<AtomicU64>,
    active: Option<PollHandle>,
}

impl<L: Ledger + ?Sized + 'static> BalanceWatcher<L> {
    /// Create a watcher polling every `interval`.
    pub fn new(ledger: Arc<L>, interval: Duration) -> Self {
        Self {
            ledger,
            interval,
            generation: Arc::new(AtomicU64::new(0)),
            active: None,
        }
    }

    /// Watch `owner`'s balance of `token`, replacing any previous poller.
    pub fn watch<F>(&mut self, token: TokenKind, owner: Address, on_change: F)
    where
        F: Fn(Amount) + Send + Sync + 'static,
    {
        self.stop();
        debug!(?token, ?owner, "[gd-donation] Watching balance");
        self.active = Some(spawn_poller(
            Arc::clone(&self.generation),
            balance_query(Arc::clone(&self.ledger), token, owner),
            on_change,
            self.interval,
        ));
    }

    /// Stop the active poller, if any.
    pub fn stop(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.cancel();
        }
    }

    /// Check if a poller is running.
    pub fn is_watching(&self) -> bool {
        self.active.as_ref().map_or(false, PollHandle::is_active)
    }
}
