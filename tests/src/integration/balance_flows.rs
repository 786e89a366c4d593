//! # Balance Flow Scenarios
//!
//! Balance polling as the donate dialog drives it: change-only updates,
//! token switches and cancellation racing a slow query.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use gd_donation_workflow::adapters::{InMemoryLedger, LedgerCall};
    use gd_donation_workflow::{
        poll_token_balance, start_polling, Amount, BalanceWatcher, DonationConfig, LedgerFault,
        TokenKind,
    };
    use parking_lot::Mutex;
    use tokio::sync::Semaphore;

    use crate::integration::fixtures::{dai, payer, tokens};

    const INTERVAL: Duration = Duration::from_millis(2_000);

    fn recorder() -> (Arc<Mutex<Vec<Amount>>>, impl Fn(Amount) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |amount| sink.lock().push(amount))
    }

    fn balance_reads(ledger: &InMemoryLedger, token: TokenKind) -> usize {
        ledger
            .calls()
            .iter()
            .filter(|c| matches!(c, LedgerCall::BalanceOf { token: t, .. } if *t == token))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_balance_updates_only_on_change() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_balance(&TokenKind::Native, payer(), tokens(3));
        let (seen, on_change) = recorder();

        let handle = poll_token_balance(
            Arc::clone(&ledger),
            TokenKind::Native,
            payer(),
            on_change,
            INTERVAL,
        );

        tokio::time::sleep(INTERVAL * 3).await;
        ledger.set_balance(&TokenKind::Native, payer(), tokens(1));
        tokio::time::sleep(INTERVAL * 2).await;

        assert_eq!(*seen.lock(), vec![tokens(3), tokens(1)]);
        assert!(balance_reads(&ledger, TokenKind::Native) >= 5);
        handle.cancel();
    }

    /// Unreachable node reads as zero; polling continues and recovers.
    #[tokio::test(start_paused = true)]
    async fn test_unreachable_node_reads_as_zero() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_balance(&TokenKind::Native, payer(), tokens(2));
        let (seen, on_change) = recorder();

        let _handle = poll_token_balance(
            Arc::clone(&ledger),
            TokenKind::Native,
            payer(),
            on_change,
            INTERVAL,
        );
        tokio::time::sleep(INTERVAL / 2).await;

        ledger.fail_reads(true);
        tokio::time::sleep(INTERVAL).await;
        ledger.fail_reads(false);
        tokio::time::sleep(INTERVAL).await;

        assert_eq!(*seen.lock(), vec![tokens(2), Amount::zero(), tokens(2)]);
    }

    /// Cancelled while the query is in flight: the late result is never delivered.
    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_query_resolves_never_emits() {
        let gate = Arc::new(Semaphore::new(0));
        let (seen, on_change) = recorder();

        let query = {
            let gate = Arc::clone(&gate);
            move || {
                let gate = Arc::clone(&gate);
                async move {
                    let _permit = gate.acquire().await;
                    Ok::<_, LedgerFault>(tokens(9))
                }
            }
        };
        let handle = start_polling(query, on_change, INTERVAL);

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();
        gate.add_permits(16);
        tokio::time::sleep(INTERVAL * 3).await;

        assert!(seen.lock().is_empty());
        assert!(!handle.is_active());
    }

    /// Switching tokens in the dialog stops the previous token's poller.
    #[tokio::test(start_paused = true)]
    async fn test_switching_token_stops_previous_poller() {
        let ledger = Arc::new(InMemoryLedger::new());
        let dai_kind = dai().kind;
        ledger.set_balance(&TokenKind::Native, payer(), tokens(5));
        ledger.set_balance(&dai_kind, payer(), tokens(70));

        let interval = DonationConfig::default().poll_interval();
        let mut watcher = BalanceWatcher::new(Arc::clone(&ledger), interval);
        let (native_seen, on_native) = recorder();
        let (dai_seen, on_dai) = recorder();

        watcher.watch(TokenKind::Native, payer(), on_native);
        tokio::time::sleep(interval * 2).await;
        watcher.watch(dai_kind, payer(), on_dai);
        tokio::time::sleep(Duration::from_millis(1)).await;

        let native_reads = balance_reads(&ledger, TokenKind::Native);
        ledger.set_balance(&TokenKind::Native, payer(), tokens(6));
        tokio::time::sleep(interval * 3).await;

        assert_eq!(balance_reads(&ledger, TokenKind::Native), native_reads);
        assert_eq!(*native_seen.lock(), vec![tokens(5)]);
        assert_eq!(*dai_seen.lock(), vec![tokens(70)]);
        assert!(watcher.is_watching());

        watcher.stop();
        assert!(!watcher.is_watching());
    }
}
