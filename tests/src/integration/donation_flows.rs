//! # Donation Flow Scenarios
//!
//! Full submissions from intent to settlement against the in-memory adapters:
//! giver selection, declined and failed signatures, cancellation, and the
//! record-store reconciliation path.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use gd_donation_workflow::adapters::{LedgerCall, TxScript};
    use gd_donation_workflow::{
        Address, Amount, CancelReason, CurrentUser, DonationApi, DonationError, DonationOutcome,
        DonationWarning, FailureKind, GiverId, IdempotencyKey, LedgerFault, TokenKind, TxHash,
        TxReceipt, UserRecord, WorkflowState,
    };
    use tokio_test::{assert_err, assert_ok};

    use crate::integration::fixtures::{
        dai, intent, native, payer, tokens, ObservedEvent, Scenario, ADMIN_ID,
    };

    fn registered_user(raw_giver_id: u64) -> CurrentUser {
        CurrentUser::new(payer(), raw_giver_id)
    }

    fn custom_address() -> Address {
        Address::repeat_byte(0xc5)
    }

    // =========================================================================
    // GIVER SELECTION
    // =========================================================================

    /// Native 1.5 from giver 42: no approval, `donate(42, admin, native, 1.5e18)`.
    #[tokio::test]
    async fn test_native_donation_from_existing_giver() {
        let s = Scenario::new();

        let outcome = assert_ok!(
            s.submitter
                .submit(intent(native(), "1.5"), registered_user(42))
                .await
        );

        let DonationOutcome::Settled { tx_hash, giver, record_id, warnings } = outcome else {
            panic!("expected settlement, got {outcome:?}");
        };
        assert_eq!(giver.giver_id(), GiverId::registered(42));
        assert!(!giver.is_new_giver);
        assert!(record_id.is_some());
        assert!(warnings.is_empty());

        assert_eq!(
            s.ledger.calls(),
            vec![LedgerCall::Donate {
                giver_id: GiverId::registered(42).unwrap(),
                admin_id: ADMIN_ID,
                token: TokenKind::Native,
                amount: Amount::from(1_500_000_000_000_000_000u128),
            }]
        );
        assert!(!s.submitter.history().contains(&WorkflowState::Approving));
        assert_eq!(s.submitter.state(), WorkflowState::Settled);

        let stored = s.store.donation(&IdempotencyKey::from_tx_hash(tx_hash)).unwrap();
        assert_eq!(stored.giver_id, Some(42));
        assert!(!stored.ledger_confirmed);
        assert_eq!(stored.beneficiary_admin_id, ADMIN_ID);
    }

    /// Unknown custom address: new giver with that address, `registerAndDonate`.
    #[tokio::test]
    async fn test_custom_address_without_record_registers_new_giver() {
        let s = Scenario::new();

        let outcome = s
            .submitter
            .submit(
                intent(native(), "2").on_behalf_of(custom_address()),
                registered_user(42),
            )
            .await
            .unwrap();

        let DonationOutcome::Settled { giver, .. } = outcome else {
            panic!("expected settlement, got {outcome:?}");
        };
        assert!(giver.is_new_giver);
        assert_eq!(giver.address(), custom_address());

        let calls = s.ledger.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(
            calls[0],
            LedgerCall::RegisterAndDonate { giver, admin_id: ADMIN_ID, .. } if giver == custom_address()
        ));
    }

    /// Custom address with a registered record donates as that giver.
    #[tokio::test]
    async fn test_custom_address_with_registered_record_donates() {
        let s = Scenario::new();
        s.store.insert_user(UserRecord {
            address: custom_address(),
            giver_id: Some(9),
            name: Some("Campaign Friend".to_string()),
        });

        s.submitter
            .submit(
                intent(native(), "2").on_behalf_of(custom_address()),
                registered_user(42),
            )
            .await
            .unwrap();

        assert!(matches!(
            s.ledger.calls()[0],
            LedgerCall::Donate { giver_id, .. } if giver_id.get() == 9
        ));
    }

    /// A failed lookup degrades to a new giver instead of failing the donation.
    #[tokio::test]
    async fn test_lookup_failure_degrades_to_new_giver() {
        let s = Scenario::new();
        s.store.fail_lookups(true);

        let outcome = assert_ok!(
            s.submitter
                .submit(
                    intent(native(), "1").on_behalf_of(custom_address()),
                    registered_user(42),
                )
                .await
        );

        assert!(outcome.is_settled());
        assert_eq!(s.ledger.donation_count(), 1);
        assert!(matches!(s.ledger.calls()[0], LedgerCall::RegisterAndDonate { .. }));
    }

    /// Unregistered users register as part of their first donation.
    #[tokio::test]
    async fn test_unregistered_user_registers_and_donates() {
        let s = Scenario::new();

        s.submitter
            .submit(intent(native(), "1"), registered_user(0))
            .await
            .unwrap();

        assert!(matches!(
            s.ledger.calls()[0],
            LedgerCall::RegisterAndDonate { giver, .. } if giver == payer()
        ));
    }

    // =========================================================================
    // SIGNATURES AND CHAIN FAILURES
    // =========================================================================

    #[tokio::test]
    async fn test_declined_donation_cancels_without_record() {
        let s = Scenario::new();
        s.ledger.script_donations([TxScript::Decline]);

        let outcome = s
            .submitter
            .submit(intent(native(), "1"), registered_user(42))
            .await
            .unwrap();

        assert_eq!(outcome, DonationOutcome::Cancelled(CancelReason::DeclinedSignature));
        assert_eq!(s.submitter.state(), WorkflowState::Cancelled);
        assert_eq!(s.store.donation_count(), 0);
        assert_eq!(
            s.observer.events(),
            vec![ObservedEvent::Cancelled(CancelReason::DeclinedSignature)]
        );
    }

    /// Without a hash the machine never reaches confirmation or recording.
    #[tokio::test]
    async fn test_failure_before_hash_never_records() {
        let s = Scenario::new();
        s.ledger
            .script_donations([TxScript::FailBeforeHash(LedgerFault::Chain("nonce too low".into()))]);

        let err = assert_err!(
            s.submitter
                .submit(intent(native(), "1"), registered_user(42))
                .await
        );

        assert!(matches!(err, DonationError::LedgerError { tx_hash: None, .. }));
        let history = s.submitter.history();
        assert!(!history.contains(&WorkflowState::AwaitingConfirmation));
        assert!(!history.contains(&WorkflowState::Recording));
        assert_eq!(s.submitter.state(), WorkflowState::Failed(FailureKind::LedgerError));
        assert_eq!(s.store.donation_count(), 0);
    }

    #[tokio::test]
    async fn test_revert_after_hash_reports_explorer_link() {
        let s = Scenario::new();
        s.ledger
            .script_donations([TxScript::FailAfterHash(LedgerFault::Chain("reverted".into()))]);

        let err = s
            .submitter
            .submit(intent(native(), "1"), registered_user(42))
            .await
            .unwrap_err();

        let tx_hash = TxHash::from_low_u64_be(1);
        assert!(matches!(err, DonationError::LedgerError { tx_hash: Some(h), .. } if h == tx_hash));

        let url = s.config.transaction_url(tx_hash);
        let failed = s
            .observer
            .events()
            .into_iter()
            .find_map(|e| match e {
                ObservedEvent::Failed { kind, detail } => Some((kind, detail)),
                _ => None,
            })
            .unwrap();
        assert_eq!(failed.0, FailureKind::LedgerError);
        assert!(failed.1.contains(&url));

        let mirror = s.store.donation(&IdempotencyKey::from_tx_hash(tx_hash)).unwrap();
        assert!(!mirror.ledger_confirmed);
        assert!(s.queue.is_empty());
    }

    /// The record lands as soon as the hash exists, before the chain confirms.
    #[tokio::test]
    async fn test_pending_record_exists_before_confirmation() {
        let Scenario { submitter, ledger, store, observer, .. } = Scenario::new();
        let submitter = Arc::new(submitter);
        ledger.script_donations([TxScript::Hold]);

        let task = {
            let submitter = Arc::clone(&submitter);
            tokio::spawn(async move {
                submitter
                    .submit(intent(native(), "1.5"), registered_user(42))
                    .await
            })
        };

        let mut waited = 0;
        while store.donation_count() == 0 {
            assert!(waited < 100, "no record written after the hash");
            tokio::time::sleep(Duration::from_millis(5)).await;
            waited += 1;
        }

        let tx_hash = TxHash::from_low_u64_be(1);
        let pending = store.donation(&IdempotencyKey::from_tx_hash(tx_hash)).unwrap();
        assert_eq!(submitter.state(), WorkflowState::AwaitingConfirmation);
        assert!(!pending.ledger_confirmed);
        assert_eq!(pending.giver_id, Some(42));
        assert!(!observer
            .events()
            .iter()
            .any(|e| matches!(e, ObservedEvent::Confirmed(_))));

        for emitter in ledger.take_held() {
            emitter.fail(LedgerFault::Chain("reverted".into()));
        }

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, DonationError::LedgerError { tx_hash: Some(h), .. } if h == tx_hash));
        assert_eq!(store.donation_count(), 1);
    }

    /// Hashed transaction reverts after the record write failed: the record is still queued.
    #[tokio::test]
    async fn test_revert_after_failed_record_write_is_queued() {
        let s = Scenario::new();
        s.store.fail_writes(true);
        s.ledger
            .script_donations([TxScript::FailAfterHash(LedgerFault::Chain("reverted".into()))]);

        let err = s
            .submitter
            .submit(intent(native(), "1"), registered_user(42))
            .await
            .unwrap_err();

        assert!(matches!(err, DonationError::LedgerError { tx_hash: Some(_), .. }));
        assert_eq!(s.queue.len(), 1);
        assert!(!s.queue.snapshot()[0].payload.ledger_confirmed);
        assert_eq!(s.observer.warnings().len(), 1);

        s.store.fail_writes(false);
        let report = s.queue.retry(s.store.as_ref()).await;
        assert_eq!(report.written.len(), 1);
        assert_eq!(s.store.donation_count(), 1);
    }

    /// A busy submitter reports that first, whatever the new intent looks like.
    #[tokio::test]
    async fn test_invalid_intent_while_busy_reports_in_progress() {
        let Scenario { submitter, ledger, .. } = Scenario::new();
        let submitter = Arc::new(submitter);
        ledger.script_donations([TxScript::Hold]);

        let task = {
            let submitter = Arc::clone(&submitter);
            tokio::spawn(async move {
                submitter
                    .submit(intent(native(), "1"), registered_user(42))
                    .await
            })
        };

        let mut waited = 0;
        while submitter.state() != WorkflowState::AwaitingConfirmation {
            assert!(waited < 100, "donation never reached the signer");
            tokio::time::sleep(Duration::from_millis(5)).await;
            waited += 1;
        }

        let err = submitter
            .submit(intent(native(), "0.001"), registered_user(42))
            .await
            .unwrap_err();
        assert!(matches!(err, DonationError::SubmissionInProgress));

        for emitter in ledger.take_held() {
            emitter.confirm(TxReceipt {
                tx_hash: TxHash::from_low_u64_be(1),
                block_number: 1_000,
            });
        }
        assert!(task.await.unwrap().unwrap().is_settled());
    }

    #[tokio::test]
    async fn test_submitted_event_carries_transaction_url() {
        let s = Scenario::new();

        s.submitter
            .submit(intent(native(), "1"), registered_user(42))
            .await
            .unwrap();

        let tx_hash = TxHash::from_low_u64_be(1);
        assert_eq!(
            s.observer.events()[0],
            ObservedEvent::Submitted {
                tx_hash,
                tx_url: s.config.transaction_url(tx_hash),
            }
        );
    }

    // =========================================================================
    // CANCELLATION
    // =========================================================================

    /// Cancelling before submission stops the flow ahead of any ledger call.
    #[tokio::test]
    async fn test_cancel_before_submit_touches_nothing() {
        let s = Scenario::new();
        let handle = s.submitter.cancel_handle();
        assert!(handle.cancel());

        let outcome = s
            .submitter
            .submit(intent(dai(), "100"), registered_user(42))
            .await
            .unwrap();

        assert_eq!(outcome, DonationOutcome::Cancelled(CancelReason::UserCancelled));
        assert!(s.ledger.calls().is_empty());
    }

    /// Once the signer has the donation, cancel is refused and the donation settles.
    #[tokio::test]
    async fn test_cancel_refused_while_awaiting_confirmation() {
        let Scenario { submitter, ledger, .. } = Scenario::new();
        let submitter = Arc::new(submitter);
        ledger.script_donations([TxScript::Hold]);

        let task = {
            let submitter = Arc::clone(&submitter);
            tokio::spawn(async move {
                submitter
                    .submit(intent(native(), "1"), registered_user(42))
                    .await
            })
        };

        let mut waited = 0;
        while submitter.state() != WorkflowState::AwaitingConfirmation {
            assert!(waited < 100, "donation never reached the signer");
            tokio::time::sleep(Duration::from_millis(5)).await;
            waited += 1;
        }

        assert!(!submitter.cancel());
        assert!(!submitter.cancel_handle().cancel());

        let tx_hash = TxHash::from_low_u64_be(1);
        for emitter in ledger.take_held() {
            emitter.confirm(TxReceipt {
                tx_hash,
                block_number: 1_000,
            });
        }

        let outcome = task.await.unwrap().unwrap();
        assert!(outcome.is_settled());
        assert_eq!(submitter.state(), WorkflowState::Settled);
    }

    #[tokio::test]
    async fn test_settled_submitter_refuses_new_intent() {
        let s = Scenario::new();
        s.submitter
            .submit(intent(native(), "1"), registered_user(42))
            .await
            .unwrap();

        let err = s
            .submitter
            .submit(intent(native(), "1"), registered_user(42))
            .await
            .unwrap_err();

        assert!(matches!(err, DonationError::SubmitterSpent { .. }));
        assert!(!s.submitter.cancel());
        assert_eq!(s.ledger.donation_count(), 1);
    }

    // =========================================================================
    // RECONCILIATION
    // =========================================================================

    /// Hash obtained, record write throws: settled with a queued warning, not failed.
    #[tokio::test]
    async fn test_record_write_failure_settles_with_warning() {
        let s = Scenario::new();
        s.store.fail_writes(true);

        let outcome = assert_ok!(
            s.submitter
                .submit(intent(native(), "1.5"), registered_user(42))
                .await
        );

        let DonationOutcome::Settled { tx_hash, record_id, warnings, .. } = outcome else {
            panic!("expected settlement, got {outcome:?}");
        };
        assert_eq!(s.submitter.state(), WorkflowState::Settled);
        assert!(record_id.is_none());
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            warnings[0].to_error(),
            DonationError::RecordWriteFailed { tx_hash: h, .. } if h == tx_hash
        ));
        assert_eq!(s.observer.warnings(), warnings);
        assert_eq!(s.queue.len(), 1);

        let DonationWarning::RecordWriteFailed(pending) = &warnings[0];
        assert_eq!(pending.key, IdempotencyKey::from_tx_hash(tx_hash));
        assert!(pending.payload.ledger_confirmed);
    }

    /// Queued records land once the store recovers, and retries stay idempotent.
    #[tokio::test]
    async fn test_queued_record_written_on_retry() {
        let s = Scenario::new();
        s.store.fail_writes(true);
        let outcome = s
            .submitter
            .submit(intent(native(), "1.5"), registered_user(42))
            .await
            .unwrap();
        let DonationOutcome::Settled { tx_hash, .. } = outcome else {
            panic!("expected settlement, got {outcome:?}");
        };

        let report = s.queue.retry(s.store.as_ref()).await;
        assert!(report.written.is_empty());
        assert_eq!(report.still_pending, 1);

        s.store.fail_writes(false);
        let report = s.queue.retry(s.store.as_ref()).await;
        assert_eq!(report.written.len(), 1);
        assert_eq!(report.still_pending, 0);
        assert!(s.queue.is_empty());

        let key = IdempotencyKey::from_tx_hash(tx_hash);
        assert_eq!(s.store.donation(&key).unwrap().tx_hash, tx_hash);

        let report = s.queue.retry(s.store.as_ref()).await;
        assert!(report.written.is_empty());
        assert_eq!(s.store.donation_count(), 1);
    }

    #[tokio::test]
    async fn test_token_donation_record_carries_token() {
        let s = Scenario::new();
        s.ledger
            .set_allowance(dai().kind.contract_address().unwrap(), payer(), s.spender(), tokens(500));

        let outcome = s
            .submitter
            .submit(intent(dai(), "25"), registered_user(42))
            .await
            .unwrap();
        let DonationOutcome::Settled { tx_hash, .. } = outcome else {
            panic!("expected settlement, got {outcome:?}");
        };

        let stored = s.store.donation(&IdempotencyKey::from_tx_hash(tx_hash)).unwrap();
        assert_eq!(stored.token_symbol, "DAI");
        assert_eq!(stored.token_address, dai().kind.contract_address());
    }
}
