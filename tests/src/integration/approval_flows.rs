//! # Approval Flow Scenarios
//!
//! Token donations through the allowance gate: no approval when the
//! allowance covers the amount, exactly one exact-amount approval otherwise.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gd_donation_workflow::adapters::{InMemoryLedger, LedgerCall, StaticSigner, TxScript};
    use gd_donation_workflow::{
        Address, AllowanceRequest, Amount, ApprovalGate, ApprovalOutcome, CurrentUser, DonationApi,
        DonationError, FailureKind, LedgerFault, Signer, WorkflowState,
    };
    use tokio_test::{assert_err, assert_ok};

    use crate::integration::fixtures::{
        dai, dai_address, intent, payer, tokens, ObservedEvent, Scenario,
    };

    fn user() -> CurrentUser {
        CurrentUser::new(payer(), 42)
    }

    #[tokio::test]
    async fn test_sufficient_allowance_issues_no_approval() {
        let s = Scenario::new();
        s.ledger
            .set_allowance(dai_address(), payer(), s.spender(), tokens(150));

        let outcome = assert_ok!(s.submitter.submit(intent(dai(), "100"), user()).await);

        assert!(outcome.is_settled());
        assert_eq!(s.ledger.approval_count(), 0);
        assert_eq!(s.ledger.donation_count(), 1);
        assert!(!s
            .observer
            .events()
            .iter()
            .any(|e| matches!(e, ObservedEvent::ApprovalNeeded { .. })));
    }

    /// The allowance exactly equal to the amount is enough.
    #[tokio::test]
    async fn test_exact_allowance_is_sufficient() {
        let s = Scenario::new();
        s.ledger
            .set_allowance(dai_address(), payer(), s.spender(), tokens(100));

        s.submitter.submit(intent(dai(), "100"), user()).await.unwrap();

        assert_eq!(s.ledger.approval_count(), 0);
    }

    #[tokio::test]
    async fn test_low_allowance_approves_exact_amount_once() {
        let s = Scenario::new();
        s.ledger
            .set_allowance(dai_address(), payer(), s.spender(), tokens(40));

        s.submitter.submit(intent(dai(), "100"), user()).await.unwrap();

        let approvals: Vec<_> = s
            .ledger
            .calls()
            .into_iter()
            .filter(|c| matches!(c, LedgerCall::Approve { .. }))
            .collect();
        assert_eq!(
            approvals,
            vec![LedgerCall::Approve {
                token: dai_address(),
                spender: s.spender(),
                amount: tokens(100),
            }]
        );
        assert_ne!(tokens(100), Amount::MAX);

        let allowance_reads = s
            .ledger
            .calls()
            .iter()
            .filter(|c| matches!(c, LedgerCall::Allowance { .. }))
            .count();
        assert_eq!(allowance_reads, 1);

        assert_eq!(
            s.observer.events()[0],
            ObservedEvent::ApprovalNeeded {
                symbol: "DAI".to_string(),
                amount: tokens(100),
            }
        );
    }

    /// Token 100, allowance 0, approval declined: failed, and nothing donated.
    #[tokio::test]
    async fn test_declined_approval_fails_without_donation() {
        let s = Scenario::new();
        s.ledger.script_approvals([TxScript::Decline]);

        let err = assert_err!(s.submitter.submit(intent(dai(), "100"), user()).await);

        assert!(matches!(err, DonationError::ApprovalRejected));
        assert_eq!(
            s.submitter.state(),
            WorkflowState::Failed(FailureKind::ApprovalRejected)
        );
        assert_eq!(
            s.ledger.calls(),
            vec![
                LedgerCall::Allowance {
                    token: dai_address(),
                    owner: payer(),
                    spender: s.spender(),
                },
                LedgerCall::Approve {
                    token: dai_address(),
                    spender: s.spender(),
                    amount: tokens(100),
                },
            ]
        );
        assert_eq!(s.ledger.donation_count(), 0);
        assert_eq!(s.store.donation_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_approval_transaction() {
        let s = Scenario::new();
        s.ledger.script_approvals([TxScript::FailBeforeHash(LedgerFault::Chain(
            "gas estimation failed".into(),
        ))]);

        let err = s.submitter.submit(intent(dai(), "100"), user()).await.unwrap_err();

        assert!(matches!(err, DonationError::ApprovalFailed { .. }));
        assert_eq!(
            s.submitter.state(),
            WorkflowState::Failed(FailureKind::ApprovalFailed)
        );
        assert_eq!(s.ledger.donation_count(), 0);
    }

    /// Donation reverting for lack of allowance is reported as an approval failure.
    #[tokio::test]
    async fn test_donation_reverting_on_allowance() {
        let s = Scenario::new();
        s.ledger.script_donations([TxScript::FailAfterHash(
            LedgerFault::from_provider_message("ERC20: transfer amount exceeds allowance"),
        )]);

        let err = s.submitter.submit(intent(dai(), "100"), user()).await.unwrap_err();

        assert!(matches!(err, DonationError::ApprovalFailed { .. }));
        assert_eq!(
            s.submitter.state(),
            WorkflowState::Failed(FailureKind::ApprovalFailed)
        );
    }

    #[tokio::test]
    async fn test_approving_entered_once() {
        let s = Scenario::new();

        s.submitter.submit(intent(dai(), "100"), user()).await.unwrap();

        let history = s.submitter.history();
        assert_eq!(
            history,
            vec![
                WorkflowState::Idle,
                WorkflowState::Approving,
                WorkflowState::Resolving,
                WorkflowState::Submitting,
                WorkflowState::AwaitingConfirmation,
                WorkflowState::Recording,
                WorkflowState::Settled,
            ]
        );
    }

    /// A confirmed approval covers the next request for the same amount.
    #[tokio::test]
    async fn test_gate_reuses_confirmed_approval() {
        let ledger = Arc::new(InMemoryLedger::new());
        let gate = ApprovalGate::new(Arc::clone(&ledger));
        let signer = StaticSigner::new(payer());
        let request = AllowanceRequest {
            token: dai_address(),
            owner: payer(),
            spender: Address::repeat_byte(0x5b),
            required: tokens(3),
        };

        let first = gate.ensure_allowance(&request, &signer.options()).await.unwrap();
        let second = gate.ensure_allowance(&request, &signer.options()).await.unwrap();

        assert!(matches!(first, ApprovalOutcome::Approved { .. }));
        assert_eq!(
            second,
            ApprovalOutcome::AlreadySufficient { current: tokens(3) }
        );
        assert_eq!(ledger.approval_count(), 1);
    }
}
