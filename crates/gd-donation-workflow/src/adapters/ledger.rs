//! In-memory Ledger Adapter
//!
//! Implements the `Ledger` port against in-process balances and allowances.
//! Each transaction follows a scripted behaviour so callers can exercise
//! declined prompts, pre-hash failures and on-chain reverts.

use crate::domain::{AdminId, Address, Amount, GiverId, TokenKind, TxHash};
use crate::ports::outbound::{Ledger, LedgerFault, SignerOptions, TxEmitter, TxHandle, TxReceipt};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

/// Scripted behaviour of the next transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxScript {
    /// Hash, then confirmation.
    Confirm,
    /// Signature prompt declined; no hash.
    Decline,
    /// Fails before a hash exists.
    FailBeforeHash(LedgerFault),
    /// Hash, then the chain rejects the transaction.
    FailAfterHash(LedgerFault),
    /// Hash only; the emitter is held until [`InMemoryLedger::take_held`].
    Hold,
}

/// A call observed by the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerCall {
    /// `balance_of`
    BalanceOf {
        /// Token.
        token: TokenKind,
        /// Owner.
        owner: Address,
    },
    /// `allowance`
    Allowance {
        /// Token contract.
        token: Address,
        /// Owner.
        owner: Address,
        /// Spender.
        spender: Address,
    },
    /// `approve`
    Approve {
        /// Token contract.
        token: Address,
        /// Spender.
        spender: Address,
        /// Approved amount.
        amount: Amount,
    },
    /// `donate`
    Donate {
        /// Giver id.
        giver_id: GiverId,
        /// Beneficiary admin.
        admin_id: AdminId,
        /// Token.
        token: TokenKind,
        /// Amount.
        amount: Amount,
    },
    /// `register_and_donate`
    RegisterAndDonate {
        /// Giver address.
        giver: Address,
        /// Beneficiary admin.
        admin_id: AdminId,
        /// Token.
        token: TokenKind,
        /// Amount.
        amount: Amount,
    },
}

/// In-memory ledger.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    balances: RwLock<HashMap<(Option<Address>, Address), Amount>>,
    allowances: RwLock<HashMap<(Address, Address, Address), Amount>>,
    approve_script: Mutex<VecDeque<TxScript>>,
    donation_script: Mutex<VecDeque<TxScript>>,
    calls: Mutex<Vec<LedgerCall>>,
    held: Mutex<Vec<TxEmitter>>,
    fail_reads: AtomicBool,
    next_tx: AtomicU64,
    block_height: AtomicU64,
}

impl InMemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            block_height: AtomicU64::new(1_000),
            ..Default::default()
        }
    }

    /// Set a balance.
    pub fn set_balance(&self, token: &TokenKind, owner: Address, amount: Amount) {
        self.balances
            .write()
            .insert((token.contract_address(), owner), amount);
    }

    /// Set an allowance.
    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: Amount) {
        self.allowances
            .write()
            .insert((token, owner, spender), amount);
    }

    /// Script the next approval transactions.
    pub fn script_approvals(&self, scripts: impl IntoIterator<Item = TxScript>) {
        self.approve_script.lock().extend(scripts);
    }

    /// Script the next donation transactions.
    pub fn script_donations(&self, scripts: impl IntoIterator<Item = TxScript>) {
        self.donation_script.lock().extend(scripts);
    }

    /// Make balance and allowance reads fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Every call observed so far.
    pub fn calls(&self) -> Vec<LedgerCall> {
        self.calls.lock().clone()
    }

    /// Number of approval transactions issued.
    pub fn approval_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, LedgerCall::Approve { .. }))
            .count()
    }

    /// Number of donation transactions issued (either kind).
    pub fn donation_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    LedgerCall::Donate { .. } | LedgerCall::RegisterAndDonate { .. }
                )
            })
            .count()
    }

    /// Take emitters of held transactions, to confirm or fail them later.
    pub fn take_held(&self) -> Vec<TxEmitter> {
        std::mem::take(&mut *self.held.lock())
    }

    fn record(&self, call: LedgerCall) {
        self.calls.lock().push(call);
    }

    fn next_hash(&self) -> TxHash {
        let n = self.next_tx.fetch_add(1, Ordering::SeqCst) + 1;
        TxHash::from_low_u64_be(n)
    }

    fn next_receipt(&self, tx_hash: TxHash) -> TxReceipt {
        TxReceipt {
            tx_hash,
            block_number: self.block_height.fetch_add(1, Ordering::SeqCst),
        }
    }

    fn check_reads(&self) -> Result<(), LedgerFault> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(LedgerFault::Chain("node unreachable".to_string()));
        }
        Ok(())
    }

    /// Run a script; `on_confirm` applies the state change of a confirmed tx.
    fn run(
        &self,
        script: TxScript,
        on_confirm: impl FnOnce(&Self),
    ) -> Result<TxHandle, LedgerFault> {
        let (handle, mut emitter) = TxHandle::channel();
        match script {
            TxScript::Confirm => {
                let tx_hash = self.next_hash();
                emitter.emit_hash(tx_hash);
                on_confirm(self);
                emitter.confirm(self.next_receipt(tx_hash));
            }
            TxScript::Decline => emitter.fail(LedgerFault::Declined),
            TxScript::FailBeforeHash(fault) => return Err(fault),
            TxScript::FailAfterHash(fault) => {
                emitter.emit_hash(self.next_hash());
                emitter.fail(fault);
            }
            TxScript::Hold => {
                emitter.emit_hash(self.next_hash());
                self.held.lock().push(emitter);
            }
        }
        Ok(handle)
    }

    fn next_script(queue: &Mutex<VecDeque<TxScript>>) -> TxScript {
        queue.lock().pop_front().unwrap_or(TxScript::Confirm)
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn balance_of(&self, token: &TokenKind, owner: Address) -> Result<Amount, LedgerFault> {
        self.record(LedgerCall::BalanceOf {
            token: *token,
            owner,
        });
        self.check_reads()?;
        Ok(self
            .balances
            .read()
            .get(&(token.contract_address(), owner))
            .copied()
            .unwrap_or_default())
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<Amount, LedgerFault> {
        self.record(LedgerCall::Allowance {
            token,
            owner,
            spender,
        });
        self.check_reads()?;
        Ok(self
            .allowances
            .read()
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: Amount,
        opts: &SignerOptions,
    ) -> Result<TxHandle, LedgerFault> {
        debug!("[gd-ledger] approve {} of {:?} for {:?}", amount, token, spender);
        self.record(LedgerCall::Approve {
            token,
            spender,
            amount,
        });
        let owner = opts.from;
        let script = Self::next_script(&self.approve_script);
        self.run(script, |ledger| {
            ledger.set_allowance(token, owner, spender, amount)
        })
    }

    async fn donate(
        &self,
        giver_id: GiverId,
        beneficiary_admin_id: AdminId,
        token: &TokenKind,
        amount: Amount,
        _opts: &SignerOptions,
    ) -> Result<TxHandle, LedgerFault> {
        debug!("[gd-ledger] donate {} from giver {} to admin {}", amount, giver_id, beneficiary_admin_id);
        self.record(LedgerCall::Donate {
            giver_id,
            admin_id: beneficiary_admin_id,
            token: *token,
            amount,
        });
        let script = Self::next_script(&self.donation_script);
        self.run(script, |_| {})
    }

    async fn register_and_donate(
        &self,
        giver: Address,
        beneficiary_admin_id: AdminId,
        token: &TokenKind,
        amount: Amount,
        _opts: &SignerOptions,
    ) -> Result<TxHandle, LedgerFault> {
        debug!("[gd-ledger] register {:?} and donate {} to admin {}", giver, amount, beneficiary_admin_id);
        self.record(LedgerCall::RegisterAndDonate {
            giver,
            admin_id: beneficiary_admin_id,
            token: *token,
            amount,
        });
        let script = Self::next_script(&self.donation_script);
        self.run(script, |_| {})
    }
}
