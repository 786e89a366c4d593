//! # Outbound Ports
//!
//! Traits for the collaborators the workflow drives: the ledger contracts,
//! the off-chain record store and the wallet signer.

use crate::domain::{
    AdminId, Address, Amount, DonationPayload, GiverId, IdempotencyKey, RecordId, TokenKind,
    TxHash, UserRecord,
};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;

/// Message wallet providers use when the user rejects a signature prompt.
pub const DECLINED_SIGNATURE_MESSAGE: &str = "User denied transaction signature";

/// Fault reported by the ledger or the signer.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LedgerFault {
    /// User rejected the signature prompt.
    #[error("user denied transaction signature")]
    Declined,

    /// Token allowance too low for the transfer.
    #[error("insufficient allowance: {0}")]
    InsufficientAllowance(String),

    /// Any other chain or provider failure.
    #[error("chain error: {0}")]
    Chain(String),

    /// The transaction handle was dropped before reporting.
    #[error("transaction handle dropped before completion")]
    Dropped,
}

impl LedgerFault {
    /// Classify a raw provider error message.
    pub fn from_provider_message(message: &str) -> Self {
        if message.contains(DECLINED_SIGNATURE_MESSAGE) {
            LedgerFault::Declined
        } else if message.to_lowercase().contains("allowance") {
            LedgerFault::InsufficientAllowance(message.to_string())
        } else {
            LedgerFault::Chain(message.to_string())
        }
    }

    /// Check if the user declined signing.
    pub fn is_declined(&self) -> bool {
        matches!(self, LedgerFault::Declined)
    }
}

/// Receipt of a confirmed transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxReceipt {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Block the transaction was mined in.
    pub block_number: u64,
}

/// Pending transaction: reports its hash once, then resolves or rejects on confirmation.
#[derive(Debug)]
pub struct TxHandle {
    hash_rx: Option<oneshot::Receiver<Result<TxHash, LedgerFault>>>,
    outcome_rx: oneshot::Receiver<Result<TxReceipt, LedgerFault>>,
    hash: Option<TxHash>,
}

/// Producer side of a [`TxHandle`], held by ledger implementations.
#[derive(Debug)]
pub struct TxEmitter {
    hash_tx: Option<oneshot::Sender<Result<TxHash, LedgerFault>>>,
    outcome_tx: Option<oneshot::Sender<Result<TxReceipt, LedgerFault>>>,
}

impl TxHandle {
    /// Create a handle and its emitter.
    pub fn channel() -> (TxHandle, TxEmitter) {
        let (hash_tx, hash_rx) = oneshot::channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        (
            TxHandle {
                hash_rx: Some(hash_rx),
                outcome_rx,
                hash: None,
            },
            TxEmitter {
                hash_tx: Some(hash_tx),
                outcome_tx: Some(outcome_tx),
            },
        )
    }

    /// Wait for the signer to produce the transaction hash.
    pub async fn transaction_hash(&mut self) -> Result<TxHash, LedgerFault> {
        if let Some(hash) = self.hash {
            return Ok(hash);
        }
        let rx = self.hash_rx.take().ok_or(LedgerFault::Dropped)?;
        let hash = rx.await.map_err(|_| LedgerFault::Dropped)??;
        self.hash = Some(hash);
        Ok(hash)
    }

    /// Wait for the chain to confirm or reject the transaction.
    pub async fn confirmation(self) -> Result<TxReceipt, LedgerFault> {
        self.outcome_rx.await.map_err(|_| LedgerFault::Dropped)?
    }
}

impl TxEmitter {
    /// Report the transaction hash. Later calls are ignored.
    pub fn emit_hash(&mut self, tx_hash: TxHash) {
        if let Some(tx) = self.hash_tx.take() {
            let _ = tx.send(Ok(tx_hash));
        }
    }

    /// Report confirmation.
    pub fn confirm(mut self, receipt: TxReceipt) {
        if let Some(tx) = self.outcome_tx.take() {
            let _ = tx.send(Ok(receipt));
        }
    }

    /// Report a failure. Before the hash, it fails the hash wait as well.
    pub fn fail(mut self, fault: LedgerFault) {
        if let Some(tx) = self.hash_tx.take() {
            let _ = tx.send(Err(fault.clone()));
        }
        if let Some(tx) = self.outcome_tx.take() {
            let _ = tx.send(Err(fault));
        }
    }
}

/// Gas and sender parameters attached to every transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignerOptions {
    /// Sending account.
    pub from: Address,
    /// Gas price in wei, `None` lets the provider decide.
    pub gas_price: Option<Amount>,
    /// Gas added on top of the provider's estimate.
    pub extra_gas: u64,
}

/// Wallet signer - outbound port.
///
/// Declined prompts surface as [`LedgerFault::Declined`] from the ledger calls it signs.
pub trait Signer: Send + Sync {
    /// Account the wallet signs for.
    fn address(&self) -> Address;

    /// Options for the next transaction.
    fn options(&self) -> SignerOptions;
}

/// Ledger contracts - outbound port.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Balance of `owner` in `token`.
    async fn balance_of(&self, token: &TokenKind, owner: Address) -> Result<Amount, LedgerFault>;

    /// Current allowance of `spender` over `owner`'s `token`.
    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<Amount, LedgerFault>;

    /// Approve `spender` to move exactly `amount` of `token`.
    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: Amount,
        opts: &SignerOptions,
    ) -> Result<TxHandle, LedgerFault>;

    /// Donate as a registered giver.
    async fn donate(
        &self,
        giver_id: GiverId,
        beneficiary_admin_id: AdminId,
        token: &TokenKind,
        amount: Amount,
        opts: &SignerOptions,
    ) -> Result<TxHandle, LedgerFault>;

    /// Register `giver` and donate in one transaction.
    async fn register_and_donate(
        &self,
        giver: Address,
        beneficiary_admin_id: AdminId,
        token: &TokenKind,
        amount: Amount,
        opts: &SignerOptions,
    ) -> Result<TxHandle, LedgerFault>;
}

/// Record store failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RecordStoreError {
    /// Service unreachable or timed out.
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    /// Service refused the request.
    #[error("record store rejected request: {0}")]
    Rejected(String),
}

/// Off-chain record store - outbound port.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Look up a user by wallet address.
    async fn find_user_by_address(
        &self,
        address: Address,
    ) -> Result<Option<UserRecord>, RecordStoreError>;

    /// Create a donation record. Repeating a key returns the existing record.
    async fn create_donation_record(
        &self,
        key: &IdempotencyKey,
        payload: &DonationPayload,
    ) -> Result<RecordId, RecordStoreError>;
}
