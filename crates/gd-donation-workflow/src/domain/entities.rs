//! # Domain Entities
//!
//! Intent, giver identity and the per-submission record.

use super::amount::to_base_units;
use super::errors::{AdminId, Address, Amount, DonationError, DonationResult, RecordId, TxHash};
use super::value_objects::{GiverId, Token};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the user asked to give. Immutable once submission begins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationIntent {
    /// Wallet paying for the donation.
    pub payer_address: Address,
    /// Admin receiving the donation.
    pub beneficiary_admin_id: AdminId,
    /// Token donated.
    pub token: Token,
    /// Amount in token units (not base units).
    pub amount: Decimal,
    /// Donate on behalf of another address.
    pub on_behalf_of: Option<Address>,
}

impl DonationIntent {
    /// Create an intent; the amount must be positive.
    pub fn new(
        payer_address: Address,
        beneficiary_admin_id: AdminId,
        token: Token,
        amount: Decimal,
    ) -> DonationResult<Self> {
        if amount <= Decimal::ZERO {
            return Err(DonationError::InvalidAmount(format!(
                "{} must be greater than zero",
                amount
            )));
        }
        Ok(Self {
            payer_address,
            beneficiary_admin_id,
            token,
            amount,
            on_behalf_of: None,
        })
    }

    /// Donate on behalf of a custom address.
    pub fn on_behalf_of(mut self, address: Address) -> Self {
        self.on_behalf_of = Some(address);
        self
    }

    /// Amount in base units of the token.
    pub fn base_units(&self) -> DonationResult<Amount> {
        to_base_units(self.amount, self.token.kind.decimals())
    }
}

/// The logged-in dApp user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Wallet address.
    pub address: Address,
    /// On-chain giver id, if registered.
    pub giver_id: Option<GiverId>,
}

impl CurrentUser {
    /// Build from the raw id the record store reports (0 = unregistered).
    pub fn new(address: Address, raw_giver_id: u64) -> Self {
        Self {
            address,
            giver_id: GiverId::registered(raw_giver_id),
        }
    }
}

/// User document as stored by the record store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Wallet address.
    pub address: Address,
    /// Raw giver id (absent or 0 when not registered on-chain).
    #[serde(default, rename = "giverId")]
    pub giver_id: Option<u64>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
}

impl UserRecord {
    /// Registered giver id, if any.
    pub fn registered_giver(&self) -> Option<GiverId> {
        self.giver_id.and_then(GiverId::registered)
    }
}

/// Which on-chain identity owns a donation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiverIdentity {
    /// Giver address.
    pub address: Address,
    /// On-chain id, `None` when not yet registered.
    pub giver_id: Option<GiverId>,
}

/// Result of giver resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedGiver {
    /// Resolved identity.
    pub identity: GiverIdentity,
    /// Giver must be registered as part of the donation.
    pub is_new_giver: bool,
}

impl ResolvedGiver {
    /// Giver already registered on-chain.
    pub fn existing(address: Address, giver_id: GiverId) -> Self {
        Self {
            identity: GiverIdentity {
                address,
                giver_id: Some(giver_id),
            },
            is_new_giver: false,
        }
    }

    /// Giver to register with the donation.
    pub fn new_giver(address: Address) -> Self {
        Self {
            identity: GiverIdentity {
                address,
                giver_id: None,
            },
            is_new_giver: true,
        }
    }

    /// Giver address.
    pub fn address(&self) -> Address {
        self.identity.address
    }

    /// On-chain id, if registered.
    pub fn giver_id(&self) -> Option<GiverId> {
        self.identity.giver_id
    }
}

/// Allowance snapshot. Read fresh for every token donation, never cached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenAllowance {
    /// Token contract.
    pub token: Address,
    /// Token owner.
    pub owner: Address,
    /// Allowed spender (the ledger contract).
    pub spender: Address,
    /// Allowed amount in base units.
    pub amount: Amount,
}

impl TokenAllowance {
    /// Check if the allowance covers `required`.
    pub fn covers(&self, required: Amount) -> bool {
        self.amount >= required
    }
}

/// Payload written to the record store once the donation is confirmed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationPayload {
    /// Giver address.
    pub giver_address: Address,
    /// Giver id, absent for a giver registered by this donation.
    pub giver_id: Option<u64>,
    /// Giver registered by this donation.
    pub is_new_giver: bool,
    /// Admin receiving the donation.
    pub beneficiary_admin_id: AdminId,
    /// Token symbol.
    pub token_symbol: String,
    /// Token contract, absent for the native token.
    pub token_address: Option<Address>,
    /// Amount in base units, decimal string.
    pub amount: String,
    /// Donation transaction.
    pub tx_hash: TxHash,
    /// Chain confirmation observed.
    pub ledger_confirmed: bool,
}

/// Per-submission record. Owned and mutated only by its submitter.
///
/// Transitions are monotonic: the hash is set once, confirmation and the
/// record id both require the hash, and the record id is set once.
#[derive(Clone, Debug)]
pub struct SubmissionRecord {
    correlation_id: Uuid,
    intent: DonationIntent,
    giver: Option<ResolvedGiver>,
    transaction_hash: Option<TxHash>,
    ledger_confirmed: bool,
    record_store_id: Option<RecordId>,
}

impl SubmissionRecord {
    /// Start a record for an intent.
    pub fn new(correlation_id: Uuid, intent: DonationIntent) -> Self {
        Self {
            correlation_id,
            intent,
            giver: None,
            transaction_hash: None,
            ledger_confirmed: false,
            record_store_id: None,
        }
    }

    /// Correlation id used in logs.
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// The bound intent.
    pub fn intent(&self) -> &DonationIntent {
        &self.intent
    }

    /// Resolved giver, once known.
    pub fn giver(&self) -> Option<&ResolvedGiver> {
        self.giver.as_ref()
    }

    /// Donation transaction hash, once known.
    pub fn transaction_hash(&self) -> Option<TxHash> {
        self.transaction_hash
    }

    /// Chain confirmation observed.
    pub fn is_ledger_confirmed(&self) -> bool {
        self.ledger_confirmed
    }

    /// Record-store id, once written.
    pub fn record_store_id(&self) -> Option<&RecordId> {
        self.record_store_id.as_ref()
    }

    /// Bind the resolved giver. Resolution happens once per submission.
    pub fn set_giver(&mut self, giver: ResolvedGiver) -> DonationResult<()> {
        if self.giver.is_some() {
            return Err(DonationError::InvalidRecordTransition(
                "giver already resolved",
            ));
        }
        self.giver = Some(giver);
        Ok(())
    }

    /// Set the transaction hash (once).
    pub fn set_transaction_hash(&mut self, tx_hash: TxHash) -> DonationResult<()> {
        if self.transaction_hash.is_some() {
            return Err(DonationError::InvalidRecordTransition(
                "transaction hash already set",
            ));
        }
        self.transaction_hash = Some(tx_hash);
        Ok(())
    }

    /// Mark the transaction confirmed. Requires the hash.
    pub fn mark_confirmed(&mut self) -> DonationResult<()> {
        if self.transaction_hash.is_none() {
            return Err(DonationError::InvalidRecordTransition(
                "confirmation before transaction hash",
            ));
        }
        self.ledger_confirmed = true;
        Ok(())
    }

    /// Set the record-store id (once). Requires the hash.
    pub fn set_record_store_id(&mut self, id: RecordId) -> DonationResult<()> {
        if self.transaction_hash.is_none() {
            return Err(DonationError::InvalidRecordTransition(
                "record id before transaction hash",
            ));
        }
        if self.record_store_id.is_some() {
            return Err(DonationError::InvalidRecordTransition(
                "record id already set",
            ));
        }
        self.record_store_id = Some(id);
        Ok(())
    }

    /// Build the record-store payload. Requires giver and hash.
    pub fn payload(&self) -> DonationResult<DonationPayload> {
        let giver = self.giver.ok_or(DonationError::InvalidRecordTransition(
            "payload before giver resolution",
        ))?;
        let tx_hash = self
            .transaction_hash
            .ok_or(DonationError::InvalidRecordTransition(
                "payload before transaction hash",
            ))?;

        Ok(DonationPayload {
            giver_address: giver.address(),
            giver_id: giver.giver_id().map(|id| id.get()),
            is_new_giver: giver.is_new_giver,
            beneficiary_admin_id: self.intent.beneficiary_admin_id,
            token_symbol: self.intent.token.symbol.clone(),
            token_address: self.intent.token.kind.contract_address(),
            amount: self.intent.base_units()?.to_string(),
            tx_hash,
            ledger_confirmed: self.ledger_confirmed,
        })
    }
}
