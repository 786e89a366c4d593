//! In-memory Record Store Adapter
//!
//! Users and donation records kept in process. Writes are idempotent per key.

use crate::domain::{Address, DonationPayload, IdempotencyKey, RecordId, UserRecord};
use crate::ports::outbound::{RecordStore, RecordStoreError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// In-memory record store.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    users: RwLock<HashMap<Address, UserRecord>>,
    donations: RwLock<HashMap<IdempotencyKey, (RecordId, DonationPayload)>>,
    fail_lookups: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryRecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a user.
    pub fn insert_user(&self, user: UserRecord) {
        self.users.write().insert(user.address, user);
    }

    /// Make user lookups fail.
    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    /// Make donation writes fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of donation records.
    pub fn donation_count(&self) -> usize {
        self.donations.read().len()
    }

    /// Stored payload for a key.
    pub fn donation(&self, key: &IdempotencyKey) -> Option<DonationPayload> {
        self.donations.read().get(key).map(|(_, p)| p.clone())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn find_user_by_address(
        &self,
        address: Address,
    ) -> Result<Option<UserRecord>, RecordStoreError> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(RecordStoreError::Unavailable("users service down".to_string()));
        }
        Ok(self.users.read().get(&address).cloned())
    }

    async fn create_donation_record(
        &self,
        key: &IdempotencyKey,
        payload: &DonationPayload,
    ) -> Result<RecordId, RecordStoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RecordStoreError::Unavailable(
                "donations service down".to_string(),
            ));
        }
        let mut donations = self.donations.write();
        let (id, _) = donations
            .entry(key.clone())
            .or_insert_with(|| (Uuid::new_v4().to_string(), payload.clone()));
        Ok(id.clone())
    }
}
