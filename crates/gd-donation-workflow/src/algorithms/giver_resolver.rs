//! # Giver Resolver
//!
//! Picks the on-chain giver that owns a donation.
//!
//! Resolution never fails. When the off-chain lookup is unavailable the
//! giver is registered as part of the donation instead.

use crate::domain::{CurrentUser, DonationIntent, ResolvedGiver};
use crate::ports::outbound::RecordStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Giver resolver.
pub struct GiverResolver<R: RecordStore + ?Sized> {
    store: Arc<R>,
}

impl<R: RecordStore + ?Sized> GiverResolver<R> {
    /// Create a resolver over the record store.
    pub fn new(store: Arc<R>) -> Self {
        Self { store }
    }

    /// Resolve the giver, in priority order:
    ///
    /// 1. `on_behalf_of` address: its registered giver, else a new giver with that address
    /// 2. the current user's registered giver
    /// 3. the current user as a new giver
    pub async fn resolve(&self, intent: &DonationIntent, current_user: &CurrentUser) -> ResolvedGiver {
        if let Some(address) = intent.on_behalf_of {
            return match self.store.find_user_by_address(address).await {
                Ok(Some(user)) => match user.registered_giver() {
                    Some(giver_id) => {
                        debug!(?address, %giver_id, "[gd-donation] Donating on behalf of registered giver");
                        ResolvedGiver::existing(address, giver_id)
                    }
                    None => {
                        debug!(?address, "[gd-donation] Custom address not registered on-chain");
                        ResolvedGiver::new_giver(address)
                    }
                },
                Ok(None) => {
                    debug!(?address, "[gd-donation] No user for custom address");
                    ResolvedGiver::new_giver(address)
                }
                Err(e) => {
                    warn!(?address, "[gd-donation] User lookup failed, registering new giver: {}", e);
                    ResolvedGiver::new_giver(address)
                }
            };
        }

        match current_user.giver_id {
            Some(giver_id) => ResolvedGiver::existing(current_user.address, giver_id),
            None => ResolvedGiver::new_giver(current_user.address),
        }
    }
}
