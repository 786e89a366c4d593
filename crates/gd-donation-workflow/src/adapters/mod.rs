//! # Adapters Layer (Hexagonal Architecture)
//!
//! In-process implementations of the outbound ports, for local development
//! and tests.

mod ledger;
mod record_store;
mod signer;

pub use ledger::{InMemoryLedger, LedgerCall, TxScript};
pub use record_store::InMemoryRecordStore;
pub use signer::StaticSigner;
