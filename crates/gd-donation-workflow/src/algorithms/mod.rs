//! # Algorithms Module
//!
//! The building blocks the donation submitter sequences.

pub mod approval_gate;
pub mod balance_poller;
pub mod giver_resolver;
pub mod state_machine;

pub use approval_gate::{AllowanceRequest, ApprovalGate, ApprovalOutcome};
pub use balance_poller::{poll_token_balance, start_polling, BalanceWatcher, PollHandle};
pub use giver_resolver::GiverResolver;
pub use state_machine::WorkflowMachine;
