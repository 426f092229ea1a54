//! # Adapters Layer (Hexagonal Architecture)
//!
//! In-process implementations of the participant ports: a scripted
//! participant for driving protocol edge cases, and two reference resource
//! managers (a 2PC ledger and a TCC inventory).

mod inventory;
mod ledger;
mod scripted;

pub use inventory::InMemoryInventory;
pub use ledger::InMemoryLedger;
pub use scripted::{CallCounts, ScriptedParticipant};
