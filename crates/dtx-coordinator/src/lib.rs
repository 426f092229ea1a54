//! # DTX Coordinator
//!
//! Distributed transaction coordination for in-process business services.
//!
//! ## Protocols
//!
//! - **Two-Phase Commit (2PC)**: unanimous Prepare vote, then Commit; any
//!   "no" or failure aborts every participant.
//! - **Try-Confirm-Cancel (TCC)**: every participant reserves, then all
//!   confirm; any failed reservation cancels every participant.
//!
//! Each transaction has a deadline. A transaction still undecided when its
//! deadline passes is marked TimedOut and compensated autonomously.
//!
//! ## Module Structure
//!
//! ```text
//! dtx-coordinator/
//! ├── domain/          # Record, operation log, status machine, errors
//! ├── ports/           # TransactionApi + participant traits
//! ├── algorithms/      # Phase fan-out, 2PC, TCC, timeout watcher
//! ├── adapters/        # In-memory ledger/inventory, scripted participant
//! ├── registry.rs      # Concurrency-safe record store
//! └── service.rs       # TransactionCoordinator (TransactionApi impl)
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! let coordinator = TransactionCoordinator::new(CoordinatorConfig::default());
//! let tx_id = coordinator.begin_transaction(None)?;
//! coordinator.add_participant(&tx_id, ParticipantHandle::two_phase(ledger))?;
//! coordinator.commit(&tx_id).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod registry;
pub mod service;

// Re-exports
pub use adapters::{CallCounts, InMemoryInventory, InMemoryLedger, ScriptedParticipant};
pub use algorithms::{TccCoordinator, TimeoutWatcher, TwoPhaseCoordinator};
pub use config::CoordinatorConfig;
pub use domain::{
    invariant_commit_after_unanimous_prepare, invariant_confirm_after_all_tries,
    invariant_log_settled, invariant_single_call_per_phase, Operation, OperationLog,
    OperationStatus, ParticipantError, Params, Phase, PhaseFailure, Protocol, TransactionId,
    TransactionRecord, TransactionStatus, TxError, TxResult, DEFAULT_PHASE_TIMEOUT_MS,
    DEFAULT_TX_TIMEOUT_MS,
};
pub use ports::{ParticipantHandle, TccParticipant, TransactionApi, TwoPhaseParticipant};
pub use registry::{TransactionEntry, TransactionRegistry};
pub use service::TransactionCoordinator;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
