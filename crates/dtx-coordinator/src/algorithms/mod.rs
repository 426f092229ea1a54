//! # Algorithms Module
//!
//! Protocol drivers (2PC, TCC), the shared phase fan-out they build on, and
//! the per-transaction timeout watcher.

pub(crate) mod phase;
pub mod tcc;
pub mod timeout;
pub mod two_phase_commit;

pub use tcc::TccCoordinator;
pub use timeout::TimeoutWatcher;
pub use two_phase_commit::TwoPhaseCoordinator;
