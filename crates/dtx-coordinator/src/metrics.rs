//! # Coordinator Metrics
//!
//! Prometheus metrics for monitoring transaction outcomes.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! dtx-coordinator = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `dtx_transactions_begun_total` - Counter of transactions created
//! - `dtx_transactions_committed_total` - Counter of committed transactions (by protocol)
//! - `dtx_transactions_aborted_total` - Counter of aborted transactions (by protocol, failing phase)
//! - `dtx_transactions_timed_out_total` - Counter of transactions expired by the timeout watcher
//! - `dtx_phase_calls_total` - Counter of participant calls (by phase, outcome)
//! - `dtx_compensation_failures_total` - Counter of failed abort/cancel calls (by phase)

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

use crate::domain::{Phase, Protocol};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Total transactions begun
    pub static ref TRANSACTIONS_BEGUN: IntCounter = register_int_counter!(
        "dtx_transactions_begun_total",
        "Total number of transactions begun"
    )
    .expect("Failed to create TRANSACTIONS_BEGUN metric");

    /// Total transactions committed, labeled by protocol
    pub static ref TRANSACTIONS_COMMITTED: IntCounterVec = register_int_counter_vec!(
        "dtx_transactions_committed_total",
        "Total number of transactions committed",
        &["protocol"]
    )
    .expect("Failed to create TRANSACTIONS_COMMITTED metric");

    /// Total transactions aborted, labeled by protocol and failing phase
    pub static ref TRANSACTIONS_ABORTED: IntCounterVec = register_int_counter_vec!(
        "dtx_transactions_aborted_total",
        "Total number of transactions aborted",
        &["protocol", "phase"]
    )
    .expect("Failed to create TRANSACTIONS_ABORTED metric");

    /// Total transactions expired by the timeout watcher
    pub static ref TRANSACTIONS_TIMED_OUT: IntCounter = register_int_counter!(
        "dtx_transactions_timed_out_total",
        "Total number of transactions timed out"
    )
    .expect("Failed to create TRANSACTIONS_TIMED_OUT metric");

    /// Participant calls, labeled by phase and outcome
    pub static ref PHASE_CALLS: IntCounterVec = register_int_counter_vec!(
        "dtx_phase_calls_total",
        "Total number of participant phase calls",
        &["phase", "outcome"]
    )
    .expect("Failed to create PHASE_CALLS metric");

    /// Failed compensation calls, labeled by phase
    pub static ref COMPENSATION_FAILURES: IntCounterVec = register_int_counter_vec!(
        "dtx_compensation_failures_total",
        "Total number of failed abort/cancel calls",
        &["phase"]
    )
    .expect("Failed to create COMPENSATION_FAILURES metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

/// Record a transaction begun
#[cfg(feature = "metrics")]
pub fn record_transaction_begun() {
    TRANSACTIONS_BEGUN.inc();
}

/// Record a transaction committed
#[cfg(feature = "metrics")]
pub fn record_transaction_committed(protocol: Protocol) {
    TRANSACTIONS_COMMITTED
        .with_label_values(&[protocol.as_str()])
        .inc();
}

/// Record a transaction aborted during `phase`
#[cfg(feature = "metrics")]
pub fn record_transaction_aborted(protocol: Protocol, phase: Phase) {
    TRANSACTIONS_ABORTED
        .with_label_values(&[protocol.as_str(), phase.as_str()])
        .inc();
}

/// Record a transaction expired by its watcher
#[cfg(feature = "metrics")]
pub fn record_transaction_timed_out() {
    TRANSACTIONS_TIMED_OUT.inc();
}

/// Record one participant call
#[cfg(feature = "metrics")]
pub fn record_phase_call(phase: Phase, success: bool) {
    let outcome = if success { "success" } else { "failed" };
    PHASE_CALLS.with_label_values(&[phase.as_str(), outcome]).inc();
}

/// Record a failed compensation call
#[cfg(feature = "metrics")]
pub fn record_compensation_failure(phase: Phase) {
    COMPENSATION_FAILURES
        .with_label_values(&[phase.as_str()])
        .inc();
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
#[allow(missing_docs)]
pub fn record_transaction_begun() {}

#[cfg(not(feature = "metrics"))]
#[allow(missing_docs)]
pub fn record_transaction_committed(_protocol: Protocol) {}

#[cfg(not(feature = "metrics"))]
#[allow(missing_docs)]
pub fn record_transaction_aborted(_protocol: Protocol, _phase: Phase) {}

#[cfg(not(feature = "metrics"))]
#[allow(missing_docs)]
pub fn record_transaction_timed_out() {}

#[cfg(not(feature = "metrics"))]
#[allow(missing_docs)]
pub fn record_phase_call(_phase: Phase, _success: bool) {}

#[cfg(not(feature = "metrics"))]
#[allow(missing_docs)]
pub fn record_compensation_failure(_phase: Phase) {}
