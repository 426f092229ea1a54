//! # Domain Errors
//!
//! Error types for the transaction coordinator and its participants.

use super::value_objects::{Protocol, TransactionId, TransactionStatus};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Error returned by a participant phase call.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantError {
    /// Participant refused the request (business rule, insufficient funds, ...).
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Participant could not be reached or is not serving.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Participant answered `prepared = false`.
    #[error("Voted to abort")]
    VotedNo,

    /// Call did not complete within the phase timeout.
    #[error("No response within {0:?}")]
    TimedOut(Duration),

    /// Operation names a participant that is not registered.
    #[error("Participant not registered")]
    NotFound,

    /// Phase task panicked.
    #[error("Phase task panicked: {0}")]
    Panicked(String),
}

/// One participant's failure within a phase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseFailure {
    /// Failing participant.
    pub participant_id: String,
    /// What went wrong.
    pub error: ParticipantError,
}

impl PhaseFailure {
    /// Create a new phase failure.
    pub fn new(participant_id: impl Into<String>, error: ParticipantError) -> Self {
        Self {
            participant_id: participant_id.into(),
            error,
        }
    }
}

fn describe(failures: &[PhaseFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.participant_id, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Coordinator error types.
#[derive(Debug, Error)]
pub enum TxError {
    /// Unknown transaction ID.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// Unknown participant within a transaction.
    #[error("Participant {participant_id} not found in transaction {tx_id}")]
    ParticipantNotFound {
        /// Transaction searched
        tx_id: TransactionId,
        /// Participant requested
        participant_id: String,
    },

    /// Phase attempted on a terminal or frozen record.
    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidStateTransition {
        /// Current status
        from: TransactionStatus,
        /// Attempted status
        to: TransactionStatus,
    },

    /// At least one participant failed to prepare; the transaction was aborted.
    #[error("Prepare failed: {}", describe(.failures))]
    PrepareFailed {
        /// Every participant that did not vote yes
        failures: Vec<PhaseFailure>,
    },

    /// At least one participant failed to commit. Participants listed in
    /// `committed` have already applied the transaction and are not rolled back.
    #[error("Commit failed (partial, {} committed): {}", .committed.len(), describe(.failures))]
    CommitFailed {
        /// Participants whose commit failed
        failures: Vec<PhaseFailure>,
        /// Participants that acknowledged commit
        committed: Vec<String>,
    },

    /// At least one Try failed; every participant was cancelled.
    #[error("Try failed: {}", describe(.failures))]
    TryFailed {
        /// Every entry whose Try failed
        failures: Vec<PhaseFailure>,
    },

    /// At least one Confirm failed. Reservations of the failed participants
    /// are still held; confirm is not retried.
    #[error("Confirm failed (partial, {} confirmed): {}", .confirmed.len(), describe(.failures))]
    ConfirmFailed {
        /// Participants whose confirm failed
        failures: Vec<PhaseFailure>,
        /// Participants that acknowledged confirm
        confirmed: Vec<String>,
    },

    /// The transaction deadline elapsed before a decision was reached.
    #[error("Transaction {tx_id} timed out after {timeout:?}")]
    TimeoutExceeded {
        /// Timed out transaction
        tx_id: TransactionId,
        /// Configured transaction timeout
        timeout: Duration,
    },

    /// Participant already registered under the same ID.
    #[error("Participant {participant_id} already registered in transaction {tx_id}")]
    DuplicateParticipant {
        /// Transaction
        tx_id: TransactionId,
        /// Duplicated participant
        participant_id: String,
    },

    /// Participant or coordinator protocol does not match the transaction.
    #[error("Protocol mismatch: transaction uses {expected:?}, got {found:?}")]
    ProtocolMismatch {
        /// Protocol fixed for the transaction
        expected: Protocol,
        /// Protocol of the caller
        found: Protocol,
    },

    /// No async runtime available to arm the timeout watcher.
    #[error("Runtime unavailable: {0}")]
    RuntimeUnavailable(String),
}

impl TxError {
    /// Participant failures carried by aggregate phase errors.
    pub fn failures(&self) -> &[PhaseFailure] {
        match self {
            Self::PrepareFailed { failures }
            | Self::CommitFailed { failures, .. }
            | Self::TryFailed { failures }
            | Self::ConfirmFailed { failures, .. } => failures,
            _ => &[],
        }
    }
}

/// Result type for coordinator operations.
pub type TxResult<T> = Result<T, TxError>;
