//! # Domain Value Objects
//!
//! Immutable value types for transaction coordination.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Opaque per-operation payload handed to participants.
pub type Params = HashMap<String, serde_json::Value>;

/// Unique transaction identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(String);

impl TransactionId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow as string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TransactionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Atomicity protocol driving a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// Prepare / Commit / Abort.
    TwoPhaseCommit,
    /// Try / Confirm / Cancel.
    TryConfirmCancel,
}

impl Protocol {
    /// Short label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TwoPhaseCommit => "2pc",
            Self::TryConfirmCancel => "tcc",
        }
    }
}

/// Transaction state machine shared by both protocols.
///
/// ```text
/// 2PC: Pending → Preparing → Prepared → Committed
///                    └──────────┴────→ Aborted
/// TCC: Pending → Trying → Confirming → Committed
///                   │          └─────→ Aborted
///                   └→ Cancelling ───→ Aborted
/// Pending | Preparing | Trying ──timeout──→ TimedOut
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TransactionStatus {
    /// Created; participants may still be registered.
    #[default]
    Pending,
    /// 2PC phase 1 in flight.
    Preparing,
    /// Every participant voted yes; commit decided.
    Prepared,
    /// TCC try phase in flight.
    Trying,
    /// Every try succeeded; confirm in flight.
    Confirming,
    /// Compensating after a failed try or an explicit cancel.
    Cancelling,
    /// Terminal: every participant committed/confirmed.
    Committed,
    /// Terminal: rolled back or partially failed.
    Aborted,
    /// Terminal: deadline elapsed before a decision.
    TimedOut,
}

impl TransactionStatus {
    /// Check if transition to next state is valid.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        match (self, next) {
            (Pending, Preparing | Trying | Aborted | Cancelling | TimedOut) => true,
            (Preparing, Prepared | Aborted | TimedOut) => true,
            (Prepared, Committed | Aborted) => true, // Commit failed
            (Trying, Confirming | Cancelling | TimedOut) => true,
            (Confirming, Committed | Aborted) => true, // Confirm failed
            (Cancelling, Aborted) => true,
            _ => false,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Aborted | Self::TimedOut)
    }

    /// No commit/abort decision has been made yet.
    ///
    /// Only undecided transactions are swept by the timeout watcher.
    pub fn is_undecided(&self) -> bool {
        matches!(self, Self::Pending | Self::Preparing | Self::Trying)
    }
}

/// Protocol phase recorded in the operation log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// 2PC vote.
    Prepare,
    /// 2PC decision.
    Commit,
    /// 2PC compensation.
    Abort,
    /// TCC reservation.
    Try,
    /// TCC finalization.
    Confirm,
    /// TCC compensation.
    Cancel,
}

impl Phase {
    /// Lowercase label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prepare => "prepare",
            Self::Commit => "commit",
            Self::Abort => "abort",
            Self::Try => "try",
            Self::Confirm => "confirm",
            Self::Cancel => "cancel",
        }
    }

    /// Abort and Cancel are best-effort.
    pub fn is_compensation(&self) -> bool {
        matches!(self, Self::Abort | Self::Cancel)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single logged operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    /// Dispatched, result not yet collected.
    #[default]
    Executing,
    /// Participant acknowledged.
    Success,
    /// Participant failed, refused or timed out.
    Failed,
}
