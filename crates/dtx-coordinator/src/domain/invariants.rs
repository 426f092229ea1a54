//! # Domain Invariants
//!
//! Rules that must hold for every transaction record, checked against the
//! operation log.

use super::entities::{OperationLog, TransactionRecord};
use super::value_objects::{OperationStatus, Phase};

/// Default transaction timeout.
pub const DEFAULT_TX_TIMEOUT_MS: u64 = 30_000;

/// Default per-phase timeout.
pub const DEFAULT_PHASE_TIMEOUT_MS: u64 = 10_000;

/// Invariant: 2PC commit is only issued after a unanimous yes vote.
///
/// No participant receives Commit unless every participant's Prepare
/// succeeded, and each participant's Commit follows its own Prepare.
pub fn invariant_commit_after_unanimous_prepare(log: &OperationLog) -> bool {
    let entries = log.entries();
    let commits: Vec<_> = entries.iter().filter(|op| op.phase == Phase::Commit).collect();
    if commits.is_empty() {
        return true;
    }

    let all_prepared = entries
        .iter()
        .filter(|op| op.phase == Phase::Prepare)
        .all(|op| op.status == OperationStatus::Success);
    if !all_prepared {
        return false;
    }

    commits.iter().all(|commit| {
        let commit_pos = entries.iter().position(|op| op.id == commit.id);
        let prepare_pos = entries.iter().position(|op| {
            op.phase == Phase::Prepare && op.participant_id == commit.participant_id
        });
        matches!((prepare_pos, commit_pos), (Some(p), Some(c)) if p < c)
    })
}

/// Invariant: TCC confirm is only issued when every try succeeded.
pub fn invariant_confirm_after_all_tries(log: &OperationLog) -> bool {
    if log.by_phase(Phase::Confirm).next().is_none() {
        return true;
    }
    log.by_phase(Phase::Try)
        .all(|op| op.status == OperationStatus::Success)
}

/// Invariant: a decided record has no operation left executing.
///
/// Pending compensation sweeps from the timeout watcher may still be in
/// flight right after the status flips, so callers check this once the
/// coordinator call has returned.
pub fn invariant_log_settled(record: &TransactionRecord) -> bool {
    !record.status.is_terminal()
        || record
            .log
            .entries()
            .iter()
            .all(|op| op.status != OperationStatus::Executing)
}

/// Invariant: each participant receives a phase at most once.
pub fn invariant_single_call_per_phase(log: &OperationLog, phase: Phase) -> bool {
    let mut seen = std::collections::HashSet::new();
    log.by_phase(phase)
        .all(|op| seen.insert(op.participant_id.as_str()))
}
