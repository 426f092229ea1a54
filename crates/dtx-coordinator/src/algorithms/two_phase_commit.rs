//! # Two-Phase Commit Protocol
//!
//! 2PC coordinator: a Prepare vote across every participant, then Commit if
//! the vote was unanimous, Abort otherwise.
//!
//! Commit is assumed irrevocable once issued. If some participants fail to
//! commit, those that already did are NOT rolled back and commit is not
//! retried; the caller receives [`TxError::CommitFailed`] naming both sides.

use super::phase::{acknowledged, compensate, decide_outcome, run_phase, PhaseCall};
use crate::domain::{
    ParticipantError, Params, Phase, Protocol, TransactionId, TransactionStatus, TxError,
    TxResult,
};
use crate::metrics;
use crate::ports::outbound::{ParticipantHandle, TwoPhaseParticipant};
use crate::registry::TransactionRegistry;
use dtx_telemetry::log_tx_event;
use std::sync::Arc;
use std::time::Duration;

const COMPONENT: &str = "two_phase";

/// 2PC coordinator.
#[derive(Clone)]
pub struct TwoPhaseCoordinator {
    registry: Arc<TransactionRegistry>,
    phase_timeout: Duration,
}

impl TwoPhaseCoordinator {
    /// Create a coordinator over `registry`.
    pub fn new(registry: Arc<TransactionRegistry>, phase_timeout: Duration) -> Self {
        Self {
            registry,
            phase_timeout,
        }
    }

    /// Run Prepare then Commit (or Abort) for `tx_id`.
    pub async fn commit(&self, tx_id: &TransactionId) -> TxResult<()> {
        let entry = self.registry.entry(tx_id)?;
        let participants = entry.with_record(|record| {
            record.begin_phase(Protocol::TwoPhaseCommit, TransactionStatus::Preparing)
        })?;

        log_tx_event!(
            info,
            COMPONENT,
            "Prepare phase started",
            tx_id,
            participants = participants.len()
        );

        // Phase 1: every participant votes, no short-circuit.
        let votes = run_phase(
            &entry,
            Phase::Prepare,
            calls(&participants),
            self.phase_timeout,
            |p, tx_id, _| async move {
                match p.prepare(&tx_id).await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(ParticipantError::VotedNo),
                    Err(e) => Err(e),
                }
            },
        )
        .await;

        if let Err(failures) = decide_outcome(&votes) {
            entry.advance(TransactionStatus::Aborted)?;
            log_tx_event!(
                warn,
                COMPONENT,
                "Prepare failed; aborting",
                tx_id,
                failed = failures.len()
            );
            compensate(&entry, &participants, self.phase_timeout).await;
            entry.disarm_watcher();
            metrics::record_transaction_aborted(Protocol::TwoPhaseCommit, Phase::Prepare);
            return Err(TxError::PrepareFailed { failures });
        }

        entry.advance(TransactionStatus::Prepared)?;
        log_tx_event!(info, COMPONENT, "All participants prepared; committing", tx_id);

        // Phase 2: decision is final from here on.
        let acks = run_phase(
            &entry,
            Phase::Commit,
            calls(&participants),
            self.phase_timeout,
            |p, tx_id, _| async move { p.commit(&tx_id).await },
        )
        .await;

        match decide_outcome(&acks) {
            Ok(()) => {
                entry.advance(TransactionStatus::Committed)?;
                entry.disarm_watcher();
                metrics::record_transaction_committed(Protocol::TwoPhaseCommit);
                log_tx_event!(info, COMPONENT, "Transaction committed", tx_id);
                Ok(())
            }
            Err(failures) => {
                let committed = acknowledged(&acks);
                entry.advance(TransactionStatus::Aborted)?;
                entry.disarm_watcher();
                metrics::record_transaction_aborted(Protocol::TwoPhaseCommit, Phase::Commit);
                log_tx_event!(
                    error,
                    COMPONENT,
                    "Partial commit: committed participants are not rolled back",
                    tx_id,
                    committed = committed.len(),
                    failed = failures.len()
                );
                Err(TxError::CommitFailed {
                    failures,
                    committed,
                })
            }
        }
    }

    /// Caller-initiated rollback: mark Aborted, then Abort every participant.
    ///
    /// Individual abort failures are logged, not returned.
    ///
    /// Also accepted on a Prepared record. If [`commit`](Self::commit) is
    /// already delivering Phase 2, the Abort calls race the Commit calls,
    /// some participants may end up committed, and `commit` returns
    /// [`TxError::InvalidStateTransition`].
    pub async fn abort(&self, tx_id: &TransactionId) -> TxResult<()> {
        let entry = self.registry.entry(tx_id)?;
        let participants = entry.with_record(|record| {
            record.begin_phase(Protocol::TwoPhaseCommit, TransactionStatus::Aborted)
        })?;

        log_tx_event!(info, COMPONENT, "Abort requested", tx_id);
        compensate(&entry, &participants, self.phase_timeout).await;
        entry.disarm_watcher();
        metrics::record_transaction_aborted(Protocol::TwoPhaseCommit, Phase::Abort);
        Ok(())
    }
}

fn calls(participants: &[ParticipantHandle]) -> Vec<PhaseCall<dyn TwoPhaseParticipant>> {
    participants
        .iter()
        .filter_map(|handle| match handle {
            ParticipantHandle::TwoPhase(p) => Some(PhaseCall::new(
                p.participant_id(),
                Arc::clone(p),
                Params::new(),
            )),
            ParticipantHandle::Tcc(_) => None,
        })
        .collect()
}
