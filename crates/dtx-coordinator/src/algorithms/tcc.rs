//! # Try-Confirm-Cancel Protocol
//!
//! TCC coordinator: every participant reserves resources (Try); if every
//! reservation succeeds they are all finalized (Confirm), otherwise every
//! registered participant releases what it holds (Cancel).
//!
//! Confirm is never issued unless every Try succeeded. A failed Confirm is
//! not retried; the transaction is marked Aborted and the error names the
//! participants that did confirm.

use super::phase::{acknowledged, compensate, decide_outcome, run_phase, PhaseCall};
use crate::domain::{
    Operation, ParticipantError, Params, Phase, PhaseFailure, Protocol, TransactionId,
    TransactionStatus, TxError, TxResult,
};
use crate::metrics;
use crate::ports::outbound::{ParticipantHandle, TccParticipant};
use crate::registry::{TransactionEntry, TransactionRegistry};
use dtx_telemetry::{log_participant_event, log_tx_event};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const COMPONENT: &str = "tcc";

/// TCC coordinator.
#[derive(Clone)]
pub struct TccCoordinator {
    registry: Arc<TransactionRegistry>,
    phase_timeout: Duration,
}

impl TccCoordinator {
    /// Create a coordinator over `registry`.
    pub fn new(registry: Arc<TransactionRegistry>, phase_timeout: Duration) -> Self {
        Self {
            registry,
            phase_timeout,
        }
    }

    /// Run Try then Confirm (or Cancel) for `tx_id`.
    ///
    /// `operations` maps participant IDs to their Try params. Registered
    /// participants without an entry are tried with empty params; entries
    /// naming an unregistered participant fail that entry.
    pub async fn execute_transaction(
        &self,
        tx_id: &TransactionId,
        mut operations: HashMap<String, Params>,
    ) -> TxResult<()> {
        let entry = self.registry.entry(tx_id)?;
        let participants = entry.with_record(|record| {
            record.begin_phase(Protocol::TryConfirmCancel, TransactionStatus::Trying)
        })?;

        let calls: Vec<PhaseCall<dyn TccParticipant>> = participants
            .iter()
            .filter_map(|handle| match handle {
                ParticipantHandle::Tcc(p) => {
                    let participant_id = p.participant_id();
                    let params = operations.remove(&participant_id).unwrap_or_default();
                    Some(PhaseCall::new(participant_id, Arc::clone(p), params))
                }
                ParticipantHandle::TwoPhase(_) => None,
            })
            .collect();

        // Whatever is left names nobody registered.
        let unknown = reject_unknown(&entry, operations);

        log_tx_event!(
            info,
            COMPONENT,
            "Try phase started",
            tx_id,
            participants = calls.len(),
            unknown = unknown.len()
        );

        let tries = run_phase(
            &entry,
            Phase::Try,
            calls,
            self.phase_timeout,
            |p, tx_id, params| async move { p.try_reserve(&tx_id, &params).await },
        )
        .await;

        let mut failures = unknown;
        if let Err(try_failures) = decide_outcome(&tries) {
            failures.extend(try_failures);
        }

        if !failures.is_empty() {
            entry.advance(TransactionStatus::Cancelling)?;
            log_tx_event!(
                warn,
                COMPONENT,
                "Try failed; cancelling",
                tx_id,
                failed = failures.len()
            );
            compensate(&entry, &participants, self.phase_timeout).await;
            entry.advance(TransactionStatus::Aborted)?;
            entry.disarm_watcher();
            metrics::record_transaction_aborted(Protocol::TryConfirmCancel, Phase::Try);
            return Err(TxError::TryFailed { failures });
        }

        entry.advance(TransactionStatus::Confirming)?;
        log_tx_event!(info, COMPONENT, "All reservations held; confirming", tx_id);

        let confirm_calls: Vec<PhaseCall<dyn TccParticipant>> = participants
            .iter()
            .filter_map(|handle| match handle {
                ParticipantHandle::Tcc(p) => Some(PhaseCall::new(
                    p.participant_id(),
                    Arc::clone(p),
                    Params::new(),
                )),
                ParticipantHandle::TwoPhase(_) => None,
            })
            .collect();

        let confirms = run_phase(
            &entry,
            Phase::Confirm,
            confirm_calls,
            self.phase_timeout,
            |p, tx_id, _| async move { p.confirm(&tx_id).await },
        )
        .await;

        match decide_outcome(&confirms) {
            Ok(()) => {
                entry.advance(TransactionStatus::Committed)?;
                entry.disarm_watcher();
                metrics::record_transaction_committed(Protocol::TryConfirmCancel);
                log_tx_event!(info, COMPONENT, "Transaction confirmed", tx_id);
                Ok(())
            }
            Err(failures) => {
                let confirmed = acknowledged(&confirms);
                entry.advance(TransactionStatus::Aborted)?;
                entry.disarm_watcher();
                metrics::record_transaction_aborted(Protocol::TryConfirmCancel, Phase::Confirm);
                log_tx_event!(
                    error,
                    COMPONENT,
                    "Partial confirm: failed participants still hold reservations",
                    tx_id,
                    confirmed = confirmed.len(),
                    failed = failures.len()
                );
                Err(TxError::ConfirmFailed {
                    failures,
                    confirmed,
                })
            }
        }
    }

    /// Caller-initiated compensation: Cancel every participant, then mark
    /// the transaction Aborted.
    pub async fn cancel(&self, tx_id: &TransactionId) -> TxResult<()> {
        let entry = self.registry.entry(tx_id)?;
        let participants = entry.with_record(|record| {
            record.begin_phase(Protocol::TryConfirmCancel, TransactionStatus::Cancelling)
        })?;

        log_tx_event!(info, COMPONENT, "Cancel requested", tx_id);
        compensate(&entry, &participants, self.phase_timeout).await;
        entry.advance(TransactionStatus::Aborted)?;
        entry.disarm_watcher();
        metrics::record_transaction_aborted(Protocol::TryConfirmCancel, Phase::Cancel);
        Ok(())
    }
}

/// Log a failed Try for every operation naming an unregistered participant.
fn reject_unknown(
    entry: &TransactionEntry,
    operations: HashMap<String, Params>,
) -> Vec<PhaseFailure> {
    let mut unknown: Vec<(String, Params)> = operations.into_iter().collect();
    unknown.sort_by(|a, b| a.0.cmp(&b.0));

    entry.with_record(|record| {
        for (participant_id, params) in &unknown {
            let index = record
                .log
                .append(Operation::new(participant_id.clone(), Phase::Try, params.clone()));
            record.log.complete(index, Err(&ParticipantError::NotFound));
        }
    });

    unknown
        .into_iter()
        .map(|(participant_id, _)| {
            log_participant_event!(
                warn,
                COMPONENT,
                "Try names an unregistered participant",
                entry.id(),
                participant_id
            );
            metrics::record_phase_call(Phase::Try, false);
            PhaseFailure::new(participant_id, ParticipantError::NotFound)
        })
        .collect()
}
