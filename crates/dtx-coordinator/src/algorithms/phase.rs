//! # Phase Fan-Out
//!
//! Structured concurrency for one protocol phase: one Tokio task per
//! participant, each bounded by the phase timeout, joined behind a single
//! barrier before any outcome is acted upon.
//!
//! A call that exceeds the phase timeout is dropped and reported as
//! [`ParticipantError::TimedOut`]. The participant may still apply it later,
//! which is why compensation calls must be idempotent.

use crate::domain::{Operation, ParticipantError, Params, Phase, PhaseFailure, TransactionId};
use crate::metrics;
use crate::ports::outbound::{ParticipantHandle, TccParticipant, TwoPhaseParticipant};
use crate::registry::TransactionEntry;
use dtx_telemetry::log_participant_event;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const COMPONENT: &str = "phase";

/// One participant call scheduled within a phase.
pub(crate) struct PhaseCall<P: ?Sized> {
    pub participant_id: String,
    pub participant: Arc<P>,
    pub params: Params,
}

impl<P: ?Sized> PhaseCall<P> {
    pub fn new(participant_id: String, participant: Arc<P>, params: Params) -> Self {
        Self {
            participant_id,
            participant,
            params,
        }
    }
}

/// Result of one participant call after the barrier.
#[derive(Clone, Debug)]
pub(crate) struct PhaseOutcome {
    pub participant_id: String,
    pub result: Result<(), ParticipantError>,
}

/// Dispatch every call concurrently and wait for all of them.
///
/// Every call is logged as an executing [`Operation`] before dispatch and
/// completed after the barrier releases.
pub(crate) async fn run_phase<P, F, Fut>(
    entry: &TransactionEntry,
    phase: Phase,
    calls: Vec<PhaseCall<P>>,
    phase_timeout: Duration,
    invoke: F,
) -> Vec<PhaseOutcome>
where
    P: ?Sized + Send + Sync + 'static,
    F: Fn(Arc<P>, TransactionId, Params) -> Fut,
    Fut: Future<Output = Result<(), ParticipantError>> + Send + 'static,
{
    let tx_id = entry.id().clone();

    let indices: Vec<usize> = entry.with_record(|record| {
        calls
            .iter()
            .map(|call| {
                record.log.append(Operation::new(
                    call.participant_id.clone(),
                    phase,
                    call.params.clone(),
                ))
            })
            .collect()
    });

    let (ids, handles): (Vec<_>, Vec<_>) = calls
        .into_iter()
        .map(|call| {
            let fut = invoke(call.participant, tx_id.clone(), call.params);
            let handle = tokio::spawn(tokio::time::timeout(phase_timeout, fut));
            (call.participant_id, handle)
        })
        .unzip();

    let joined = join_all(handles).await;

    let outcomes: Vec<PhaseOutcome> = ids
        .into_iter()
        .zip(joined)
        .map(|(participant_id, joined)| {
            let result = match joined {
                Ok(Ok(result)) => result,
                Ok(Err(_elapsed)) => {
                    log_participant_event!(
                        warn,
                        COMPONENT,
                        "Participant call abandoned after phase timeout",
                        tx_id,
                        participant_id,
                        phase = %phase,
                        timeout_ms = phase_timeout.as_millis() as u64
                    );
                    Err(ParticipantError::TimedOut(phase_timeout))
                }
                Err(join_error) => Err(ParticipantError::Panicked(join_error.to_string())),
            };
            PhaseOutcome {
                participant_id,
                result,
            }
        })
        .collect();

    entry.with_record(|record| {
        for (index, outcome) in indices.iter().zip(&outcomes) {
            record.log.complete(*index, outcome.result.as_ref().map(|_| ()));
        }
    });

    for outcome in &outcomes {
        metrics::record_phase_call(phase, outcome.result.is_ok());
        if let Err(error) = &outcome.result {
            log_participant_event!(
                debug,
                COMPONENT,
                "Participant call failed",
                tx_id,
                outcome.participant_id,
                phase = %phase,
                error = %error
            );
        }
    }

    outcomes
}

/// Aggregate decision: `Ok` only if every participant succeeded.
pub(crate) fn decide_outcome(outcomes: &[PhaseOutcome]) -> Result<(), Vec<PhaseFailure>> {
    let failures: Vec<PhaseFailure> = outcomes
        .iter()
        .filter_map(|o| match &o.result {
            Ok(()) => None,
            Err(e) => Some(PhaseFailure::new(o.participant_id.clone(), e.clone())),
        })
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}

/// Participants that acknowledged the phase.
pub(crate) fn acknowledged(outcomes: &[PhaseOutcome]) -> Vec<String> {
    outcomes
        .iter()
        .filter(|o| o.result.is_ok())
        .map(|o| o.participant_id.clone())
        .collect()
}

/// Best-effort rollback: Abort on 2PC participants, Cancel on TCC ones.
///
/// Failures are logged and counted, never escalated.
pub(crate) async fn compensate(
    entry: &TransactionEntry,
    participants: &[ParticipantHandle],
    phase_timeout: Duration,
) -> Vec<PhaseFailure> {
    let mut aborts: Vec<PhaseCall<dyn TwoPhaseParticipant>> = Vec::new();
    let mut cancels: Vec<PhaseCall<dyn TccParticipant>> = Vec::new();
    for participant in participants {
        match participant {
            ParticipantHandle::TwoPhase(p) => {
                aborts.push(PhaseCall::new(p.participant_id(), Arc::clone(p), Params::new()))
            }
            ParticipantHandle::Tcc(p) => {
                cancels.push(PhaseCall::new(p.participant_id(), Arc::clone(p), Params::new()))
            }
        }
    }

    let (aborted, cancelled) = tokio::join!(
        run_phase(entry, Phase::Abort, aborts, phase_timeout, |p, tx_id, _| async move {
            p.abort(&tx_id).await
        }),
        run_phase(entry, Phase::Cancel, cancels, phase_timeout, |p, tx_id, _| async move {
            p.cancel(&tx_id).await
        }),
    );

    let mut failures = Vec::new();
    for (phase, outcomes) in [(Phase::Abort, aborted), (Phase::Cancel, cancelled)] {
        if let Err(phase_failures) = decide_outcome(&outcomes) {
            for failure in &phase_failures {
                metrics::record_compensation_failure(phase);
                log_participant_event!(
                    warn,
                    COMPONENT,
                    "Compensation failed; continuing",
                    entry.id(),
                    failure.participant_id,
                    phase = %phase,
                    error = %failure.error
                );
            }
            failures.extend(phase_failures);
        }
    }
    failures
}
