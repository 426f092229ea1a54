//! # Domain Entities
//!
//! Transaction record and its append-only operation log.

use super::errors::{ParticipantError, TxError, TxResult};
use super::value_objects::{
    OperationStatus, Params, Phase, Protocol, TransactionId, TransactionStatus,
};
use crate::ports::outbound::{ParticipantHandle, TccParticipant, TwoPhaseParticipant};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Current unix time in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// One phase call against one participant, kept for audit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Operation ID.
    pub id: Uuid,
    /// Target participant.
    pub participant_id: String,
    /// Protocol phase.
    pub phase: Phase,
    /// Outcome so far.
    pub status: OperationStatus,
    /// Payload passed to the participant (TCC try only).
    pub params: Params,
    /// Failure description when `status == Failed`.
    pub error: Option<String>,
    /// Dispatch timestamp (unix ms).
    pub timestamp: u64,
    /// Completion timestamp (unix ms).
    pub completed_at: Option<u64>,
}

impl Operation {
    /// Create an executing operation.
    pub fn new(participant_id: impl Into<String>, phase: Phase, params: Params) -> Self {
        Self {
            id: Uuid::new_v4(),
            participant_id: participant_id.into(),
            phase,
            status: OperationStatus::Executing,
            params,
            error: None,
            timestamp: now_millis(),
            completed_at: None,
        }
    }

    /// Record the outcome. Returns `false` if the operation was already completed.
    pub fn complete(&mut self, outcome: Result<(), &ParticipantError>) -> bool {
        if self.status != OperationStatus::Executing {
            return false;
        }
        match outcome {
            Ok(()) => self.status = OperationStatus::Success,
            Err(e) => {
                self.status = OperationStatus::Failed;
                self.error = Some(e.to_string());
            }
        }
        self.completed_at = Some(now_millis());
        true
    }
}

/// Append-only operation log. Entries are never removed or reordered.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationLog {
    entries: Vec<Operation>,
}

impl OperationLog {
    /// Append an operation, returning its index.
    pub fn append(&mut self, operation: Operation) -> usize {
        self.entries.push(operation);
        self.entries.len() - 1
    }

    /// Complete the operation at `index`. Unknown or already completed
    /// entries are left untouched.
    pub fn complete(&mut self, index: usize, outcome: Result<(), &ParticipantError>) -> bool {
        self.entries
            .get_mut(index)
            .map(|op| op.complete(outcome))
            .unwrap_or(false)
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[Operation] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries for a given phase.
    pub fn by_phase(&self, phase: Phase) -> impl Iterator<Item = &Operation> {
        self.entries.iter().filter(move |op| op.phase == phase)
    }

    /// Count entries matching phase and status.
    pub fn count(&self, phase: Phase, status: OperationStatus) -> usize {
        self.by_phase(phase).filter(|op| op.status == status).count()
    }
}

/// In-memory state of one distributed transaction.
#[derive(Clone, Debug)]
pub struct TransactionRecord {
    /// Transaction ID.
    pub id: TransactionId,
    /// Current status.
    pub status: TransactionStatus,
    /// Protocol, fixed by the first registered participant or phase.
    pub protocol: Option<Protocol>,
    /// Registered participants, in registration order.
    pub participants: Vec<ParticipantHandle>,
    /// Phase history.
    pub log: OperationLog,
    /// Creation timestamp (unix ms).
    pub created_at: u64,
    /// Last status change (unix ms).
    pub updated_at: u64,
    /// Transaction-level timeout.
    pub timeout: Duration,
    /// Caller-supplied metadata.
    pub context: HashMap<String, String>,
}

impl TransactionRecord {
    /// Create a pending record.
    pub fn new(id: TransactionId, timeout: Duration, context: HashMap<String, String>) -> Self {
        let now = now_millis();
        Self {
            id,
            status: TransactionStatus::Pending,
            protocol: None,
            participants: Vec::new(),
            log: OperationLog::default(),
            created_at: now,
            updated_at: now,
            timeout,
            context,
        }
    }

    /// Transition to a new status.
    pub fn transition_to(&mut self, next: TransactionStatus) -> TxResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(TxError::InvalidStateTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = now_millis();
        Ok(())
    }

    /// Transition mid-protocol. Reports `TimeoutExceeded` if the timeout
    /// watcher has already claimed the record.
    pub fn advance(&mut self, next: TransactionStatus) -> TxResult<()> {
        if self.status == TransactionStatus::TimedOut {
            return Err(TxError::TimeoutExceeded {
                tx_id: self.id.clone(),
                timeout: self.timeout,
            });
        }
        self.transition_to(next)
    }

    /// Register a participant. Only allowed while pending.
    pub fn add_participant(&mut self, participant: ParticipantHandle) -> TxResult<()> {
        if self.status != TransactionStatus::Pending {
            return Err(TxError::InvalidStateTransition {
                from: self.status,
                to: TransactionStatus::Pending,
            });
        }

        let found = participant.protocol();
        match self.protocol {
            Some(expected) if expected != found => {
                return Err(TxError::ProtocolMismatch { expected, found });
            }
            _ => {}
        }

        let participant_id = participant.participant_id();
        if self.participant(&participant_id).is_some() {
            return Err(TxError::DuplicateParticipant {
                tx_id: self.id.clone(),
                participant_id,
            });
        }

        self.protocol = Some(found);
        self.participants.push(participant);
        self.updated_at = now_millis();
        Ok(())
    }

    /// Look up a registered participant.
    pub fn participant(&self, participant_id: &str) -> Option<&ParticipantHandle> {
        self.participants
            .iter()
            .find(|p| p.participant_id() == participant_id)
    }

    /// Registered participant IDs in registration order.
    pub fn participant_ids(&self) -> Vec<String> {
        self.participants.iter().map(|p| p.participant_id()).collect()
    }

    /// Start a protocol step: check the protocol, apply the guarded
    /// transition and return the (now frozen) participant set.
    pub fn begin_phase(
        &mut self,
        protocol: Protocol,
        next: TransactionStatus,
    ) -> TxResult<Vec<ParticipantHandle>> {
        if let Some(expected) = self.protocol {
            if expected != protocol {
                return Err(TxError::ProtocolMismatch {
                    expected,
                    found: protocol,
                });
            }
        }
        self.transition_to(next)?;
        self.protocol = Some(protocol);
        Ok(self.participants.clone())
    }

    /// Registered 2PC participants.
    pub fn two_phase_participants(&self) -> Vec<Arc<dyn TwoPhaseParticipant>> {
        self.participants
            .iter()
            .filter_map(|p| match p {
                ParticipantHandle::TwoPhase(p) => Some(Arc::clone(p)),
                ParticipantHandle::Tcc(_) => None,
            })
            .collect()
    }

    /// Registered TCC participants.
    pub fn tcc_participants(&self) -> Vec<Arc<dyn TccParticipant>> {
        self.participants
            .iter()
            .filter_map(|p| match p {
                ParticipantHandle::Tcc(p) => Some(Arc::clone(p)),
                ParticipantHandle::TwoPhase(_) => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ScriptedParticipant;

    fn create_test_record() -> TransactionRecord {
        TransactionRecord::new(
            TransactionId::from("tx-1"),
            Duration::from_secs(5),
            HashMap::new(),
        )
    }

    fn two_phase(id: &str) -> ParticipantHandle {
        ParticipantHandle::two_phase(Arc::new(ScriptedParticipant::new(id)))
    }

    fn tcc(id: &str) -> ParticipantHandle {
        ParticipantHandle::tcc(Arc::new(ScriptedParticipant::new(id)))
    }

    #[test]
    fn test_record_new() {
        let record = create_test_record();
        assert_eq!(record.status, TransactionStatus::Pending);
        assert!(record.participants.is_empty());
        assert!(record.log.is_empty());
        assert!(record.protocol.is_none());
    }

    #[test]
    fn test_add_participant_fixes_protocol() {
        let mut record = create_test_record();
        record.add_participant(two_phase("a")).unwrap();
        assert_eq!(record.protocol, Some(Protocol::TwoPhaseCommit));

        let result = record.add_participant(tcc("b"));
        assert!(matches!(result, Err(TxError::ProtocolMismatch { .. })));
        assert_eq!(record.participants.len(), 1);
    }

    #[test]
    fn test_duplicate_participant_rejected() {
        let mut record = create_test_record();
        record.add_participant(two_phase("a")).unwrap();
        let result = record.add_participant(two_phase("a"));
        assert!(matches!(result, Err(TxError::DuplicateParticipant { .. })));
    }

    #[test]
    fn test_participants_frozen_after_first_phase() {
        let mut record = create_test_record();
        record.add_participant(two_phase("a")).unwrap();
        record.transition_to(TransactionStatus::Preparing).unwrap();

        let result = record.add_participant(two_phase("b"));
        assert!(matches!(result, Err(TxError::InvalidStateTransition { .. })));
        assert_eq!(record.participant_ids(), vec!["a".to_string()]);
    }

    #[test]
    fn test_advance_after_timeout_reports_timeout() {
        let mut record = create_test_record();
        record.transition_to(TransactionStatus::Preparing).unwrap();
        record.transition_to(TransactionStatus::TimedOut).unwrap();

        let result = record.advance(TransactionStatus::Prepared);
        assert!(matches!(result, Err(TxError::TimeoutExceeded { .. })));
    }

    #[test]
    fn test_operation_completes_once() {
        let mut log = OperationLog::default();
        let idx = log.append(Operation::new("a", Phase::Prepare, Params::new()));

        assert!(log.complete(idx, Ok(())));
        assert!(!log.complete(idx, Err(&ParticipantError::VotedNo)));
        assert_eq!(log.entries()[idx].status, OperationStatus::Success);
        assert!(log.entries()[idx].error.is_none());
    }

    #[test]
    fn test_failed_operation_keeps_reason() {
        let mut log = OperationLog::default();
        let idx = log.append(Operation::new("a", Phase::Commit, Params::new()));
        log.complete(idx, Err(&ParticipantError::Rejected("disk full".into())));

        let op = &log.entries()[idx];
        assert_eq!(op.status, OperationStatus::Failed);
        assert!(op.error.as_deref().unwrap().contains("disk full"));
        assert_eq!(log.count(Phase::Commit, OperationStatus::Failed), 1);
    }

    #[test]
    fn test_begin_phase_checks_protocol_before_transition() {
        let mut record = create_test_record();
        record.add_participant(tcc("a")).unwrap();

        let result = record.begin_phase(Protocol::TwoPhaseCommit, TransactionStatus::Preparing);
        assert!(matches!(result, Err(TxError::ProtocolMismatch { .. })));
        assert_eq!(record.status, TransactionStatus::Pending);

        let participants = record
            .begin_phase(Protocol::TryConfirmCancel, TransactionStatus::Trying)
            .unwrap();
        assert_eq!(participants.len(), 1);
        assert_eq!(record.status, TransactionStatus::Trying);
    }

    #[test]
    fn test_begin_phase_on_terminal_record_fails() {
        let mut record = create_test_record();
        record.transition_to(TransactionStatus::Aborted).unwrap();

        let result = record.begin_phase(Protocol::TwoPhaseCommit, TransactionStatus::Preparing);
        assert!(matches!(
            result,
            Err(TxError::InvalidStateTransition {
                from: TransactionStatus::Aborted,
                ..
            })
        ));
        assert!(record.protocol.is_none());
    }
}
