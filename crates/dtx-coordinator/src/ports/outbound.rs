//! # Outbound Ports
//!
//! Capability traits implemented by external business participants. The
//! coordinators only ever see these traits, never a concrete service.
//!
//! Abort, Cancel and Confirm may be delivered more than once (a call the
//! coordinator gave up on can still land later), so implementations must be
//! idempotent.

use crate::domain::{ParticipantError, Params, Protocol, TransactionId};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Two-Phase Commit participant - outbound port.
#[async_trait]
pub trait TwoPhaseParticipant: Send + Sync {
    /// Stable participant identifier, unique within a transaction.
    fn participant_id(&self) -> String;

    /// Phase 1 vote. `Ok(false)` means "cannot commit".
    async fn prepare(&self, tx_id: &TransactionId) -> Result<bool, ParticipantError>;

    /// Phase 2 commit. Irrevocable once acknowledged.
    async fn commit(&self, tx_id: &TransactionId) -> Result<(), ParticipantError>;

    /// Roll back anything staged for the transaction.
    async fn abort(&self, tx_id: &TransactionId) -> Result<(), ParticipantError>;
}

/// Try-Confirm-Cancel participant - outbound port.
#[async_trait]
pub trait TccParticipant: Send + Sync {
    /// Stable participant identifier, unique within a transaction.
    fn participant_id(&self) -> String;

    /// Reserve resources described by `params`.
    async fn try_reserve(
        &self,
        tx_id: &TransactionId,
        params: &Params,
    ) -> Result<(), ParticipantError>;

    /// Finalize the reservation.
    async fn confirm(&self, tx_id: &TransactionId) -> Result<(), ParticipantError>;

    /// Release the reservation. Must succeed even if Try never ran.
    async fn cancel(&self, tx_id: &TransactionId) -> Result<(), ParticipantError>;
}

/// Shared handle to a registered participant of either protocol.
///
/// The record keeps a clone of the `Arc`; the business service that
/// registered the participant owns its lifecycle.
#[derive(Clone)]
pub enum ParticipantHandle {
    /// 2PC participant.
    TwoPhase(Arc<dyn TwoPhaseParticipant>),
    /// TCC participant.
    Tcc(Arc<dyn TccParticipant>),
}

impl ParticipantHandle {
    /// Wrap a 2PC participant.
    pub fn two_phase(participant: Arc<dyn TwoPhaseParticipant>) -> Self {
        Self::TwoPhase(participant)
    }

    /// Wrap a TCC participant.
    pub fn tcc(participant: Arc<dyn TccParticipant>) -> Self {
        Self::Tcc(participant)
    }

    /// Participant identifier.
    pub fn participant_id(&self) -> String {
        match self {
            Self::TwoPhase(p) => p.participant_id(),
            Self::Tcc(p) => p.participant_id(),
        }
    }

    /// Protocol this participant speaks.
    pub fn protocol(&self) -> Protocol {
        match self {
            Self::TwoPhase(_) => Protocol::TwoPhaseCommit,
            Self::Tcc(_) => Protocol::TryConfirmCancel,
        }
    }
}

impl fmt::Debug for ParticipantHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticipantHandle")
            .field("participant_id", &self.participant_id())
            .field("protocol", &self.protocol())
            .finish()
    }
}
