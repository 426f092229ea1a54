//! Scripted participant.
//!
//! Implements both participant ports with per-phase canned outcomes and
//! optional delays. Every call is counted, including calls the coordinator
//! abandons on timeout.

use crate::domain::{ParticipantError, Params, Phase, TransactionId};
use crate::ports::outbound::{TccParticipant, TwoPhaseParticipant};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Number of calls received per phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// Prepare calls
    pub prepare: usize,
    /// Commit calls
    pub commit: usize,
    /// Abort calls
    pub abort: usize,
    /// Try calls
    pub try_reserve: usize,
    /// Confirm calls
    pub confirm: usize,
    /// Cancel calls
    pub cancel: usize,
}

impl CallCounts {
    fn bump(&mut self, phase: Phase) {
        match phase {
            Phase::Prepare => self.prepare += 1,
            Phase::Commit => self.commit += 1,
            Phase::Abort => self.abort += 1,
            Phase::Try => self.try_reserve += 1,
            Phase::Confirm => self.confirm += 1,
            Phase::Cancel => self.cancel += 1,
        }
    }
}

/// Participant whose answers are fixed up front.
///
/// Succeeds on every phase unless told otherwise:
///
/// ```rust,ignore
/// let p = ScriptedParticipant::new("payments")
///     .votes_no()
///     .delays(Phase::Abort, Duration::from_millis(20));
/// ```
pub struct ScriptedParticipant {
    id: String,
    vote: bool,
    failures: HashMap<Phase, ParticipantError>,
    delays: HashMap<Phase, Duration>,
    calls: Mutex<CallCounts>,
    history: Mutex<Vec<(TransactionId, Phase)>>,
    last_params: Mutex<Option<Params>>,
}

impl ScriptedParticipant {
    /// Participant that succeeds everywhere.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vote: true,
            failures: HashMap::new(),
            delays: HashMap::new(),
            calls: Mutex::new(CallCounts::default()),
            history: Mutex::new(Vec::new()),
            last_params: Mutex::new(None),
        }
    }

    /// Answer `Ok(false)` to Prepare.
    pub fn votes_no(mut self) -> Self {
        self.vote = false;
        self
    }

    /// Return `error` from `phase`.
    pub fn fails_on(mut self, phase: Phase, error: ParticipantError) -> Self {
        self.failures.insert(phase, error);
        self
    }

    /// Sleep for `delay` before answering `phase`.
    pub fn delays(mut self, phase: Phase, delay: Duration) -> Self {
        self.delays.insert(phase, delay);
        self
    }

    /// Calls received so far.
    pub fn calls(&self) -> CallCounts {
        *self.calls.lock()
    }

    /// Every call received, in arrival order.
    pub fn history(&self) -> Vec<(TransactionId, Phase)> {
        self.history.lock().clone()
    }

    /// Params of the most recent Try.
    pub fn last_params(&self) -> Option<Params> {
        self.last_params.lock().clone()
    }

    async fn respond(&self, tx_id: &TransactionId, phase: Phase) -> Result<(), ParticipantError> {
        self.calls.lock().bump(phase);
        self.history.lock().push((tx_id.clone(), phase));
        debug!("[scripted:{}] {} for {}", self.id, phase, tx_id);

        if let Some(delay) = self.delays.get(&phase) {
            tokio::time::sleep(*delay).await;
        }

        match self.failures.get(&phase) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TwoPhaseParticipant for ScriptedParticipant {
    fn participant_id(&self) -> String {
        self.id.clone()
    }

    async fn prepare(&self, tx_id: &TransactionId) -> Result<bool, ParticipantError> {
        self.respond(tx_id, Phase::Prepare).await?;
        Ok(self.vote)
    }

    async fn commit(&self, tx_id: &TransactionId) -> Result<(), ParticipantError> {
        self.respond(tx_id, Phase::Commit).await
    }

    async fn abort(&self, tx_id: &TransactionId) -> Result<(), ParticipantError> {
        self.respond(tx_id, Phase::Abort).await
    }
}

#[async_trait]
impl TccParticipant for ScriptedParticipant {
    fn participant_id(&self) -> String {
        self.id.clone()
    }

    async fn try_reserve(
        &self,
        tx_id: &TransactionId,
        params: &Params,
    ) -> Result<(), ParticipantError> {
        *self.last_params.lock() = Some(params.clone());
        self.respond(tx_id, Phase::Try).await
    }

    async fn confirm(&self, tx_id: &TransactionId) -> Result<(), ParticipantError> {
        self.respond(tx_id, Phase::Confirm).await
    }

    async fn cancel(&self, tx_id: &TransactionId) -> Result<(), ParticipantError> {
        self.respond(tx_id, Phase::Cancel).await
    }
}
