//! In-memory ledger (2PC participant).
//!
//! Callers stage balance deltas per transaction. Prepare checks that every
//! staged delta keeps its account non-negative and locks the touched
//! accounts; commit applies the deltas; abort discards them.

use crate::domain::{ParticipantError, TransactionId};
use crate::ports::outbound::TwoPhaseParticipant;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Default)]
struct LedgerState {
    balances: HashMap<String, i64>,
    staged: HashMap<TransactionId, Vec<(String, i64)>>,
    /// account -> transaction holding the prepare lock
    locks: HashMap<String, TransactionId>,
    prepared: HashSet<TransactionId>,
    committed: HashSet<TransactionId>,
}

impl LedgerState {
    fn release(&mut self, tx_id: &TransactionId) {
        self.locks.retain(|_, holder| holder != tx_id);
        self.prepared.remove(tx_id);
    }
}

/// Account balances with staged, lock-protected transfers.
pub struct InMemoryLedger {
    id: String,
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    /// Create an empty ledger.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Seed an account balance.
    pub fn with_balance(self, account: impl Into<String>, balance: i64) -> Self {
        self.state.lock().balances.insert(account.into(), balance);
        self
    }

    /// Stage a balance change for `tx_id`. Applied only on commit.
    pub fn stage(&self, tx_id: &TransactionId, account: impl Into<String>, delta: i64) {
        self.state
            .lock()
            .staged
            .entry(tx_id.clone())
            .or_default()
            .push((account.into(), delta));
    }

    /// Current balance; unknown accounts read as zero.
    pub fn balance(&self, account: &str) -> i64 {
        self.state.lock().balances.get(account).copied().unwrap_or(0)
    }

    /// Whether `tx_id` holds prepare locks.
    pub fn is_prepared(&self, tx_id: &TransactionId) -> bool {
        self.state.lock().prepared.contains(tx_id)
    }

    /// Whether `tx_id` has staged changes.
    pub fn has_staged(&self, tx_id: &TransactionId) -> bool {
        self.state.lock().staged.contains_key(tx_id)
    }
}

#[async_trait]
impl TwoPhaseParticipant for InMemoryLedger {
    fn participant_id(&self) -> String {
        self.id.clone()
    }

    async fn prepare(&self, tx_id: &TransactionId) -> Result<bool, ParticipantError> {
        let mut state = self.state.lock();
        if state.prepared.contains(tx_id) {
            return Ok(true);
        }

        let deltas = state.staged.get(tx_id).cloned().unwrap_or_default();

        let mut projected: HashMap<&str, i64> = HashMap::new();
        for (account, delta) in &deltas {
            if let Some(holder) = state.locks.get(account) {
                if holder != tx_id {
                    debug!("[{}] {} locked by {}; voting no", self.id, account, holder);
                    return Ok(false);
                }
            }
            let current = projected
                .entry(account.as_str())
                .or_insert_with(|| state.balances.get(account).copied().unwrap_or(0));
            *current += delta;
        }

        if let Some((account, _)) = projected.iter().find(|(_, balance)| **balance < 0) {
            debug!("[{}] insufficient funds on {}; voting no", self.id, account);
            return Ok(false);
        }

        let accounts: Vec<String> = deltas.into_iter().map(|(account, _)| account).collect();
        for account in accounts {
            state.locks.insert(account, tx_id.clone());
        }
        state.prepared.insert(tx_id.clone());
        Ok(true)
    }

    async fn commit(&self, tx_id: &TransactionId) -> Result<(), ParticipantError> {
        let mut state = self.state.lock();
        if state.committed.contains(tx_id) {
            return Ok(());
        }
        if !state.prepared.contains(tx_id) {
            return Err(ParticipantError::Rejected(format!(
                "transaction {tx_id} is not prepared"
            )));
        }

        for (account, delta) in state.staged.remove(tx_id).unwrap_or_default() {
            *state.balances.entry(account).or_insert(0) += delta;
        }
        state.release(tx_id);
        state.committed.insert(tx_id.clone());
        debug!("[{}] committed {}", self.id, tx_id);
        Ok(())
    }

    async fn abort(&self, tx_id: &TransactionId) -> Result<(), ParticipantError> {
        let mut state = self.state.lock();
        if state.committed.contains(tx_id) {
            return Err(ParticipantError::Rejected(format!(
                "transaction {tx_id} already committed"
            )));
        }
        state.staged.remove(tx_id);
        state.release(tx_id);
        debug!("[{}] aborted {}", self.id, tx_id);
        Ok(())
    }
}
