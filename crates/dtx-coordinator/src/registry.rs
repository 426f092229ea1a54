//! # Transaction Registry
//!
//! Concurrency-safe store of in-flight transaction records.
//!
//! The ID → entry map sits behind one coarse `RwLock`; its critical sections
//! are plain map operations. Every record carries its own `Mutex`, so phase
//! bookkeeping on one transaction never blocks another. Neither lock is held
//! across an `.await`.

use crate::algorithms::timeout::TimeoutWatcher;
use crate::config::CoordinatorConfig;
use crate::domain::{TransactionId, TransactionRecord, TransactionStatus, TxError, TxResult};
use crate::metrics;
use crate::ports::outbound::ParticipantHandle;
use dtx_telemetry::log_tx_event;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const COMPONENT: &str = "registry";

/// One registered transaction: its record plus its timeout watcher.
pub struct TransactionEntry {
    id: TransactionId,
    record: Mutex<TransactionRecord>,
    watcher: Mutex<Option<TimeoutWatcher>>,
}

impl TransactionEntry {
    fn new(record: TransactionRecord) -> Self {
        Self {
            id: record.id.clone(),
            record: Mutex::new(record),
            watcher: Mutex::new(None),
        }
    }

    /// Transaction ID.
    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    /// Current status.
    pub fn status(&self) -> TransactionStatus {
        self.record.lock().status
    }

    /// Point-in-time copy of the record.
    pub fn snapshot(&self) -> TransactionRecord {
        self.record.lock().clone()
    }

    /// Run `f` under the record lock. `f` must not block.
    pub(crate) fn with_record<R>(&self, f: impl FnOnce(&mut TransactionRecord) -> R) -> R {
        let mut record = self.record.lock();
        f(&mut record)
    }

    /// Mid-protocol transition; see [`TransactionRecord::advance`].
    pub(crate) fn advance(&self, next: TransactionStatus) -> TxResult<()> {
        self.record.lock().advance(next)
    }

    fn arm_watcher(&self, watcher: TimeoutWatcher) {
        *self.watcher.lock() = Some(watcher);
    }

    /// Cancel the pending timeout once the record is decided.
    pub(crate) fn disarm_watcher(&self) {
        if let Some(watcher) = self.watcher.lock().take() {
            watcher.disarm();
        }
    }
}

/// Transaction ID → record store.
pub struct TransactionRegistry {
    transactions: RwLock<HashMap<TransactionId, Arc<TransactionEntry>>>,
    config: CoordinatorConfig,
}

impl TransactionRegistry {
    /// Create an empty registry.
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            transactions: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Create a pending transaction and arm its timeout watcher.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn begin_transaction(&self, timeout: Duration) -> TxResult<TransactionRecord> {
        self.begin_transaction_with_context(timeout, HashMap::new())
    }

    /// Same as [`begin_transaction`](Self::begin_transaction), seeding the
    /// record's context map with caller metadata.
    pub fn begin_transaction_with_context(
        &self,
        timeout: Duration,
        context: HashMap<String, String>,
    ) -> TxResult<TransactionRecord> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TxError::RuntimeUnavailable(e.to_string()))?;

        let record = TransactionRecord::new(TransactionId::generate(), timeout, context);
        let snapshot = record.clone();
        let entry = Arc::new(TransactionEntry::new(record));

        let watcher = TimeoutWatcher::arm(
            &runtime,
            Arc::downgrade(&entry),
            timeout,
            self.config.phase_timeout,
        );
        entry.arm_watcher(watcher);

        self.transactions
            .write()
            .insert(snapshot.id.clone(), entry);

        metrics::record_transaction_begun();
        log_tx_event!(
            debug,
            COMPONENT,
            "Transaction begun",
            snapshot.id,
            timeout_ms = timeout.as_millis() as u64
        );

        Ok(snapshot)
    }

    /// Register a participant on a pending transaction.
    pub fn add_participant(
        &self,
        tx_id: &TransactionId,
        participant: ParticipantHandle,
    ) -> TxResult<()> {
        let entry = self.entry(tx_id)?;
        let participant_id = participant.participant_id();
        entry.with_record(|record| record.add_participant(participant))?;

        log_tx_event!(
            debug,
            COMPONENT,
            "Participant registered",
            tx_id,
            participant_id = %participant_id
        );
        Ok(())
    }

    /// Snapshot of a transaction record.
    pub fn get_transaction(&self, tx_id: &TransactionId) -> TxResult<TransactionRecord> {
        Ok(self.entry(tx_id)?.snapshot())
    }

    /// Look up one registered participant.
    pub fn participant(
        &self,
        tx_id: &TransactionId,
        participant_id: &str,
    ) -> TxResult<ParticipantHandle> {
        self.entry(tx_id)?
            .with_record(|record| record.participant(participant_id).cloned())
            .ok_or_else(|| TxError::ParticipantNotFound {
                tx_id: tx_id.clone(),
                participant_id: participant_id.to_string(),
            })
    }

    /// Shared entry for a transaction.
    pub(crate) fn entry(&self, tx_id: &TransactionId) -> TxResult<Arc<TransactionEntry>> {
        self.transactions
            .read()
            .get(tx_id)
            .cloned()
            .ok_or_else(|| TxError::TransactionNotFound(tx_id.clone()))
    }

    /// Remove a record. Hook for an external retention policy; the watcher of
    /// an evicted record becomes a no-op.
    pub fn evict(&self, tx_id: &TransactionId) -> TxResult<TransactionRecord> {
        let entry = self
            .transactions
            .write()
            .remove(tx_id)
            .ok_or_else(|| TxError::TransactionNotFound(tx_id.clone()))?;
        // A timed-out record may still be running its compensation sweep.
        if entry.status() != TransactionStatus::TimedOut {
            entry.disarm_watcher();
        }
        Ok(entry.snapshot())
    }

    /// Number of stored transactions.
    pub fn len(&self) -> usize {
        self.transactions.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.transactions.read().is_empty()
    }

    /// IDs of all stored transactions.
    pub fn transaction_ids(&self) -> Vec<TransactionId> {
        self.transactions.read().keys().cloned().collect()
    }
}

impl Default for TransactionRegistry {
    fn default() -> Self {
        Self::new(CoordinatorConfig::default())
    }
}
