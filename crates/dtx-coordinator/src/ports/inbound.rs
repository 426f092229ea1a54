//! # Inbound Ports
//!
//! API trait defining what the coordinator offers to the (out of scope)
//! HTTP/CLI layer.

use crate::domain::{Params, TransactionId, TransactionRecord, TxResult};
use crate::ports::outbound::ParticipantHandle;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Distributed transaction API - inbound port.
#[async_trait]
pub trait TransactionApi: Send + Sync {
    /// Start a transaction. `None` uses the configured default timeout.
    fn begin_transaction(&self, timeout: Option<Duration>) -> TxResult<TransactionId>;

    /// Register a participant while the transaction is pending.
    fn add_participant(&self, tx_id: &TransactionId, participant: ParticipantHandle)
        -> TxResult<()>;

    /// Snapshot of the transaction record.
    fn get_transaction(&self, tx_id: &TransactionId) -> TxResult<TransactionRecord>;

    /// Run Two-Phase Commit.
    async fn commit(&self, tx_id: &TransactionId) -> TxResult<()>;

    /// Caller-initiated 2PC rollback.
    async fn abort(&self, tx_id: &TransactionId) -> TxResult<()>;

    /// Run Try-Confirm-Cancel with per-participant try parameters.
    ///
    /// `operations` is keyed by participant ID. Every registered participant
    /// is tried: one without an entry receives empty params. An entry naming
    /// an unregistered participant fails the Try phase with
    /// `ParticipantError::NotFound`.
    async fn execute_transaction(
        &self,
        tx_id: &TransactionId,
        operations: HashMap<String, Params>,
    ) -> TxResult<()>;

    /// Caller-initiated TCC rollback.
    async fn cancel(&self, tx_id: &TransactionId) -> TxResult<()>;
}
