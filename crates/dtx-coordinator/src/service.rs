//! Transaction Coordinator Service
//!
//! Wires the registry and both protocol coordinators behind the
//! [`TransactionApi`] inbound port.

use crate::algorithms::{TccCoordinator, TwoPhaseCoordinator};
use crate::config::CoordinatorConfig;
use crate::domain::{Params, TransactionId, TransactionRecord, TxResult};
use crate::ports::inbound::TransactionApi;
use crate::ports::outbound::ParticipantHandle;
use crate::registry::TransactionRegistry;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Distributed transaction coordinator.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct TransactionCoordinator {
    config: CoordinatorConfig,
    registry: Arc<TransactionRegistry>,
    two_phase: TwoPhaseCoordinator,
    tcc: TccCoordinator,
}

impl TransactionCoordinator {
    /// Create a coordinator with its own registry.
    pub fn new(config: CoordinatorConfig) -> Self {
        let registry = Arc::new(TransactionRegistry::new(config.clone()));
        Self::with_registry(config, registry)
    }

    /// Create a coordinator over an existing registry.
    pub fn with_registry(config: CoordinatorConfig, registry: Arc<TransactionRegistry>) -> Self {
        Self {
            two_phase: TwoPhaseCoordinator::new(registry.clone(), config.phase_timeout),
            tcc: TccCoordinator::new(registry.clone(), config.phase_timeout),
            registry,
            config,
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Underlying registry.
    pub fn registry(&self) -> &Arc<TransactionRegistry> {
        &self.registry
    }

    /// 2PC driver.
    pub fn two_phase(&self) -> &TwoPhaseCoordinator {
        &self.two_phase
    }

    /// TCC driver.
    pub fn tcc(&self) -> &TccCoordinator {
        &self.tcc
    }

    /// Begin a transaction carrying caller metadata.
    pub fn begin_transaction_with_context(
        &self,
        timeout: Option<Duration>,
        context: HashMap<String, String>,
    ) -> TxResult<TransactionId> {
        let timeout = timeout.unwrap_or(self.config.default_tx_timeout);
        self.registry
            .begin_transaction_with_context(timeout, context)
            .map(|record| record.id)
    }
}

impl Default for TransactionCoordinator {
    fn default() -> Self {
        Self::new(CoordinatorConfig::default())
    }
}

#[async_trait]
impl TransactionApi for TransactionCoordinator {
    fn begin_transaction(&self, timeout: Option<Duration>) -> TxResult<TransactionId> {
        self.begin_transaction_with_context(timeout, HashMap::new())
    }

    fn add_participant(
        &self,
        tx_id: &TransactionId,
        participant: ParticipantHandle,
    ) -> TxResult<()> {
        self.registry.add_participant(tx_id, participant)
    }

    fn get_transaction(&self, tx_id: &TransactionId) -> TxResult<TransactionRecord> {
        self.registry.get_transaction(tx_id)
    }

    async fn commit(&self, tx_id: &TransactionId) -> TxResult<()> {
        self.two_phase.commit(tx_id).await
    }

    async fn abort(&self, tx_id: &TransactionId) -> TxResult<()> {
        self.two_phase.abort(tx_id).await
    }

    async fn execute_transaction(
        &self,
        tx_id: &TransactionId,
        operations: HashMap<String, Params>,
    ) -> TxResult<()> {
        self.tcc.execute_transaction(tx_id, operations).await
    }

    async fn cancel(&self, tx_id: &TransactionId) -> TxResult<()> {
        self.tcc.cancel(tx_id).await
    }
}
