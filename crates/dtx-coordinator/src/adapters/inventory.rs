//! In-memory inventory (TCC participant).
//!
//! Try reserves `quantity` units of `sku` out of available stock, confirm
//! consumes the reservation, cancel puts it back. Cancel without a prior try
//! records the transaction as cancelled so a late try is refused.

use crate::domain::{ParticipantError, Params, TransactionId};
use crate::ports::outbound::TccParticipant;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
struct Reservation {
    sku: String,
    quantity: u64,
}

#[derive(Default)]
struct InventoryState {
    available: HashMap<String, u64>,
    reservations: HashMap<TransactionId, Reservation>,
    confirmed: HashSet<TransactionId>,
    cancelled: HashSet<TransactionId>,
}

/// Stock levels with per-transaction reservations.
pub struct InMemoryInventory {
    id: String,
    state: Mutex<InventoryState>,
}

impl InMemoryInventory {
    /// Create an empty inventory.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Mutex::new(InventoryState::default()),
        }
    }

    /// Seed available stock for a SKU.
    pub fn with_stock(self, sku: impl Into<String>, quantity: u64) -> Self {
        self.state.lock().available.insert(sku.into(), quantity);
        self
    }

    /// Units available for new reservations.
    pub fn available(&self, sku: &str) -> u64 {
        self.state.lock().available.get(sku).copied().unwrap_or(0)
    }

    /// Units reserved by `tx_id`, if any.
    pub fn reserved(&self, tx_id: &TransactionId) -> Option<u64> {
        self.state
            .lock()
            .reservations
            .get(tx_id)
            .map(|r| r.quantity)
    }

    /// Build Try params for this adapter.
    pub fn params(sku: &str, quantity: u64) -> Params {
        let mut params = Params::new();
        params.insert("sku".to_string(), serde_json::json!(sku));
        params.insert("quantity".to_string(), serde_json::json!(quantity));
        params
    }

    fn parse(params: &Params) -> Result<Reservation, ParticipantError> {
        let sku = params
            .get("sku")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ParticipantError::Rejected("missing sku".to_string()))?;
        let quantity = params
            .get("quantity")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| ParticipantError::Rejected("missing quantity".to_string()))?;
        Ok(Reservation {
            sku: sku.to_string(),
            quantity,
        })
    }
}

#[async_trait]
impl TccParticipant for InMemoryInventory {
    fn participant_id(&self) -> String {
        self.id.clone()
    }

    async fn try_reserve(
        &self,
        tx_id: &TransactionId,
        params: &Params,
    ) -> Result<(), ParticipantError> {
        let wanted = Self::parse(params)?;
        let mut state = self.state.lock();

        if state.cancelled.contains(tx_id) {
            return Err(ParticipantError::Rejected(format!(
                "transaction {tx_id} already cancelled"
            )));
        }
        if let Some(existing) = state.reservations.get(tx_id) {
            return if *existing == wanted {
                Ok(())
            } else {
                Err(ParticipantError::Rejected(format!(
                    "transaction {tx_id} already holds a different reservation"
                )))
            };
        }

        let stock = state.available.get(&wanted.sku).copied().unwrap_or(0);
        if stock < wanted.quantity {
            return Err(ParticipantError::Rejected(format!(
                "insufficient stock for {}: {} < {}",
                wanted.sku, stock, wanted.quantity
            )));
        }

        state
            .available
            .insert(wanted.sku.clone(), stock - wanted.quantity);
        debug!(
            "[{}] reserved {} x {} for {}",
            self.id, wanted.quantity, wanted.sku, tx_id
        );
        state.reservations.insert(tx_id.clone(), wanted);
        Ok(())
    }

    async fn confirm(&self, tx_id: &TransactionId) -> Result<(), ParticipantError> {
        let mut state = self.state.lock();
        if state.confirmed.contains(tx_id) {
            return Ok(());
        }
        if state.reservations.remove(tx_id).is_none() {
            return Err(ParticipantError::Rejected(format!(
                "no reservation held for {tx_id}"
            )));
        }
        state.confirmed.insert(tx_id.clone());
        debug!("[{}] confirmed {}", self.id, tx_id);
        Ok(())
    }

    async fn cancel(&self, tx_id: &TransactionId) -> Result<(), ParticipantError> {
        let mut state = self.state.lock();
        if state.confirmed.contains(tx_id) {
            return Err(ParticipantError::Rejected(format!(
                "transaction {tx_id} already confirmed"
            )));
        }
        if let Some(reservation) = state.reservations.remove(tx_id) {
            *state.available.entry(reservation.sku).or_insert(0) += reservation.quantity;
        }
        state.cancelled.insert(tx_id.clone());
        debug!("[{}] cancelled {}", self.id, tx_id);
        Ok(())
    }
}
