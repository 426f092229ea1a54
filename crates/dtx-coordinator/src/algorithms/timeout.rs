//! # Timeout Watcher
//!
//! One scheduled task per transaction. When the deadline passes and the
//! transaction is still undecided (Pending, Preparing or Trying), the watcher
//! marks it TimedOut and sweeps compensation across every registered
//! participant. Decided transactions are left alone, so a late firing is
//! harmless.

use super::phase::compensate;
use crate::domain::TransactionStatus;
use crate::metrics;
use crate::registry::TransactionEntry;
use dtx_telemetry::log_tx_event;
use std::sync::Weak;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const COMPONENT: &str = "timeout";

/// Stand-in deadline for timeouts too large to represent (about 30 years).
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Handle to a transaction's armed deadline.
pub struct TimeoutWatcher {
    deadline: Instant,
    handle: JoinHandle<()>,
}

impl TimeoutWatcher {
    /// Spawn the watcher on `runtime`. Only a weak reference to the entry is
    /// kept, so an evicted transaction is not held alive by its timer.
    pub fn arm(
        runtime: &Handle,
        entry: Weak<TransactionEntry>,
        timeout: Duration,
        phase_timeout: Duration,
    ) -> Self {
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let handle = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(entry) = entry.upgrade() {
                expire(&entry, phase_timeout).await;
            }
        });
        Self { deadline, handle }
    }

    /// Cancel the timer. No effect once it has fired.
    pub fn disarm(&self) {
        self.handle.abort();
    }

    /// When the watcher fires.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Whether the watcher task has completed or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Expire an undecided transaction. Returns `true` if the record was moved
/// to TimedOut by this call.
pub(crate) async fn expire(entry: &TransactionEntry, phase_timeout: Duration) -> bool {
    let claimed = entry.with_record(|record| {
        if !record.status.is_undecided() {
            return Err(record.status);
        }
        let from = record.status;
        record
            .transition_to(TransactionStatus::TimedOut)
            .map(|_| (from, record.participants.clone()))
            .map_err(|_| from)
    });

    let (from, participants) = match claimed {
        Ok(claimed) => claimed,
        Err(status) => {
            log_tx_event!(
                debug,
                COMPONENT,
                "Deadline reached on decided transaction; nothing to do",
                entry.id(),
                status = ?status
            );
            return false;
        }
    };

    metrics::record_transaction_timed_out();
    log_tx_event!(
        warn,
        COMPONENT,
        "Transaction timed out; compensating",
        entry.id(),
        from = ?from,
        participants = participants.len()
    );

    let failures = compensate(entry, &participants, phase_timeout).await;
    if !failures.is_empty() {
        log_tx_event!(
            warn,
            COMPONENT,
            "Timeout compensation finished with failures",
            entry.id(),
            failed = failures.len()
        );
    }
    true
}
