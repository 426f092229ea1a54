//! Structured logging helpers.
//!
//! Log lines carry consistent fields so they can be filtered per transaction:
//! - `component`: emitting component (registry, two_phase, tcc, timeout)
//! - `tx_id`: transaction identifier
//! - additional context fields

/// Log a transaction-scoped event with standard fields.
///
/// ```rust,ignore
/// log_tx_event!(info, "two_phase", "Prepare phase complete", tx_id, participants = 3);
/// ```
#[macro_export]
macro_rules! log_tx_event {
    ($level:ident, $component:expr, $msg:expr, $tx_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            tx_id = %$tx_id,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a participant-scoped event inside a transaction.
#[macro_export]
macro_rules! log_participant_event {
    ($level:ident, $component:expr, $msg:expr, $tx_id:expr, $participant_id:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            tx_id = %$tx_id,
            participant_id = %$participant_id,
            $($($field)*,)?
            $msg
        )
    };
}
