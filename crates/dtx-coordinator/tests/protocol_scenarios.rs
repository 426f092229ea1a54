//! # Protocol Scenario Tests
//!
//! End-to-end runs through the public `TransactionApi`.
//!
//! ## Test Categories
//!
//! 1. **2PC** - unanimous commit, vote-no abort, status monotonicity
//! 2. **TCC** - confirm guard, partial confirm
//! 3. **Timeouts** - autonomous expiry, abandoned participant calls
//! 4. **Concurrency** - many transactions in flight at once
//! 5. **Reference adapters** - ledger and inventory under the coordinator

use dtx_coordinator::{
    invariant_commit_after_unanimous_prepare, invariant_confirm_after_all_tries,
    invariant_log_settled, invariant_single_call_per_phase, CoordinatorConfig, InMemoryInventory,
    InMemoryLedger, OperationStatus, ParticipantError, ParticipantHandle, Params, Phase,
    ScriptedParticipant, TransactionApi, TransactionCoordinator, TransactionId,
    TransactionStatus, TxError,
};
use dtx_telemetry::{init_tracing, TelemetryConfig};
use futures::future::join_all;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// TEST HELPERS
// =============================================================================

fn coordinator() -> TransactionCoordinator {
    // Only the first test to get here installs the subscriber.
    let _ = init_tracing(&TelemetryConfig::for_tests());
    TransactionCoordinator::new(CoordinatorConfig::for_testing())
}

fn enlist_two_phase(
    coordinator: &TransactionCoordinator,
    tx_id: &TransactionId,
    participants: &[Arc<ScriptedParticipant>],
) {
    for p in participants {
        coordinator
            .add_participant(tx_id, ParticipantHandle::two_phase(p.clone()))
            .unwrap();
    }
}

fn enlist_tcc(
    coordinator: &TransactionCoordinator,
    tx_id: &TransactionId,
    participants: &[Arc<ScriptedParticipant>],
) {
    for p in participants {
        coordinator
            .add_participant(tx_id, ParticipantHandle::tcc(p.clone()))
            .unwrap();
    }
}

// =============================================================================
// 2PC
// =============================================================================

#[tokio::test]
async fn test_prepare_vote_no_aborts_all() {
    let coordinator = coordinator();
    let tx_id = coordinator.begin_transaction(None).unwrap();
    let a = Arc::new(ScriptedParticipant::new("A"));
    let b = Arc::new(ScriptedParticipant::new("B").votes_no());
    enlist_two_phase(&coordinator, &tx_id, &[a.clone(), b.clone()]);

    let result = coordinator.commit(&tx_id).await;
    assert!(matches!(result, Err(TxError::PrepareFailed { .. })));

    let record = coordinator.get_transaction(&tx_id).unwrap();
    assert_eq!(record.status, TransactionStatus::Aborted);
    for p in [&a, &b] {
        assert_eq!(p.calls().abort, 1);
        assert_eq!(p.calls().commit, 0);
    }
    assert!(invariant_commit_after_unanimous_prepare(&record.log));
    assert!(invariant_log_settled(&record));
}

#[tokio::test]
async fn test_unanimous_prepare_commits_all() {
    let coordinator = coordinator();
    let tx_id = coordinator.begin_transaction(None).unwrap();
    let parts: Vec<_> = ["A", "B", "C"]
        .into_iter()
        .map(|id| Arc::new(ScriptedParticipant::new(id)))
        .collect();
    enlist_two_phase(&coordinator, &tx_id, &parts);

    coordinator.commit(&tx_id).await.unwrap();

    let record = coordinator.get_transaction(&tx_id).unwrap();
    assert_eq!(record.status, TransactionStatus::Committed);
    assert_eq!(record.log.len(), 6);
    assert_eq!(record.log.count(Phase::Prepare, OperationStatus::Success), 3);
    assert_eq!(record.log.count(Phase::Commit, OperationStatus::Success), 3);
    assert!(invariant_single_call_per_phase(&record.log, Phase::Prepare));
    assert!(invariant_single_call_per_phase(&record.log, Phase::Commit));
    for p in &parts {
        assert_eq!(p.calls().prepare, 1);
        assert_eq!(p.calls().commit, 1);
    }
}

#[tokio::test]
async fn test_terminal_status_is_final() {
    let coordinator = coordinator();
    let tx_id = coordinator.begin_transaction(None).unwrap();
    let a = Arc::new(ScriptedParticipant::new("A"));
    enlist_two_phase(&coordinator, &tx_id, &[a.clone()]);
    coordinator.commit(&tx_id).await.unwrap();

    let before = coordinator.get_transaction(&tx_id).unwrap();

    assert!(matches!(
        coordinator.commit(&tx_id).await,
        Err(TxError::InvalidStateTransition { .. })
    ));
    assert!(matches!(
        coordinator.abort(&tx_id).await,
        Err(TxError::InvalidStateTransition { .. })
    ));
    assert!(coordinator
        .add_participant(
            &tx_id,
            ParticipantHandle::two_phase(Arc::new(ScriptedParticipant::new("late")))
        )
        .is_err());

    let after = coordinator.get_transaction(&tx_id).unwrap();
    assert_eq!(after.status, TransactionStatus::Committed);
    assert_eq!(after.log, before.log);
    assert_eq!(after.participants.len(), 1);
    assert_eq!(a.calls().prepare, 1);
}

#[tokio::test]
async fn test_concurrent_commits_run_protocol_once() {
    let coordinator = coordinator();
    let tx_id = coordinator.begin_transaction(None).unwrap();
    let a = Arc::new(ScriptedParticipant::new("A").delays(Phase::Prepare, Duration::from_millis(20)));
    enlist_two_phase(&coordinator, &tx_id, &[a.clone()]);

    let results = join_all((0..4).map(|_| coordinator.commit(&tx_id))).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(a.calls().prepare, 1);
    assert_eq!(a.calls().commit, 1);
}

#[tokio::test]
async fn test_unknown_transaction_rejected() {
    let coordinator = coordinator();
    let missing = TransactionId::from("does-not-exist");

    assert!(matches!(
        coordinator.commit(&missing).await,
        Err(TxError::TransactionNotFound(_))
    ));
    assert!(matches!(
        coordinator.execute_transaction(&missing, HashMap::new()).await,
        Err(TxError::TransactionNotFound(_))
    ));
}

// =============================================================================
// TCC
// =============================================================================

#[tokio::test]
async fn test_confirm_failure_marks_aborted() {
    let coordinator = coordinator();
    let tx_id = coordinator.begin_transaction(None).unwrap();
    let a = Arc::new(ScriptedParticipant::new("A"));
    let b = Arc::new(
        ScriptedParticipant::new("B")
            .fails_on(Phase::Confirm, ParticipantError::Unavailable("down".into())),
    );
    enlist_tcc(&coordinator, &tx_id, &[a.clone(), b.clone()]);

    let result = coordinator.execute_transaction(&tx_id, HashMap::new()).await;
    assert!(matches!(result, Err(TxError::ConfirmFailed { .. })));

    let record = coordinator.get_transaction(&tx_id).unwrap();
    assert_eq!(record.status, TransactionStatus::Aborted);
    assert_eq!(a.calls().confirm, 1);
    assert_eq!(b.calls().confirm, 1);
    assert!(invariant_confirm_after_all_tries(&record.log));
}

#[tokio::test]
async fn test_confirm_never_follows_failed_try() {
    let coordinator = coordinator();
    let tx_id = coordinator.begin_transaction(None).unwrap();
    let parts = vec![
        Arc::new(ScriptedParticipant::new("A")),
        Arc::new(
            ScriptedParticipant::new("B")
                .fails_on(Phase::Try, ParticipantError::Rejected("limit".into())),
        ),
        Arc::new(ScriptedParticipant::new("C")),
    ];
    enlist_tcc(&coordinator, &tx_id, &parts);

    let result = coordinator.execute_transaction(&tx_id, HashMap::new()).await;
    assert!(matches!(result, Err(TxError::TryFailed { .. })));

    let record = coordinator.get_transaction(&tx_id).unwrap();
    assert_eq!(record.log.by_phase(Phase::Confirm).count(), 0);
    assert_eq!(record.log.count(Phase::Cancel, OperationStatus::Success), 3);
    for p in &parts {
        assert_eq!(p.calls().confirm, 0);
        assert_eq!(p.calls().cancel, 1);
    }
}

#[tokio::test]
async fn test_mixed_protocols_rejected() {
    let coordinator = coordinator();
    let tx_id = coordinator.begin_transaction(None).unwrap();
    let p = Arc::new(ScriptedParticipant::new("A"));
    coordinator
        .add_participant(&tx_id, ParticipantHandle::two_phase(p.clone()))
        .unwrap();

    let result = coordinator.add_participant(
        &tx_id,
        ParticipantHandle::tcc(Arc::new(ScriptedParticipant::new("B"))),
    );
    assert!(matches!(result, Err(TxError::ProtocolMismatch { .. })));
    assert!(matches!(
        coordinator.cancel(&tx_id).await,
        Err(TxError::ProtocolMismatch { .. })
    ));
}

// =============================================================================
// TIMEOUTS
// =============================================================================

#[tokio::test]
async fn test_idle_two_phase_transaction_times_out() {
    let coordinator = coordinator();
    let tx_id = coordinator
        .begin_transaction(Some(Duration::from_millis(100)))
        .unwrap();
    let parts: Vec<_> = ["A", "B"]
        .into_iter()
        .map(|id| Arc::new(ScriptedParticipant::new(id)))
        .collect();
    enlist_two_phase(&coordinator, &tx_id, &parts);

    tokio::time::sleep(Duration::from_millis(400)).await;

    let record = coordinator.get_transaction(&tx_id).unwrap();
    assert_eq!(record.status, TransactionStatus::TimedOut);
    for p in &parts {
        assert_eq!(p.calls().abort, 1);
    }

    assert!(matches!(
        coordinator.commit(&tx_id).await,
        Err(TxError::InvalidStateTransition { .. })
    ));
}

#[tokio::test]
async fn test_idle_tcc_transaction_times_out() {
    let coordinator = coordinator();
    let tx_id = coordinator
        .begin_transaction(Some(Duration::from_millis(100)))
        .unwrap();
    let a = Arc::new(ScriptedParticipant::new("A"));
    enlist_tcc(&coordinator, &tx_id, &[a.clone()]);

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(
        coordinator.get_transaction(&tx_id).unwrap().status,
        TransactionStatus::TimedOut
    );
    assert_eq!(a.calls().cancel, 1);
    assert_eq!(a.calls().try_reserve, 0);
}

#[tokio::test]
async fn test_decided_transaction_never_times_out() {
    let coordinator = coordinator();
    let tx_id = coordinator
        .begin_transaction(Some(Duration::from_millis(100)))
        .unwrap();
    let a = Arc::new(ScriptedParticipant::new("A"));
    enlist_two_phase(&coordinator, &tx_id, &[a.clone()]);
    coordinator.commit(&tx_id).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(
        coordinator.get_transaction(&tx_id).unwrap().status,
        TransactionStatus::Committed
    );
    assert_eq!(a.calls().abort, 0);
}

#[tokio::test]
async fn test_hung_participant_abandoned_after_phase_timeout() {
    let _ = init_tracing(&TelemetryConfig::for_tests());
    let config = CoordinatorConfig::for_testing().with_phase_timeout(Duration::from_millis(50));
    let coordinator = TransactionCoordinator::new(config);
    let tx_id = coordinator.begin_transaction(None).unwrap();
    let hung = Arc::new(
        ScriptedParticipant::new("hung").delays(Phase::Prepare, Duration::from_secs(60)),
    );
    let ok = Arc::new(ScriptedParticipant::new("ok"));
    enlist_two_phase(&coordinator, &tx_id, &[hung.clone(), ok.clone()]);

    let started = std::time::Instant::now();
    let err = coordinator.commit(&tx_id).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(5));

    let failure = &err.failures()[0];
    assert_eq!(failure.participant_id, "hung");
    assert_eq!(
        failure.error,
        ParticipantError::TimedOut(Duration::from_millis(50))
    );
    assert_eq!(ok.calls().abort, 1);
    assert_eq!(hung.calls().abort, 1);
}

// =============================================================================
// CONCURRENCY
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_hundred_concurrent_transactions() {
    let coordinator = coordinator();

    let runs = (0..100).map(|i| {
        let coordinator = coordinator.clone();
        // Jitter is drawn before the task yields; ThreadRng is not Send.
        let jitter: Vec<u64> = {
            let mut rng = rand::thread_rng();
            (0..3).map(|_| rng.gen_range(0..10)).collect()
        };
        let refuse = i % 7 == 0;

        tokio::spawn(async move {
            let tx_id = coordinator.begin_transaction(None).unwrap();
            let parts: Vec<Arc<ScriptedParticipant>> = jitter
                .iter()
                .enumerate()
                .map(|(n, ms)| {
                    let p = ScriptedParticipant::new(format!("p{n}"))
                        .delays(Phase::Prepare, Duration::from_millis(*ms))
                        .delays(Phase::Try, Duration::from_millis(*ms));
                    Arc::new(if refuse && n == 2 { p.votes_no() } else { p })
                })
                .collect();

            let result = if i % 2 == 0 {
                enlist_two_phase(&coordinator, &tx_id, &parts);
                coordinator.commit(&tx_id).await
            } else {
                enlist_tcc(&coordinator, &tx_id, &parts);
                coordinator.execute_transaction(&tx_id, HashMap::new()).await
            };
            (tx_id, parts, result)
        })
    });

    let outcomes = join_all(runs).await;
    assert_eq!(coordinator.registry().len(), 100);

    for outcome in outcomes {
        let (tx_id, parts, result) = outcome.unwrap();
        let record = coordinator.get_transaction(&tx_id).unwrap();

        assert!(record.status.is_terminal());
        assert_eq!(result.is_ok(), record.status == TransactionStatus::Committed);
        assert_eq!(record.participants.len(), 3);
        assert!(invariant_log_settled(&record));
        assert!(invariant_commit_after_unanimous_prepare(&record.log));
        assert!(invariant_confirm_after_all_tries(&record.log));

        // Each participant only ever saw its own transaction.
        for p in &parts {
            assert!(p.history().iter().all(|(seen, _)| *seen == tx_id));
        }
    }
}

// =============================================================================
// REFERENCE ADAPTERS
// =============================================================================

#[tokio::test]
async fn test_ledger_transfer_commits_atomically() {
    let coordinator = coordinator();
    let source = Arc::new(InMemoryLedger::new("bank-a").with_balance("alice", 100));
    let target = Arc::new(InMemoryLedger::new("bank-b"));

    let tx_id = coordinator.begin_transaction(None).unwrap();
    source.stage(&tx_id, "alice", -30);
    target.stage(&tx_id, "bob", 30);
    coordinator
        .add_participant(&tx_id, ParticipantHandle::two_phase(source.clone()))
        .unwrap();
    coordinator
        .add_participant(&tx_id, ParticipantHandle::two_phase(target.clone()))
        .unwrap();

    coordinator.commit(&tx_id).await.unwrap();
    assert_eq!(source.balance("alice"), 70);
    assert_eq!(target.balance("bob"), 30);

    // Overdraft: source votes no, target never applies its credit.
    let tx_id = coordinator.begin_transaction(None).unwrap();
    source.stage(&tx_id, "alice", -500);
    target.stage(&tx_id, "bob", 500);
    coordinator
        .add_participant(&tx_id, ParticipantHandle::two_phase(source.clone()))
        .unwrap();
    coordinator
        .add_participant(&tx_id, ParticipantHandle::two_phase(target.clone()))
        .unwrap();

    assert!(coordinator.commit(&tx_id).await.is_err());
    assert_eq!(source.balance("alice"), 70);
    assert_eq!(target.balance("bob"), 30);
    assert!(!target.is_prepared(&tx_id));
    assert!(!target.has_staged(&tx_id));
}

#[tokio::test]
async fn test_inventory_reservations_released_on_failure() {
    let coordinator = coordinator();
    let warehouse = Arc::new(InMemoryInventory::new("warehouse").with_stock("widget", 5));
    let payments = Arc::new(
        ScriptedParticipant::new("payments")
            .fails_on(Phase::Try, ParticipantError::Rejected("card declined".into())),
    );

    let tx_id = coordinator.begin_transaction(None).unwrap();
    coordinator
        .add_participant(&tx_id, ParticipantHandle::tcc(warehouse.clone()))
        .unwrap();
    coordinator
        .add_participant(&tx_id, ParticipantHandle::tcc(payments.clone()))
        .unwrap();

    let mut operations: HashMap<String, Params> = HashMap::new();
    operations.insert("warehouse".into(), InMemoryInventory::params("widget", 3));

    let result = coordinator.execute_transaction(&tx_id, operations).await;
    assert!(matches!(result, Err(TxError::TryFailed { .. })));
    assert_eq!(warehouse.available("widget"), 5);
    assert_eq!(warehouse.reserved(&tx_id), None);
}

#[tokio::test]
async fn test_inventory_confirm_consumes_stock() {
    let coordinator = coordinator();
    let warehouse = Arc::new(InMemoryInventory::new("warehouse").with_stock("widget", 5));

    let tx_id = coordinator.begin_transaction(None).unwrap();
    coordinator
        .add_participant(&tx_id, ParticipantHandle::tcc(warehouse.clone()))
        .unwrap();

    let mut operations: HashMap<String, Params> = HashMap::new();
    operations.insert("warehouse".into(), InMemoryInventory::params("widget", 2));
    coordinator
        .execute_transaction(&tx_id, operations)
        .await
        .unwrap();

    assert_eq!(warehouse.available("widget"), 3);
    assert_eq!(
        coordinator.get_transaction(&tx_id).unwrap().status,
        TransactionStatus::Committed
    );
}
