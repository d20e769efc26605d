//! End-to-end scheduling scenarios on an injected clock and a scripted
//! sender.
//!
//! Each test drives the engine through wall-clock instants with
//! `ManualClock` + `wake()` and asserts on the object store documents the
//! run leaves behind.
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::float_cmp)]

use std::{sync::Arc, time::Duration};

use courier_scheduler::{
    ManualClock, RecoveryOptions, Scheduler, SchedulerConfig, ScriptedSender, SendOutcome,
    SendOutcome::{Delivered, PermanentFailure, TransientFailure},
    StoreBackoff, recover,
};
use courier_store::{Message, MessageStatus, TestStateStore};

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    clock: ManualClock,
    store: TestStateStore,
    sender: Arc<ScriptedSender>,
    scheduler: Arc<Scheduler>,
}

/// An engine over a fresh store, dispatcher not yet started, so tests can
/// position the clock before the first attempt.
fn harness(start: f64, sender: ScriptedSender) -> Harness {
    harness_with(start, sender, TestStateStore::new(), SchedulerConfig::default())
}

fn harness_with(
    start: f64,
    sender: ScriptedSender,
    store: TestStateStore,
    config: SchedulerConfig,
) -> Harness {
    let clock = ManualClock::at(start);
    let sender = Arc::new(sender);
    let scheduler = Scheduler::new(
        Arc::new(store.clone()),
        sender.clone(),
        Arc::new(clock.clone()),
        config,
    )
    .expect("valid config");

    Harness {
        clock,
        store,
        sender,
        scheduler,
    }
}

impl Harness {
    /// Jump the clock and nudge the dispatcher.
    fn step(&self, to: f64) {
        self.clock.set(to);
        self.scheduler.wake();
    }

    /// Wait until the active document for `message_id` shows `attempts`
    /// completed failures.
    async fn wait_for_attempts(&self, message_id: &str, attempts: u32) {
        self.store
            .wait_until(WAIT, |store| {
                store
                    .active_document(message_id)
                    .is_some_and(|record| record.attempt_count == attempts)
            })
            .await
            .unwrap_or_else(|_| panic!("{message_id} never reached {attempts} attempts"));
    }

    async fn wait_for_success_count(&self, count: usize) {
        self.store
            .wait_until(WAIT, |store| store.success_keys().len() == count)
            .await
            .expect("success documents never appeared");
    }

    async fn wait_for_failed_count(&self, count: usize) {
        self.store
            .wait_until(WAIT, |store| store.failed_keys().len() == count)
            .await
            .expect("failed documents never appeared");
    }
}

// A message whose first attempt succeeds leaves exactly one success
// document and no active document.
#[tokio::test]
async fn immediate_success() {
    let h = harness(1000.0, ScriptedSender::with_script([Delivered]));

    h.scheduler
        .submit(Message::new("m1", "hello"))
        .await
        .expect("accepted");
    assert_eq!(h.store.active_count(), 1);

    h.step(1000.01);
    h.scheduler.start();
    h.wait_for_success_count(1).await;

    assert_eq!(h.store.success_keys(), vec!["success/1000010_m1.json"]);
    let record = h.store.document("success/1000010_m1.json").expect("parses");
    assert_eq!(record.status, MessageStatus::Succeeded);
    assert_eq!(record.attempt_count, 0);
    assert_eq!(record.created_at, 1000.0);

    assert!(h.store.active_document("m1").is_none());
    assert!(h.store.failed_keys().is_empty());
    assert_eq!(h.sender.call_count(), 1);
}

// Two transient failures, then success on the third attempt. Retry
// instants come from the creation time, not from when attempts ran.
#[tokio::test]
async fn retry_to_success() {
    let h = harness(
        2000.0,
        ScriptedSender::with_script([TransientFailure, TransientFailure, Delivered]),
    );

    h.scheduler
        .submit(Message::new("m2", "hello"))
        .await
        .expect("accepted");

    h.step(2000.01);
    h.scheduler.start();
    h.wait_for_attempts("m2", 1).await;
    let record = h.store.active_document("m2").unwrap();
    assert_eq!(record.next_retry_at, 2060.0);

    h.step(2060.01);
    h.wait_for_attempts("m2", 2).await;
    let record = h.store.active_document("m2").unwrap();
    assert_eq!(record.next_retry_at, 2300.0);

    h.step(2300.01);
    h.wait_for_success_count(1).await;

    assert!(h.store.active_document("m2").is_none());
    let record = h.store.document("success/2300010_m2.json").expect("parses");
    assert_eq!(record.attempt_count, 2);
    assert_eq!(h.sender.call_count(), 3);

    let stats = h.scheduler.stats();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.submitted, 1);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 0);
    assert!(stats.next_due_at.is_none());
}

// A sender that always fails transiently walks the whole delay table
// and dead-letters after six attempts.
#[tokio::test]
async fn retries_exhaust_to_dead_letter() {
    let h = harness(3000.0, ScriptedSender::always(TransientFailure));

    h.scheduler
        .submit(Message::new("m3", "hello"))
        .await
        .expect("accepted");

    h.step(3000.01);
    h.scheduler.start();
    h.wait_for_attempts("m3", 1).await;

    for (attempts, due) in [(2, 3060.01), (3, 3300.01), (4, 4800.01), (5, 10200.01)] {
        h.step(due);
        h.wait_for_attempts("m3", attempts).await;
    }

    h.step(24600.01);
    h.wait_for_failed_count(1).await;

    assert_eq!(h.store.failed_keys(), vec!["failed/24600010_m3.json"]);
    let record = h.store.document("failed/24600010_m3.json").expect("parses");
    assert_eq!(record.status, MessageStatus::Failed);
    assert_eq!(record.attempt_count, 6);

    assert!(h.store.active_document("m3").is_none());
    assert!(h.store.success_keys().is_empty());
    assert_eq!(h.sender.call_count(), 6);
    assert_eq!(h.scheduler.stats().failed, 1);
}

// A permanent refusal dead-letters immediately, with no further
// attempts however often the clock moves on.
#[tokio::test]
async fn permanent_failure_short_circuits() {
    let h = harness(4500.0, ScriptedSender::with_script([PermanentFailure]));

    h.scheduler
        .submit(Message::new("m4", "hello"))
        .await
        .expect("accepted");

    h.step(4500.01);
    h.scheduler.start();
    h.wait_for_failed_count(1).await;

    let record = h.store.document("failed/4500010_m4.json").expect("parses");
    assert_eq!(record.status, MessageStatus::Failed);
    assert_eq!(record.attempt_count, 1);
    assert!(h.store.active_document("m4").is_none());

    h.step(999_999.0);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.sender.call_count(), 1);
}

// Kill the engine after a failed first attempt, recover a fresh one
// over the same store, and the retry completes with its history intact.
#[tokio::test]
async fn crash_recovery_resumes_pending_work() {
    let store = TestStateStore::new();

    let first = harness_with(
        5000.0,
        ScriptedSender::with_script([TransientFailure]),
        store.clone(),
        SchedulerConfig::default(),
    );
    first
        .scheduler
        .submit(Message::new("m5", "hello"))
        .await
        .expect("accepted");
    first.step(5000.01);
    first.scheduler.start();
    first.wait_for_attempts("m5", 1).await;
    first.scheduler.shutdown().await.expect("clean shutdown");

    // the pending record survives in the store, not in memory
    let persisted = store.active_document("m5").expect("still persisted");
    assert_eq!(persisted.next_retry_at, 5060.0);

    let second = harness_with(
        5060.01,
        ScriptedSender::with_script([Delivered]),
        store.clone(),
        SchedulerConfig::default(),
    );
    let report = recover(&second.scheduler, RecoveryOptions::default())
        .await
        .expect("recovery succeeds");
    assert_eq!(report.loaded, 1);
    assert_eq!(second.scheduler.stats().pending, 1);

    second.scheduler.start();
    second.wait_for_success_count(1).await;

    let record = second
        .store
        .document("success/5060010_m5.json")
        .expect("parses");
    assert_eq!(record.attempt_count, 1);
    assert_eq!(record.created_at, 5000.0);
    assert!(second.store.active_document("m5").is_none());
}

// Records sharing a due instant dispatch in submission order, both on
// the initial attempt and again after rescheduling.
#[tokio::test]
async fn equal_due_times_dispatch_in_submission_order() {
    let h = harness(
        4000.0,
        ScriptedSender::with_script([TransientFailure, TransientFailure, Delivered, Delivered]),
    );

    h.scheduler
        .submit(Message::new("a", "same"))
        .await
        .expect("accepted");
    h.scheduler
        .submit(Message::new("b", "same"))
        .await
        .expect("accepted");

    h.step(4000.01);
    h.scheduler.start();
    h.wait_for_attempts("a", 1).await;
    h.wait_for_attempts("b", 1).await;
    assert_eq!(h.store.active_document("a").unwrap().next_retry_at, 4060.0);
    assert_eq!(h.store.active_document("b").unwrap().next_retry_at, 4060.0);

    h.step(4060.01);
    h.wait_for_success_count(2).await;

    assert_eq!(h.sender.calls(), vec!["a", "b", "a", "b"]);
}

// A sender that blows up is indistinguishable from a transient failure.
#[tokio::test]
async fn sender_errors_are_treated_as_transient() {
    let sender = ScriptedSender::with_script([]);
    sender.push_error("socket reset by carrier");
    sender.push(Delivered);
    let h = harness(7000.0, sender);

    h.scheduler
        .submit(Message::new("m7", "hello"))
        .await
        .expect("accepted");

    h.step(7000.01);
    h.scheduler.start();
    h.wait_for_attempts("m7", 1).await;

    h.step(7060.01);
    h.wait_for_success_count(1).await;

    let record = h.store.document("success/7060010_m7.json").expect("parses");
    assert_eq!(record.attempt_count, 1);
}

// Invariant: before the dispatcher touches anything, every pending record
// in memory has exactly one matching active document, and vice versa.
#[tokio::test]
async fn memory_and_store_agree_on_pending_records() {
    let h = harness(8000.0, ScriptedSender::default());

    for id in ["x", "y", "z"] {
        h.scheduler
            .submit(Message::new(id, "payload"))
            .await
            .expect("accepted");
    }

    assert_eq!(h.scheduler.stats().pending, 3);
    assert_eq!(h.store.active_count(), 3);
    for id in ["x", "y", "z"] {
        let record = h.store.active_document(id).expect("persisted");
        assert_eq!(record.attempt_count, 0);
        assert_eq!(record.status, MessageStatus::Pending);
        assert_eq!(record.created_at, 8000.0);
    }
}

// A store outage while rescheduling reverts the record to its last
// persisted state; once the store recovers the retry goes through and the
// document advances.
#[tokio::test]
async fn store_outage_during_reschedule_reverts_to_prior_state() {
    let config = SchedulerConfig {
        backoff: StoreBackoff {
            max_attempts: 2,
            initial_delay_ms: 1,
            max_delay_ms: 2,
        },
        ..SchedulerConfig::default()
    };
    let h = harness_with(
        9000.0,
        ScriptedSender::always(TransientFailure),
        TestStateStore::new(),
        config,
    );

    h.scheduler
        .submit(Message::new("m9", "hello"))
        .await
        .expect("accepted");
    h.store.fail_puts(true);

    h.step(9000.01);
    h.scheduler.start();

    // attempts keep failing to persist; the stored document stays pristine
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.sender.call_count() >= 1);
    let record = h.store.active_document("m9").expect("still persisted");
    assert_eq!(record.attempt_count, 0);

    h.store.fail_puts(false);
    h.wait_for_attempts("m9", 1).await;
    assert_eq!(h.store.active_document("m9").unwrap().next_retry_at, 9060.0);
}

// Shutdown stops intake but leaves pending work durable for the next run.
#[tokio::test]
async fn shutdown_leaves_pending_records_in_the_store() {
    let h = harness(9500.0, ScriptedSender::always(TransientFailure));

    h.scheduler
        .submit(Message::new("later", "hello"))
        .await
        .expect("accepted");
    h.scheduler.start();
    assert!(h.scheduler.is_running());

    h.scheduler.shutdown().await.expect("clean shutdown");
    assert!(!h.scheduler.is_running());

    let err = h
        .scheduler
        .submit(Message::new("rejected", "hello"))
        .await
        .unwrap_err();
    assert!(err.is_shutdown());

    assert_eq!(h.store.active_count(), 1);
}

// Batch draining caps peak batch size without dropping records.
#[tokio::test]
async fn small_batches_still_drain_everything() {
    let config = SchedulerConfig {
        batch_size: 2,
        ..SchedulerConfig::default()
    };
    let h = harness_with(
        9800.0,
        ScriptedSender::always(SendOutcome::Delivered),
        TestStateStore::new(),
        config,
    );

    for i in 0..5 {
        h.scheduler
            .submit(Message::new(format!("m{i}"), "hello"))
            .await
            .expect("accepted");
    }

    h.step(9800.01);
    h.scheduler.start();
    h.wait_for_success_count(5).await;

    assert_eq!(h.scheduler.stats().succeeded, 5);
    assert_eq!(h.store.active_count(), 0);
}
