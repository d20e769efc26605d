//! The background dispatch loop.
//!
//! One task drains due records from the heap and runs delivery attempts.
//! All waiting happens on the engine's `Notify`: untimed while the heap is
//! empty, bounded by the head's due time otherwise. Senders are always
//! invoked outside the engine lock.

use std::{sync::Arc, time::Duration};

use courier_store::{MessageRecord, MessageStatus, StoreError};
use tracing::{debug, error, info, warn};

use crate::{engine::Scheduler, sender::SendOutcome};

enum Step {
    Exit,
    Idle,
    Sleep(Duration),
    Dispatch(Vec<MessageRecord>),
}

pub(crate) async fn run(scheduler: Arc<Scheduler>) {
    debug!("dispatcher started");

    loop {
        // Created before the state is examined so a submission that lands
        // between the check and the wait still wakes us.
        let notified = scheduler.notify.notified();
        tokio::pin!(notified);

        match next_step(&scheduler) {
            Step::Exit => break,
            Step::Idle => notified.await,
            Step::Sleep(wait) => {
                tokio::select! {
                    () = notified => {}
                    () = tokio::time::sleep(wait) => {}
                }
            }
            Step::Dispatch(batch) => {
                for record in batch {
                    attempt(&scheduler, record).await;
                }
                // the head may have moved
                scheduler.notify.notify_waiters();
            }
        }
    }

    debug!("dispatcher stopped");
}

fn next_step(scheduler: &Scheduler) -> Step {
    let now = scheduler.clock.now();
    let mut state = scheduler.state.lock();

    if state.is_shutting_down() {
        return Step::Exit;
    }

    match state.peek_due() {
        None => Step::Idle,
        Some(due_at) if due_at > now => Step::Sleep(Duration::from_secs_f64(due_at - now)),
        Some(_) => Step::Dispatch(state.pop_due(now, scheduler.config.batch_size)),
    }
}

/// Run one delivery attempt and apply its outcome.
async fn attempt(scheduler: &Arc<Scheduler>, record: MessageRecord) {
    let outcome = match scheduler.sender.send(&record.message).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(
                message_id = %record.message_id,
                error = %e,
                "sender error, treating as transient failure"
            );
            SendOutcome::TransientFailure
        }
    };

    let now = scheduler.clock.now();
    match outcome {
        SendOutcome::Delivered => {
            let mut delivered = record.clone();
            delivered.mark_succeeded(now);
            finalize(scheduler, record, delivered).await;
        }
        SendOutcome::PermanentFailure => {
            let mut refused = record.clone();
            refused.record_failure(now);
            refused.mark_failed(now);
            finalize(scheduler, record, refused).await;
        }
        SendOutcome::TransientFailure => {
            let mut failed = record.clone();
            failed.record_failure(now);

            match scheduler
                .config
                .policy
                .next_retry_at(failed.created_at, failed.attempt_count)
            {
                Some(due_at) => {
                    failed.schedule_retry(due_at);
                    reschedule(scheduler, record, failed).await;
                }
                None => {
                    failed.mark_failed(now);
                    finalize(scheduler, record, failed).await;
                }
            }
        }
    }
}

/// Persist a rescheduled record, then put it back on the heap. If the store
/// stays down past the backoff budget the prior state goes back instead, so
/// memory keeps matching the last acknowledged active document.
async fn reschedule(scheduler: &Arc<Scheduler>, prior: MessageRecord, next: MessageRecord) {
    debug!(
        message_id = %next.message_id,
        attempt_count = next.attempt_count,
        next_retry_at = next.next_retry_at,
        "attempt failed, rescheduling"
    );

    match persist(scheduler, StoreWrite::Active(&next)).await {
        Ok(()) => scheduler.state.lock().insert(next),
        Err(e) => {
            error!(
                message_id = %prior.message_id,
                error = %e,
                "could not persist reschedule, restoring prior state"
            );
            scheduler.state.lock().insert(prior);
        }
    }
}

/// Commit a terminal outcome: terminal document first, then the active
/// delete. A crash between the two leaves a duplicate for recovery to
/// reconcile, never a lost record.
async fn finalize(scheduler: &Arc<Scheduler>, prior: MessageRecord, terminal: MessageRecord) {
    let write = if terminal.status == MessageStatus::Succeeded {
        StoreWrite::Success(&terminal)
    } else {
        StoreWrite::Failed(&terminal)
    };

    match persist(scheduler, write).await {
        Ok(()) => {
            if let Err(e) = persist(scheduler, StoreWrite::DeleteActive(&terminal.message_id)).await
            {
                warn!(
                    message_id = %terminal.message_id,
                    error = %e,
                    "terminal document written but active document not deleted, recovery will reconcile"
                );
            }

            let mut state = scheduler.state.lock();
            if terminal.status == MessageStatus::Succeeded {
                state.record_success();
            } else {
                state.record_failed();
            }
            drop(state);

            info!(
                message_id = %terminal.message_id,
                status = ?terminal.status,
                attempt_count = terminal.attempt_count,
                "record finalized"
            );
        }
        Err(e) => {
            error!(
                message_id = %prior.message_id,
                error = %e,
                "could not persist terminal transition, restoring prior state"
            );
            scheduler.state.lock().insert(prior);
        }
    }
}

#[derive(Clone, Copy)]
enum StoreWrite<'a> {
    Active(&'a MessageRecord),
    Success(&'a MessageRecord),
    Failed(&'a MessageRecord),
    DeleteActive(&'a str),
}

/// Issue a store write with bounded exponential backoff. The dispatcher
/// cannot progress a record without persistence, so transient store
/// failures are absorbed here.
async fn persist(scheduler: &Scheduler, write: StoreWrite<'_>) -> Result<(), StoreError> {
    let backoff = scheduler.config.backoff;
    let mut failed_attempts = 0;

    loop {
        let result = match write {
            StoreWrite::Active(record) => scheduler.store.put_active(record).await,
            StoreWrite::Success(record) => scheduler.store.put_success(record).await,
            StoreWrite::Failed(record) => scheduler.store.put_failed(record).await,
            StoreWrite::DeleteActive(message_id) => scheduler.store.delete_active(message_id).await,
        };

        match result {
            Ok(()) => return Ok(()),
            Err(e) => {
                failed_attempts += 1;
                if failed_attempts >= backoff.max_attempts {
                    return Err(e);
                }

                let wait = backoff.delay(failed_attempts - 1);
                warn!(
                    error = %e,
                    attempt = failed_attempts,
                    wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                    "store write failed, backing off"
                );
                tokio::time::sleep(wait).await;
            }
        }
    }
}
