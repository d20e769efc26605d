//! The scheduling engine.
//!
//! One mutex guards all shared state: the min-heap of due times, the
//! id-to-record index, the reservation set, the counters, and the shutdown
//! flag. Critical sections are short and never span a store call; the
//! state-mutating helpers live on [`EngineState`] so they can only be
//! reached through the lock.

use std::{
    cmp::{Ordering, Reverse},
    collections::{BinaryHeap, HashMap, HashSet},
    sync::Arc,
};

use courier_store::{Message, MessageRecord, StateStore};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::{sync::Notify, task::JoinHandle};
use tracing::warn;

use crate::{
    clock::Clock, dispatch, error::SchedulerError, policy::RetryPolicy, sender::Sender,
};

/// Engine tuning knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Upper bound on records drained per dispatch cycle, to bound peak
    /// memory when a large backlog comes due at once.
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,

    /// Retry timing policy.
    #[serde(flatten, default)]
    pub policy: RetryPolicy,

    /// Backoff for dispatcher-side store writes.
    #[serde(default)]
    pub backoff: StoreBackoff,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::batch_size(),
            policy: RetryPolicy::default(),
            backoff: StoreBackoff::default(),
        }
    }
}

/// Bounded exponential backoff for store writes issued by the dispatcher.
///
/// The dispatcher cannot make progress on a record without persistence, so
/// its writes are retried here before the record is put back on the heap.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StoreBackoff {
    /// Total attempts before giving up.
    #[serde(default = "defaults::backoff_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first re-attempt.
    #[serde(default = "defaults::backoff_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Cap on the doubling delay.
    #[serde(default = "defaults::backoff_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for StoreBackoff {
    fn default() -> Self {
        Self {
            max_attempts: defaults::backoff_max_attempts(),
            initial_delay_ms: defaults::backoff_initial_delay_ms(),
            max_delay_ms: defaults::backoff_max_delay_ms(),
        }
    }
}

impl StoreBackoff {
    /// Delay after the `failed` completed attempts (0-indexed).
    pub fn delay(&self, failed: u32) -> std::time::Duration {
        let doubled = self
            .initial_delay_ms
            .saturating_mul(1_u64.checked_shl(failed).unwrap_or(u64::MAX));
        std::time::Duration::from_millis(doubled.min(self.max_delay_ms))
    }
}

mod defaults {
    pub const fn batch_size() -> usize {
        64
    }

    pub const fn backoff_max_attempts() -> u32 {
        5
    }

    pub const fn backoff_initial_delay_ms() -> u64 {
        100
    }

    pub const fn backoff_max_delay_ms() -> u64 {
        5000
    }
}

/// Heap entry: ordered by due time, ties broken by submission sequence so
/// records sharing an instant dispatch in submission order.
#[derive(Debug, Clone)]
struct DueEntry {
    due_at: f64,
    seq: u64,
    message_id: String,
}

impl PartialEq for DueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DueEntry {}

impl PartialOrd for DueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due_at
            .total_cmp(&other.due_at)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Everything the engine mutex guards.
#[derive(Debug, Default)]
pub(crate) struct EngineState {
    heap: BinaryHeap<Reverse<DueEntry>>,
    index: HashMap<String, MessageRecord>,
    /// Ids whose active write is in flight; live for duplicate detection
    /// but invisible to the dispatcher until committed.
    reserved: HashSet<String>,
    next_seq: u64,
    submitted: u64,
    succeeded: u64,
    failed: u64,
    shutting_down: bool,
}

impl EngineState {
    /// Insert a pending record into heap and index.
    pub(crate) fn insert(&mut self, record: MessageRecord) {
        let seq = self.next_seq;
        self.next_seq += 1;

        self.heap.push(Reverse(DueEntry {
            due_at: record.next_retry_at,
            seq,
            message_id: record.message_id.clone(),
        }));
        self.index.insert(record.message_id.clone(), record);
    }

    /// Due time of the earliest pending record.
    pub(crate) fn peek_due(&self) -> Option<f64> {
        self.heap.peek().map(|Reverse(entry)| entry.due_at)
    }

    /// Drain up to `limit` records due at or before `now`, earliest first.
    pub(crate) fn pop_due(&mut self, now: f64, limit: usize) -> Vec<MessageRecord> {
        let mut batch = Vec::new();

        while batch.len() < limit
            && self
                .heap
                .peek()
                .is_some_and(|Reverse(entry)| entry.due_at <= now)
        {
            let Some(Reverse(entry)) = self.heap.pop() else {
                break;
            };
            if let Some(record) = self.index.remove(&entry.message_id) {
                batch.push(record);
            }
        }

        batch
    }

    pub(crate) fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub(crate) fn record_failed(&mut self) {
        self.failed += 1;
    }

    pub(crate) const fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    fn is_live(&self, message_id: &str) -> bool {
        self.index.contains_key(message_id) || self.reserved.contains(message_id)
    }
}

/// Snapshot of engine counters. Internally consistent, but may be stale the
/// instant after it is taken.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    /// Records currently queued for an attempt.
    pub pending: usize,
    /// Accepted submissions since this process started.
    pub submitted: u64,
    /// Terminal successes since this process started.
    pub succeeded: u64,
    /// Terminal failures since this process started.
    pub failed: u64,
    /// Due time of the earliest pending record, if any.
    pub next_due_at: Option<f64>,
}

/// The scheduling engine: a time-ordered queue of pending attempts coupled
/// to the object-store state machine, drained by a background dispatcher.
#[derive(Debug)]
pub struct Scheduler {
    pub(crate) state: Mutex<EngineState>,
    pub(crate) notify: Notify,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) store: Arc<dyn StateStore>,
    pub(crate) sender: Arc<dyn Sender>,
    pub(crate) config: SchedulerConfig,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Build an engine over the given collaborators.
    ///
    /// # Errors
    /// `SchedulerError::Configuration` for an invalid retry table or a zero
    /// batch size.
    pub fn new(
        store: Arc<dyn StateStore>,
        sender: Arc<dyn Sender>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Result<Arc<Self>, SchedulerError> {
        config
            .policy
            .validate()
            .map_err(SchedulerError::Configuration)?;
        if config.batch_size == 0 {
            return Err(SchedulerError::Configuration(
                "batch_size must be at least 1".to_string(),
            ));
        }

        Ok(Arc::new(Self {
            state: Mutex::new(EngineState::default()),
            notify: Notify::new(),
            clock,
            store,
            sender,
            config,
            worker: Mutex::new(None),
        }))
    }

    /// Accept a message for delivery.
    ///
    /// The record's active document is durably written before this returns
    /// `Ok`; on any failure the engine is left exactly as it was.
    ///
    /// # Errors
    /// `EmptyMessageId` and `DuplicateMessage` for rejected input,
    /// `ShutdownInProgress` once shutdown has begun, `Store` when the
    /// active document cannot be written.
    pub async fn submit(&self, message: Message) -> Result<String, SchedulerError> {
        if message.message_id.is_empty() {
            return Err(SchedulerError::EmptyMessageId);
        }
        let message_id = message.message_id.clone();

        {
            let mut state = self.state.lock();
            if state.shutting_down {
                return Err(SchedulerError::ShutdownInProgress);
            }
            if state.is_live(&message_id) {
                return Err(SchedulerError::DuplicateMessage(message_id));
            }
            state.reserved.insert(message_id.clone());
        }

        let record = MessageRecord::new(message, self.clock.now());
        let written = self.store.put_active(&record).await;

        let mut state = self.state.lock();
        state.reserved.remove(&message_id);
        match written {
            Ok(()) => {
                state.insert(record);
                state.submitted += 1;
                drop(state);
                self.notify.notify_waiters();
                Ok(message_id)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Nudge the dispatcher to re-examine the heap head. Idempotent.
    pub fn wake(&self) {
        self.notify.notify_waiters();
    }

    /// Snapshot the engine counters.
    pub fn stats(&self) -> Stats {
        let state = self.state.lock();
        Stats {
            pending: state.heap.len(),
            submitted: state.submitted,
            succeeded: state.succeeded,
            failed: state.failed,
            next_due_at: state.peek_due(),
        }
    }

    /// Reinsert a recovered record without touching the store. Recovery
    /// only: an idempotent restart must not change the object store.
    pub(crate) fn seed(&self, record: MessageRecord) {
        self.state.lock().insert(record);
    }

    /// Spawn the background dispatcher. Call once, after recovery.
    pub fn start(self: &Arc<Self>) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            warn!("dispatcher already started");
            return;
        }
        *worker = Some(tokio::spawn(dispatch::run(Arc::clone(self))));
    }

    /// Whether the dispatcher task is alive.
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop accepting submissions, let in-flight attempts drain, and join
    /// the dispatcher. Pending records stay in the object store for the
    /// next recovery.
    ///
    /// # Errors
    /// `DispatcherFailed` if the dispatcher task panicked.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        self.state.lock().shutting_down = true;
        self.notify.notify_waiters();

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| SchedulerError::DispatcherFailed(e.to_string()))?;
        }
        Ok(())
    }
}
