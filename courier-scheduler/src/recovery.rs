//! Crash recovery: rebuild engine state from the active prefix.

use courier_store::{MessageStatus, StoreError};
use tracing::{info, warn};

use crate::{engine::Scheduler, error::RecoveryError};

/// Knobs for the recovery pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryOptions {
    /// Skip active documents that cannot be decoded instead of refusing to
    /// start. Skipped documents are left in place for inspection.
    pub skip_unreadable: bool,
}

/// What a recovery pass found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Pending records reseeded into the engine.
    pub loaded: usize,
    /// Stale non-pending active documents cleaned up.
    pub discarded: usize,
    /// Unreadable documents skipped (only with `skip_unreadable`).
    pub skipped: usize,
}

/// Load every active record from the store and reseed the engine.
///
/// Must run before [`Scheduler::start`]. The pass never rewrites an active
/// document, so an idempotent restart leaves the object store untouched;
/// records whose due time has already passed become eligible immediately,
/// with no catch-up back-off.
///
/// Active documents whose status is not `PENDING` are stale artifacts of a
/// crash between a terminal write and its active delete; they are discarded
/// and deleted without verifying the terminal document.
///
/// # Errors
/// Any listing failure, and any load failure not excused by
/// [`RecoveryOptions::skip_unreadable`], aborts recovery: the engine must
/// not start dispatching from a partially recovered state.
pub async fn recover(
    scheduler: &Scheduler,
    options: RecoveryOptions,
) -> Result<RecoveryReport, RecoveryError> {
    let message_ids = scheduler
        .store
        .list_active()
        .await
        .map_err(RecoveryError::List)?;

    let mut report = RecoveryReport::default();

    for message_id in message_ids {
        match scheduler.store.get_active(&message_id).await {
            Ok(record) if record.status == MessageStatus::Pending => {
                scheduler.seed(record);
                report.loaded += 1;
            }
            Ok(record) => {
                info!(
                    message_id = %message_id,
                    status = ?record.status,
                    "discarding stale non-pending active document"
                );
                if let Err(e) = scheduler.store.delete_active(&message_id).await {
                    warn!(
                        message_id = %message_id,
                        error = %e,
                        "could not clean up stale active document"
                    );
                }
                report.discarded += 1;
            }
            Err(e @ StoreError::Serialization(_)) if options.skip_unreadable => {
                warn!(
                    message_id = %message_id,
                    error = %e,
                    "skipping unreadable active document"
                );
                report.skipped += 1;
            }
            Err(source) => {
                return Err(RecoveryError::Load { message_id, source });
            }
        }
    }

    info!(
        loaded = report.loaded,
        discarded = report.discarded,
        skipped = report.skipped,
        "recovery complete"
    );
    Ok(report)
}
