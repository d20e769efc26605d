//! Scheduling engine for durable retry of outbound short messages.
//!
//! The engine owns an in-memory min-heap of pending attempts keyed by due
//! time, coupled to an object-store state machine: every transition is
//! persisted through a [`courier_store::StateStore`] before it becomes
//! observable, so the process can be killed and recovered without losing
//! pending work or duplicating terminal outcomes.

#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

pub mod clock;
mod dispatch;
pub mod engine;
pub mod error;
pub mod policy;
pub mod recovery;
pub mod sender;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Scheduler, SchedulerConfig, Stats, StoreBackoff};
pub use error::{RecoveryError, SchedulerError, SenderError};
pub use policy::RetryPolicy;
pub use recovery::{RecoveryOptions, RecoveryReport, recover};
pub use sender::{DemoSender, ScriptedSender, SendOutcome, Sender};
