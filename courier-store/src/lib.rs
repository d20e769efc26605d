//! State persistence for the courier retry scheduler.
//!
//! This crate provides:
//! - The persisted data model (`Message`, `MessageRecord`)
//! - The `StateStore` gateway trait over an object store bucket
//! - Backends: S3-compatible (production), in-memory (tests, local runs)

#![deny(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::must_use_candidate)]

pub mod backends;
pub mod config;
pub mod error;
pub mod gateway;
pub mod record;

pub use backends::{MemoryStateStore, S3StateStore, TestStateStore};
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use gateway::StateStore;
pub use record::{Message, MessageRecord, MessageStatus};
