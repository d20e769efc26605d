//! Backend implementations of the state store gateway.
//!
//! - `s3`: S3-compatible object store for production use
//! - `memory`: in-memory storage for tests and local runs
//! - `test`: test utilities with synchronization and failure injection

pub mod memory;
pub mod s3;

pub use memory::MemoryStateStore;
pub use self::s3::S3StateStore;
pub use test::TestStateStore;
