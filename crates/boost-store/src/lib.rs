//! # boost-store: Result store implementations.
//!
//! - [`RocksResultStore`]: durable store backed by RocksDB; a run commit is
//!   one atomic `WriteBatch`
//! - [`MemoryResultStore`]: in-process store for tests

pub mod memory;
pub mod rocks;

pub use memory::MemoryResultStore;
pub use rocks::RocksResultStore;
