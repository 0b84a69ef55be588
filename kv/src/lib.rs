//! Key-value store interface and implementations.
//!
//! Provides a trait-based KV store with an in-memory implementation for
//! testing and a redb-based implementation for persistence. Besides plain
//! reads and writes, every store supports [`KVStore::commit`]: a guarded
//! batch that is applied atomically only if every guarded key still holds
//! the bytes the caller read. That is the optimistic-concurrency primitive
//! the identity store builds its read-modify-write cycles on.

pub mod batch;
pub mod memory;
pub mod redb;

use std::fmt;
use thiserror::Error;

pub use batch::{Batch, Guard, Write};

/// Errors that can occur in KV store operations.
#[derive(Error, Debug)]
pub enum KVError {
    #[error("kv: conflict on key {0:?}")]
    Conflict(String),

    #[error("kv: storage error: {0}")]
    Storage(String),

    #[error("kv: serialization error: {0}")]
    Serialization(String),
}

/// Result type for KV operations.
pub type KVResult<T> = Result<T, KVError>;

/// Key-value store trait.
///
/// String keys, byte values. Implementations must be safe for concurrent
/// use; `commit` must be atomic with respect to every other write.
pub trait KVStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &str) -> KVResult<Option<Vec<u8>>>;

    /// Set a key-value pair.
    fn set(&self, key: &str, value: &[u8]) -> KVResult<()>;

    /// Delete a key.
    fn delete(&self, key: &str) -> KVResult<()>;

    /// Scan for keys with a given prefix, sorted by key.
    fn scan(&self, prefix: &str) -> KVResult<Vec<(String, Vec<u8>)>>;

    /// Batch set multiple key-value pairs.
    fn batch_set(&self, entries: &[(&str, &[u8])]) -> KVResult<()>;

    /// Batch delete multiple keys.
    fn batch_delete(&self, keys: &[&str]) -> KVResult<()>;

    /// Check every guard, then apply every write, as one transaction.
    ///
    /// Returns [`KVError::Conflict`] naming the first failing guard; in that
    /// case nothing is written.
    fn commit(&self, batch: &Batch) -> KVResult<()>;
}

impl fmt::Debug for dyn KVStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KVStore {{ ... }}")
    }
}

// Re-export the implementations
pub use memory::MemoryStore;
pub use redb::RedbStore;
