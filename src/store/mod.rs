//! Keyed counters held by the service
//!
//! Handlers only see the [`CounterStore`] trait, so a shared backing store can
//! replace the in-memory map without touching call sites.

pub mod downloads;
pub mod memory;

use std::collections::BTreeMap;

pub use downloads::{DownloadStats, DownloadTracker};
pub use memory::InMemoryCounterStore;

pub trait CounterStore: Send + Sync {
    /// Current count for `key`; unseen keys count zero
    fn get(&self, key: &str) -> u64;

    /// Add one to `key` and return the new count
    fn increment(&self, key: &str) -> u64;

    /// Drop `key` back to zero
    fn reset(&self, key: &str);

    /// Every tracked key with its count, ordered by key
    fn snapshot(&self) -> BTreeMap<String, u64>;
}
