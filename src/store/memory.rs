use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use super::CounterStore;

/// Counters in process memory, lost on restart
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counts: Mutex<HashMap<String, u64>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing counts
    pub fn seeded<I, K>(initial: I) -> Self
    where
        I: IntoIterator<Item = (K, u64)>,
        K: Into<String>,
    {
        Self {
            counts: Mutex::new(initial.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }
}

impl CounterStore for InMemoryCounterStore {
    fn get(&self, key: &str) -> u64 {
        self.counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    fn increment(&self, key: &str) -> u64 {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        let count = counts.entry(key.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    fn reset(&self, key: &str) {
        self.counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }
}
