//! Bounded memo of lookup results, evicting the oldest entry first.

use crate::lookup_result::LookupResult;
use async_lock::Mutex;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};

pub const DEFAULT_CAPACITY: usize = 256;

/// Everything that distinguishes one lookup call from another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupKey {
    pub ioc: String,
    pub ioc_type: Option<String>,
    pub query_type: Option<String>,
    pub provider_name: Option<String>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Default)]
struct Entries {
    results: HashMap<LookupKey, Arc<LookupResult>>,
    order: VecDeque<LookupKey>,
}

#[derive(Debug)]
pub struct LookupCache {
    capacity: usize,
    entries: Mutex<Entries>,
}

impl Default for LookupCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl LookupCache {
    /// A capacity of zero disables caching.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(Entries::default()),
        }
    }

    pub async fn get(&self, key: &LookupKey) -> Option<Arc<LookupResult>> {
        self.entries.lock().await.results.get(key).cloned()
    }

    /// Store `result`, evicting the oldest entries beyond capacity. An
    /// existing entry for `key` is kept.
    pub async fn insert(&self, key: LookupKey, result: Arc<LookupResult>) -> Arc<LookupResult> {
        if self.capacity == 0 {
            return result;
        }
        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.results.get(&key) {
            return Arc::clone(existing);
        }
        while entries.order.len() >= self.capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.results.remove(&oldest);
        }
        entries.order.push_back(key.clone());
        entries.results.insert(key, Arc::clone(&result));
        result
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.results.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.lock().await;
        entries.results.clear();
        entries.order.clear();
    }
}
