//! In-process store of recent comparison results.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use recite_core::{ComparisonResult, StoreConfig};
use tracing::debug;

struct Entry {
    stored_at: Instant,
    result: ComparisonResult,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    /// Session ids, oldest first.
    order: VecDeque<String>,
}

impl Inner {
    fn remove(&mut self, session_id: &str) -> Option<Entry> {
        let entry = self.entries.remove(session_id)?;
        self.order.retain(|id| id != session_id);
        Some(entry)
    }
}

/// Results keyed by session id, bounded by count and age.
pub struct ResultStore {
    inner: Mutex<Inner>,
    capacity: usize,
    ttl: Duration,
}

impl ResultStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.capacity, Duration::from_secs(config.ttl_secs))
    }

    /// Store `result`, replacing an earlier one with the same session id and
    /// evicting the oldest entries beyond capacity.
    pub fn insert(&self, result: ComparisonResult) {
        let mut inner = self.inner.lock();
        let id = result.session_id.clone();
        inner.remove(&id);
        inner.order.push_back(id.clone());
        inner.entries.insert(
            id,
            Entry {
                stored_at: Instant::now(),
                result,
            },
        );
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
                debug!("evicted result {oldest}");
            }
        }
    }

    /// Look up a result; expired entries are dropped and not returned.
    pub fn get(&self, session_id: &str) -> Option<ComparisonResult> {
        let mut inner = self.inner.lock();
        let expired = inner.entries.get(session_id)?.stored_at.elapsed() >= self.ttl;
        if expired {
            inner.remove(session_id);
            return None;
        }
        inner.entries.get(session_id).map(|e| e.result.clone())
    }

    /// Drop every expired entry and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let ttl = self.ttl;
        let before = inner.entries.len();
        inner.entries.retain(|_, e| e.stored_at.elapsed() < ttl);
        let Inner { entries, order } = &mut *inner;
        order.retain(|id| entries.contains_key(id));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::from_config(&StoreConfig::default())
    }
}
