//! Search result cache
//!
//! TTL-bounded map with oldest-inserted eviction once `max_entries` is
//! exceeded. Entries expire lazily on read; a background sweeper removes
//! expired entries that are never read again.

use parking_lot::Mutex;
use ragline_config::constants::cache;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Cache configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(cache::TTL_SECS),
            max_entries: cache::MAX_ENTRIES,
        }
    }
}

impl From<&ragline_config::CacheConfig> for CacheConfig {
    fn from(config: &ragline_config::CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            ttl: Duration::from_secs(config.ttl_secs),
            max_entries: config.max_entries,
        }
    }
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    seq: u64,
}

struct CacheState<V> {
    entries: HashMap<String, Entry<V>>,
    /// Insertion order; may hold stale records of overwritten or expired keys,
    /// compacted once they outnumber live entries
    order: VecDeque<(String, u64)>,
    next_seq: u64,
}

impl<V> CacheState<V> {
    /// Drop order records whose key is gone or was re-inserted since
    fn compact_order(&mut self) {
        let Self { entries, order, .. } = self;
        order.retain(|(key, seq)| entries.get(key).map(|e| e.seq == *seq).unwrap_or(false));
    }
}

/// TTL cache keyed by string
pub struct SearchCache<V> {
    config: CacheConfig,
    state: Mutex<CacheState<V>>,
    sweeping: AtomicBool,
}

impl<V: Clone> SearchCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
                next_seq: 0,
            }),
            sweeping: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Fresh value for `key`; expired entries are removed and reported as a miss
    pub fn get(&self, key: &str) -> Option<V> {
        let mut state = self.state.lock();
        if let Some(entry) = state.entries.get(key) {
            if entry.inserted_at.elapsed() < self.config.ttl {
                metrics::counter!("ragline_search_cache_hits_total").increment(1);
                return Some(entry.value.clone());
            }
            state.entries.remove(key);
        }

        metrics::counter!("ragline_search_cache_misses_total").increment(1);
        None
    }

    /// Insert or overwrite, evicting the oldest entries while over capacity
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let now = Instant::now();
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;

        state.entries.insert(
            key.clone(),
            Entry {
                value,
                inserted_at: now,
                seq,
            },
        );
        state.order.push_back((key, seq));
        if state.order.len() > 2 * state.entries.len().max(1) {
            state.compact_order();
        }

        while state.entries.len() > self.config.max_entries {
            let Some((oldest, seq)) = state.order.pop_front() else {
                break;
            };
            // Skip order records superseded by a later insert of the same key
            let current = state
                .entries
                .get(&oldest)
                .map(|e| e.seq == seq)
                .unwrap_or(false);
            if current {
                state.entries.remove(&oldest);
                tracing::trace!(key = %oldest, "Evicted cache entry");
            }
        }
    }

    /// Remove every expired entry
    ///
    /// Concurrent sweeps are skipped rather than queued. Returns the number of
    /// entries removed.
    pub fn sweep(&self) -> usize {
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return 0;
        }

        let ttl = self.config.ttl;
        let removed = {
            let mut state = self.state.lock();
            let before = state.entries.len();
            state.entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
            state.compact_order();
            before - state.entries.len()
        };

        self.sweeping.store(false, Ordering::Release);

        if removed > 0 {
            tracing::debug!(removed, "Swept expired cache entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn order_len(&self) -> usize {
        self.state.lock().order.len()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.order.clear();
    }
}

impl<V: Clone + Send + 'static> SearchCache<V> {
    /// Sweep every `ttl` until the cache is dropped or the handle aborted
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.config.ttl.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // First tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                match weak.upgrade() {
                    Some(cache) => {
                        cache.sweep();
                    },
                    None => break,
                }
            }
        })
    }
}
