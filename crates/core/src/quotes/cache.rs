//! In-process quote cache keyed by market selector.
//!
//! There are at most three keys, so there is no eviction and no TTL: freshness
//! is judged by the acquisition service from the entry timestamps. Entries
//! live as long as the process and are replaced in place.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use stockdash_market_data::{MarketSelector, Quote};
use tokio::sync::broadcast;

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Cached quotes for one selector.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub data: Arc<Vec<Quote>>,
    /// When the data was confirmed fresh
    pub cached_at: DateTime<Utc>,
    /// When the persisted store was last queried; never earlier than `cached_at`
    pub last_checked_at: DateTime<Utc>,
}

/// Per-key summary for operational inspection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntrySummary {
    pub key: MarketSelector,
    pub count: usize,
    pub cached_at: DateTime<Utc>,
    pub last_checked_at: DateTime<Utc>,
}

pub struct QuoteCache {
    entries: RwLock<HashMap<MarketSelector, CacheEntry>>,
    changes: broadcast::Sender<MarketSelector>,
}

impl QuoteCache {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            entries: RwLock::new(HashMap::new()),
            changes,
        }
    }

    pub fn get(&self, key: MarketSelector) -> Option<CacheEntry> {
        self.read().get(&key).cloned()
    }

    /// Replaces the entry for `key`.
    ///
    /// An entry whose `cached_at` is newer than the incoming one keeps its
    /// data; only its `last_checked_at` advances. Returns whether the data
    /// was replaced.
    pub fn set(
        &self,
        key: MarketSelector,
        data: Arc<Vec<Quote>>,
        cached_at: DateTime<Utc>,
        last_checked_at: DateTime<Utc>,
    ) -> bool {
        {
            let mut entries = self.write();
            if let Some(existing) = entries.get_mut(&key) {
                if existing.cached_at > cached_at {
                    debug!(
                        "Keeping newer {} entry cached at {} over data cached at {}",
                        key, existing.cached_at, cached_at
                    );
                    existing.last_checked_at = existing.last_checked_at.max(last_checked_at);
                    return false;
                }
            }
            entries.insert(
                key,
                CacheEntry {
                    data,
                    cached_at,
                    last_checked_at: last_checked_at.max(cached_at),
                },
            );
        }

        // No receivers is fine: nobody is watching yet.
        let _ = self.changes.send(key);
        true
    }

    /// Records a store check without touching the data.
    pub fn mark_checked(&self, key: MarketSelector, at: DateTime<Utc>) {
        if let Some(entry) = self.write().get_mut(&key) {
            entry.last_checked_at = entry.last_checked_at.max(at);
        }
    }

    pub fn snapshot(&self) -> Vec<CacheEntrySummary> {
        let entries = self.read();
        MarketSelector::VARIANTS
            .iter()
            .filter_map(|key| {
                entries.get(key).map(|entry| CacheEntrySummary {
                    key: *key,
                    count: entry.data.len(),
                    cached_at: entry.cached_at,
                    last_checked_at: entry.last_checked_at,
                })
            })
            .collect()
    }

    /// Receives the key of every entry whose data is replaced.
    pub fn subscribe(&self) -> broadcast::Receiver<MarketSelector> {
        self.changes.subscribe()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<MarketSelector, CacheEntry>> {
        self.entries.read().unwrap_or_else(|poisoned| {
            warn!("Quote cache lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<MarketSelector, CacheEntry>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            warn!("Quote cache lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl Default for QuoteCache {
    fn default() -> Self {
        Self::new()
    }
}
