//! Quote acquisition: the staleness and refresh state machine.
//!
//! A request for a selector is answered from the first tier that can serve it:
//!
//! 1. a fresh memory entry
//! 2. a stale memory entry whose store check is recent
//! 3. the persisted store, with a background live refresh when its rows are stale
//! 4. a blocking live fetch when the store has nothing usable
//!
//! `all` is evaluated per market partition: only the partitions that are
//! empty (or the whole selector, when the combined row count is too small)
//! block on the provider, and only the stale partitions are refreshed in the
//! background.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, info, warn};
use serde::Serialize;
use stockdash_market_data::{
    normalize_quotes, LiveQuoteProvider, Market, MarketDataError, MarketSelector, Quote,
};

use super::cache::{CacheEntry, QuoteCache};
use super::config::AcquisitionConfig;
use super::constants::STALE_ENTRY_HEADROOM;
use super::inflight::InFlight;
use super::merge::{merge_partitions, newest_update, rows_for_market};
use super::store::QuoteStore;
use crate::utils::time_utils::{is_within, to_time_delta, Clock, SystemClock};

/// Which tier produced an [`AcquisitionOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Fresh memory entry
    Memory,
    /// Stale memory entry, store checked moments ago
    RecentCheck,
    /// Fresh store rows
    Store,
    /// Stale store rows; a background refresh was scheduled
    StaleStore,
    /// Fresh provider rows
    Live,
    /// Prior or partial data served after a failure
    Fallback,
    /// Nothing to show
    None,
}

/// Result of one acquisition request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionOutcome {
    pub market: MarketSelector,
    pub quotes: Arc<Vec<Quote>>,
    pub source: DataSource,
    /// Set when some requested market has nothing to show, or a forced refresh failed
    pub error: Option<String>,
    pub cached_at: Option<DateTime<Utc>>,
}

impl AcquisitionOutcome {
    fn from_entry(market: MarketSelector, entry: CacheEntry, source: DataSource) -> Self {
        Self {
            market,
            quotes: entry.data,
            source,
            error: None,
            cached_at: Some(entry.cached_at),
        }
    }

    fn empty(market: MarketSelector, error: String) -> Self {
        Self {
            market,
            quotes: Arc::new(Vec::new()),
            source: DataSource::None,
            error: Some(error),
            cached_at: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

#[derive(Debug, Clone)]
struct LiveBatch {
    quotes: Arc<Vec<Quote>>,
    started_at: DateTime<Utc>,
}

type LiveFetch = Result<LiveBatch, Arc<MarketDataError>>;

struct StorePartition {
    market: Market,
    rows: Vec<Quote>,
}

/// Serves quotes for a [`MarketSelector`] from memory, store or provider.
///
/// Cheap to clone; clones share the cache and the in-flight registries.
#[derive(Clone)]
pub struct QuoteAcquisitionService {
    cache: Arc<QuoteCache>,
    store: Arc<dyn QuoteStore>,
    provider: Arc<dyn LiveQuoteProvider>,
    clock: Arc<dyn Clock>,
    config: AcquisitionConfig,
    store_checks: InFlight<MarketSelector, AcquisitionOutcome>,
    live_fetches: InFlight<Market, LiveFetch>,
    background: InFlight<MarketSelector, ()>,
}

impl QuoteAcquisitionService {
    pub fn new(
        cache: Arc<QuoteCache>,
        store: Arc<dyn QuoteStore>,
        provider: Arc<dyn LiveQuoteProvider>,
        config: AcquisitionConfig,
    ) -> Self {
        Self {
            cache,
            store,
            provider,
            clock: Arc::new(SystemClock),
            config,
            store_checks: InFlight::new(),
            live_fetches: InFlight::new(),
            background: InFlight::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cache(&self) -> &Arc<QuoteCache> {
        &self.cache
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Answers from memory alone, without any I/O.
    ///
    /// Returns `None` when the store has to be consulted.
    pub fn try_cached(&self, market: MarketSelector) -> Option<AcquisitionOutcome> {
        let entry = self.cache.get(market)?;
        let now = self.clock.now();

        if is_within(now, entry.cached_at, self.config.fresh_window) {
            debug!("Serving fresh {} quotes from memory", market);
            return Some(AcquisitionOutcome::from_entry(
                market,
                entry,
                DataSource::Memory,
            ));
        }
        if is_within(
            now,
            entry.last_checked_at,
            self.config.recheck_suppression_window,
        ) {
            debug!("Store checked recently for {}, serving cached quotes", market);
            return Some(AcquisitionOutcome::from_entry(
                market,
                entry,
                DataSource::RecentCheck,
            ));
        }
        None
    }

    /// Runs the full acquisition procedure for `market`.
    ///
    /// Concurrent calls for the same selector share one store check.
    pub async fn get_quotes(&self, market: MarketSelector) -> AcquisitionOutcome {
        if let Some(hit) = self.try_cached(market) {
            return hit;
        }

        let this = self.clone();
        let check = self
            .store_checks
            .run(market, move || async move { this.check_store(market).await });

        match check.await {
            Ok(outcome) => outcome,
            Err(failed) => self.recover(market, failed.to_string()),
        }
    }

    /// Fetches every market of `market` live, bypassing memory and store.
    ///
    /// The cache is replaced only when every market succeeds.
    pub async fn force_refresh(&self, market: MarketSelector) -> AcquisitionOutcome {
        info!("Forced refresh of {} quotes", market);
        let fetched = self.fetch_live_markets(market.markets()).await;
        let prior = self.cache.get(market);

        let mut partitions = Vec::with_capacity(fetched.len());
        let mut started_at: Option<DateTime<Utc>> = None;
        let mut failures = Vec::new();

        for (m, result) in fetched {
            match result {
                Ok(batch) => {
                    started_at = Some(earliest(started_at, batch.started_at));
                    partitions.push((m, batch.quotes.to_vec()));
                }
                Err(e) => {
                    failures.push(format!("{}: {}", m, e));
                    if let Some(entry) = &prior {
                        partitions.push((m, rows_for_market(&entry.data, m)));
                    }
                }
            }
        }

        let quotes = Arc::new(merge_partitions(partitions));

        match started_at {
            Some(started_at) if failures.is_empty() => {
                self.cache
                    .set(market, Arc::clone(&quotes), started_at, self.clock.now());
                AcquisitionOutcome {
                    market,
                    quotes,
                    source: DataSource::Live,
                    error: None,
                    cached_at: Some(started_at),
                }
            }
            _ => {
                let error = format!("Live refresh failed ({})", failures.join("; "));
                warn!("{} for {}, cache left untouched", error, market);
                AcquisitionOutcome {
                    market,
                    source: if quotes.is_empty() {
                        DataSource::None
                    } else {
                        DataSource::Fallback
                    },
                    quotes,
                    error: Some(error),
                    cached_at: prior.map(|entry| entry.cached_at),
                }
            }
        }
    }

    /// Steps 3 and 4: consult the store, go live where it falls short.
    async fn check_store(&self, market: MarketSelector) -> AcquisitionOutcome {
        // A check that finished while this one was queued may have filled the entry.
        if let Some(hit) = self.try_cached(market) {
            return hit;
        }

        let now = self.clock.now();
        let prior = self.cache.get(market);

        let reads = join_all(market.markets().iter().map(|&m| async move {
            (m, self.store.quotes_for_market(m).await)
        }))
        .await;

        let mut partitions = Vec::with_capacity(reads.len());
        let mut store_failures = Vec::new();
        for (m, read) in reads {
            match read {
                Ok(rows) => partitions.push(StorePartition {
                    market: m,
                    rows: normalize_quotes(m, rows),
                }),
                Err(e) => store_failures.push(format!("{}: {}", m, e)),
            }
        }

        if !store_failures.is_empty() {
            let message = format!("Stock store unavailable ({})", store_failures.join("; "));
            return match prior {
                Some(entry) => {
                    warn!("{}; serving cached {} quotes", message, market);
                    self.cache.mark_checked(market, now);
                    AcquisitionOutcome::from_entry(market, entry, DataSource::Fallback)
                }
                None => {
                    warn!("{}; nothing cached for {}", message, market);
                    AcquisitionOutcome::empty(market, message)
                }
            };
        }

        let total: usize = partitions.iter().map(|p| p.rows.len()).sum();
        let below_threshold = market.is_all() && total < self.config.min_rows_all;
        if below_threshold {
            debug!(
                "Store holds {} rows for {}, below the minimum of {}",
                total, market, self.config.min_rows_all
            );
        }

        let (usable, insufficient): (Vec<StorePartition>, Vec<StorePartition>) = partitions
            .into_iter()
            .partition(|p| !below_threshold && !p.rows.is_empty());

        let live_markets: Vec<Market> = insufficient.iter().map(|p| p.market).collect();
        let fetched = if live_markets.is_empty() {
            Vec::new()
        } else {
            info!(
                "Store has no usable {} rows for {:?}, fetching live",
                market, live_markets
            );
            self.fetch_live_markets(&live_markets).await
        };

        let mut assembled = Vec::with_capacity(market.markets().len());
        let mut stale_markets = Vec::new();
        let mut cached_at = now;
        let mut used_live = false;
        let mut live_failed = false;
        let mut nothing_to_show = Vec::new();

        for partition in usable {
            let fresh = newest_update(&partition.rows)
                .is_some_and(|newest| is_within(now, newest, self.config.fresh_window));
            if !fresh {
                stale_markets.push(partition.market);
            }
            assembled.push((partition.market, partition.rows));
        }

        let mut store_rows: HashMap<Market, Vec<Quote>> = insufficient
            .into_iter()
            .map(|p| (p.market, p.rows))
            .collect();

        for (m, result) in fetched {
            match result {
                Ok(batch) => {
                    used_live = true;
                    cached_at = cached_at.min(batch.started_at);
                    assembled.push((m, batch.quotes.to_vec()));
                }
                Err(e) => {
                    live_failed = true;
                    let fallback = store_rows
                        .remove(&m)
                        .filter(|rows| !rows.is_empty())
                        .or_else(|| {
                            prior
                                .as_ref()
                                .map(|entry| rows_for_market(&entry.data, m))
                                .filter(|rows| !rows.is_empty())
                        });
                    match fallback {
                        Some(rows) => {
                            warn!(
                                "Live fetch for {} failed ({}), serving {} fallback rows",
                                m,
                                e,
                                rows.len()
                            );
                            assembled.push((m, rows));
                        }
                        None => {
                            warn!("Live fetch for {} failed ({}), nothing to serve", m, e);
                            nothing_to_show.push(format!("{}: {}", m, e));
                        }
                    }
                }
            }
        }

        let quotes = Arc::new(merge_partitions(assembled));

        if live_failed {
            // The prior entry stays as it was, but the check itself counts.
            self.cache.mark_checked(market, now);
            if !stale_markets.is_empty() {
                self.spawn_background_refresh(market, stale_markets);
            }
            return AcquisitionOutcome {
                market,
                source: if quotes.is_empty() {
                    DataSource::None
                } else {
                    DataSource::Fallback
                },
                quotes,
                error: if nothing_to_show.is_empty() {
                    None
                } else {
                    Some(nothing_to_show.join("; "))
                },
                cached_at: prior.map(|entry| entry.cached_at),
            };
        }

        if stale_markets.is_empty() {
            if !self.cache.set(market, Arc::clone(&quotes), cached_at, now) {
                return self.newer_entry_or(market, quotes, cached_at);
            }
            let source = if used_live {
                DataSource::Live
            } else {
                DataSource::Store
            };
            debug!("Cached {} fresh {} quotes ({:?})", quotes.len(), market, source);
            return AcquisitionOutcome {
                market,
                quotes,
                source,
                error: None,
                cached_at: Some(cached_at),
            };
        }

        let stale_cached_at = prior.map(|entry| entry.cached_at).unwrap_or_else(|| {
            now - to_time_delta(self.config.fresh_window.saturating_sub(STALE_ENTRY_HEADROOM))
        });
        if !self.cache.set(market, Arc::clone(&quotes), stale_cached_at, now) {
            return self.newer_entry_or(market, quotes, stale_cached_at);
        }
        self.spawn_background_refresh(market, stale_markets);

        AcquisitionOutcome {
            market,
            quotes,
            source: DataSource::StaleStore,
            error: None,
            cached_at: Some(stale_cached_at),
        }
    }

    /// Called when the cache refused `quotes` because something newer landed
    /// while the store was being read. Serves whatever the cache holds now.
    fn newer_entry_or(
        &self,
        market: MarketSelector,
        quotes: Arc<Vec<Quote>>,
        cached_at: DateTime<Utc>,
    ) -> AcquisitionOutcome {
        match self.cache.get(market) {
            Some(entry) => {
                debug!("Store result for {} superseded by newer cached data", market);
                AcquisitionOutcome::from_entry(market, entry, DataSource::Memory)
            }
            None => AcquisitionOutcome {
                market,
                quotes,
                source: DataSource::Store,
                error: None,
                cached_at: Some(cached_at),
            },
        }
    }

    fn spawn_background_refresh(&self, market: MarketSelector, stale: Vec<Market>) {
        if self.background.is_running(&market) {
            debug!("Background refresh for {} already running", market);
            return;
        }
        info!(
            "Serving stale {} quotes, refreshing {:?} in the background",
            market, stale
        );
        let this = self.clone();
        // Fire and forget: the registry keeps the task alive and deduplicated.
        drop(self.background.run(market, move || async move {
            this.refresh_in_background(market, stale).await
        }));
    }

    async fn refresh_in_background(&self, market: MarketSelector, stale: Vec<Market>) {
        let fetched = self.fetch_live_markets(&stale).await;

        let mut started_at: Option<DateTime<Utc>> = None;
        let mut refreshed: HashMap<Market, Arc<Vec<Quote>>> = HashMap::new();
        for (m, result) in fetched {
            match result {
                Ok(batch) => {
                    started_at = Some(earliest(started_at, batch.started_at));
                    refreshed.insert(m, batch.quotes);
                }
                Err(e) => {
                    warn!("Background refresh of {} for {} failed: {}", m, market, e);
                    return;
                }
            }
        }
        let Some(started_at) = started_at else {
            return;
        };

        let current = self.cache.get(market);
        let partitions = market
            .markets()
            .iter()
            .map(|&m| {
                let rows = match refreshed.get(&m) {
                    Some(quotes) => quotes.to_vec(),
                    None => current
                        .as_ref()
                        .map(|entry| rows_for_market(&entry.data, m))
                        .unwrap_or_default(),
                };
                (m, rows)
            })
            .collect();
        let quotes = Arc::new(merge_partitions(partitions));
        let count = quotes.len();

        if self.cache.set(market, quotes, started_at, self.clock.now()) {
            info!("Background refresh updated {} ({} quotes)", market, count);
        } else {
            debug!("Background refresh for {} superseded by newer data", market);
        }
    }

    async fn fetch_live_markets(&self, markets: &[Market]) -> Vec<(Market, LiveFetch)> {
        join_all(
            markets
                .iter()
                .map(|&m| async move { (m, self.fetch_live(m).await) }),
        )
        .await
    }

    /// One live fetch per market at a time; concurrent callers join it.
    async fn fetch_live(&self, market: Market) -> LiveFetch {
        let this = self.clone();
        let task = self.live_fetches.run(market, move || async move {
            this.fetch_live_uncoalesced(market).await
        });
        task.await
            .unwrap_or_else(|failed| Err(Arc::new(MarketDataError::TaskFailed(failed.0))))
    }

    async fn fetch_live_uncoalesced(&self, market: Market) -> LiveFetch {
        let started_at = self.clock.now();
        let timeout = self.config.provider_timeout;

        let fetched =
            match tokio::time::timeout(timeout, self.provider.fetch_quotes(market)).await {
                Ok(result) => result,
                Err(_) => Err(MarketDataError::Timeout { market, timeout }),
            };

        let quotes = match fetched {
            Ok(raw) => normalize_quotes(market, raw),
            Err(e) => {
                warn!(
                    "Live fetch from {} for {} failed: {}",
                    self.provider.id(),
                    market,
                    e
                );
                return Err(Arc::new(e));
            }
        };

        if quotes.is_empty() {
            warn!("{} returned no quotes for {}", self.provider.id(), market);
            return Err(Arc::new(MarketDataError::EmptyResult { market }));
        }

        info!(
            "Fetched {} live {} quotes from {}",
            quotes.len(),
            market,
            self.provider.id()
        );
        let quotes = Arc::new(quotes);
        if self.config.write_through {
            self.write_through(market, Arc::clone(&quotes));
        }
        Ok(LiveBatch { quotes, started_at })
    }

    fn write_through(&self, market: Market, quotes: Arc<Vec<Quote>>) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            match store.upsert_quotes(quotes.to_vec()).await {
                Ok(written) => debug!("Stored {} live {} quotes", written, market),
                Err(e) => warn!("Failed to store live {} quotes: {}", market, e),
            }
        });
    }

    fn recover(&self, market: MarketSelector, reason: String) -> AcquisitionOutcome {
        warn!("Quote acquisition for {} failed: {}", market, reason);
        match self.cache.get(market) {
            Some(entry) => AcquisitionOutcome::from_entry(market, entry, DataSource::Fallback),
            None => AcquisitionOutcome::empty(market, reason),
        }
    }
}

fn earliest(current: Option<DateTime<Utc>>, candidate: DateTime<Utc>) -> DateTime<Utc> {
    current.map_or(candidate, |c| c.min(candidate))
}
