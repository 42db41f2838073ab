//! Live quote views for consumers.
//!
//! [`QuoteSubscriptions::subscribe`] mounts a view for one selector: it runs
//! the initial acquisition, fires the store self-heal, and keeps the view in
//! sync with cache replacements made by background refreshes. The view is a
//! `tokio::sync::watch` channel of [`QuotesView`] snapshots.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use stockdash_market_data::{MarketSelector, Quote};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::acquisition::{AcquisitionOutcome, DataSource, QuoteAcquisitionService};
use super::cache::CacheEntry;
use super::seed::StoreSeeder;

/// Snapshot of one subscription.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotesView {
    pub market: MarketSelector,
    pub data: Arc<Vec<Quote>>,
    /// True only while nothing (fresh or stale) is available to show
    pub loading: bool,
    pub error: Option<String>,
    pub source: Option<DataSource>,
    pub cached_at: Option<DateTime<Utc>>,
}

impl QuotesView {
    fn loading(market: MarketSelector) -> Self {
        Self {
            market,
            data: Arc::new(Vec::new()),
            loading: true,
            error: None,
            source: None,
            cached_at: None,
        }
    }

    fn apply_outcome(&mut self, outcome: AcquisitionOutcome) {
        if !outcome.quotes.is_empty() {
            self.data = outcome.quotes;
            self.source = Some(outcome.source);
            self.cached_at = outcome.cached_at;
        }
        self.error = outcome.error;
        self.loading = false;
    }

    fn apply_entry(&mut self, entry: CacheEntry) {
        // Already applied through the outcome that produced it.
        if entry.data.is_empty() || Arc::ptr_eq(&self.data, &entry.data) {
            return;
        }
        self.data = entry.data;
        self.cached_at = Some(entry.cached_at);
        self.source = Some(DataSource::Memory);
        self.error = None;
        self.loading = false;
    }
}

/// Entry point for consumers of market quotes.
#[derive(Clone)]
pub struct QuoteSubscriptions {
    service: QuoteAcquisitionService,
    seeder: StoreSeeder,
}

impl QuoteSubscriptions {
    pub fn new(service: QuoteAcquisitionService, seeder: StoreSeeder) -> Self {
        Self { service, seeder }
    }

    pub fn service(&self) -> &QuoteAcquisitionService {
        &self.service
    }

    /// Mounts a live view for `market`. Must be called within a tokio runtime.
    pub fn subscribe(&self, market: MarketSelector) -> MarketQuotes {
        let cached = self.service.try_cached(market);
        let needs_acquisition = cached.is_none();

        let mut initial = QuotesView::loading(market);
        if let Some(outcome) = cached {
            initial.apply_outcome(outcome);
        }

        let (tx, rx) = watch::channel(initial);
        let tx = Arc::new(tx);

        // Subscribe before acquiring so no replacement is missed.
        let changes = self.service.cache().subscribe();
        tokio::spawn(follow_cache(
            self.service.clone(),
            market,
            changes,
            Arc::clone(&tx),
        ));

        let seeder = self.seeder.clone();
        tokio::spawn(async move {
            match seeder.populate_if_empty().await {
                Ok(0) => {}
                Ok(inserted) => debug!("Self-heal stored {} quotes", inserted),
                Err(e) => warn!("Self-heal populate failed: {}", e),
            }
        });

        if needs_acquisition {
            let service = self.service.clone();
            let tx = Arc::clone(&tx);
            tokio::spawn(async move {
                let outcome = service.get_quotes(market).await;
                tx.send_modify(|view| view.apply_outcome(outcome));
            });
        }

        MarketQuotes {
            market,
            rx,
            tx,
            service: self.service.clone(),
        }
    }
}

/// Applies cache replacements for `market` until every receiver is gone.
async fn follow_cache(
    service: QuoteAcquisitionService,
    market: MarketSelector,
    mut changes: broadcast::Receiver<MarketSelector>,
    tx: Arc<watch::Sender<QuotesView>>,
) {
    loop {
        tokio::select! {
            _ = tx.closed() => break,
            change = changes.recv() => match change {
                Ok(key) if key == market => {
                    if let Some(entry) = service.cache().get(market) {
                        tx.send_modify(|view| view.apply_entry(entry));
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Subscription for {} skipped {} cache events", market, skipped);
                    if let Some(entry) = service.cache().get(market) {
                        tx.send_modify(|view| view.apply_entry(entry));
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    debug!("Subscription for {} closed", market);
}

/// A mounted view of one selector.
pub struct MarketQuotes {
    market: MarketSelector,
    rx: watch::Receiver<QuotesView>,
    tx: Arc<watch::Sender<QuotesView>>,
    service: QuoteAcquisitionService,
}

impl MarketQuotes {
    pub fn market(&self) -> MarketSelector {
        self.market
    }

    pub fn view(&self) -> QuotesView {
        self.rx.borrow().clone()
    }

    /// Waits for the next update; false once the view can no longer change.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// An additional receiver of the same view.
    pub fn watch(&self) -> watch::Receiver<QuotesView> {
        self.rx.clone()
    }

    /// Forces a live refresh. The returned handle may be ignored.
    pub fn refresh(&self) -> JoinHandle<()> {
        self.tx.send_if_modified(|view| {
            if view.data.is_empty() && !view.loading {
                view.loading = true;
                true
            } else {
                false
            }
        });

        let service = self.service.clone();
        let tx = Arc::clone(&self.tx);
        let market = self.market;
        tokio::spawn(async move {
            let outcome = service.force_refresh(market).await;
            tx.send_modify(|view| view.apply_outcome(outcome));
        })
    }
}
