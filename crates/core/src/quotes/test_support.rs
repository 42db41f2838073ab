//! Hand-written mocks shared by the quote tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use stockdash_market_data::{LiveQuoteProvider, Market, MarketDataError, Quote};
use tokio::sync::Semaphore;

use super::store::QuoteStore;
use crate::errors::{DatabaseError, Error, Result};

/// Fixed "now" of the tests.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// `count` distinct quotes for `market`, all updated at `updated`.
pub fn make_quotes(market: Market, count: usize, updated: DateTime<Utc>) -> Vec<Quote> {
    let prefix = match market {
        Market::Us => "US",
        Market::Saudi => "SA",
    };
    (0..count)
        .map(|i| {
            Quote::new(
                market,
                format!("{}{:03}", prefix, i),
                format!("{} company {}", market, i),
                Decimal::from(10 + i as i64),
                updated,
            )
        })
        .collect()
}

/// Polls `condition` until it holds or roughly a second has passed.
pub async fn wait_for(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

// =========================================================================
// Mock QuoteStore
// =========================================================================

#[derive(Clone, Default)]
pub struct MockQuoteStore {
    rows: Arc<Mutex<HashMap<Market, Vec<Quote>>>>,
    reads: Arc<Mutex<Vec<Market>>>,
    counts: Arc<Mutex<Vec<Market>>>,
    upserts: Arc<Mutex<Vec<Vec<Quote>>>>,
    fail_reads: Arc<Mutex<bool>>,
    fail_counts: Arc<Mutex<bool>>,
    read_gate: Arc<Mutex<Option<Arc<Semaphore>>>>,
}

impl MockQuoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(self, market: Market, rows: Vec<Quote>) -> Self {
        self.rows.lock().unwrap().insert(market, rows);
        self
    }

    pub fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.lock().unwrap() = fail;
    }

    pub fn set_fail_counts(&self, fail: bool) {
        *self.fail_counts.lock().unwrap() = fail;
    }

    /// Makes every read wait until [`release_reads`](Self::release_reads).
    pub fn hold_reads(&self) {
        *self.read_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_reads(&self) {
        if let Some(gate) = self.read_gate.lock().unwrap().take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn reads(&self) -> Vec<Market> {
        self.reads.lock().unwrap().clone()
    }

    pub fn counts(&self) -> Vec<Market> {
        self.counts.lock().unwrap().clone()
    }

    pub fn upserts(&self) -> Vec<Vec<Quote>> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn stored(&self, market: Market) -> Vec<Quote> {
        self.rows
            .lock()
            .unwrap()
            .get(&market)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl QuoteStore for MockQuoteStore {
    async fn quotes_for_market(&self, market: Market) -> Result<Vec<Quote>> {
        self.reads.lock().unwrap().push(market);
        let gate = self.read_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await;
        }
        if *self.fail_reads.lock().unwrap() {
            return Err(Error::Database(DatabaseError::ConnectionFailed(
                "connection refused".into(),
            )));
        }
        Ok(self.stored(market))
    }

    async fn count_for_market(&self, market: Market) -> Result<usize> {
        self.counts.lock().unwrap().push(market);
        if *self.fail_counts.lock().unwrap() {
            return Err(Error::Database(DatabaseError::QueryFailed(
                "count failed".into(),
            )));
        }
        Ok(self.stored(market).len())
    }

    async fn upsert_quotes(&self, quotes: Vec<Quote>) -> Result<usize> {
        self.upserts.lock().unwrap().push(quotes.clone());
        let written = quotes.len();
        let mut rows = self.rows.lock().unwrap();
        for quote in quotes {
            let partition = rows.entry(quote.market).or_default();
            partition.retain(|q| q.symbol != quote.symbol);
            partition.push(quote);
        }
        Ok(written)
    }
}

// =========================================================================
// Mock LiveQuoteProvider
// =========================================================================

#[derive(Clone)]
pub enum MockResponse {
    Quotes(Vec<Quote>),
    Fail(String),
    Hang,
}

#[derive(Clone, Default)]
pub struct MockProvider {
    responses: Arc<Mutex<HashMap<Market, MockResponse>>>,
    calls: Arc<Mutex<Vec<Market>>>,
    completed: Arc<AtomicUsize>,
    gate: Arc<Mutex<Option<Arc<Semaphore>>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, market: Market, response: MockResponse) -> Self {
        self.responses.lock().unwrap().insert(market, response);
        self
    }

    /// Makes every call wait until [`release`](Self::release).
    pub fn hold(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn calls(&self) -> Vec<Market> {
        self.calls.lock().unwrap().clone()
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LiveQuoteProvider for MockProvider {
    fn id(&self) -> &'static str {
        "MOCK"
    }

    async fn fetch_quotes(&self, market: Market) -> std::result::Result<Vec<Quote>, MarketDataError> {
        self.calls.lock().unwrap().push(market);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await;
        }

        let response = self.responses.lock().unwrap().get(&market).cloned();
        let result = match response {
            Some(MockResponse::Quotes(quotes)) => Ok(quotes),
            Some(MockResponse::Fail(message)) => Err(MarketDataError::ProviderError { market, message }),
            Some(MockResponse::Hang) => std::future::pending().await,
            None => Ok(Vec::new()),
        };
        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}
