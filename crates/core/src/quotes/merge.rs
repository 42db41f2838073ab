//! Helpers for splitting and joining per-market quote lists.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use stockdash_market_data::{Market, Quote};

/// The most recent `last_updated` among `quotes`.
pub fn newest_update(quotes: &[Quote]) -> Option<DateTime<Utc>> {
    quotes.iter().map(|q| q.last_updated).max()
}

/// Rows of `quotes` that belong to `market`.
pub fn rows_for_market(quotes: &[Quote], market: Market) -> Vec<Quote> {
    quotes
        .iter()
        .filter(|q| q.market == market)
        .cloned()
        .collect()
}

/// Concatenates per-market lists in [`Market::ALL`] order.
///
/// Each (market, symbol) pair appears once; the first occurrence wins, so
/// callers pass already-normalized partitions.
pub fn merge_partitions(mut partitions: Vec<(Market, Vec<Quote>)>) -> Vec<Quote> {
    partitions.sort_by_key(|(market, _)| *market);

    let total = partitions.iter().map(|(_, rows)| rows.len()).sum();
    let mut seen: HashSet<(Market, String)> = HashSet::with_capacity(total);
    let mut merged = Vec::with_capacity(total);

    for (_, rows) in partitions {
        for quote in rows {
            if seen.insert((quote.market, quote.symbol.clone())) {
                merged.push(quote);
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use rust_decimal_macros::dec;

    #[test]
    fn test_merge_orders_markets_and_drops_duplicates() {
        let now = Utc::now();
        let saudi = vec![Quote::new(Market::Saudi, "2222", "Aramco", dec!(27.9), now)];
        let us = vec![
            Quote::new(Market::Us, "AAPL", "Apple", dec!(189), now),
            Quote::new(Market::Us, "AAPL", "Apple", dec!(190), now),
            Quote::new(Market::Us, "MSFT", "Microsoft", dec!(410), now),
        ];

        let merged = merge_partitions(vec![(Market::Saudi, saudi), (Market::Us, us)]);

        let keys: Vec<(Market, &str)> = merged
            .iter()
            .map(|q| (q.market, q.symbol.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (Market::Us, "AAPL"),
                (Market::Us, "MSFT"),
                (Market::Saudi, "2222")
            ]
        );
        assert_eq!(merged[0].price, dec!(189));
    }

    #[test]
    fn test_newest_update() {
        let now = Utc::now();
        let rows = vec![
            Quote::new(Market::Us, "A", "A", dec!(1), now - TimeDelta::minutes(5)),
            Quote::new(Market::Us, "B", "B", dec!(1), now),
        ];
        assert_eq!(newest_update(&rows), Some(now));
        assert_eq!(newest_update(&[]), None);
    }

    #[test]
    fn test_rows_for_market() {
        let now = Utc::now();
        let rows = vec![
            Quote::new(Market::Us, "A", "A", dec!(1), now),
            Quote::new(Market::Saudi, "1120", "Al Rajhi", dec!(85), now),
        ];
        let saudi = rows_for_market(&rows, Market::Saudi);
        assert_eq!(saudi.len(), 1);
        assert_eq!(saudi[0].symbol, "1120");
    }
}
