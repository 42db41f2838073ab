use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

/// An exchange partition of the persisted quote dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Us,
    Saudi,
}

impl Market {
    /// Every persisted partition, in merge order.
    pub const ALL: [Market; 2] = [Market::Us, Market::Saudi];

    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Us => "us",
            Market::Saudi => "saudi",
        }
    }
}

impl FromStr for Market {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "us" => Ok(Market::Us),
            "saudi" => Ok(Market::Saudi),
            _ => Err(MarketDataError::InvalidMarket(s.to_string())),
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache key for quote acquisition.
///
/// `All` is not a store partition: it is the client-side union of every
/// [`Market`], fetched per market and cached under its own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarketSelector {
    Us,
    Saudi,
    #[default]
    All,
}

impl MarketSelector {
    pub const VARIANTS: [MarketSelector; 3] =
        [MarketSelector::Us, MarketSelector::Saudi, MarketSelector::All];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketSelector::Us => "us",
            MarketSelector::Saudi => "saudi",
            MarketSelector::All => "all",
        }
    }

    /// The store partitions this selector spans.
    pub fn markets(&self) -> &'static [Market] {
        match self {
            MarketSelector::Us => &[Market::Us],
            MarketSelector::Saudi => &[Market::Saudi],
            MarketSelector::All => &Market::ALL,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, MarketSelector::All)
    }
}

impl From<Market> for MarketSelector {
    fn from(market: Market) -> Self {
        match market {
            Market::Us => MarketSelector::Us,
            Market::Saudi => MarketSelector::Saudi,
        }
    }
}

impl FromStr for MarketSelector {
    type Err = MarketDataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(MarketSelector::All),
            other => other.parse::<Market>().map(MarketSelector::from),
        }
    }
}

impl fmt::Display for MarketSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_markets() {
        assert_eq!(MarketSelector::Us.markets(), &[Market::Us]);
        assert_eq!(MarketSelector::Saudi.markets(), &[Market::Saudi]);
        assert_eq!(MarketSelector::All.markets(), &[Market::Us, Market::Saudi]);
    }

    #[test]
    fn test_selector_parse() {
        assert_eq!("ALL".parse::<MarketSelector>().unwrap(), MarketSelector::All);
        assert_eq!(" saudi ".parse::<MarketSelector>().unwrap(), MarketSelector::Saudi);
        assert!(matches!(
            "eu".parse::<MarketSelector>(),
            Err(MarketDataError::InvalidMarket(_))
        ));
    }

    #[test]
    fn test_market_rejects_all() {
        assert!("all".parse::<Market>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&MarketSelector::Saudi).unwrap();
        assert_eq!(json, "\"saudi\"");
        let market: Market = serde_json::from_str("\"us\"").unwrap();
        assert_eq!(market, Market::Us);
    }
}
