use serde::{Deserialize, Serialize};

use crate::domain::value_objects::currency::Currency;

/// Listing venue, derived from the ticker suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Tsx,
    TsxVenture,
    Cse,
    Us,
}

impl Exchange {
    pub fn from_ticker(ticker: &str) -> Self {
        let upper = ticker.trim().to_ascii_uppercase();
        if upper.ends_with(".TO") {
            Exchange::Tsx
        } else if upper.ends_with(".V") {
            Exchange::TsxVenture
        } else if upper.ends_with(".CN") || upper.ends_with(".CNX") {
            Exchange::Cse
        } else {
            Exchange::Us
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Exchange::Tsx => "tsx",
            Exchange::TsxVenture => "tsxv",
            Exchange::Cse => "cse",
            Exchange::Us => "us",
        }
    }

    /// Currency a listing quotes in when a source does not say
    pub fn home_currency(&self) -> Currency {
        match self {
            Exchange::Us => Currency::usd(),
            Exchange::Tsx | Exchange::TsxVenture | Exchange::Cse => Currency::cad(),
        }
    }

    /// Exchange segment of MiningFeeds stock URLs; US listings are not covered
    pub fn mining_feeds_slug(&self) -> Option<&'static str> {
        match self {
            Exchange::Tsx => Some("tsx"),
            Exchange::TsxVenture => Some("tsxv"),
            Exchange::Cse => Some("cse"),
            Exchange::Us => None,
        }
    }

    pub fn tradingview_prefix(&self) -> Option<&'static str> {
        match self {
            Exchange::Tsx => Some("TSX"),
            Exchange::TsxVenture => Some("TSXV"),
            Exchange::Cse => Some("CSE"),
            Exchange::Us => None,
        }
    }

    /// Ticker without the venue suffix (`ABX.TO` -> `ABX`)
    pub fn ticker_root<'a>(&self, ticker: &'a str) -> &'a str {
        let ticker = ticker.trim();
        match self {
            Exchange::Us => ticker,
            _ => ticker.rsplit_once('.').map(|(root, _)| root).unwrap_or(ticker),
        }
    }
}
