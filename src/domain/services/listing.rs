//! Read model for the comparison table.
//!
//! Zero or missing facts are `None` here so that consumers render "N/A"
//! instead of a confident-looking zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use crate::domain::entities::company::CompanyRecord;
use crate::domain::errors::ConfigError;
use crate::domain::services::gold_equivalent::SILVER_GOLD_RATIO;
use crate::domain::value_objects::fact_key::FactKey;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyListing {
    pub name: String,
    pub ticker: String,
    pub exchange: String,
    pub stock_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub enterprise_value: Option<f64>,
    pub cash: Option<f64>,
    pub debt: Option<f64>,
    pub revenue: Option<f64>,
    pub net_income: Option<f64>,
    pub reserves_au_eq_moz: Option<f64>,
    pub resources_au_eq_moz: Option<f64>,
    pub potential_au_eq_moz: Option<f64>,
    pub reserves_gold_moz: Option<f64>,
    pub reserves_silver_moz: Option<f64>,
    pub resources_gold_moz: Option<f64>,
    pub resources_silver_moz: Option<f64>,
    pub potential_gold_moz: Option<f64>,
    pub potential_silver_moz: Option<f64>,
    pub production_au_eq_koz: Option<f64>,
    pub aisc_last_year: Option<f64>,
    pub ev_per_oz: Option<f64>,
    pub market_cap_per_oz: Option<f64>,
    /// Share of the gold-equivalent ounces held as gold, 0 to 100
    pub percentage_in_gold: Option<f64>,
    pub percentage_in_silver: Option<f64>,
    /// Facts whose sources disagreed on the last run
    pub flagged: Vec<FactKey>,
    pub news_link: String,
    pub last_updated: Option<DateTime<Utc>>,
}

fn usable(value: f64) -> Option<f64> {
    (value.is_finite() && value != 0.0).then_some(value)
}

/// Gold and silver shares of a per-metal split, silver counted at the
/// standard ratio. Resources are used when known, reserves otherwise.
fn metal_split(record: &CompanyRecord) -> Option<(f64, f64)> {
    let positive = |key| record.fact(key).map(|f| f.value).filter(|v| v.is_finite() && *v > 0.0);
    [FactKey::ResourcesAuEqMoz, FactKey::ReservesAuEqMoz]
        .into_iter()
        .filter_map(|key| key.metal_parts())
        .find_map(|[(gold_key, _), (silver_key, _)]| {
            let gold = positive(gold_key);
            let silver = positive(silver_key).map(|ag| ag / SILVER_GOLD_RATIO);
            let total = gold.unwrap_or(0.0) + silver.unwrap_or(0.0);
            (total > 0.0).then(|| {
                let gold_share = gold.unwrap_or(0.0) / total * 100.0;
                (gold_share, 100.0 - gold_share)
            })
        })
}

impl CompanyListing {
    pub fn from_record(record: &CompanyRecord) -> Self {
        let fact = |key| record.fact(key).and_then(|f| usable(f.value));

        let market_cap = fact(FactKey::MarketCap);
        let cash = fact(FactKey::Cash);
        let debt = fact(FactKey::Debt);
        let enterprise_value = fact(FactKey::EnterpriseValue).or_else(|| {
            market_cap
                .map(|cap| cap + debt.unwrap_or(0.0) - cash.unwrap_or(0.0))
                .and_then(usable)
        });
        let reserves = fact(FactKey::ReservesAuEqMoz).filter(|r| *r > 0.0);
        let split = metal_split(record);
        let per_oz = |value: Option<f64>| {
            value
                .zip(reserves)
                .map(|(v, moz)| v / (moz * 1_000_000.0))
        };

        Self {
            name: record.company.name.clone(),
            ticker: record.company.ticker.clone(),
            exchange: record.company.exchange().name().to_string(),
            stock_price: fact(FactKey::StockPrice),
            market_cap,
            shares_outstanding: fact(FactKey::SharesOutstanding),
            enterprise_value,
            cash,
            debt,
            revenue: fact(FactKey::Revenue),
            net_income: fact(FactKey::NetIncome),
            reserves_au_eq_moz: reserves,
            resources_au_eq_moz: fact(FactKey::ResourcesAuEqMoz),
            potential_au_eq_moz: fact(FactKey::PotentialAuEqMoz),
            reserves_gold_moz: fact(FactKey::ReservesGoldMoz),
            reserves_silver_moz: fact(FactKey::ReservesSilverMoz),
            resources_gold_moz: fact(FactKey::ResourcesGoldMoz),
            resources_silver_moz: fact(FactKey::ResourcesSilverMoz),
            potential_gold_moz: fact(FactKey::PotentialGoldMoz),
            potential_silver_moz: fact(FactKey::PotentialSilverMoz),
            production_au_eq_koz: fact(FactKey::ProductionAuEqKoz),
            aisc_last_year: fact(FactKey::AiscLastYear),
            ev_per_oz: per_oz(enterprise_value),
            market_cap_per_oz: per_oz(market_cap),
            percentage_in_gold: split.map(|(gold, _)| gold),
            percentage_in_silver: split.map(|(_, silver)| silver),
            flagged: record
                .facts
                .iter()
                .filter(|(_, f)| f.flagged)
                .map(|(key, _)| *key)
                .collect(),
            news_link: record.news_link(),
            last_updated: record.last_updated,
        }
    }

    pub fn fact(&self, key: FactKey) -> Option<f64> {
        match key {
            FactKey::StockPrice => self.stock_price,
            FactKey::MarketCap => self.market_cap,
            FactKey::SharesOutstanding => self.shares_outstanding,
            FactKey::EnterpriseValue => self.enterprise_value,
            FactKey::Cash => self.cash,
            FactKey::Debt => self.debt,
            FactKey::Revenue => self.revenue,
            FactKey::NetIncome => self.net_income,
            FactKey::ReservesAuEqMoz => self.reserves_au_eq_moz,
            FactKey::ResourcesAuEqMoz => self.resources_au_eq_moz,
            FactKey::PotentialAuEqMoz => self.potential_au_eq_moz,
            FactKey::ReservesGoldMoz => self.reserves_gold_moz,
            FactKey::ReservesSilverMoz => self.reserves_silver_moz,
            FactKey::ResourcesGoldMoz => self.resources_gold_moz,
            FactKey::ResourcesSilverMoz => self.resources_silver_moz,
            FactKey::PotentialGoldMoz => self.potential_gold_moz,
            FactKey::PotentialSilverMoz => self.potential_silver_moz,
            FactKey::ProductionAuEqKoz => self.production_au_eq_koz,
            FactKey::AiscLastYear => self.aisc_last_year,
        }
    }
}

/// Column a listing can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Ticker,
    Fact(FactKey),
    EvPerOz,
    MarketCapPerOz,
}

impl FromStr for SortKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "ticker" => Ok(SortKey::Ticker),
            "ev_per_oz" => Ok(SortKey::EvPerOz),
            "market_cap_per_oz" => Ok(SortKey::MarketCapPerOz),
            other => other.parse::<FactKey>().map(SortKey::Fact).map_err(|_| {
                ConfigError::InvalidValue {
                    key: "sort".to_string(),
                    value: s.to_string(),
                }
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn from_flag(descending: bool) -> Self {
        if descending {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        }
    }
}

fn numeric(listing: &CompanyListing, key: SortKey) -> Option<f64> {
    match key {
        SortKey::Fact(fact) => listing.fact(fact),
        SortKey::EvPerOz => listing.ev_per_oz,
        SortKey::MarketCapPerOz => listing.market_cap_per_oz,
        SortKey::Name | SortKey::Ticker => None,
    }
}

/// Stable sort; rows without a value go last in either order
pub fn sort_listings(listings: &mut [CompanyListing], key: SortKey, order: SortOrder) {
    let directed = |ordering: Ordering| match order {
        SortOrder::Ascending => ordering,
        SortOrder::Descending => ordering.reverse(),
    };

    listings.sort_by(|a, b| match key {
        SortKey::Name => directed(a.name.to_lowercase().cmp(&b.name.to_lowercase())),
        SortKey::Ticker => directed(a.ticker.cmp(&b.ticker)),
        _ => match (numeric(a, key), numeric(b, key)) {
            (Some(x), Some(y)) => directed(x.total_cmp(&y)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    });
}

/// Case-insensitive match on name or ticker; an empty query keeps everything
pub fn filter_listings(listings: Vec<CompanyListing>, query: &str) -> Vec<CompanyListing> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return listings;
    }
    listings
        .into_iter()
        .filter(|l| l.name.to_lowercase().contains(&query) || l.ticker.to_lowercase().contains(&query))
        .collect()
}

/// `1.23B`, `45.60M`, `5.09`, or `N/A`
pub fn format_value(value: Option<f64>) -> String {
    match value {
        None => "N/A".to_string(),
        Some(v) if v.abs() >= 1e9 => format!("{:.2}B", v / 1e9),
        Some(v) if v.abs() >= 1e6 => format!("{:.2}M", v / 1e6),
        Some(v) => format!("{:.2}", v),
    }
}

const TABLE_FACTS: [FactKey; 6] = [
    FactKey::StockPrice,
    FactKey::MarketCap,
    FactKey::EnterpriseValue,
    FactKey::ReservesAuEqMoz,
    FactKey::ResourcesAuEqMoz,
    FactKey::AiscLastYear,
];

/// Plain-text comparison table; flagged values carry a `*`
pub fn render_table(listings: &[CompanyListing]) -> String {
    let mut header = vec!["Ticker".to_string(), "Name".to_string()];
    header.extend(TABLE_FACTS.iter().map(|k| k.label().to_string()));
    header.push("EV/oz".to_string());

    let mut rows = vec![header];
    for listing in listings {
        let mut row = vec![listing.ticker.clone(), listing.name.clone()];
        for key in TABLE_FACTS {
            let mut cell = format_value(listing.fact(key));
            if listing.flagged.contains(&key) && listing.fact(key).is_some() {
                cell.push('*');
            }
            row.push(cell);
        }
        row.push(format_value(listing.ev_per_oz));
        rows.push(row);
    }

    let columns = rows[0].len();
    let widths: Vec<usize> = (0..columns)
        .map(|i| rows.iter().map(|r| r[i].chars().count()).max().unwrap_or(0))
        .collect();

    rows.iter()
        .map(|row| {
            row.iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = width))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
