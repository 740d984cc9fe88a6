use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::ConfigError;

/// Identifies where a reading came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    YahooFinance,
    AlphaVantage,
    FinancialModelingPrep,
    #[serde(rename = "tradingview")]
    TradingView,
    MiningFeeds,
    JuniorMiningNetwork,
    CompanyWebsite,
    InvestorPresentation,
    Manual,
}

impl SourceId {
    pub const ALL: [SourceId; 9] = [
        SourceId::YahooFinance,
        SourceId::AlphaVantage,
        SourceId::FinancialModelingPrep,
        SourceId::TradingView,
        SourceId::MiningFeeds,
        SourceId::JuniorMiningNetwork,
        SourceId::CompanyWebsite,
        SourceId::InvestorPresentation,
        SourceId::Manual,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SourceId::YahooFinance => "yahoo_finance",
            SourceId::AlphaVantage => "alpha_vantage",
            SourceId::FinancialModelingPrep => "financial_modeling_prep",
            SourceId::TradingView => "tradingview",
            SourceId::MiningFeeds => "mining_feeds",
            SourceId::JuniorMiningNetwork => "junior_mining_network",
            SourceId::CompanyWebsite => "company_website",
            SourceId::InvestorPresentation => "investor_presentation",
            SourceId::Manual => "manual",
        }
    }

    /// Sources that need an API key to be usable
    pub fn requires_api_key(&self) -> bool {
        matches!(self, SourceId::AlphaVantage | SourceId::FinancialModelingPrep)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SourceId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        let source = match normalized.as_str() {
            "yahoo" | "yahoo_finance" => SourceId::YahooFinance,
            "alpha_vantage" | "alphavantage" => SourceId::AlphaVantage,
            "fmp" | "financial_modeling_prep" => SourceId::FinancialModelingPrep,
            "tradingview" | "trading_view" => SourceId::TradingView,
            "miningfeeds" | "mining_feeds" => SourceId::MiningFeeds,
            "jmn" | "junior_mining_network" => SourceId::JuniorMiningNetwork,
            "website" | "company_website" => SourceId::CompanyWebsite,
            "pdf" | "presentation" | "investor_presentation" => SourceId::InvestorPresentation,
            "manual" => SourceId::Manual,
            _ => return Err(ConfigError::UnknownSource(s.to_string())),
        };
        Ok(source)
    }
}
