use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::entities::exchange::Exchange;
use crate::domain::errors::ValidationError;
use crate::domain::value_objects::fact_key::FactKey;

/// A tracked company as listed in the input file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub ticker: String,
    pub name: String,
    pub name_alt: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

impl Company {
    pub fn new(ticker: &str, name: &str) -> Result<Self, ValidationError> {
        let ticker = ticker.trim();
        if ticker.is_empty()
            || ticker.eq_ignore_ascii_case("undefined")
            || ticker.chars().any(char::is_whitespace)
        {
            return Err(ValidationError::InvalidTicker(ticker.to_string()));
        }
        Ok(Self {
            ticker: ticker.to_ascii_uppercase(),
            name: name.trim().to_string(),
            name_alt: None,
            website: None,
        })
    }

    pub fn with_name_alt(mut self, name_alt: Option<&str>) -> Self {
        self.name_alt = name_alt
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        self
    }

    /// Company home page, normalized without a trailing slash
    pub fn with_website(mut self, website: Option<&str>) -> Self {
        self.website = website
            .map(|w| w.trim().trim_end_matches('/'))
            .filter(|w| w.starts_with("http://") || w.starts_with("https://"))
            .map(str::to_string);
        self
    }

    pub fn exchange(&self) -> Exchange {
        Exchange::from_ticker(&self.ticker)
    }

    pub fn ticker_root(&self) -> &str {
        self.exchange().ticker_root(&self.ticker)
    }

    /// Company news page used when no explicit link is stored
    pub fn default_news_link(&self) -> String {
        format!(
            "https://www.miningfeeds.com/company/{}/",
            self.ticker_root().to_ascii_lowercase()
        )
    }
}

/// Latest stored value of one fact
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredFact {
    pub value: f64,
    #[serde(default)]
    pub flagged: bool,
}

/// All persisted facts for one ticker. Created on first write, overwritten
/// fact by fact afterwards, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    #[serde(flatten)]
    pub company: Company,
    #[serde(default)]
    pub facts: BTreeMap<FactKey, StoredFact>,
    #[serde(default)]
    pub news_link: Option<String>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl CompanyRecord {
    pub fn new(company: Company) -> Self {
        Self {
            company,
            facts: BTreeMap::new(),
            news_link: None,
            last_updated: None,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.company.ticker
    }

    pub fn fact(&self, key: FactKey) -> Option<StoredFact> {
        self.facts.get(&key).copied()
    }

    pub fn news_link(&self) -> String {
        self.news_link
            .clone()
            .unwrap_or_else(|| self.company.default_news_link())
    }
}
