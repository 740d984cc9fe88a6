//! Fact Specifications
//!
//! Every fact family (price, market cap, reserves, ...) is described by a
//! `FactSpec` instead of bespoke reconciliation code. `FactCatalog` holds the
//! specs the batch reconciles.

use crate::domain::entities::exchange::Exchange;
use crate::domain::entities::source::SourceId;
use crate::domain::errors::ConfigError;
use crate::domain::value_objects::currency::Currency;
use crate::domain::value_objects::fact_key::FactKey;

/// Variance threshold for quoted prices
pub const PRICE_VARIANCE_THRESHOLD: f64 = 0.02;
/// Variance threshold for broader financial and mining figures
pub const FINANCIAL_VARIANCE_THRESHOLD: f64 = 0.05;

/// Currency assumed when a source reports a value without one
#[derive(Debug, Clone, PartialEq)]
pub enum UntaggedCurrency {
    /// The fact's expected currency
    Expected,
    /// The listing exchange's home currency
    ExchangeHome,
    Fixed(Currency),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactSpec {
    pub key: FactKey,
    /// `None` for facts not measured in money (ounces, share counts)
    pub expected_currency: Option<Currency>,
    pub variance_threshold: f64,
    pub preferred_source: Option<SourceId>,
    pub untagged_currency: UntaggedCurrency,
}

impl FactSpec {
    pub fn new(
        key: FactKey,
        expected_currency: Option<Currency>,
        variance_threshold: f64,
        preferred_source: Option<SourceId>,
    ) -> Result<Self, ConfigError> {
        if !variance_threshold.is_finite() || variance_threshold < 0.0 {
            return Err(ConfigError::InvalidThreshold {
                fact: key.column().to_string(),
                value: variance_threshold,
            });
        }
        Ok(Self {
            key,
            expected_currency,
            variance_threshold,
            preferred_source,
            untagged_currency: UntaggedCurrency::Expected,
        })
    }

    pub fn with_untagged_currency(mut self, rule: UntaggedCurrency) -> Self {
        self.untagged_currency = rule;
        self
    }

    /// Currency to tag onto an untagged reading for a company listed on `exchange`
    pub fn currency_for_untagged(&self, exchange: Exchange) -> Option<Currency> {
        self.expected_currency.as_ref()?;
        match &self.untagged_currency {
            UntaggedCurrency::Expected => self.expected_currency.clone(),
            UntaggedCurrency::ExchangeHome => Some(exchange.home_currency()),
            UntaggedCurrency::Fixed(currency) => Some(currency.clone()),
        }
    }
}

/// The set of fact specs a batch reconciles, in display order
#[derive(Debug, Clone, PartialEq)]
pub struct FactCatalog {
    specs: Vec<FactSpec>,
}

impl FactCatalog {
    pub fn new(specs: Vec<FactSpec>) -> Self {
        Self { specs }
    }

    /// Built-in catalog. Market facts prefer Yahoo Finance on disagreement;
    /// mining facts have no preferred source and fall back to the first reading.
    pub fn standard() -> Self {
        let cad = Some(Currency::cad());
        let market = |key, threshold| FactSpec {
            key,
            expected_currency: cad.clone(),
            variance_threshold: threshold,
            preferred_source: Some(SourceId::YahooFinance),
            untagged_currency: UntaggedCurrency::ExchangeHome,
        };
        let financial = |key| FactSpec {
            key,
            expected_currency: cad.clone(),
            variance_threshold: FINANCIAL_VARIANCE_THRESHOLD,
            preferred_source: Some(SourceId::YahooFinance),
            untagged_currency: UntaggedCurrency::Fixed(Currency::usd()),
        };
        let mining = |key| FactSpec {
            key,
            expected_currency: None,
            variance_threshold: FINANCIAL_VARIANCE_THRESHOLD,
            preferred_source: None,
            untagged_currency: UntaggedCurrency::Expected,
        };

        Self::new(vec![
            market(FactKey::StockPrice, PRICE_VARIANCE_THRESHOLD),
            market(FactKey::MarketCap, FINANCIAL_VARIANCE_THRESHOLD),
            FactSpec {
                preferred_source: Some(SourceId::YahooFinance),
                ..mining(FactKey::SharesOutstanding)
            },
            financial(FactKey::EnterpriseValue),
            financial(FactKey::Cash),
            financial(FactKey::Debt),
            financial(FactKey::Revenue),
            financial(FactKey::NetIncome),
            mining(FactKey::ReservesAuEqMoz),
            mining(FactKey::ResourcesAuEqMoz),
            mining(FactKey::PotentialAuEqMoz),
            mining(FactKey::ReservesGoldMoz),
            mining(FactKey::ReservesSilverMoz),
            mining(FactKey::ResourcesGoldMoz),
            mining(FactKey::ResourcesSilverMoz),
            mining(FactKey::PotentialGoldMoz),
            mining(FactKey::PotentialSilverMoz),
            mining(FactKey::ProductionAuEqKoz),
            FactSpec {
                key: FactKey::AiscLastYear,
                expected_currency: Some(Currency::usd()),
                variance_threshold: FINANCIAL_VARIANCE_THRESHOLD,
                preferred_source: None,
                untagged_currency: UntaggedCurrency::Expected,
            },
        ])
    }

    pub fn get(&self, key: FactKey) -> Option<&FactSpec> {
        self.specs.iter().find(|spec| spec.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FactSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl Default for FactCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
