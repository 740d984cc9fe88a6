use serde::{Deserialize, Serialize};

use crate::domain::entities::source::SourceId;
use crate::domain::value_objects::currency::Currency;
use crate::domain::value_objects::fact_key::FactKey;

/// One source's observation of one fact, possibly absent.
///
/// `currency: None` means the source did not report one; the reconciler then
/// assumes the fact's expected currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub source: SourceId,
    pub value: Option<f64>,
    pub currency: Option<Currency>,
}

impl Reading {
    pub fn new(source: SourceId, value: f64, currency: Option<Currency>) -> Self {
        Self {
            source,
            value: Some(value),
            currency,
        }
    }

    pub fn in_currency(source: SourceId, value: f64, currency: Currency) -> Self {
        Self::new(source, value, Some(currency))
    }

    /// A source that was asked but had nothing usable
    pub fn missing(source: SourceId) -> Self {
        Self {
            source,
            value: None,
            currency: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metal {
    Gold,
    Silver,
    /// A figure the source already states in gold-equivalent ounces
    #[serde(rename = "au_eq")]
    GoldEquivalent,
}

/// Raw value a source reported, before any currency or metal normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Observed {
    Amount {
        value: f64,
        currency: Option<Currency>,
    },
    /// Ounces of a metal, in the unit of the fact (Moz or koz)
    Metal { metal: Metal, quantity: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub fact: FactKey,
    pub value: Observed,
}

/// Everything one source returned for one company in a single fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSnapshot {
    pub source: SourceId,
    pub observations: Vec<Observation>,
    pub reported_name: Option<String>,
}

impl SourceSnapshot {
    pub fn new(source: SourceId) -> Self {
        Self {
            source,
            observations: Vec::new(),
            reported_name: None,
        }
    }

    /// Record a monetary or count value; non-finite values are ignored
    pub fn amount(mut self, fact: FactKey, value: Option<f64>, currency: Option<Currency>) -> Self {
        if let Some(value) = value.filter(|v| v.is_finite()) {
            self.observations.push(Observation {
                fact,
                value: Observed::Amount { value, currency },
            });
        }
        self
    }

    pub fn metal(mut self, fact: FactKey, metal: Metal, quantity: f64) -> Self {
        if quantity.is_finite() {
            self.observations.push(Observation {
                fact,
                value: Observed::Metal { metal, quantity },
            });
        }
        self
    }

    pub fn with_reported_name(mut self, name: Option<String>) -> Self {
        self.reported_name = name.filter(|n| !n.trim().is_empty());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations_for(&self, fact: FactKey) -> impl Iterator<Item = &Observed> {
        self.observations
            .iter()
            .filter(move |o| o.fact == fact)
            .map(|o| &o.value)
    }

    /// Keep the earlier of two snapshots' observations for a fact and add the rest
    pub fn merge(mut self, other: SourceSnapshot) -> Self {
        for observation in other.observations {
            if !self.observations.iter().any(|o| o.fact == observation.fact) {
                self.observations.push(observation);
            }
        }
        if self.reported_name.is_none() {
            self.reported_name = other.reported_name;
        }
        self
    }
}
