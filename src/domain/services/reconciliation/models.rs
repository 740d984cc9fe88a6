//! Reconciliation output types

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::entities::source::SourceId;
use crate::domain::value_objects::currency::Currency;
use crate::domain::value_objects::fact_key::FactKey;

/// What one source said about a fact, as received and after normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceObservation {
    pub source: SourceId,
    pub raw_value: Option<f64>,
    pub raw_currency: Option<Currency>,
    /// Value in the fact's expected currency; `None` if the reading was dropped
    pub normalized: Option<f64>,
}

/// Result of reconciling one fact for one ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFact {
    pub key: FactKey,
    /// Resolved value; 0 when no source had usable data
    pub value: f64,
    pub currency: Option<Currency>,
    /// Sources that contributed a usable value, in input order
    pub contributing_sources: Vec<SourceId>,
    /// max - min over the usable values
    pub variance: f64,
    pub relative_variance: f64,
    pub flagged: bool,
    pub timestamp: DateTime<Utc>,
    pub observations: Vec<SourceObservation>,
}

impl ResolvedFact {
    /// Whether any source contributed. A fact without data carries the
    /// zero default and must not overwrite a stored value.
    pub fn has_data(&self) -> bool {
        !self.contributing_sources.is_empty()
    }

    /// Equality ignoring the resolution time
    pub fn same_outcome(&self, other: &ResolvedFact) -> bool {
        self.key == other.key
            && self.value == other.value
            && self.currency == other.currency
            && self.contributing_sources == other.contributing_sources
            && self.variance == other.variance
            && self.relative_variance == other.relative_variance
            && self.flagged == other.flagged
            && self.observations == other.observations
    }
}

/// One provenance line: a reconciled fact attributed to its ticker
#[derive(Debug, Clone, PartialEq)]
pub struct ProvenanceEntry {
    pub ticker: String,
    pub fact: ResolvedFact,
}

impl ProvenanceEntry {
    pub fn new(ticker: &str, fact: ResolvedFact) -> Self {
        Self {
            ticker: ticker.to_string(),
            fact,
        }
    }
}

pub(crate) fn format_amount(value: f64) -> String {
    if value.abs() >= 1000.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.4}", value)
    }
}

fn with_unit(value: String, currency: Option<&Currency>) -> String {
    match currency {
        Some(currency) => format!("{} {}", value, currency),
        None => value,
    }
}

/// `[ts] TICKER fact: src=value CUR, ..., Variance=x, Resolved=y CUR`
impl fmt::Display for ProvenanceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fact = &self.fact;
        write!(
            f,
            "[{}] {} {}: ",
            fact.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.ticker,
            fact.key
        )?;

        for observation in &fact.observations {
            let raw = match observation.raw_value {
                Some(value) => with_unit(format_amount(value), observation.raw_currency.as_ref()),
                None => "N/A".to_string(),
            };
            write!(f, "{}={}, ", observation.source, raw)?;
        }

        write!(
            f,
            "Variance={}, Resolved={}",
            format_amount(fact.variance),
            with_unit(format_amount(fact.value), fact.currency.as_ref())
        )?;
        if fact.flagged {
            f.write_str(" FLAGGED")?;
        }
        Ok(())
    }
}
