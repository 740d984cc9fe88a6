//! Multi-source Reconciler
//!
//! Merges the readings several sources gave for one fact into a single
//! `ResolvedFact`:
//!
//! - readings without a value, with a non-finite value, or in a currency that
//!   cannot be converted are dropped
//! - no usable reading resolves to `0`, unflagged, with no sources
//! - a single usable reading passes through unchanged
//! - several readings are averaged when their spread relative to the
//!   reference value stays within the fact's threshold; otherwise the
//!   preferred source's value (or the first one) wins and the fact is flagged
//!
//! The reconciler performs no I/O and holds no mutable state.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use super::fact_spec::FactSpec;
use super::models::{format_amount, ResolvedFact, SourceObservation};
use crate::domain::entities::source::SourceId;
use crate::domain::services::currency_converter::CurrencyConverter;
use crate::domain::value_objects::reading::Reading;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Resolution {
    value: f64,
    variance: f64,
    relative_variance: f64,
    flagged: bool,
}

pub struct Reconciler {
    converter: Arc<dyn CurrencyConverter>,
}

impl Reconciler {
    pub fn new(converter: Arc<dyn CurrencyConverter>) -> Self {
        Self { converter }
    }

    pub fn reconcile(&self, spec: &FactSpec, readings: &[Reading]) -> ResolvedFact {
        self.reconcile_at(spec, readings, Utc::now())
    }

    pub fn reconcile_at(
        &self,
        spec: &FactSpec,
        readings: &[Reading],
        now: DateTime<Utc>,
    ) -> ResolvedFact {
        let mut observations = Vec::with_capacity(readings.len());
        let mut valid: Vec<(SourceId, f64)> = Vec::with_capacity(readings.len());

        for reading in readings {
            let normalized = self.normalize(spec, reading);
            if let Some(value) = normalized {
                valid.push((reading.source, value));
            }
            observations.push(SourceObservation {
                source: reading.source,
                raw_value: reading.value,
                raw_currency: reading.currency.clone(),
                normalized,
            });
        }

        let resolution = resolve(spec, &valid);
        let fact = ResolvedFact {
            key: spec.key,
            value: resolution.value,
            currency: spec.expected_currency.clone(),
            contributing_sources: valid.iter().map(|(source, _)| *source).collect(),
            variance: resolution.variance,
            relative_variance: resolution.relative_variance,
            flagged: resolution.flagged,
            timestamp: now,
            observations,
        };

        info!(
            fact = %fact.key,
            readings = %summarize(&fact.observations),
            variance = fact.variance,
            resolved = %format_amount(fact.value),
            flagged = fact.flagged,
            "Reconciled"
        );
        if fact.flagged {
            warn!(
                fact = %fact.key,
                relative_variance = fact.relative_variance,
                threshold = spec.variance_threshold,
                "Sources disagree, kept preferred value"
            );
        }

        fact
    }

    /// Reading value in the fact's expected currency, or `None` if unusable
    fn normalize(&self, spec: &FactSpec, reading: &Reading) -> Option<f64> {
        let value = reading.value.filter(|v| v.is_finite())?;
        let Some(target) = &spec.expected_currency else {
            return Some(value);
        };
        let from = reading.currency.as_ref().unwrap_or(target);
        let converted = self.converter.convert(value, from, target);
        if converted.is_none() {
            warn!(
                fact = %spec.key,
                source = %reading.source,
                from = %from,
                to = %target,
                "No exchange rate, dropping reading"
            );
        }
        converted
    }
}

fn resolve(spec: &FactSpec, valid: &[(SourceId, f64)]) -> Resolution {
    let (first, rest) = match valid {
        [] => {
            return Resolution {
                value: 0.0,
                variance: 0.0,
                relative_variance: 0.0,
                flagged: false,
            }
        }
        [first, rest @ ..] => (first.1, rest),
    };
    if rest.is_empty() {
        return Resolution {
            value: first,
            variance: 0.0,
            relative_variance: 0.0,
            flagged: false,
        };
    }

    let (min, max) = valid
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), (_, v)| {
            (min.min(*v), max.max(*v))
        });
    let variance = max - min;

    let reference = spec
        .preferred_source
        .and_then(|preferred| valid.iter().find(|(source, _)| *source == preferred))
        .map(|(_, value)| *value)
        .unwrap_or(first);
    let relative_variance = relative_to(variance, reference);

    if relative_variance <= spec.variance_threshold {
        let mean = valid.iter().map(|(_, v)| v).sum::<f64>() / valid.len() as f64;
        Resolution {
            value: mean,
            variance,
            relative_variance,
            flagged: false,
        }
    } else {
        Resolution {
            value: reference,
            variance,
            relative_variance,
            flagged: true,
        }
    }
}

/// Spread relative to the reference magnitude. A zero reference is only
/// agreement when every reading is zero.
fn relative_to(variance: f64, reference: f64) -> f64 {
    if reference == 0.0 {
        if variance == 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        variance / reference.abs()
    }
}

fn summarize(observations: &[SourceObservation]) -> String {
    observations
        .iter()
        .map(|o| match (o.raw_value, &o.raw_currency) {
            (Some(v), Some(c)) => format!("{}={} {}", o.source, format_amount(v), c),
            (Some(v), None) => format!("{}={}", o.source, format_amount(v)),
            (None, _) => format!("{}=N/A", o.source),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::services::currency_converter::RateTable;
    use crate::domain::value_objects::currency::Currency;
    use crate::domain::value_objects::fact_key::FactKey;

    fn reconciler() -> Reconciler {
        Reconciler::new(Arc::new(RateTable::with_defaults()))
    }

    fn cad_spec(threshold: f64, preferred: Option<SourceId>) -> FactSpec {
        FactSpec::new(FactKey::MarketCap, Some(Currency::cad()), threshold, preferred).unwrap()
    }

    #[test]
    fn test_no_readings_defaults_to_zero() {
        let fact = reconciler().reconcile(&cad_spec(0.05, None), &[]);
        assert_eq!(fact.value, 0.0);
        assert!(!fact.flagged);
        assert!(fact.contributing_sources.is_empty());
        assert!(fact.observations.is_empty());
    }

    #[test]
    fn test_only_missing_readings_default_to_zero() {
        let readings = [
            Reading::missing(SourceId::YahooFinance),
            Reading::missing(SourceId::MiningFeeds),
        ];
        let fact = reconciler().reconcile(&cad_spec(0.05, None), &readings);
        assert_eq!(fact.value, 0.0);
        assert!(!fact.flagged);
        assert!(fact.contributing_sources.is_empty());
        assert_eq!(fact.observations.len(), 2);
    }

    #[test]
    fn test_untagged_reading_assumes_expected_currency() {
        let readings = [Reading::new(SourceId::TradingView, 7.5, None)];
        let fact = reconciler().reconcile(&cad_spec(0.02, None), &readings);
        assert_eq!(fact.value, 7.5);
        assert_eq!(fact.currency, Some(Currency::cad()));
    }

    #[test]
    fn test_usd_reading_is_converted_to_cad() {
        let readings = [Reading::in_currency(SourceId::YahooFinance, 100.0, Currency::usd())];
        let fact = reconciler().reconcile(&cad_spec(0.05, None), &readings);
        assert!((fact.value - 135.0).abs() < 1e-9);
        assert_eq!(fact.observations[0].raw_value, Some(100.0));
    }

    #[test]
    fn test_unconvertible_reading_is_dropped() {
        let readings = [
            Reading::in_currency(SourceId::YahooFinance, 10.0, Currency::new("ZAR").unwrap()),
            Reading::in_currency(SourceId::TradingView, 4.0, Currency::cad()),
        ];
        let fact = reconciler().reconcile(&cad_spec(0.05, None), &readings);
        assert_eq!(fact.value, 4.0);
        assert_eq!(fact.contributing_sources, vec![SourceId::TradingView]);
        assert_eq!(fact.observations[0].normalized, None);
    }

    #[test]
    fn test_non_finite_reading_is_dropped() {
        let readings = [
            Reading::new(SourceId::YahooFinance, f64::NAN, None),
            Reading::new(SourceId::MiningFeeds, 3.0, None),
        ];
        let fact = reconciler().reconcile(&cad_spec(0.05, None), &readings);
        assert_eq!(fact.value, 3.0);
        assert_eq!(fact.contributing_sources, vec![SourceId::MiningFeeds]);
    }

    #[test]
    fn test_disagreement_without_preferred_takes_first() {
        let readings = [
            Reading::new(SourceId::MiningFeeds, 200.0, None),
            Reading::new(SourceId::TradingView, 100.0, None),
        ];
        let fact = reconciler().reconcile(&cad_spec(0.05, None), &readings);
        assert_eq!(fact.value, 200.0);
        assert!(fact.flagged);
        assert_eq!(fact.variance, 100.0);
        assert_eq!(fact.relative_variance, 0.5);
    }

    #[test]
    fn test_preferred_source_is_reference_even_when_not_first() {
        let readings = [
            Reading::new(SourceId::MiningFeeds, 650.0, None),
            Reading::new(SourceId::YahooFinance, 500.0, None),
        ];
        let spec = cad_spec(0.05, Some(SourceId::YahooFinance));
        let fact = reconciler().reconcile(&spec, &readings);
        assert_eq!(fact.value, 500.0);
        assert!(fact.flagged);
        assert!((fact.relative_variance - 0.3).abs() < 1e-12);
        assert_eq!(
            fact.contributing_sources,
            vec![SourceId::MiningFeeds, SourceId::YahooFinance]
        );
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let readings = [
            Reading::new(SourceId::YahooFinance, 100.0, None),
            Reading::new(SourceId::TradingView, 105.0, None),
        ];
        let fact = reconciler().reconcile(&cad_spec(0.05, None), &readings);
        assert!(!fact.flagged);
        assert_eq!(fact.value, 102.5);
    }

    #[test]
    fn test_zero_reference() {
        assert_eq!(relative_to(0.0, 0.0), 0.0);
        assert_eq!(relative_to(1.0, 0.0), f64::INFINITY);
        assert_eq!(relative_to(1.0, -4.0), 0.25);
    }

    #[test]
    fn test_non_monetary_fact_ignores_currency() {
        let spec = FactSpec::new(FactKey::ReservesAuEqMoz, None, 0.05, None).unwrap();
        let readings = [Reading::in_currency(
            SourceId::CompanyWebsite,
            2.5,
            Currency::new("ZAR").unwrap(),
        )];
        let fact = reconciler().reconcile(&spec, &readings);
        assert_eq!(fact.value, 2.5);
        assert_eq!(fact.currency, None);
    }
}
