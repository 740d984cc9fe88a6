//! Turns source snapshots into per-fact readings.
//!
//! Metal quantities become gold-equivalent and untagged amounts get the fact
//! family's default currency here, so the reconciler only ever sees
//! gold-equivalent values with an explicit or expected currency.

use crate::domain::entities::exchange::Exchange;
use crate::domain::entities::source::SourceId;
use crate::domain::services::gold_equivalent::GoldEquivalence;
use crate::domain::services::reconciliation::FactSpec;
use crate::domain::value_objects::fact_key::FactKey;
use crate::domain::value_objects::reading::{Metal, Observed, Reading, SourceSnapshot};

/// Outcome of asking one source about one company
#[derive(Debug, Clone)]
pub struct SourceResult {
    pub source: SourceId,
    pub provides: &'static [FactKey],
    /// `None` when the fetch failed or timed out
    pub snapshot: Option<SourceSnapshot>,
}

impl SourceResult {
    pub fn fetched(source: SourceId, provides: &'static [FactKey], snapshot: SourceSnapshot) -> Self {
        Self {
            source,
            provides,
            snapshot: Some(snapshot),
        }
    }

    pub fn failed(source: SourceId, provides: &'static [FactKey]) -> Self {
        Self {
            source,
            provides,
            snapshot: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReadingAssembler {
    equivalence: GoldEquivalence,
}

impl ReadingAssembler {
    pub fn new(equivalence: GoldEquivalence) -> Self {
        Self { equivalence }
    }

    /// Readings for `spec` in source order. A source that provides the fact
    /// but failed, or returned nothing for it, yields one missing reading.
    pub fn readings_for(
        &self,
        spec: &FactSpec,
        exchange: Exchange,
        results: &[SourceResult],
    ) -> Vec<Reading> {
        let mut readings = Vec::new();

        for result in results {
            let before = readings.len();
            if let Some(snapshot) = &result.snapshot {
                self.push_source_readings(spec, exchange, snapshot, &mut readings);
            }
            if readings.len() == before && result.provides.contains(&spec.key) {
                readings.push(Reading::missing(result.source));
            }
        }

        readings
    }

    fn push_source_readings(
        &self,
        spec: &FactSpec,
        exchange: Exchange,
        snapshot: &SourceSnapshot,
        readings: &mut Vec<Reading>,
    ) {
        let source = snapshot.source;
        let mut stated: Option<f64> = None;
        let mut parts: Option<f64> = None;

        for observed in snapshot.observations_for(spec.key) {
            match observed {
                Observed::Amount { value, currency } => {
                    let currency = currency
                        .clone()
                        .or_else(|| spec.currency_for_untagged(exchange));
                    readings.push(Reading::new(source, *value, currency));
                }
                // per-metal facts keep the metal's own ounces
                Observed::Metal { quantity, .. } if spec.key.metal().is_some() => {
                    readings.push(Reading::new(source, *quantity, None));
                }
                Observed::Metal {
                    metal: Metal::GoldEquivalent,
                    quantity,
                } => {
                    if stated.is_none() {
                        stated = self.equivalence.to_gold(Metal::GoldEquivalent, *quantity);
                    }
                }
                Observed::Metal { metal, quantity } => {
                    if let Some(gold) = self.equivalence.to_gold(*metal, *quantity) {
                        *parts.get_or_insert(0.0) += gold;
                    }
                }
            }
        }

        // gold and silver from one source add up to one Au-eq reading, unless
        // the source already stated the Au-eq figure
        if stated.is_none() && parts.is_none() {
            for (part, metal) in spec.key.metal_parts().into_iter().flatten() {
                for observed in snapshot.observations_for(part) {
                    let quantity = match observed {
                        Observed::Amount { value, .. } => *value,
                        Observed::Metal { quantity, .. } => *quantity,
                    };
                    if let Some(gold) = self.equivalence.to_gold(metal, quantity) {
                        *parts.get_or_insert(0.0) += gold;
                    }
                }
            }
        }

        if let Some(total) = stated.or(parts) {
            readings.push(Reading::new(source, total, None));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::services::reconciliation::FactCatalog;
    use crate::domain::value_objects::currency::Currency;

    const PRICE_FACTS: &[FactKey] = &[FactKey::StockPrice, FactKey::MarketCap];
    const RESERVE_FACTS: &[FactKey] = &[FactKey::ReservesAuEqMoz];

    #[test]
    fn test_failed_source_yields_missing_reading() {
        let catalog = FactCatalog::standard();
        let spec = catalog.get(FactKey::StockPrice).unwrap();
        let results = [
            SourceResult::failed(SourceId::YahooFinance, PRICE_FACTS),
            SourceResult::fetched(
                SourceId::TradingView,
                PRICE_FACTS,
                SourceSnapshot::new(SourceId::TradingView).amount(FactKey::StockPrice, Some(5.08), None),
            ),
        ];

        let readings = ReadingAssembler::default().readings_for(spec, Exchange::Tsx, &results);
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0], Reading::missing(SourceId::YahooFinance));
        assert_eq!(
            readings[1],
            Reading::in_currency(SourceId::TradingView, 5.08, Currency::cad())
        );
    }

    #[test]
    fn test_sources_not_covering_fact_are_skipped() {
        let catalog = FactCatalog::standard();
        let spec = catalog.get(FactKey::ReservesAuEqMoz).unwrap();
        let results = [SourceResult::failed(SourceId::YahooFinance, PRICE_FACTS)];
        assert!(ReadingAssembler::default()
            .readings_for(spec, Exchange::Tsx, &results)
            .is_empty());
    }

    #[test]
    fn test_untagged_cash_defaults_to_usd() {
        let catalog = FactCatalog::standard();
        let spec = catalog.get(FactKey::Cash).unwrap();
        let results = [SourceResult::fetched(
            SourceId::AlphaVantage,
            &[FactKey::Cash],
            SourceSnapshot::new(SourceId::AlphaVantage).amount(FactKey::Cash, Some(1.0e6), None),
        )];
        let readings = ReadingAssembler::default().readings_for(spec, Exchange::Tsx, &results);
        assert_eq!(readings[0].currency, Some(Currency::usd()));
    }

    #[test]
    fn test_silver_becomes_gold_equivalent() {
        let catalog = FactCatalog::standard();
        let spec = catalog.get(FactKey::ReservesAuEqMoz).unwrap();
        let snapshot = SourceSnapshot::new(SourceId::CompanyWebsite)
            .metal(FactKey::ReservesAuEqMoz, Metal::Gold, 1.2)
            .metal(FactKey::ReservesAuEqMoz, Metal::Silver, 80.0);
        let results = [SourceResult::fetched(SourceId::CompanyWebsite, RESERVE_FACTS, snapshot)];

        let readings = ReadingAssembler::default().readings_for(spec, Exchange::Tsx, &results);
        assert_eq!(readings, vec![Reading::new(SourceId::CompanyWebsite, 2.2, None)]);
    }

    fn resources(snapshot: SourceSnapshot) -> Vec<Reading> {
        let catalog = FactCatalog::standard();
        let spec = catalog.get(FactKey::ResourcesAuEqMoz).unwrap();
        let provides = &[FactKey::ResourcesAuEqMoz];
        let results = [SourceResult::fetched(snapshot.source, provides, snapshot)];
        ReadingAssembler::default().readings_for(spec, Exchange::TsxVenture, &results)
    }

    #[test]
    fn test_stated_gold_equivalent_is_not_topped_up_with_silver() {
        let snapshot = SourceSnapshot::new(SourceId::CompanyWebsite)
            .metal(FactKey::ResourcesAuEqMoz, Metal::GoldEquivalent, 2.0)
            .amount(FactKey::ResourcesSilverMoz, Some(2.0), None);

        assert_eq!(
            resources(snapshot),
            vec![Reading::new(SourceId::CompanyWebsite, 2.0, None)]
        );
    }

    #[test]
    fn test_gold_equivalent_computed_from_per_metal_facts() {
        let snapshot = SourceSnapshot::new(SourceId::InvestorPresentation)
            .amount(FactKey::ResourcesGoldMoz, Some(1.5), None)
            .amount(FactKey::ResourcesSilverMoz, Some(40.0), None);

        assert_eq!(
            resources(snapshot),
            vec![Reading::new(SourceId::InvestorPresentation, 2.0, None)]
        );
    }

    #[test]
    fn test_per_metal_fact_keeps_raw_ounces() {
        let catalog = FactCatalog::standard();
        let spec = catalog.get(FactKey::ResourcesSilverMoz).unwrap();
        let snapshot = SourceSnapshot::new(SourceId::CompanyWebsite)
            .amount(FactKey::ResourcesSilverMoz, Some(12.5), None);
        let results = [SourceResult::fetched(
            SourceId::CompanyWebsite,
            &[FactKey::ResourcesSilverMoz],
            snapshot,
        )];

        let readings = ReadingAssembler::default().readings_for(spec, Exchange::Tsx, &results);
        assert_eq!(readings, vec![Reading::new(SourceId::CompanyWebsite, 12.5, None)]);
    }
}
