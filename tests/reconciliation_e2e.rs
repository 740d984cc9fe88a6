//! Reconciliation end-to-end tests
//!
//! Snapshots as sources would return them go through reading assembly and
//! the reconciler with the built-in fact catalog.

use chrono::Utc;
use std::sync::Arc;

use aurum::domain::entities::company::Company;
use aurum::domain::entities::source::SourceId;
use aurum::domain::services::currency_converter::{CurrencyConverter, RateTable};
use aurum::domain::services::reading_assembly::{ReadingAssembler, SourceResult};
use aurum::domain::services::reconciliation::{FactCatalog, FactSpec, Reconciler, ResolvedFact};
use aurum::domain::value_objects::currency::Currency;
use aurum::domain::value_objects::fact_key::FactKey;
use aurum::domain::value_objects::reading::{Metal, Reading, SourceSnapshot};

fn reconciler() -> Reconciler {
    Reconciler::new(Arc::new(RateTable::with_defaults()))
}

fn spec(threshold: f64, preferred: Option<SourceId>) -> FactSpec {
    FactSpec::new(FactKey::MarketCap, Some(Currency::cad()), threshold, preferred).unwrap()
}

fn cad(source: SourceId, value: f64) -> Reading {
    Reading::in_currency(source, value, Currency::cad())
}

/// Assemble and reconcile one catalog fact for `company`
fn resolve(company: &Company, key: FactKey, results: &[SourceResult]) -> ResolvedFact {
    let catalog = FactCatalog::standard();
    let spec = catalog.get(key).unwrap();
    let readings = ReadingAssembler::default().readings_for(spec, company.exchange(), results);
    reconciler().reconcile(spec, &readings)
}

fn fetched(snapshot: SourceSnapshot, provides: &'static [FactKey]) -> SourceResult {
    SourceResult::fetched(snapshot.source, provides, snapshot)
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_zero_readings_resolve_to_unflagged_zero() {
    let fact = reconciler().reconcile(&spec(0.05, None), &[]);

    assert_eq!(fact.value, 0.0);
    assert!(!fact.flagged);
    assert!(fact.contributing_sources.is_empty());
    assert!(!fact.has_data());
}

#[test]
fn test_single_reading_passes_through() {
    let fact = reconciler().reconcile(&spec(0.05, None), &[cad(SourceId::TradingView, 42.0)]);

    assert_eq!(fact.value, 42.0);
    assert_eq!(fact.variance, 0.0);
    assert!(!fact.flagged);
    assert_eq!(fact.contributing_sources, vec![SourceId::TradingView]);
}

#[test]
fn test_close_readings_average() {
    let fact = reconciler().reconcile(
        &spec(0.05, None),
        &[cad(SourceId::YahooFinance, 100.0), cad(SourceId::TradingView, 101.0)],
    );

    assert_eq!(fact.value, 100.5);
    assert_eq!(fact.variance, 1.0);
    assert!(!fact.flagged);
}

#[test]
fn test_disagreement_keeps_preferred_value_and_flags() {
    let fact = reconciler().reconcile(
        &spec(0.05, Some(SourceId::YahooFinance)),
        &[cad(SourceId::TradingView, 200.0), cad(SourceId::YahooFinance, 100.0)],
    );

    assert_eq!(fact.value, 100.0);
    assert_eq!(fact.variance, 100.0);
    assert!(fact.flagged);
}

#[test]
fn test_disagreement_without_preferred_source_keeps_first() {
    let fact = reconciler().reconcile(
        &spec(0.05, Some(SourceId::YahooFinance)),
        &[cad(SourceId::TradingView, 200.0), cad(SourceId::MiningFeeds, 100.0)],
    );

    assert_eq!(fact.value, 200.0);
    assert!(fact.flagged);
}

#[test]
fn test_reconciliation_is_idempotent() {
    let readings = [
        cad(SourceId::YahooFinance, 100.0),
        Reading::missing(SourceId::MiningFeeds),
        Reading::in_currency(SourceId::FinancialModelingPrep, 80.0, Currency::usd()),
    ];
    let now = Utc::now();
    let spec = spec(0.05, Some(SourceId::YahooFinance));

    let first = reconciler().reconcile_at(&spec, &readings, now);
    let second = reconciler().reconcile_at(&spec, &readings, now);
    assert_eq!(first, second);
}

#[test]
fn test_currency_round_trip() {
    let rates = RateTable::with_defaults();
    for currency in [Currency::usd(), Currency::aud()] {
        let there = rates.convert(1234.5, &currency, &Currency::cad()).unwrap();
        let back = rates.convert(there, &Currency::cad(), &currency).unwrap();
        assert!((back - 1234.5).abs() < 1e-9, "{} round trip gave {}", currency, back);
    }
}

#[test]
fn test_foreign_currency_readings_are_normalized_before_comparison() {
    let fact = reconciler().reconcile(
        &spec(0.05, None),
        &[
            Reading::in_currency(SourceId::AlphaVantage, 100.0, Currency::usd()),
            cad(SourceId::YahooFinance, 135.0),
        ],
    );

    assert!((fact.value - 135.0).abs() < 1e-9);
    assert!(!fact.flagged);
    assert_eq!(fact.observations[0].raw_currency, Some(Currency::usd()));
}

#[test]
fn test_unconvertible_reading_is_dropped() {
    let fact = reconciler().reconcile(
        &spec(0.05, None),
        &[
            Reading::in_currency(SourceId::TradingView, 9.0, Currency::new("EUR").unwrap()),
            cad(SourceId::YahooFinance, 50.0),
        ],
    );

    assert_eq!(fact.value, 50.0);
    assert_eq!(fact.contributing_sources, vec![SourceId::YahooFinance]);
    assert_eq!(fact.observations.len(), 2);
    assert_eq!(fact.observations[0].normalized, None);
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_tsx_price_within_tolerance_averages() {
    let company = Company::new("XYZ.TO", "Xyz Gold").unwrap();
    let results = [
        fetched(
            SourceSnapshot::new(SourceId::YahooFinance).amount(FactKey::StockPrice, Some(5.10), None),
            &[FactKey::StockPrice],
        ),
        fetched(
            SourceSnapshot::new(SourceId::TradingView).amount(FactKey::StockPrice, Some(5.08), None),
            &[FactKey::StockPrice],
        ),
    ];

    let fact = resolve(&company, FactKey::StockPrice, &results);

    assert!((fact.value - 5.09).abs() < 1e-9);
    assert!(!fact.flagged);
    assert_eq!(fact.currency, Some(Currency::cad()));
}

#[test]
fn test_market_cap_disagreement_prefers_yahoo() {
    let company = Company::new("XYZ.TO", "Xyz Gold").unwrap();
    let results = [
        fetched(
            SourceSnapshot::new(SourceId::TradingView).amount(
                FactKey::MarketCap,
                Some(650e6),
                Some(Currency::cad()),
            ),
            &[FactKey::StockPrice, FactKey::MarketCap],
        ),
        fetched(
            SourceSnapshot::new(SourceId::YahooFinance).amount(
                FactKey::MarketCap,
                Some(500e6),
                Some(Currency::cad()),
            ),
            &[FactKey::StockPrice, FactKey::MarketCap],
        ),
    ];

    let fact = resolve(&company, FactKey::MarketCap, &results);

    assert_eq!(fact.value, 500e6);
    assert_eq!(fact.variance, 150e6);
    assert!(fact.flagged);
}

#[test]
fn test_silver_reserves_are_compared_as_gold_equivalent() {
    let company = Company::new("XYZ.V", "Xyz Mining").unwrap();
    let results = [
        fetched(
            SourceSnapshot::new(SourceId::CompanyWebsite).metal(
                FactKey::ReservesAuEqMoz,
                Metal::Gold,
                1.2,
            ),
            &[FactKey::ReservesAuEqMoz],
        ),
        fetched(
            SourceSnapshot::new(SourceId::Manual).metal(FactKey::ReservesAuEqMoz, Metal::Silver, 80.0),
            &[FactKey::ReservesAuEqMoz],
        ),
    ];

    let fact = resolve(&company, FactKey::ReservesAuEqMoz, &results);

    let normalized: Vec<Option<f64>> = fact.observations.iter().map(|o| o.normalized).collect();
    assert_eq!(normalized, vec![Some(1.2), Some(1.0)]);
    assert!(fact.flagged);
    assert_eq!(fact.value, 1.2);
}

#[test]
fn test_failed_source_is_a_missing_reading() {
    let company = Company::new("XYZ.TO", "Xyz Gold").unwrap();
    let results = [
        SourceResult::failed(SourceId::TradingView, &[FactKey::StockPrice, FactKey::MarketCap]),
        fetched(
            SourceSnapshot::new(SourceId::YahooFinance).amount(FactKey::StockPrice, Some(5.10), None),
            &[FactKey::StockPrice],
        ),
    ];

    let fact = resolve(&company, FactKey::StockPrice, &results);

    assert_eq!(fact.value, 5.10);
    assert!(!fact.flagged);
    assert_eq!(fact.observations.len(), 2);
    assert_eq!(fact.observations[0].raw_value, None);
}

#[test]
fn test_provenance_line_lists_every_source() {
    let company = Company::new("XYZ.TO", "Xyz Gold").unwrap();
    let results = [
        SourceResult::failed(SourceId::MiningFeeds, &[FactKey::StockPrice]),
        fetched(
            SourceSnapshot::new(SourceId::YahooFinance).amount(
                FactKey::StockPrice,
                Some(5.10),
                Some(Currency::cad()),
            ),
            &[FactKey::StockPrice],
        ),
    ];

    let fact = resolve(&company, FactKey::StockPrice, &results);
    let line = aurum::domain::services::reconciliation::ProvenanceEntry::new(&company.ticker, fact)
        .to_string();

    assert!(line.contains("XYZ.TO stock_price:"));
    assert!(line.contains("=N/A"));
    assert!(line.ends_with("Variance=0.0000, Resolved=5.1000 CAD"));
}
