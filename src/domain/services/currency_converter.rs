//! Currency conversion seen by the reconciler.
//!
//! The reconciler only needs `convert`; where rates come from and how long
//! they are cached is the concern of `infrastructure::exchange_rates`.

use std::collections::HashMap;

use crate::domain::value_objects::currency::Currency;

pub const DEFAULT_USD_TO_CAD: f64 = 1.35;
pub const DEFAULT_AUD_TO_CAD: f64 = 0.90;

pub trait CurrencyConverter: Send + Sync {
    /// Units of `to` per one unit of `from`, if known
    fn rate(&self, from: &Currency, to: &Currency) -> Option<f64>;

    /// Convert `value`; `None` when no rate is known for a different currency
    fn convert(&self, value: f64, from: &Currency, to: &Currency) -> Option<f64> {
        if from == to {
            return Some(value);
        }
        let converted = value * self.rate(from, to)?;
        converted.is_finite().then_some(converted)
    }
}

/// Rates quoted against a single pivot currency.
///
/// Cross rates are derived through the pivot, so converting there and back
/// returns the original value up to floating-point error.
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    pivot: Currency,
    to_pivot: HashMap<Currency, f64>,
}

impl RateTable {
    pub fn new(pivot: Currency) -> Self {
        let mut to_pivot = HashMap::new();
        to_pivot.insert(pivot.clone(), 1.0);
        Self { pivot, to_pivot }
    }

    /// CAD-pivoted table with the fallback rates used when no live quote is available
    pub fn with_defaults() -> Self {
        let mut table = Self::new(Currency::cad());
        table.set_rate(Currency::usd(), DEFAULT_USD_TO_CAD);
        table.set_rate(Currency::aud(), DEFAULT_AUD_TO_CAD);
        table
    }

    pub fn pivot(&self) -> &Currency {
        &self.pivot
    }

    /// Set how many pivot units one unit of `currency` is worth.
    /// Returns false and leaves the table unchanged for unusable rates.
    pub fn set_rate(&mut self, currency: Currency, rate_to_pivot: f64) -> bool {
        if !rate_to_pivot.is_finite() || rate_to_pivot <= 0.0 || currency == self.pivot {
            return false;
        }
        self.to_pivot.insert(currency, rate_to_pivot);
        true
    }

    pub fn rate_to_pivot(&self, currency: &Currency) -> Option<f64> {
        self.to_pivot.get(currency).copied()
    }

    pub fn currencies(&self) -> impl Iterator<Item = &Currency> {
        self.to_pivot.keys()
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl CurrencyConverter for RateTable {
    fn rate(&self, from: &Currency, to: &Currency) -> Option<f64> {
        if from == to {
            return Some(1.0);
        }
        let from_rate = self.rate_to_pivot(from)?;
        let to_rate = self.rate_to_pivot(to)?;
        Some(from_rate / to_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_conversion() {
        let table = RateTable::new(Currency::cad());
        let eur = Currency::new("EUR").unwrap();
        assert_eq!(table.convert(12.5, &eur, &eur), Some(12.5));
    }

    #[test]
    fn test_default_usd_to_cad() {
        let table = RateTable::with_defaults();
        let cad = table.convert(100.0, &Currency::usd(), &Currency::cad()).unwrap();
        assert!((cad - 135.0).abs() < 1e-9);
    }

    #[test]
    fn test_cross_rate_through_pivot() {
        let table = RateTable::with_defaults();
        let usd = table.convert(90.0, &Currency::aud(), &Currency::usd()).unwrap();
        assert!((usd - 90.0 * 0.90 / 1.35).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_currency_is_unconvertible() {
        let table = RateTable::with_defaults();
        let zar = Currency::new("ZAR").unwrap();
        assert_eq!(table.convert(1.0, &zar, &Currency::cad()), None);
        assert_eq!(table.convert(1.0, &Currency::cad(), &zar), None);
    }

    #[test]
    fn test_rejects_unusable_rates() {
        let mut table = RateTable::with_defaults();
        assert!(!table.set_rate(Currency::usd(), 0.0));
        assert!(!table.set_rate(Currency::usd(), f64::NAN));
        assert!(!table.set_rate(Currency::cad(), 2.0));
        assert_eq!(table.rate_to_pivot(&Currency::usd()), Some(DEFAULT_USD_TO_CAD));
    }

    #[test]
    fn test_round_trip() {
        let table = RateTable::with_defaults();
        let pairs = [
            (Currency::usd(), Currency::cad()),
            (Currency::aud(), Currency::usd()),
            (Currency::cad(), Currency::aud()),
        ];
        for (a, b) in pairs {
            for v in [0.01, 5.09, 1_234_567.0] {
                let there = table.convert(v, &a, &b).unwrap();
                let back = table.convert(there, &b, &a).unwrap();
                assert!((back - v).abs() <= v * 1e-12, "{} -> {} -> {}", a, b, back);
            }
        }
    }
}
