use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::ValidationError;

/// ISO 4217 currency code, always three uppercase ASCII letters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Result<Self, ValidationError> {
        let code = code.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidCurrency(code.to_string()));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    pub fn cad() -> Self {
        Self("CAD".to_string())
    }

    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    pub fn aud() -> Self {
        Self("AUD".to_string())
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_normalizes_case() {
        let currency = Currency::new(" cad ").unwrap();
        assert_eq!(currency, Currency::cad());
        assert_eq!(currency.code(), "CAD");
    }

    #[test]
    fn test_currency_rejects_invalid_codes() {
        assert!(Currency::new("").is_err());
        assert!(Currency::new("US").is_err());
        assert!(Currency::new("USDT").is_err());
        assert!(Currency::new("U$D").is_err());
    }

    #[test]
    fn test_currency_serde_roundtrip_as_plain_string() {
        let json = serde_json::to_string(&Currency::usd()).unwrap();
        assert_eq!(json, "\"USD\"");
        let parsed: Currency = serde_json::from_str("\"aud\"").unwrap();
        assert_eq!(parsed, Currency::aud());
        assert!(serde_json::from_str::<Currency>("\"dollars\"").is_err());
    }
}
