//! Alpha Vantage API client
//!
//! The free tier allows only a handful of calls per minute, so every call
//! waits on a shared pacing limiter. The company source issues three calls
//! (quote, balance sheet, income statement) and keeps whatever succeeded.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use crate::domain::entities::company::Company;
use crate::domain::entities::source::SourceId;
use crate::domain::errors::FetchError;
use crate::domain::repositories::source_fetcher::SourceFetcher;
use crate::domain::value_objects::currency::Currency;
use crate::domain::value_objects::fact_key::FactKey;
use crate::domain::value_objects::reading::SourceSnapshot;
use crate::infrastructure::http::{get_json, json_number, json_string};
use crate::rate_limit::GlobalRateLimiter;

const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";
const SOURCE: SourceId = SourceId::AlphaVantage;

const PROVIDES: &[FactKey] = &[
    FactKey::StockPrice,
    FactKey::Cash,
    FactKey::Debt,
    FactKey::Revenue,
    FactKey::NetIncome,
];

pub struct AlphaVantageApi {
    client: Client,
    base_url: String,
    api_key: String,
    limiter: GlobalRateLimiter,
}

impl AlphaVantageApi {
    pub fn new(client: Client, api_key: &str, limiter: GlobalRateLimiter) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL, api_key, limiter)
    }

    pub fn with_base_url(
        client: Client,
        base_url: &str,
        api_key: &str,
        limiter: GlobalRateLimiter,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            limiter,
        }
    }

    async fn call(&self, params: &[(&str, &str)]) -> Result<Value, FetchError> {
        let url = Url::parse_with_params(
            &format!("{}/query", self.base_url),
            params.iter().copied().chain([("apikey", self.api_key.as_str())]),
        )
        .map_err(|e| FetchError::Transport {
            source_id: SOURCE,
            message: e.to_string(),
        })?;

        self.limiter.until_ready().await;
        let body = get_json(&self.client, SOURCE, url.as_str()).await?;
        check_api_message(&body)?;
        Ok(body)
    }

    pub async fn global_quote(&self, symbol: &str) -> Result<Value, FetchError> {
        self.call(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol)]).await
    }

    pub async fn balance_sheet(&self, symbol: &str) -> Result<Value, FetchError> {
        self.call(&[("function", "BALANCE_SHEET"), ("symbol", symbol)]).await
    }

    pub async fn income_statement(&self, symbol: &str) -> Result<Value, FetchError> {
        self.call(&[("function", "INCOME_STATEMENT"), ("symbol", symbol)]).await
    }

    /// Units of `to` per unit of `from`
    pub async fn exchange_rate(&self, from: &Currency, to: &Currency) -> Result<f64, FetchError> {
        let body = self
            .call(&[
                ("function", "CURRENCY_EXCHANGE_RATE"),
                ("from_currency", from.code()),
                ("to_currency", to.code()),
            ])
            .await?;
        parse_exchange_rate(&body)
    }
}

/// Alpha Vantage reports throttling and bad symbols in a 200 body
fn check_api_message(body: &Value) -> Result<(), FetchError> {
    if let Some(message) = body["Note"].as_str().or_else(|| body["Information"].as_str()) {
        return Err(FetchError::RateLimited {
            source_id: SOURCE,
            message: message.to_string(),
        });
    }
    if let Some(message) = body["Error Message"].as_str() {
        return Err(FetchError::Parse {
            source_id: SOURCE,
            message: message.to_string(),
        });
    }
    Ok(())
}

fn reported_currency(report: &Value) -> Option<Currency> {
    json_string(&report["reportedCurrency"]).and_then(|c| Currency::new(&c).ok())
}

pub(crate) fn parse_global_quote(snapshot: SourceSnapshot, body: &Value) -> SourceSnapshot {
    snapshot.amount(
        FactKey::StockPrice,
        json_number(&body["Global Quote"]["05. price"]),
        None,
    )
}

pub(crate) fn parse_balance_sheet(snapshot: SourceSnapshot, body: &Value) -> SourceSnapshot {
    let report = &body["annualReports"][0];
    let currency = reported_currency(report);
    snapshot
        .amount(
            FactKey::Cash,
            json_number(&report["cashAndCashEquivalentsAtCarryingValue"]),
            currency.clone(),
        )
        .amount(FactKey::Debt, json_number(&report["longTermDebt"]), currency)
}

pub(crate) fn parse_income_statement(snapshot: SourceSnapshot, body: &Value) -> SourceSnapshot {
    let report = &body["annualReports"][0];
    let currency = reported_currency(report);
    snapshot
        .amount(FactKey::Revenue, json_number(&report["totalRevenue"]), currency.clone())
        .amount(FactKey::NetIncome, json_number(&report["netIncome"]), currency)
}

pub(crate) fn parse_exchange_rate(body: &Value) -> Result<f64, FetchError> {
    json_number(&body["Realtime Currency Exchange Rate"]["5. Exchange Rate"])
        .filter(|rate| *rate > 0.0)
        .ok_or_else(|| FetchError::Parse {
            source_id: SOURCE,
            message: "missing exchange rate".to_string(),
        })
}

pub struct AlphaVantageSource {
    api: Arc<AlphaVantageApi>,
}

impl AlphaVantageSource {
    pub fn new(api: Arc<AlphaVantageApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl SourceFetcher for AlphaVantageSource {
    fn source(&self) -> SourceId {
        SOURCE
    }

    fn provides(&self) -> &'static [FactKey] {
        PROVIDES
    }

    async fn fetch(&self, company: &Company) -> Result<SourceSnapshot, FetchError> {
        let symbol = company.ticker.as_str();
        let mut snapshot = SourceSnapshot::new(SOURCE);
        let mut first_error = None;

        let calls: [(&str, Result<Value, FetchError>); 3] = [
            ("quote", self.api.global_quote(symbol).await),
            ("balance sheet", self.api.balance_sheet(symbol).await),
            ("income statement", self.api.income_statement(symbol).await),
        ];

        for (index, (label, result)) in calls.into_iter().enumerate() {
            match result {
                Ok(body) => {
                    snapshot = match index {
                        0 => parse_global_quote(snapshot, &body),
                        1 => parse_balance_sheet(snapshot, &body),
                        _ => parse_income_statement(snapshot, &body),
                    };
                }
                Err(e) => {
                    warn!(ticker = %company.ticker, "Alpha Vantage {} failed: {}", label, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if snapshot.is_empty() {
            return Err(first_error.unwrap_or_else(|| FetchError::NotFound {
                source_id: SOURCE,
                ticker: company.ticker.clone(),
            }));
        }
        debug!(
            ticker = %company.ticker,
            facts = snapshot.observations.len(),
            "Alpha Vantage snapshot"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::create_rate_limiter;
    use crate::rate_limit::RateLimiterConfig;
    use serde_json::json;

    fn unlimited() -> GlobalRateLimiter {
        create_rate_limiter(RateLimiterConfig {
            requests_per_minute: 1000,
        })
    }

    #[test]
    fn test_parse_reports() {
        let snapshot = SourceSnapshot::new(SOURCE);
        let snapshot = parse_global_quote(snapshot, &json!({"Global Quote": {"05. price": "5.0800"}}));
        let snapshot = parse_balance_sheet(
            snapshot,
            &json!({"annualReports": [{
                "reportedCurrency": "USD",
                "cashAndCashEquivalentsAtCarryingValue": "30000000",
                "longTermDebt": "None"
            }]}),
        );
        let snapshot = parse_income_statement(
            snapshot,
            &json!({"annualReports": [{"totalRevenue": "120000000", "netIncome": "-4000000"}]}),
        );

        assert_eq!(snapshot.observations.len(), 4);
        assert_eq!(snapshot.observations_for(FactKey::Debt).count(), 0);
    }

    #[test]
    fn test_throttle_note_is_rate_limited() {
        let err = check_api_message(&json!({"Note": "Thank you for using Alpha Vantage!"})).unwrap_err();
        assert!(matches!(err, FetchError::RateLimited { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_exchange_rate() {
        let body = json!({"Realtime Currency Exchange Rate": {"5. Exchange Rate": "1.36250000"}});
        assert_eq!(parse_exchange_rate(&body).unwrap(), 1.3625);
        assert!(parse_exchange_rate(&json!({})).is_err());
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_successful_calls() {
        let mut server = mockito::Server::new_async().await;
        let _quote = server
            .mock("GET", "/query")
            .match_query(mockito::Matcher::UrlEncoded(
                "function".into(),
                "GLOBAL_QUOTE".into(),
            ))
            .with_status(200)
            .with_body(r#"{"Global Quote": {"05. price": "5.08"}}"#)
            .create_async()
            .await;
        let _balance = server
            .mock("GET", "/query")
            .match_query(mockito::Matcher::UrlEncoded(
                "function".into(),
                "BALANCE_SHEET".into(),
            ))
            .with_status(500)
            .create_async()
            .await;
        let _income = server
            .mock("GET", "/query")
            .match_query(mockito::Matcher::UrlEncoded(
                "function".into(),
                "INCOME_STATEMENT".into(),
            ))
            .with_status(200)
            .with_body(r#"{"Information": "rate limit"}"#)
            .create_async()
            .await;

        let api = AlphaVantageApi::with_base_url(Client::new(), &server.url(), "demo", unlimited());
        let source = AlphaVantageSource::new(Arc::new(api));
        let company = Company::new("XYZ.TO", "Xyz Gold").unwrap();

        let snapshot = source.fetch(&company).await.unwrap();
        assert_eq!(snapshot.observations.len(), 1);
        assert_eq!(snapshot.observations_for(FactKey::StockPrice).count(), 1);
    }

    #[tokio::test]
    async fn test_all_calls_failing_returns_first_error() {
        let mut server = mockito::Server::new_async().await;
        let _all = server
            .mock("GET", "/query")
            .match_query(mockito::Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let api = AlphaVantageApi::with_base_url(Client::new(), &server.url(), "demo", unlimited());
        let source = AlphaVantageSource::new(Arc::new(api));
        let company = Company::new("XYZ.TO", "Xyz Gold").unwrap();

        let err = source.fetch(&company).await.unwrap_err();
        assert_eq!(
            err,
            FetchError::HttpStatus {
                source_id: SOURCE,
                status: 503
            }
        );
    }
}
