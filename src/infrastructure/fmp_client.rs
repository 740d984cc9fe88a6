//! Financial Modeling Prep source
//!
//! Profile, income statement and balance sheet are requested concurrently.
//! Only the profile is required; statements are best effort.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::warn;

use crate::domain::entities::company::Company;
use crate::domain::entities::source::SourceId;
use crate::domain::errors::FetchError;
use crate::domain::repositories::source_fetcher::SourceFetcher;
use crate::domain::value_objects::currency::Currency;
use crate::domain::value_objects::fact_key::FactKey;
use crate::domain::value_objects::reading::SourceSnapshot;
use crate::infrastructure::http::{get_json, json_number, json_string};

const DEFAULT_BASE_URL: &str = "https://financialmodelingprep.com/api/v3";
const SOURCE: SourceId = SourceId::FinancialModelingPrep;

const PROVIDES: &[FactKey] = &[
    FactKey::StockPrice,
    FactKey::MarketCap,
    FactKey::Revenue,
    FactKey::NetIncome,
    FactKey::Debt,
    FactKey::Cash,
];

pub struct FmpSource {
    client: Client,
    base_url: String,
    api_key: String,
}

impl FmpSource {
    pub fn new(client: Client, api_key: &str) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL, api_key)
    }

    pub fn with_base_url(client: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn url(&self, endpoint: &str, symbol: &str, limited: bool) -> String {
        let limit = if limited { "limit=1&" } else { "" };
        format!(
            "{}/{}/{}?{}apikey={}",
            self.base_url, endpoint, symbol, limit, self.api_key
        )
    }
}

fn first_item(body: &Value) -> Option<&Value> {
    body.as_array().and_then(|items| items.first())
}

fn currency_of(item: &Value, field: &str) -> Option<Currency> {
    json_string(&item[field]).and_then(|c| Currency::new(&c).ok())
}

pub(crate) fn parse_profile(ticker: &str, body: &Value) -> Result<SourceSnapshot, FetchError> {
    let profile = first_item(body).ok_or_else(|| FetchError::NotFound {
        source_id: SOURCE,
        ticker: ticker.to_string(),
    })?;
    let currency = currency_of(profile, "currency");

    Ok(SourceSnapshot::new(SOURCE)
        .amount(FactKey::StockPrice, json_number(&profile["price"]), currency.clone())
        .amount(FactKey::MarketCap, json_number(&profile["mktCap"]), currency)
        .with_reported_name(json_string(&profile["companyName"])))
}

pub(crate) fn parse_income(snapshot: SourceSnapshot, body: &Value) -> SourceSnapshot {
    let Some(item) = first_item(body) else {
        return snapshot;
    };
    let currency = currency_of(item, "reportedCurrency");
    snapshot
        .amount(FactKey::Revenue, json_number(&item["revenue"]), currency.clone())
        .amount(FactKey::NetIncome, json_number(&item["netIncome"]), currency)
}

pub(crate) fn parse_balance(snapshot: SourceSnapshot, body: &Value) -> SourceSnapshot {
    let Some(item) = first_item(body) else {
        return snapshot;
    };
    let currency = currency_of(item, "reportedCurrency");
    let cash = json_number(&item["cashAndCashEquivalents"])
        .or_else(|| json_number(&item["cashAndEquivalents"]));
    snapshot
        .amount(FactKey::Debt, json_number(&item["totalDebt"]), currency.clone())
        .amount(FactKey::Cash, cash, currency)
}

#[async_trait]
impl SourceFetcher for FmpSource {
    fn source(&self) -> SourceId {
        SOURCE
    }

    fn provides(&self) -> &'static [FactKey] {
        PROVIDES
    }

    async fn fetch(&self, company: &Company) -> Result<SourceSnapshot, FetchError> {
        let symbol = company.ticker_root();
        let profile_url = self.url("profile", symbol, false);
        let income_url = self.url("income-statement", symbol, true);
        let balance_url = self.url("balance-sheet-statement", symbol, true);

        let (profile, income, balance) = tokio::join!(
            get_json(&self.client, SOURCE, &profile_url),
            get_json(&self.client, SOURCE, &income_url),
            get_json(&self.client, SOURCE, &balance_url),
        );

        let mut snapshot = parse_profile(&company.ticker, &profile?)?;
        match income {
            Ok(body) => snapshot = parse_income(snapshot, &body),
            Err(e) => warn!(ticker = %company.ticker, "FMP income statement failed: {}", e),
        }
        match balance {
            Ok(body) => snapshot = parse_balance(snapshot, &body),
            Err(e) => warn!(ticker = %company.ticker, "FMP balance sheet failed: {}", e),
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_profile_is_not_found() {
        let err = parse_profile("XYZ.TO", &json!([])).unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));
    }

    #[test]
    fn test_parse_statements() {
        let snapshot = parse_profile(
            "XYZ.TO",
            &json!([{"price": 5.1, "mktCap": 500000000, "currency": "CAD", "companyName": "Xyz Gold Corp"}]),
        )
        .unwrap();
        let snapshot = parse_income(snapshot, &json!([{"revenue": 1.2e8, "netIncome": -4.0e6}]));
        let snapshot = parse_balance(
            snapshot,
            &json!([{"totalDebt": 5.0e7, "cashAndEquivalents": 3.0e7, "reportedCurrency": "USD"}]),
        );

        assert_eq!(snapshot.observations.len(), 6);
        assert_eq!(snapshot.reported_name.as_deref(), Some("Xyz Gold Corp"));
    }

    #[test]
    fn test_url_strips_suffix_and_limits() {
        let source = FmpSource::with_base_url(Client::new(), "http://localhost/api/v3/", "k");
        assert_eq!(
            source.url("income-statement", "XYZ", true),
            "http://localhost/api/v3/income-statement/XYZ?limit=1&apikey=k"
        );
    }

    #[tokio::test]
    async fn test_fetch_tolerates_statement_failure() {
        let mut server = mockito::Server::new_async().await;
        let _profile = server
            .mock("GET", "/profile/XYZ")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"price": 5.1, "mktCap": 500000000, "currency": "CAD"}]"#)
            .create_async()
            .await;
        let _income = server
            .mock("GET", "/income-statement/XYZ")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;
        let _balance = server
            .mock("GET", "/balance-sheet-statement/XYZ")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"totalDebt": 50000000}]"#)
            .create_async()
            .await;

        let source = FmpSource::with_base_url(Client::new(), &server.url(), "k");
        let company = Company::new("XYZ.TO", "Xyz Gold").unwrap();
        let snapshot = source.fetch(&company).await.unwrap();

        assert_eq!(snapshot.observations.len(), 3);
        assert_eq!(snapshot.observations_for(FactKey::Revenue).count(), 0);
    }
}
