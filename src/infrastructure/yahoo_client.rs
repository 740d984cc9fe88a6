//! Yahoo Finance quoteSummary source
//!
//! One request covers price, market cap, share count, enterprise value,
//! balance sheet and last annual income figures.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::domain::entities::company::Company;
use crate::domain::entities::source::SourceId;
use crate::domain::errors::FetchError;
use crate::domain::repositories::source_fetcher::SourceFetcher;
use crate::domain::value_objects::currency::Currency;
use crate::domain::value_objects::fact_key::FactKey;
use crate::domain::value_objects::reading::SourceSnapshot;
use crate::infrastructure::http::{get_json, json_number, json_string};

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const MODULES: &str = "price,defaultKeyStatistics,financialData,incomeStatementHistory";

const PROVIDES: &[FactKey] = &[
    FactKey::StockPrice,
    FactKey::MarketCap,
    FactKey::SharesOutstanding,
    FactKey::EnterpriseValue,
    FactKey::Cash,
    FactKey::Debt,
    FactKey::Revenue,
    FactKey::NetIncome,
];

pub struct YahooFinanceSource {
    client: Client,
    base_url: String,
}

impl YahooFinanceSource {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, ticker: &str) -> String {
        format!(
            "{}/v10/finance/quoteSummary/{}?modules={}",
            self.base_url, ticker, MODULES
        )
    }
}

fn currency_field(value: &Value) -> Option<Currency> {
    json_string(value).and_then(|code| Currency::new(&code).ok())
}

/// Build a snapshot from a quoteSummary response body
pub(crate) fn parse_quote_summary(ticker: &str, body: &Value) -> Result<SourceSnapshot, FetchError> {
    let summary = &body["quoteSummary"];
    if let Some(description) = summary["error"]["description"].as_str() {
        return Err(FetchError::NotFound {
            source_id: SourceId::YahooFinance,
            ticker: format!("{} ({})", ticker, description),
        });
    }

    let result = summary["result"]
        .as_array()
        .and_then(|results| results.first())
        .ok_or_else(|| FetchError::NotFound {
            source_id: SourceId::YahooFinance,
            ticker: ticker.to_string(),
        })?;

    let price = &result["price"];
    let stats = &result["defaultKeyStatistics"];
    let financial = &result["financialData"];
    let income = &result["incomeStatementHistory"]["incomeStatementHistory"][0];

    let trading_currency = currency_field(&price["currency"]);
    let financial_currency = currency_field(&financial["financialCurrency"]);

    let snapshot = SourceSnapshot::new(SourceId::YahooFinance)
        .amount(
            FactKey::StockPrice,
            json_number(&price["regularMarketPrice"]),
            trading_currency.clone(),
        )
        .amount(
            FactKey::MarketCap,
            json_number(&price["marketCap"]),
            trading_currency.clone(),
        )
        .amount(FactKey::SharesOutstanding, json_number(&stats["sharesOutstanding"]), None)
        .amount(
            FactKey::EnterpriseValue,
            json_number(&stats["enterpriseValue"]),
            trading_currency,
        )
        .amount(
            FactKey::Cash,
            json_number(&financial["totalCash"]),
            financial_currency.clone(),
        )
        .amount(
            FactKey::Debt,
            json_number(&financial["totalDebt"]),
            financial_currency.clone(),
        )
        .amount(
            FactKey::Revenue,
            json_number(&income["totalRevenue"]),
            financial_currency.clone(),
        )
        .amount(
            FactKey::NetIncome,
            json_number(&income["netIncome"]),
            financial_currency,
        )
        .with_reported_name(
            json_string(&price["longName"]).or_else(|| json_string(&price["shortName"])),
        );

    if snapshot.is_empty() {
        return Err(FetchError::NotFound {
            source_id: SourceId::YahooFinance,
            ticker: ticker.to_string(),
        });
    }
    Ok(snapshot)
}

#[async_trait]
impl SourceFetcher for YahooFinanceSource {
    fn source(&self) -> SourceId {
        SourceId::YahooFinance
    }

    fn provides(&self) -> &'static [FactKey] {
        PROVIDES
    }

    async fn fetch(&self, company: &Company) -> Result<SourceSnapshot, FetchError> {
        let body = get_json(&self.client, SourceId::YahooFinance, &self.url(&company.ticker)).await?;
        parse_quote_summary(&company.ticker, &body)
    }
}
