//! TradingView symbol page scraper
//!
//! Pages are addressed by exchange prefix and ticker root, so a name that
//! differs from ours is only logged.

use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use tracing::warn;

use crate::domain::entities::company::Company;
use crate::domain::entities::source::SourceId;
use crate::domain::errors::FetchError;
use crate::domain::repositories::source_fetcher::SourceFetcher;
use crate::domain::services::name_matching::names_match;
use crate::domain::value_objects::currency::Currency;
use crate::domain::value_objects::fact_key::FactKey;
use crate::domain::value_objects::reading::SourceSnapshot;
use crate::infrastructure::http::{get_text, parse_scaled_number};
use crate::infrastructure::scrapers::select_text;

const DEFAULT_BASE_URL: &str = "https://www.tradingview.com";
const SOURCE: SourceId = SourceId::TradingView;

const PROVIDES: &[FactKey] = &[FactKey::StockPrice, FactKey::MarketCap];

const PRICE_SELECTOR: &str = ".js-symbol-last, [data-qa-id='symbol-last-value']";
const MARKET_CAP_SELECTOR: &str = ".js-symbol-market-cap, [data-qa-id='market-cap-value']";
const CURRENCY_SELECTOR: &str = ".js-symbol-currency";
const NAME_SELECTOR: &str = ".tv-symbol-header__title, h1";

pub struct TradingViewSource {
    client: Client,
    base_url: String,
}

impl TradingViewSource {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, company: &Company) -> Option<String> {
        let prefix = company.exchange().tradingview_prefix()?;
        Some(format!(
            "{}/symbols/{}-{}/",
            self.base_url,
            prefix,
            company.ticker_root()
        ))
    }
}

pub(crate) fn parse_symbol_page(company: &Company, html: &str) -> Result<SourceSnapshot, FetchError> {
    let document = Html::parse_document(html);
    let currency = select_text(&document, CURRENCY_SELECTOR)
        .and_then(|c| Currency::new(&c).ok())
        .unwrap_or_else(|| company.exchange().home_currency());

    let price = select_text(&document, PRICE_SELECTOR).and_then(|t| parse_scaled_number(&t));
    let market_cap =
        select_text(&document, MARKET_CAP_SELECTOR).and_then(|t| parse_scaled_number(&t));

    let snapshot = SourceSnapshot::new(SOURCE)
        .amount(FactKey::StockPrice, price, Some(currency.clone()))
        .amount(FactKey::MarketCap, market_cap, Some(currency))
        .with_reported_name(select_text(&document, NAME_SELECTOR));

    if let Some(found) = snapshot.reported_name.as_deref() {
        if !names_match(found, company) {
            warn!(ticker = %company.ticker, found = %found, "TradingView name differs");
        }
    }

    if snapshot.is_empty() {
        return Err(FetchError::Parse {
            source_id: SOURCE,
            message: format!("no quote on symbol page for {}", company.ticker),
        });
    }
    Ok(snapshot)
}

#[async_trait]
impl SourceFetcher for TradingViewSource {
    fn source(&self) -> SourceId {
        SOURCE
    }

    fn provides(&self) -> &'static [FactKey] {
        PROVIDES
    }

    async fn fetch(&self, company: &Company) -> Result<SourceSnapshot, FetchError> {
        let url = self.url(company).ok_or_else(|| FetchError::Unsupported {
            source_id: SOURCE,
            ticker: company.ticker.clone(),
        })?;
        let html = get_text(&self.client, SOURCE, &url).await?;
        parse_symbol_page(company, &html)
    }
}
