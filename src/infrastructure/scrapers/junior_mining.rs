//! Junior Mining Network group page scraper
//!
//! Quotes come from the gold and silver stock tables rather than per-company
//! pages. A table is shared by every ticker in a batch, so parsed rows are
//! cached for a short time.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::entities::company::Company;
use crate::domain::entities::source::SourceId;
use crate::domain::errors::FetchError;
use crate::domain::repositories::source_fetcher::SourceFetcher;
use crate::domain::services::name_matching::{names_match, normalize_name};
use crate::domain::value_objects::fact_key::FactKey;
use crate::domain::value_objects::reading::SourceSnapshot;
use crate::infrastructure::http::{get_text, parse_scaled_number};
use crate::infrastructure::scrapers::element_text;

const DEFAULT_BASE_URL: &str = "https://www.juniorminingnetwork.com";
const GROUP_PAGES: &[&str] = &[
    "mining-stocks/gold-mining-stocks.html",
    "mining-stocks/silver-mining-stocks.html",
];
const SOURCE: SourceId = SourceId::JuniorMiningNetwork;
const PAGE_TTL: Duration = Duration::from_secs(600);

const PROVIDES: &[FactKey] = &[FactKey::StockPrice, FactKey::MarketCap];

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StockRow {
    pub ticker: String,
    pub name: String,
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
}

impl StockRow {
    fn matches(&self, company: &Company) -> bool {
        let ticker = self.ticker.to_ascii_uppercase();
        if !ticker.is_empty() && (ticker == company.ticker || ticker == company.ticker_root()) {
            return true;
        }
        let row_name = normalize_name(&self.name);
        !row_name.is_empty()
            && std::iter::once(company.name.as_str())
                .chain(company.name_alt.as_deref())
                .any(|candidate| normalize_name(candidate) == row_name)
    }
}

/// Rows of a `.stock-table`
pub(crate) fn parse_stock_table(html: &str) -> Vec<StockRow> {
    let document = Html::parse_document(html);
    let (Ok(rows), Ok(ticker), Ok(company), Ok(last), Ok(cap)) = (
        Selector::parse(".stock-table tbody tr"),
        Selector::parse(".ticker"),
        Selector::parse(".company"),
        Selector::parse(".last-trade"),
        Selector::parse(".market-cap"),
    ) else {
        return Vec::new();
    };

    document
        .select(&rows)
        .map(|row| {
            let cell = |selector: &Selector| row.select(selector).next().map(element_text);
            StockRow {
                ticker: cell(&ticker).unwrap_or_default(),
                name: cell(&company).unwrap_or_default(),
                price: cell(&last).and_then(|t| parse_scaled_number(&t)),
                market_cap: cell(&cap).and_then(|t| parse_scaled_number(&t)),
            }
        })
        .collect()
}

pub struct JuniorMiningSource {
    client: Client,
    base_url: String,
    cache: Mutex<HashMap<String, (Instant, Arc<Vec<StockRow>>)>>,
}

impl JuniorMiningSource {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn rows(&self, page: &str) -> Result<Arc<Vec<StockRow>>, FetchError> {
        let mut cache = self.cache.lock().await;
        if let Some((fetched_at, rows)) = cache.get(page) {
            if fetched_at.elapsed() < PAGE_TTL {
                return Ok(rows.clone());
            }
        }

        let url = format!("{}/{}", self.base_url, page);
        let html = get_text(&self.client, SOURCE, &url).await?;
        let rows = Arc::new(parse_stock_table(&html));
        debug!(page = %page, rows = rows.len(), "Junior Mining Network table loaded");
        cache.insert(page.to_string(), (Instant::now(), rows.clone()));
        Ok(rows)
    }
}

#[async_trait]
impl SourceFetcher for JuniorMiningSource {
    fn source(&self) -> SourceId {
        SOURCE
    }

    fn provides(&self) -> &'static [FactKey] {
        PROVIDES
    }

    async fn fetch(&self, company: &Company) -> Result<SourceSnapshot, FetchError> {
        let mut first_error = None;

        for page in GROUP_PAGES {
            let rows = match self.rows(page).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(ticker = %company.ticker, page = %page, "Junior Mining Network page failed: {}", e);
                    first_error.get_or_insert(e);
                    continue;
                }
            };

            let Some(row) = rows.iter().find(|row| row.matches(company)) else {
                continue;
            };
            if row.price.is_none() && row.market_cap.is_none() {
                continue;
            }
            if !names_match(&row.name, company) {
                warn!(ticker = %company.ticker, found = %row.name, "Junior Mining Network name differs");
            }

            return Ok(SourceSnapshot::new(SOURCE)
                .amount(FactKey::StockPrice, row.price.filter(|p| *p > 0.0), None)
                .amount(FactKey::MarketCap, row.market_cap.filter(|c| *c > 0.0), None)
                .with_reported_name(Some(row.name.clone())));
        }

        Err(first_error.unwrap_or_else(|| FetchError::NotFound {
            source_id: SOURCE,
            ticker: company.ticker.clone(),
        }))
    }
}
