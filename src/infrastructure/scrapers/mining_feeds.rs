//! MiningFeeds stock page scraper
//!
//! Stock pages are addressed by a slug of the company name plus the venue
//! (`/stock/acme-gold-tsxv/`). The alternate name is tried when the primary
//! slug does not exist.

use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use tracing::{debug, warn};
use url::Url;

use crate::domain::entities::company::Company;
use crate::domain::entities::source::SourceId;
use crate::domain::errors::FetchError;
use crate::domain::repositories::source_fetcher::SourceFetcher;
use crate::domain::services::name_matching::{names_match, url_friendly_name};
use crate::domain::value_objects::fact_key::FactKey;
use crate::domain::value_objects::reading::SourceSnapshot;
use crate::infrastructure::http::{get_page, parse_scaled_number};
use crate::infrastructure::scrapers::select_text;

const DEFAULT_BASE_URL: &str = "https://www.miningfeeds.com";
const SOURCE: SourceId = SourceId::MiningFeeds;

const PROVIDES: &[FactKey] = &[FactKey::StockPrice, FactKey::MarketCap];

const PRICE_SELECTOR: &str = ".stock-data .price";
const MARKET_CAP_SELECTOR: &str = ".stock-data .market-cap";
const NAME_SELECTOR: &str = ".company-breadcrumbs .active a, h1";

pub struct MiningFeedsSource {
    client: Client,
    base_url: String,
}

impl MiningFeedsSource {
    pub fn new(client: Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Candidate page slugs, primary name first
    fn slugs(company: &Company) -> Option<Vec<String>> {
        let venue = company.exchange().mining_feeds_slug()?;
        let mut slugs: Vec<String> = std::iter::once(company.name.as_str())
            .chain(company.name_alt.as_deref())
            .map(url_friendly_name)
            .filter(|name| !name.is_empty())
            .map(|name| format!("{}-{}", name, venue))
            .collect();
        slugs.dedup();
        Some(slugs)
    }

    fn url(&self, slug: &str) -> String {
        format!("{}/stock/{}/", self.base_url, slug)
    }
}

/// True when no redirect happened between the request and the response
fn served_as_requested(requested_url: &str, final_url: &str) -> bool {
    match (Url::parse(requested_url), Url::parse(final_url)) {
        (Ok(requested), Ok(served)) => requested == served,
        _ => requested_url == final_url,
    }
}

/// Parse a stock page. The slug is built from our own company name, so a
/// page name that does not match is accepted only when the page was served
/// from exactly the requested URL; after any redirect it is rejected.
pub(crate) fn parse_stock_page(
    company: &Company,
    html: &str,
    requested_url: &str,
    final_url: &str,
) -> Result<SourceSnapshot, FetchError> {
    let document = Html::parse_document(html);
    let found = select_text(&document, NAME_SELECTOR);

    if let Some(found) = found.as_deref() {
        if !names_match(found, company) {
            if served_as_requested(requested_url, final_url) {
                warn!(ticker = %company.ticker, found = %found, "MiningFeeds name differs, page was not redirected");
            } else {
                return Err(FetchError::NameMismatch {
                    source_id: SOURCE,
                    ticker: company.ticker.clone(),
                    found: found.to_string(),
                });
            }
        }
    }

    let currency = company.exchange().home_currency();
    let price = select_text(&document, PRICE_SELECTOR).and_then(|t| parse_scaled_number(&t));
    let market_cap =
        select_text(&document, MARKET_CAP_SELECTOR).and_then(|t| parse_scaled_number(&t));

    let snapshot = SourceSnapshot::new(SOURCE)
        .amount(FactKey::StockPrice, price, Some(currency.clone()))
        .amount(FactKey::MarketCap, market_cap, Some(currency))
        .with_reported_name(found);

    if snapshot.is_empty() {
        return Err(FetchError::Parse {
            source_id: SOURCE,
            message: format!("no stock data on page {}", final_url),
        });
    }
    Ok(snapshot)
}

#[async_trait]
impl SourceFetcher for MiningFeedsSource {
    fn source(&self) -> SourceId {
        SOURCE
    }

    fn provides(&self) -> &'static [FactKey] {
        PROVIDES
    }

    async fn fetch(&self, company: &Company) -> Result<SourceSnapshot, FetchError> {
        let slugs = Self::slugs(company).ok_or_else(|| FetchError::Unsupported {
            source_id: SOURCE,
            ticker: company.ticker.clone(),
        })?;

        for slug in &slugs {
            let url = self.url(slug);
            match get_page(&self.client, SOURCE, &url).await {
                Ok((html, final_url)) => {
                    return parse_stock_page(company, &html, &url, &final_url);
                }
                Err(FetchError::HttpStatus { status: 404, .. }) => {
                    debug!(ticker = %company.ticker, slug = %slug, "MiningFeeds page not found");
                }
                Err(e) => return Err(e),
            }
        }

        Err(FetchError::NotFound {
            source_id: SOURCE,
            ticker: company.ticker.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(name: &str) -> String {
        format!(
            r##"<html><body>
              <ul class="company-breadcrumbs"><li class="active"><a href="/company">{}</a></li></ul>
              <div class="stock-data">
                <span class="price">$5.10</span>
                <span class="market-cap">501.2M</span>
              </div>
            </body></html>"##,
            name
        )
    }

    fn company() -> Company {
        Company::new("XYZ.V", "Xyz Gold Corp")
            .unwrap()
            .with_name_alt(Some("Xyz Resources"))
    }

    #[test]
    fn test_slugs_include_alternate_name() {
        assert_eq!(
            MiningFeedsSource::slugs(&company()),
            Some(vec![
                "xyz-gold-corp-tsxv".to_string(),
                "xyz-resources-tsxv".to_string()
            ])
        );
        let us = Company::new("NEM", "Newmont").unwrap();
        assert_eq!(MiningFeedsSource::slugs(&us), None);
    }

    const REQUESTED: &str = "https://www.miningfeeds.com/stock/xyz-gold-corp-tsxv/";

    #[test]
    fn test_parse_stock_page() {
        let snapshot =
            parse_stock_page(&company(), &page("Xyz Gold Corp."), REQUESTED, REQUESTED).unwrap();
        assert_eq!(snapshot.observations.len(), 2);
        assert_eq!(snapshot.reported_name.as_deref(), Some("Xyz Gold Corp."));
    }

    #[test]
    fn test_mismatched_name_on_redirected_page_is_rejected() {
        let served = "https://www.miningfeeds.com/stock/other-metals-tsxv/";
        let err = parse_stock_page(&company(), &page("Other Metals Ltd"), REQUESTED, served)
            .unwrap_err();
        assert!(matches!(err, FetchError::NameMismatch { .. }));
    }

    #[test]
    fn test_redirect_to_url_containing_our_slug_is_still_a_redirect() {
        let served = "https://www.miningfeeds.com/stock/xyz-gold-corp-tsxv-delisted/";
        let err = parse_stock_page(&company(), &page("Other Metals Ltd"), REQUESTED, served)
            .unwrap_err();
        assert!(matches!(err, FetchError::NameMismatch { .. }));
    }

    #[test]
    fn test_mismatched_name_on_requested_page_is_kept() {
        let snapshot =
            parse_stock_page(&company(), &page("Other Metals Ltd"), REQUESTED, REQUESTED).unwrap();
        assert_eq!(snapshot.observations.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_falls_back_to_alternate_slug() {
        let mut server = mockito::Server::new_async().await;
        let primary = server
            .mock("GET", "/stock/xyz-gold-corp-tsxv/")
            .with_status(404)
            .create_async()
            .await;
        let alternate = server
            .mock("GET", "/stock/xyz-resources-tsxv/")
            .with_status(200)
            .with_body(page("Xyz Resources Inc"))
            .create_async()
            .await;

        let source = MiningFeedsSource::with_base_url(Client::new(), &server.url());
        let snapshot = source.fetch(&company()).await.unwrap();

        primary.assert_async().await;
        alternate.assert_async().await;
        assert_eq!(snapshot.observations.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_not_found_when_no_slug_exists() {
        let mut server = mockito::Server::new_async().await;
        let _any = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let source = MiningFeedsSource::with_base_url(Client::new(), &server.url());
        let err = source.fetch(&company()).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound { .. }));
    }
}
