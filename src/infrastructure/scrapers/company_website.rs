//! Company website overview scraper
//!
//! Reserve and resource figures are pulled out of investor overview copy with
//! text patterns. Only companies with a website in the input list are covered.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::Client;
use scraper::Html;
use std::ops::Range;
use tracing::{debug, warn};

use crate::domain::entities::company::Company;
use crate::domain::entities::source::SourceId;
use crate::domain::errors::FetchError;
use crate::domain::repositories::source_fetcher::SourceFetcher;
use crate::domain::value_objects::fact_key::FactKey;
use crate::domain::value_objects::reading::{Metal, SourceSnapshot};
use crate::infrastructure::http::get_text;
use crate::infrastructure::scrapers::page_text;

const SOURCE: SourceId = SourceId::CompanyWebsite;
const OVERVIEW_PATHS: &[&str] = &["investors/overview/", "company/overview/", "about-us/"];

const PROVIDES: &[FactKey] = &[
    FactKey::ReservesAuEqMoz,
    FactKey::ResourcesAuEqMoz,
    FactKey::ReservesGoldMoz,
    FactKey::ResourcesGoldMoz,
    FactKey::ResourcesSilverMoz,
];

struct Patterns {
    resources: Regex,
    reserves: Regex,
    silver: Regex,
}

static PATTERNS: OnceCell<Patterns> = OnceCell::new();

fn patterns() -> Result<&'static Patterns, regex::Error> {
    PATTERNS.get_or_try_init(|| {
        Ok(Patterns {
            resources: Regex::new(
                r"(?is)indicated mineral resources.*?(\d+\.?\d*)\s*Moz\s*(AuEq|Au\b|gold)",
            )?,
            reserves: Regex::new(
                r"(?is)(?:proven\s+(?:and|&)\s+probable|mineral)\s+reserves?.*?(\d+\.?\d*)\s*Moz\s*(AuEq|Au\b|gold)",
            )?,
            silver: Regex::new(r"(?i)(\d+\.?\d*)\s*Moz\s*(?:of\s+)?(?:Ag\b|silver)")?,
        })
    })
}

/// An ounce figure and where it sits in the page text
struct Figure {
    moz: f64,
    gold_equivalent: bool,
    span: Range<usize>,
}

impl Figure {
    fn overlaps(&self, other: &Range<usize>) -> bool {
        self.span.start < other.end && other.start < self.span.end
    }
}

/// First match of a `<number> Moz <unit>` pattern; the span covers number and unit
fn figure(pattern: &Regex, text: &str) -> Option<Figure> {
    let caps = pattern.captures(text)?;
    let number = caps.get(1)?;
    let unit = caps.get(2)?;
    Some(Figure {
        moz: number.as_str().parse().ok()?,
        gold_equivalent: unit.as_str().eq_ignore_ascii_case("aueq"),
        span: number.start()..unit.end(),
    })
}

/// Records a figure under its Au-eq fact when stated as such, otherwise as gold
fn record(snapshot: SourceSnapshot, figure: &Figure, au_eq: FactKey, gold: FactKey) -> SourceSnapshot {
    if figure.gold_equivalent {
        snapshot.metal(au_eq, Metal::GoldEquivalent, figure.moz)
    } else {
        snapshot.amount(gold, Some(figure.moz), None)
    }
}

/// Extract ounces from overview copy.
///
/// Silver is only read next to a resource figure, from a number directly
/// followed by `Moz Ag` or `Moz silver` that is not part of another figure.
/// It is kept as its own fact and never added to a stated Au-eq figure.
pub(crate) fn parse_overview(text: &str) -> Result<Option<SourceSnapshot>, FetchError> {
    let patterns = patterns().map_err(|e| FetchError::Parse {
        source_id: SOURCE,
        message: e.to_string(),
    })?;

    let resources = figure(&patterns.resources, text);
    let reserves = figure(&patterns.reserves, text);
    if resources.is_none() && reserves.is_none() {
        return Ok(None);
    }

    let mut snapshot = SourceSnapshot::new(SOURCE);
    if let Some(resources) = &resources {
        snapshot = record(snapshot, resources, FactKey::ResourcesAuEqMoz, FactKey::ResourcesGoldMoz);

        let taken: Vec<&Figure> = [Some(resources), reserves.as_ref()].into_iter().flatten().collect();
        let silver = patterns
            .silver
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).zip(caps.get(0)))
            .find(|(_, whole)| !taken.iter().any(|f| f.overlaps(&whole.range())))
            .and_then(|(number, _)| number.as_str().parse::<f64>().ok());
        if let Some(silver) = silver {
            snapshot = snapshot.amount(FactKey::ResourcesSilverMoz, Some(silver), None);
        }
    }
    if let Some(reserves) = &reserves {
        snapshot = record(snapshot, reserves, FactKey::ReservesAuEqMoz, FactKey::ReservesGoldMoz);
    }
    Ok(Some(snapshot))
}

pub struct CompanyWebsiteSource {
    client: Client,
}

impl CompanyWebsiteSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceFetcher for CompanyWebsiteSource {
    fn source(&self) -> SourceId {
        SOURCE
    }

    fn provides(&self) -> &'static [FactKey] {
        PROVIDES
    }

    async fn fetch(&self, company: &Company) -> Result<SourceSnapshot, FetchError> {
        let website = company.website.as_deref().ok_or_else(|| FetchError::Unsupported {
            source_id: SOURCE,
            ticker: company.ticker.clone(),
        })?;

        let mut first_error = None;
        for path in OVERVIEW_PATHS {
            let url = format!("{}/{}", website, path);
            let html = match get_text(&self.client, SOURCE, &url).await {
                Ok(html) => html,
                Err(e) => {
                    debug!(ticker = %company.ticker, url = %url, "Overview page failed: {}", e);
                    first_error.get_or_insert(e);
                    continue;
                }
            };
            let text = page_text(&Html::parse_document(&html));
            if let Some(snapshot) = parse_overview(&text)? {
                return Ok(snapshot);
            }
        }

        match first_error {
            Some(e) if is_unreachable(&e) => Err(e),
            _ => {
                warn!(ticker = %company.ticker, "No reserve or resource figures on company website");
                Err(FetchError::NotFound {
                    source_id: SOURCE,
                    ticker: company.ticker.clone(),
                })
            }
        }
    }
}

/// Transport-level failures mean the site itself is unreachable
fn is_unreachable(err: &FetchError) -> bool {
    matches!(err, FetchError::Timeout { .. } | FetchError::Transport { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::exchange::Exchange;
    use crate::domain::services::reading_assembly::{ReadingAssembler, SourceResult};
    use crate::domain::services::reconciliation::FactCatalog;
    use crate::domain::value_objects::reading::Observed;

    const OVERVIEW: &str = "Our flagship project hosts Measured and Indicated Mineral Resources \
        of 38.2 Mt grading 1.9 g/t for 2.35 Moz AuEq, including 12.5 Moz Ag. \
        Proven and Probable Reserves stand at 1.1 Moz Au.";

    fn resources_au_eq(snapshot: SourceSnapshot) -> Vec<Option<f64>> {
        let catalog = FactCatalog::standard();
        let spec = catalog.get(FactKey::ResourcesAuEqMoz).unwrap();
        let results = [SourceResult::fetched(SOURCE, PROVIDES, snapshot)];
        ReadingAssembler::default()
            .readings_for(spec, Exchange::TsxVenture, &results)
            .into_iter()
            .map(|r| r.value)
            .collect()
    }

    #[test]
    fn test_parse_overview_figures() {
        let snapshot = parse_overview(OVERVIEW).unwrap().unwrap();
        assert_eq!(
            snapshot.observations_for(FactKey::ResourcesAuEqMoz).next(),
            Some(&Observed::Metal {
                metal: Metal::GoldEquivalent,
                quantity: 2.35
            })
        );
        assert_eq!(
            snapshot.observations_for(FactKey::ResourcesSilverMoz).next(),
            Some(&Observed::Amount {
                value: 12.5,
                currency: None
            })
        );
        assert_eq!(
            snapshot.observations_for(FactKey::ReservesGoldMoz).next(),
            Some(&Observed::Amount {
                value: 1.1,
                currency: None
            })
        );
        assert_eq!(snapshot.observations_for(FactKey::ReservesAuEqMoz).count(), 0);

        // the stated Au-eq figure already includes the silver
        assert_eq!(resources_au_eq(snapshot), vec![Some(2.35)]);
    }

    #[test]
    fn test_au_eq_figure_in_silver_company_copy_is_not_double_counted() {
        let snapshot = parse_overview(
            "Aftermath Silver's Berenguela project hosts indicated mineral resources of 2.0 Moz AuEq.",
        )
        .unwrap()
        .unwrap();

        assert_eq!(snapshot.observations_for(FactKey::ResourcesSilverMoz).count(), 0);
        assert_eq!(resources_au_eq(snapshot), vec![Some(2.0)]);
    }

    #[test]
    fn test_plain_gold_and_silver_become_gold_equivalent() {
        let snapshot = parse_overview(
            "Indicated mineral resources total 1.5 Moz gold and 40 Moz silver.",
        )
        .unwrap()
        .unwrap();

        assert_eq!(resources_au_eq(snapshot), vec![Some(2.0)]);
    }

    #[test]
    fn test_silver_alone_is_ignored() {
        assert_eq!(parse_overview("We produced 3.0 Moz of silver. Silver 4 Moz").unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_website_is_unsupported() {
        let source = CompanyWebsiteSource::new(Client::new());
        let company = Company::new("XYZ.V", "Xyz Gold").unwrap();
        let err = source.fetch(&company).await.unwrap_err();
        assert!(matches!(err, FetchError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn test_fetch_tries_overview_paths_in_order() {
        let mut server = mockito::Server::new_async().await;
        let investors = server
            .mock("GET", "/investors/overview/")
            .with_status(404)
            .create_async()
            .await;
        let company_page = server
            .mock("GET", "/company/overview/")
            .with_status(200)
            .with_body(format!("<html><body><p>{}</p></body></html>", OVERVIEW))
            .create_async()
            .await;

        let source = CompanyWebsiteSource::new(Client::new());
        let company = Company::new("XYZ.V", "Xyz Gold")
            .unwrap()
            .with_website(Some(server.url().as_str()));
        let snapshot = source.fetch(&company).await.unwrap();

        investors.assert_async().await;
        company_page.assert_async().await;
        assert_eq!(snapshot.observations.len(), 3);
    }
}
