//! HTML page sources
//!
//! Each scraper owns its URLs and selectors. When a site changes its markup
//! only that scraper starts failing; the other sources keep reporting.

pub mod company_website;
pub mod junior_mining;
pub mod mining_feeds;
pub mod tradingview;

pub use company_website::CompanyWebsiteSource;
pub use junior_mining::JuniorMiningSource;
pub use mining_feeds::MiningFeedsSource;
pub use tradingview::TradingViewSource;

use scraper::{ElementRef, Html, Selector};

/// Whitespace-collapsed text of an element
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of the first element matching `css`; a comma list acts as ordered fallbacks
pub(crate) fn select_text(document: &Html, css: &str) -> Option<String> {
    css.split(',').map(str::trim).find_map(|candidate| {
        let selector = Selector::parse(candidate).ok()?;
        document
            .select(&selector)
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

/// Visible text of a whole page
pub(crate) fn page_text(document: &Html) -> String {
    element_text(document.root_element())
}
