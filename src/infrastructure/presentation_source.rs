//! Investor presentation figures
//!
//! Presentations and technical report summaries are saved under one
//! directory as `<TICKER>...pdf`, or as a `.txt` text dump of one. Every
//! ounce figure in the text is classified by the words within 50 bytes of it.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::domain::entities::company::Company;
use crate::domain::entities::source::SourceId;
use crate::domain::errors::FetchError;
use crate::domain::repositories::source_fetcher::SourceFetcher;
use crate::domain::value_objects::fact_key::FactKey;
use crate::domain::value_objects::reading::{Metal, SourceSnapshot};
use crate::infrastructure::http::parse_scaled_number;

const SOURCE: SourceId = SourceId::InvestorPresentation;
const CONTEXT_BYTES: usize = 50;

const PROVIDES: &[FactKey] = &[
    FactKey::ReservesAuEqMoz,
    FactKey::ResourcesAuEqMoz,
    FactKey::ReservesGoldMoz,
    FactKey::ReservesSilverMoz,
    FactKey::ResourcesGoldMoz,
    FactKey::ResourcesSilverMoz,
    FactKey::ProductionAuEqKoz,
    FactKey::AiscLastYear,
];

struct Patterns {
    figure: Regex,
    au_eq_unit: Regex,
    aisc: Regex,
    gold: Regex,
    silver: Regex,
    resources: Regex,
    reserves: Regex,
    production: Regex,
}

static PATTERNS: OnceCell<Patterns> = OnceCell::new();

fn patterns() -> Result<&'static Patterns, regex::Error> {
    PATTERNS.get_or_try_init(|| {
        Ok(Patterns {
            figure: Regex::new(
                r"(?i)(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)\s*(moz|million ounces|koz|thousand ounces)\b",
            )?,
            au_eq_unit: Regex::new(r"(?i)^\s*(?:aueq|au[\s-]?eq|gold[\s-]equivalent|geo)")?,
            aisc: Regex::new(
                r"(?i)(?:aisc|all-in sustaining costs?)[^$\d]{0,40}(?:us)?\$\s*(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)",
            )?,
            gold: Regex::new(r"\b(?:gold|au)\b")?,
            silver: Regex::new(r"\b(?:silver|ag)\b")?,
            resources: Regex::new(r"resources|indicated|inferred|measured")?,
            reserves: Regex::new(r"reserves|proven|probable")?,
            production: Regex::new(r"production|produced")?,
        })
    })
}

/// Largest char boundary at or below `index`
fn floor_boundary(text: &str, mut index: usize) -> usize {
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Smallest char boundary at or above `index`
fn ceil_boundary(text: &str, mut index: usize) -> usize {
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Which fact an ounce figure belongs to, and whether it is already Au-eq
fn classify(
    patterns: &Patterns,
    context: &str,
    thousands: bool,
    gold_equivalent: bool,
) -> Option<(FactKey, Metal)> {
    let gold = patterns.gold.is_match(context);
    let silver = patterns.silver.is_match(context);
    let resources = patterns.resources.is_match(context);
    let reserves = patterns.reserves.is_match(context);

    if thousands {
        let produced = patterns.production.is_match(context);
        return (produced && (gold || gold_equivalent))
            .then_some((FactKey::ProductionAuEqKoz, Metal::GoldEquivalent));
    }

    if gold_equivalent {
        if resources {
            return Some((FactKey::ResourcesAuEqMoz, Metal::GoldEquivalent));
        }
        if reserves {
            return Some((FactKey::ReservesAuEqMoz, Metal::GoldEquivalent));
        }
        return None;
    }

    match (gold, silver, resources, reserves) {
        (true, _, true, _) => Some((FactKey::ResourcesGoldMoz, Metal::Gold)),
        (_, true, true, _) => Some((FactKey::ResourcesSilverMoz, Metal::Silver)),
        (true, _, _, true) => Some((FactKey::ReservesGoldMoz, Metal::Gold)),
        (_, true, _, true) => Some((FactKey::ReservesSilverMoz, Metal::Silver)),
        _ => None,
    }
}

/// Classify every ounce figure and the first AISC figure in presentation
/// text. The first figure found for a fact wins.
pub fn extract_figures(text: &str) -> Result<SourceSnapshot, FetchError> {
    let patterns = patterns().map_err(|e| FetchError::Parse {
        source_id: SOURCE,
        message: e.to_string(),
    })?;

    let mut snapshot = SourceSnapshot::new(SOURCE);
    let mut seen: Vec<FactKey> = Vec::new();

    for caps in patterns.figure.captures_iter(text) {
        let (Some(whole), Some(number), Some(unit)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let Some(value) = parse_scaled_number(number.as_str()) else {
            continue;
        };

        let start = floor_boundary(text, whole.start().saturating_sub(CONTEXT_BYTES));
        let end = ceil_boundary(text, (whole.end() + CONTEXT_BYTES).min(text.len()));
        let context = text[start..end].to_lowercase();
        let unit = unit.as_str().to_lowercase();
        let thousands = unit == "koz" || unit == "thousand ounces";
        let gold_equivalent = patterns.au_eq_unit.is_match(&text[whole.end()..]);

        let Some((key, metal)) = classify(patterns, &context, thousands, gold_equivalent) else {
            continue;
        };
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        snapshot = if key.metal().is_some() {
            snapshot.amount(key, Some(value), None)
        } else {
            snapshot.metal(key, metal, value)
        };
    }

    let aisc = patterns
        .aisc
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_scaled_number(m.as_str()));
    if let Some(aisc) = aisc {
        snapshot = snapshot.amount(FactKey::AiscLastYear, Some(aisc), None);
    }

    Ok(snapshot)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn is_text(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
}

pub struct InvestorPresentationSource {
    dir: PathBuf,
}

impl InvestorPresentationSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Presentation files for a ticker, in name order
    async fn files_for(&self, ticker: &str) -> Result<Vec<PathBuf>, FetchError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Presentation directory {} unreadable: {}", self.dir.display(), e);
                return Ok(Vec::new());
            }
        };

        let prefix = ticker.to_ascii_uppercase();
        let mut files = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(FetchError::Transport {
                        source_id: SOURCE,
                        message: e.to_string(),
                    })
                }
            };
            let path = entry.path();
            let matches_ticker = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.to_ascii_uppercase().starts_with(&prefix));
            if matches_ticker && (is_pdf(&path) || is_text(&path)) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    async fn read_text(path: &Path) -> Result<String, FetchError> {
        let parse_error = |message: String| FetchError::Parse {
            source_id: SOURCE,
            message: format!("{}: {}", path.display(), message),
        };

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| parse_error(e.to_string()))?;
        if !is_pdf(path) {
            return String::from_utf8(bytes).map_err(|e| parse_error(e.to_string()));
        }

        tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| parse_error(e.to_string()))?
            .map_err(|e| parse_error(e.to_string()))
    }
}

#[async_trait]
impl SourceFetcher for InvestorPresentationSource {
    fn source(&self) -> SourceId {
        SOURCE
    }

    fn provides(&self) -> &'static [FactKey] {
        PROVIDES
    }

    async fn fetch(&self, company: &Company) -> Result<SourceSnapshot, FetchError> {
        let files = self.files_for(&company.ticker).await?;
        if files.is_empty() {
            return Err(FetchError::Unsupported {
                source_id: SOURCE,
                ticker: company.ticker.clone(),
            });
        }

        let mut snapshot = SourceSnapshot::new(SOURCE);
        for path in &files {
            let text = match Self::read_text(path).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(ticker = %company.ticker, "Skipping presentation: {}", e);
                    continue;
                }
            };
            let figures = extract_figures(&text)?;
            debug!(
                ticker = %company.ticker,
                file = %path.display(),
                "{} figures extracted",
                figures.observations.len()
            );
            snapshot = snapshot.merge(figures);
        }

        if snapshot.is_empty() {
            return Err(FetchError::NotFound {
                source_id: SOURCE,
                ticker: company.ticker.clone(),
            });
        }
        info!(
            ticker = %company.ticker,
            "✓ {} figures from {} presentation files",
            snapshot.observations.len(),
            files.len()
        );
        Ok(snapshot)
    }
}
