//! Companies input file
//!
//! Columns are matched case-insensitively: `TICKER`, `NAME`, optional
//! `NAMEALT` and optional `WEBSITE`. Rows with an unusable ticker are skipped.

use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

use crate::domain::entities::company::Company;
use crate::domain::errors::IngestError;

struct Columns {
    ticker: usize,
    name: usize,
    name_alt: Option<usize>,
    website: Option<usize>,
}

impl Columns {
    fn resolve(headers: &StringRecord) -> Result<Self, IngestError> {
        let find = |names: &[&str]| {
            headers.iter().position(|h| {
                let h = h.to_ascii_uppercase();
                names.iter().any(|n| *n == h)
            })
        };
        Ok(Self {
            ticker: find(&["TICKER"]).ok_or_else(|| IngestError::MissingColumn("TICKER".into()))?,
            name: find(&["NAME"]).ok_or_else(|| IngestError::MissingColumn("NAME".into()))?,
            name_alt: find(&["NAMEALT", "NAME_ALT"]),
            website: find(&["WEBSITE", "COMPANY_WEBSITE"]),
        })
    }
}

/// Parse companies from CSV text, keeping the first row per ticker
pub fn parse_companies(text: &str) -> Result<Vec<Company>, IngestError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| IngestError::Csv {
            line: 1,
            message: e.to_string(),
        })?
        .clone();
    let columns = Columns::resolve(&headers)?;

    let mut seen = HashSet::new();
    let mut companies = Vec::new();

    for (index, result) in reader.records().enumerate() {
        let line = index + 2;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(line, "Skipping malformed companies row: {}", e);
                continue;
            }
        };
        let field = |i: Option<usize>| i.and_then(|i| record.get(i)).filter(|v| !v.is_empty());

        let company = match Company::new(
            field(Some(columns.ticker)).unwrap_or_default(),
            field(Some(columns.name)).unwrap_or_default(),
        ) {
            Ok(company) => company
                .with_name_alt(field(columns.name_alt))
                .with_website(field(columns.website)),
            Err(e) => {
                warn!(line, "Skipping companies row: {}", e);
                continue;
            }
        };

        if seen.insert(company.ticker.clone()) {
            companies.push(company);
        } else {
            warn!(line, ticker = %company.ticker, "Duplicate ticker ignored");
        }
    }

    Ok(companies)
}

pub async fn load_companies(path: &Path) -> Result<Vec<Company>, IngestError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| IngestError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    let companies = parse_companies(&text)?;
    info!("Loaded {} companies from {}", companies.len(), path.display());
    Ok(companies)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_companies() {
        let text = "\u{feff}Ticker,Name,NameAlt,Website\n\
                    abx.to,Barrick Gold Corp, Barrick ,https://www.barrick.com/\n\
                    XYZ.V,Xyz Gold,,\n";
        let companies = parse_companies(text).unwrap();

        assert_eq!(companies.len(), 2);
        assert_eq!(companies[0].ticker, "ABX.TO");
        assert_eq!(companies[0].name_alt.as_deref(), Some("Barrick"));
        assert_eq!(companies[0].website.as_deref(), Some("https://www.barrick.com"));
        assert!(companies[1].name_alt.is_none());
        assert!(companies[1].website.is_none());
    }

    #[test]
    fn test_invalid_and_duplicate_rows_are_skipped() {
        let text = "TICKER,NAME\nundefined,Ghost\n,Empty\nXYZ.V,Xyz Gold\nxyz.v,Xyz Again\nABC.CN,Abc\n";
        let tickers: Vec<_> = parse_companies(text)
            .unwrap()
            .into_iter()
            .map(|c| c.ticker)
            .collect();
        assert_eq!(tickers, vec!["XYZ.V", "ABC.CN"]);
    }

    #[test]
    fn test_missing_ticker_column_is_an_error() {
        let err = parse_companies("SYMBOL,NAME\nXYZ.V,Xyz\n").unwrap_err();
        assert_eq!(err.to_string(), "Missing required column TICKER");
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = load_companies(Path::new("/nonexistent/companies.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Io { .. }));
    }
}
