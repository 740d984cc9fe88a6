//! Database Models
//!
//! Row mappings for the companies and fact_audit tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use crate::domain::entities::company::{Company, CompanyRecord, StoredFact};
use crate::domain::errors::PersistenceError;
use crate::domain::value_objects::fact_key::FactKey;

/// Map a `companies` row. NULL fact columns mean the fact was never written.
pub fn company_record_from_row(row: &SqliteRow) -> Result<CompanyRecord, PersistenceError> {
    let company = Company {
        ticker: row.try_get("ticker")?,
        name: row.try_get("name")?,
        name_alt: row.try_get("name_alt")?,
        website: row.try_get("website")?,
    };

    let mut record = CompanyRecord::new(company);
    for key in FactKey::ALL {
        let value: Option<f64> = row.try_get(key.column())?;
        let flagged: bool = row.try_get(format!("{}_flagged", key.column()).as_str())?;
        if let Some(value) = value {
            record.facts.insert(key, StoredFact { value, flagged });
        }
    }
    record.news_link = row.try_get("news_link")?;
    record.last_updated = row.try_get("last_updated")?;
    Ok(record)
}

/// Fact audit record in database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FactAuditRecord {
    pub id: i64,
    pub ticker: String,
    pub fact: String,
    pub value: f64,
    pub currency: Option<String>,
    pub variance: f64,
    pub relative_variance: Option<f64>,
    pub flagged: bool,
    pub sources_json: String,       // JSON array of source ids
    pub observations_json: String,  // JSON array of observations
    pub resolved_at: DateTime<Utc>,
}
