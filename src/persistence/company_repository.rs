//! Company Repository
//!
//! SQLite sink for reconciled facts, one row per ticker.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{debug, error};

use super::models::company_record_from_row;
use super::DbPool;
use crate::domain::entities::company::{Company, CompanyRecord};
use crate::domain::errors::PersistenceError;
use crate::domain::repositories::company_repository::CompanyRepository;
use crate::domain::services::reconciliation::ResolvedFact;
use crate::domain::value_objects::fact_key::FactKey;

/// SQLite implementation of the company repository
pub struct SqliteCompanyRepository {
    pool: DbPool,
}

impl SqliteCompanyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Upsert statement touching identity columns and the given fact columns only.
/// Column names come from `FactKey::column`, never from input.
fn upsert_sql(keys: &[FactKey]) -> String {
    let mut columns = vec!["ticker", "name", "name_alt", "website", "last_updated"]
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    for key in keys {
        columns.push(key.column().to_string());
        columns.push(format!("{}_flagged", key.column()));
    }

    let placeholders = (1..=columns.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let updates = columns[1..]
        .iter()
        .map(|column| match column.as_str() {
            "website" => "website = COALESCE(excluded.website, companies.website)".to_string(),
            _ => format!("{0} = excluded.{0}", column),
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO companies ({}) VALUES ({}) ON CONFLICT(ticker) DO UPDATE SET {}",
        columns.join(", "),
        placeholders,
        updates
    )
}

#[async_trait]
impl CompanyRepository for SqliteCompanyRepository {
    async fn ensure_company(&self, company: &Company) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO companies (ticker, name, name_alt, website, news_link)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(ticker) DO NOTHING
            "#,
        )
        .bind(&company.ticker)
        .bind(&company.name)
        .bind(&company.name_alt)
        .bind(&company.website)
        .bind(company.default_news_link())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to insert company {}: {}", company.ticker, e);
            PersistenceError::from(e)
        })?;
        Ok(())
    }

    async fn upsert(
        &self,
        company: &Company,
        facts: &[ResolvedFact],
    ) -> Result<usize, PersistenceError> {
        // Later entries for the same fact win
        let with_data: BTreeMap<FactKey, &ResolvedFact> = facts
            .iter()
            .filter(|fact| fact.has_data())
            .map(|fact| (fact.key, fact))
            .collect();

        if with_data.is_empty() {
            self.ensure_company(company).await?;
            debug!("No facts with data for {}, stored values kept", company.ticker);
            return Ok(0);
        }

        let last_updated = with_data
            .values()
            .map(|fact| fact.timestamp)
            .max()
            .unwrap_or_else(Utc::now);
        let keys: Vec<FactKey> = with_data.keys().copied().collect();
        let sql = upsert_sql(&keys);

        let mut query = sqlx::query(&sql)
            .bind(&company.ticker)
            .bind(&company.name)
            .bind(&company.name_alt)
            .bind(&company.website)
            .bind(last_updated);
        for fact in with_data.values() {
            query = query.bind(fact.value).bind(fact.flagged);
        }

        query.execute(&self.pool).await.map_err(|e| {
            error!("Failed to upsert facts for {}: {}", company.ticker, e);
            PersistenceError::from(e)
        })?;

        debug!("Stored {} facts for {}", with_data.len(), company.ticker);
        Ok(with_data.len())
    }

    async fn get(&self, ticker: &str) -> Result<Option<CompanyRecord>, PersistenceError> {
        let row = sqlx::query("SELECT * FROM companies WHERE ticker = ?1")
            .bind(ticker)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to load company {}: {}", ticker, e);
                PersistenceError::from(e)
            })?;

        row.as_ref().map(company_record_from_row).transpose()
    }

    async fn list_all(&self) -> Result<Vec<CompanyRecord>, PersistenceError> {
        let rows = sqlx::query("SELECT * FROM companies ORDER BY ticker")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to list companies: {}", e);
                PersistenceError::from(e)
            })?;

        rows.iter().map(company_record_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::source::SourceId;
    use crate::domain::value_objects::currency::Currency;
    use crate::persistence::init_database;

    fn resolved(key: FactKey, value: f64, flagged: bool, sources: Vec<SourceId>) -> ResolvedFact {
        ResolvedFact {
            key,
            value,
            currency: Some(Currency::cad()),
            contributing_sources: sources,
            variance: 0.0,
            relative_variance: 0.0,
            flagged,
            timestamp: Utc::now(),
            observations: Vec::new(),
        }
    }

    async fn repository() -> SqliteCompanyRepository {
        SqliteCompanyRepository::new(init_database("sqlite::memory:").await.unwrap())
    }

    fn company() -> Company {
        Company::new("XYZ.V", "Xyz Gold").unwrap()
    }

    #[test]
    fn test_upsert_sql_lists_only_given_facts() {
        let sql = upsert_sql(&[FactKey::StockPrice]);
        assert!(sql.contains("stock_price = excluded.stock_price"));
        assert!(sql.contains("stock_price_flagged = excluded.stock_price_flagged"));
        assert!(!sql.contains("market_cap"));
        assert!(sql.contains("VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"));
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let repo = repository().await;
        let written = repo
            .upsert(
                &company(),
                &[
                    resolved(FactKey::StockPrice, 5.1, false, vec![SourceId::YahooFinance]),
                    resolved(FactKey::MarketCap, 5.0e8, true, vec![SourceId::YahooFinance]),
                ],
            )
            .await
            .unwrap();
        assert_eq!(written, 2);

        let record = repo.get("XYZ.V").await.unwrap().unwrap();
        assert_eq!(record.fact(FactKey::StockPrice).map(|f| f.value), Some(5.1));
        assert_eq!(record.fact(FactKey::MarketCap).map(|f| f.flagged), Some(true));
        assert!(record.fact(FactKey::Cash).is_none());
        assert!(record.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_facts_without_data_keep_stored_values() {
        let repo = repository().await;
        repo.upsert(
            &company(),
            &[resolved(FactKey::StockPrice, 5.1, false, vec![SourceId::YahooFinance])],
        )
        .await
        .unwrap();

        let written = repo
            .upsert(
                &company(),
                &[
                    resolved(FactKey::StockPrice, 0.0, false, Vec::new()),
                    resolved(FactKey::Cash, 3.0e7, false, vec![SourceId::AlphaVantage]),
                ],
            )
            .await
            .unwrap();
        assert_eq!(written, 1);

        let record = repo.get("XYZ.V").await.unwrap().unwrap();
        assert_eq!(record.fact(FactKey::StockPrice).map(|f| f.value), Some(5.1));
        assert_eq!(record.fact(FactKey::Cash).map(|f| f.value), Some(3.0e7));
    }

    #[tokio::test]
    async fn test_ensure_company_and_list() {
        let repo = repository().await;
        repo.ensure_company(&company()).await.unwrap();
        repo.ensure_company(&Company::new("ABC.TO", "Abc Mining").unwrap())
            .await
            .unwrap();
        repo.upsert(&company(), &[]).await.unwrap();

        let records = repo.list_all().await.unwrap();
        let tickers: Vec<_> = records.iter().map(|r| r.ticker().to_string()).collect();
        assert_eq!(tickers, vec!["ABC.TO", "XYZ.V"]);
        assert!(records[1].facts.is_empty());
        assert_eq!(
            records[1].news_link(),
            "https://www.miningfeeds.com/company/xyz/"
        );
        assert!(repo.get("NOPE").await.unwrap().is_none());
    }
}
