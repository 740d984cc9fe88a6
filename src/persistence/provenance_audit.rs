//! Fact Audit Repository
//!
//! Stores every reconciled fact with the readings behind it, so a stored
//! value can be traced back to its sources.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error};

use super::models::FactAuditRecord;
use super::DbPool;
use crate::domain::errors::PersistenceError;
use crate::domain::repositories::provenance_log::ProvenanceLog;
use crate::domain::services::reconciliation::ProvenanceEntry;
use crate::domain::value_objects::fact_key::FactKey;

/// SQLite implementation of the provenance log
pub struct SqliteProvenanceLog {
    pool: DbPool,
}

impl SqliteProvenanceLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Most recent audit rows for one fact of one ticker, newest first
    pub async fn history(
        &self,
        ticker: &str,
        fact: FactKey,
        limit: u32,
    ) -> Result<Vec<FactAuditRecord>, PersistenceError> {
        sqlx::query_as::<_, FactAuditRecord>(
            r#"
            SELECT * FROM fact_audit
            WHERE ticker = ?1 AND fact = ?2
            ORDER BY resolved_at DESC, id DESC
            LIMIT ?3
            "#,
        )
        .bind(ticker)
        .bind(fact.column())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get fact history for {} {}: {}", ticker, fact, e);
            PersistenceError::from(e)
        })
    }

    /// Flagged facts resolved at or after `since`
    pub async fn flagged_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<FactAuditRecord>, PersistenceError> {
        sqlx::query_as::<_, FactAuditRecord>(
            r#"
            SELECT * FROM fact_audit
            WHERE flagged = 1 AND resolved_at >= ?1
            ORDER BY resolved_at DESC, id DESC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get flagged facts: {}", e);
            PersistenceError::from(e)
        })
    }
}

#[async_trait]
impl ProvenanceLog for SqliteProvenanceLog {
    async fn append(&self, entries: &[ProvenanceEntry]) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;

        for entry in entries {
            let fact = &entry.fact;
            let sources_json = serde_json::to_string(&fact.contributing_sources)?;
            let observations_json = serde_json::to_string(&fact.observations)?;
            let relative_variance = fact
                .relative_variance
                .is_finite()
                .then_some(fact.relative_variance);

            sqlx::query(
                r#"
                INSERT INTO fact_audit (
                    ticker, fact, value, currency, variance, relative_variance,
                    flagged, sources_json, observations_json, resolved_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(&entry.ticker)
            .bind(fact.key.column())
            .bind(fact.value)
            .bind(fact.currency.as_ref().map(|c| c.code().to_string()))
            .bind(fact.variance)
            .bind(relative_variance)
            .bind(fact.flagged)
            .bind(&sources_json)
            .bind(&observations_json)
            .bind(fact.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to save fact audit for {}: {}", entry.ticker, e);
                PersistenceError::from(e)
            })?;
        }

        tx.commit().await?;
        debug!("Saved {} fact audit rows", entries.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::source::SourceId;
    use crate::domain::services::reconciliation::{ResolvedFact, SourceObservation};
    use crate::domain::value_objects::currency::Currency;
    use crate::persistence::init_database;

    fn entry(value: f64, flagged: bool, relative_variance: f64) -> ProvenanceEntry {
        ProvenanceEntry::new(
            "XYZ.V",
            ResolvedFact {
                key: FactKey::StockPrice,
                value,
                currency: Some(Currency::cad()),
                contributing_sources: vec![SourceId::YahooFinance],
                variance: 0.0,
                relative_variance,
                flagged,
                timestamp: Utc::now(),
                observations: vec![SourceObservation {
                    source: SourceId::YahooFinance,
                    raw_value: Some(value),
                    raw_currency: Some(Currency::cad()),
                    normalized: Some(value),
                }],
            },
        )
    }

    #[tokio::test]
    async fn test_append_and_history() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let log = SqliteProvenanceLog::new(pool);

        log.append(&[entry(5.0, false, 0.0)]).await.unwrap();
        log.append(&[entry(5.2, true, f64::INFINITY)]).await.unwrap();

        let history = log.history("XYZ.V", FactKey::StockPrice, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].value, 5.2);
        assert_eq!(history[0].relative_variance, None);
        assert_eq!(history[0].currency.as_deref(), Some("CAD"));
        assert!(history[0].observations_json.contains("yahoo"));

        let since = Utc::now() - chrono::Duration::hours(1);
        let flagged = log.flagged_since(since).await.unwrap();
        assert_eq!(flagged.len(), 1);
        assert!(flagged[0].flagged);
    }
}
