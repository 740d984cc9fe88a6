use async_trait::async_trait;

use crate::domain::entities::company::{Company, CompanyRecord};
use crate::domain::errors::PersistenceError;
use crate::domain::services::reconciliation::ResolvedFact;

/// Persistence sink for company records, keyed by ticker
#[async_trait]
pub trait CompanyRepository: Send + Sync {
    /// Create the record with identity fields only, if it does not exist
    async fn ensure_company(&self, company: &Company) -> Result<(), PersistenceError>;

    /// Write the facts that have at least one contributing source and return
    /// how many were written. Facts without data never overwrite stored values.
    async fn upsert(
        &self,
        company: &Company,
        facts: &[ResolvedFact],
    ) -> Result<usize, PersistenceError>;

    async fn get(&self, ticker: &str) -> Result<Option<CompanyRecord>, PersistenceError>;

    async fn list_all(&self) -> Result<Vec<CompanyRecord>, PersistenceError>;
}
