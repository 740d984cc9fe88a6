use async_trait::async_trait;

use crate::domain::errors::PersistenceError;
use crate::domain::services::reconciliation::ProvenanceEntry;

/// Append-only audit sink, one entry per reconciled fact per ticker
#[async_trait]
pub trait ProvenanceLog: Send + Sync {
    async fn append(&self, entries: &[ProvenanceEntry]) -> Result<(), PersistenceError>;
}
