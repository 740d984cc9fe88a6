//! Append-only provenance log file, one line per reconciled fact

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::domain::errors::PersistenceError;
use crate::domain::repositories::provenance_log::ProvenanceLog;
use crate::domain::services::reconciliation::ProvenanceEntry;

pub struct FileProvenanceLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileProvenanceLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, err: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.display().to_string(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl ProvenanceLog for FileProvenanceLog {
    async fn append(&self, entries: &[ProvenanceEntry]) -> Result<(), PersistenceError> {
        if entries.is_empty() {
            return Ok(());
        }
        let block: String = entries.iter().map(|entry| format!("{}\n", entry)).collect();

        // Lines of one ticker stay together
        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        file.write_all(block.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::source::SourceId;
    use crate::domain::services::reconciliation::ResolvedFact;
    use crate::domain::value_objects::currency::Currency;
    use crate::domain::value_objects::fact_key::FactKey;
    use chrono::{TimeZone, Utc};

    fn entry(ticker: &str, value: f64) -> ProvenanceEntry {
        ProvenanceEntry::new(
            ticker,
            ResolvedFact {
                key: FactKey::StockPrice,
                value,
                currency: Some(Currency::cad()),
                contributing_sources: vec![SourceId::YahooFinance],
                variance: 0.0,
                relative_variance: 0.0,
                flagged: false,
                timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
                observations: Vec::new(),
            },
        )
    }

    #[tokio::test]
    async fn test_appends_lines_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileProvenanceLog::new(dir.path().join("logs").join("provenance.log"));

        log.append(&[entry("XYZ.V", 5.1)]).await.unwrap();
        log.append(&[entry("ABC.TO", 1.25), entry("ABC.TO", 2.5)]).await.unwrap();
        log.append(&[]).await.unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "[2025-03-01T12:00:00Z] XYZ.V stock_price: Variance=0.0000, Resolved=5.1000 CAD"
        );
        assert!(lines[2].starts_with("[2025-03-01T12:00:00Z] ABC.TO"));
    }
}
