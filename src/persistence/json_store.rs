//! JSON Company Store
//!
//! One pretty-printed document per ticker under a data directory. Writes
//! merge into the existing document and replace the file in one rename.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, warn};

use crate::domain::entities::company::{Company, CompanyRecord, StoredFact};
use crate::domain::errors::PersistenceError;
use crate::domain::repositories::company_repository::CompanyRepository;
use crate::domain::services::reconciliation::ResolvedFact;

pub struct JsonCompanyStore {
    dir: PathBuf,
    /// One lock per ticker; writes for different tickers run in parallel
    ticker_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

fn io_error(path: &Path, err: std::io::Error) -> PersistenceError {
    PersistenceError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

/// File name for a ticker; anything outside `[A-Za-z0-9._-]` becomes `_`
fn file_name(ticker: &str) -> String {
    let safe: String = ticker
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}.json", safe)
}

impl JsonCompanyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ticker_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_ticker(&self, ticker: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.ticker_locks.lock().await;
            locks.entry(ticker.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(file_name(ticker))
    }

    async fn read(&self, path: &Path, ticker: &str) -> Result<Option<CompanyRecord>, PersistenceError> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(path, e)),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| PersistenceError::Corrupt {
                ticker: ticker.to_string(),
                message: e.to_string(),
            })
    }

    async fn write(&self, record: &CompanyRecord) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;

        let path = self.path_for(record.ticker());
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(record)?;

        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error(&path, e))?;
        Ok(())
    }

    /// Existing record with identity fields refreshed from `company`
    async fn load_for_update(&self, company: &Company) -> Result<CompanyRecord, PersistenceError> {
        let path = self.path_for(&company.ticker);
        let mut record = match self.read(&path, &company.ticker).await? {
            Some(record) => record,
            None => {
                let mut record = CompanyRecord::new(company.clone());
                record.news_link = Some(company.default_news_link());
                record
            }
        };
        let website = company.website.clone().or(record.company.website.take());
        record.company = Company {
            website,
            ..company.clone()
        };
        Ok(record)
    }
}

#[async_trait]
impl CompanyRepository for JsonCompanyStore {
    async fn ensure_company(&self, company: &Company) -> Result<(), PersistenceError> {
        let _guard = self.lock_ticker(&company.ticker).await;
        let path = self.path_for(&company.ticker);
        if self.read(&path, &company.ticker).await?.is_some() {
            return Ok(());
        }
        let record = self.load_for_update(company).await?;
        self.write(&record).await
    }

    async fn upsert(
        &self,
        company: &Company,
        facts: &[ResolvedFact],
    ) -> Result<usize, PersistenceError> {
        let _guard = self.lock_ticker(&company.ticker).await;
        let mut record = self.load_for_update(company).await?;

        let mut written = 0;
        let mut latest = None;
        for fact in facts.iter().filter(|fact| fact.has_data()) {
            record.facts.insert(
                fact.key,
                StoredFact {
                    value: fact.value,
                    flagged: fact.flagged,
                },
            );
            latest = latest.max(Some(fact.timestamp));
            written += 1;
        }
        if written > 0 {
            record.last_updated = latest.or_else(|| Some(Utc::now()));
        }

        self.write(&record).await.map_err(|e| {
            error!("Failed to write {}: {}", company.ticker, e);
            e
        })?;
        debug!("Stored {} facts for {}", written, company.ticker);
        Ok(written)
    }

    async fn get(&self, ticker: &str) -> Result<Option<CompanyRecord>, PersistenceError> {
        self.read(&self.path_for(ticker), ticker).await
    }

    async fn list_all(&self) -> Result<Vec<CompanyRecord>, PersistenceError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.dir, e)),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let ticker = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or_default()
                .to_string();
            match self.read(&path, &ticker).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable company file {}: {}", path.display(), e),
            }
        }

        records.sort_by(|a, b| a.ticker().cmp(b.ticker()));
        Ok(records)
    }
}
