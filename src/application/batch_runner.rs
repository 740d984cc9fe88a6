//! Batch driver
//!
//! Loads nothing itself: it is handed the companies and the collaborators,
//! fans each ticker out to every source, reconciles every fact in the
//! catalog and hands the results to the sinks. A ticker is only ever
//! processed by one task, so each record has a single writer.

use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, info_span, warn, Instrument};

use crate::domain::entities::company::Company;
use crate::domain::repositories::{CompanyRepository, ProvenanceLog, SourceFetcher};
use crate::domain::services::reading_assembly::{ReadingAssembler, SourceResult};
use crate::domain::services::reconciliation::{
    FactCatalog, ProvenanceEntry, Reconciler, ResolvedFact,
};

/// Totals for one batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub companies: usize,
    pub facts_written: usize,
    pub flagged: usize,
    /// Source fetches that failed or timed out
    pub source_failures: usize,
    /// Tickers whose record could not be written
    pub persistence_failures: usize,
}

impl BatchSummary {
    fn add(mut self, outcome: TickerOutcome) -> Self {
        self.companies += 1;
        self.facts_written += outcome.facts_written;
        self.flagged += outcome.flagged;
        self.source_failures += outcome.source_failures;
        if !outcome.persisted {
            self.persistence_failures += 1;
        }
        self
    }
}

#[derive(Debug, Default)]
struct TickerOutcome {
    facts_written: usize,
    flagged: usize,
    source_failures: usize,
    persisted: bool,
}

pub struct BatchRunner {
    sources: Vec<Arc<dyn SourceFetcher>>,
    catalog: FactCatalog,
    assembler: ReadingAssembler,
    reconciler: Reconciler,
    repository: Arc<dyn CompanyRepository>,
    provenance: Vec<Arc<dyn ProvenanceLog>>,
    max_concurrent: usize,
    source_timeout: Duration,
}

impl BatchRunner {
    pub fn new(
        sources: Vec<Arc<dyn SourceFetcher>>,
        reconciler: Reconciler,
        repository: Arc<dyn CompanyRepository>,
    ) -> Self {
        Self {
            sources,
            catalog: FactCatalog::standard(),
            assembler: ReadingAssembler::default(),
            reconciler,
            repository,
            provenance: Vec::new(),
            max_concurrent: crate::config::MIN_CONCURRENT_TICKERS,
            source_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_catalog(mut self, catalog: FactCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_assembler(mut self, assembler: ReadingAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_provenance(mut self, log: Arc<dyn ProvenanceLog>) -> Self {
        self.provenance.push(log);
        self
    }

    /// Clamped to the supported 2..=5 tickers in flight
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.clamp(
            crate::config::MIN_CONCURRENT_TICKERS,
            crate::config::MAX_CONCURRENT_TICKERS,
        );
        self
    }

    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub async fn run(&self, companies: &[Company]) -> BatchSummary {
        info!(
            companies = companies.len(),
            sources = self.sources.len(),
            concurrency = self.max_concurrent,
            "Starting batch"
        );

        let summary = stream::iter(companies)
            .map(|company| {
                self.process(company)
                    .instrument(info_span!("ticker", ticker = %company.ticker))
            })
            .buffer_unordered(self.max_concurrent)
            .fold(BatchSummary::default(), |summary, outcome| async move {
                summary.add(outcome)
            })
            .await;

        info!(
            companies = summary.companies,
            facts = summary.facts_written,
            flagged = summary.flagged,
            source_failures = summary.source_failures,
            persistence_failures = summary.persistence_failures,
            "Batch finished"
        );
        summary
    }

    /// Fetch, reconcile and persist one ticker. Persistence failures are
    /// logged and reported in the outcome.
    async fn process(&self, company: &Company) -> TickerOutcome {
        let results = self.fetch_all(company).await;
        let source_failures = results.iter().filter(|r| r.snapshot.is_none()).count();
        let facts = self.reconcile(company, &results);
        let flagged = facts.iter().filter(|f| f.flagged).count();

        let mut outcome = TickerOutcome {
            flagged,
            source_failures,
            ..TickerOutcome::default()
        };

        match self.repository.upsert(company, &facts).await {
            Ok(written) => {
                outcome.facts_written = written;
                outcome.persisted = true;
                info!("✓ {} facts written, {} flagged", written, flagged);
            }
            Err(e) => error!("✗ Failed to persist {}: {}", company.ticker, e),
        }

        self.record_provenance(company, facts).await;
        outcome
    }

    /// Ask every source concurrently; failures and timeouts become empty
    /// results so the source still counts as a missing reading
    async fn fetch_all(&self, company: &Company) -> Vec<SourceResult> {
        let fetches = self.sources.iter().map(|source| async move {
            let timeout = source.fetch_timeout(self.source_timeout);
            match tokio::time::timeout(timeout, source.fetch(company)).await {
                Ok(Ok(snapshot)) => {
                    SourceResult::fetched(source.source(), source.provides(), snapshot)
                }
                Ok(Err(e)) => {
                    warn!(source = %source.source(), "Source failed: {}", e);
                    SourceResult::failed(source.source(), source.provides())
                }
                Err(_) => {
                    warn!(source = %source.source(), "Source timed out after {:?}", timeout);
                    SourceResult::failed(source.source(), source.provides())
                }
            }
        });
        join_all(fetches).await
    }

    fn reconcile(&self, company: &Company, results: &[SourceResult]) -> Vec<ResolvedFact> {
        let exchange = company.exchange();
        self.catalog
            .iter()
            .map(|spec| {
                let readings = self.assembler.readings_for(spec, exchange, results);
                self.reconciler.reconcile(spec, &readings)
            })
            .collect()
    }

    async fn record_provenance(&self, company: &Company, facts: Vec<ResolvedFact>) {
        if self.provenance.is_empty() {
            return;
        }
        let entries: Vec<ProvenanceEntry> = facts
            .into_iter()
            .filter(|fact| !fact.observations.is_empty())
            .map(|fact| ProvenanceEntry::new(&company.ticker, fact))
            .collect();
        if entries.is_empty() {
            return;
        }

        for log in &self.provenance {
            if let Err(e) = log.append(&entries).await {
                error!("✗ Failed to record provenance for {}: {}", company.ticker, e);
            }
        }
    }
}
