//! Retry decorator for source fetchers
//!
//! Every attempt gets the source's own timeout; transient failures are retried
//! with exponential backoff. Parse, not-found and name-mismatch failures are
//! returned at once.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::entities::company::Company;
use crate::domain::entities::source::SourceId;
use crate::domain::errors::FetchError;
use crate::domain::repositories::source_fetcher::SourceFetcher;
use crate::domain::value_objects::fact_key::FactKey;
use crate::domain::value_objects::reading::SourceSnapshot;
use crate::retry::{retry_with_policy, RetryPolicy};

pub struct RetryingSource {
    inner: Arc<dyn SourceFetcher>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
}

impl RetryingSource {
    pub fn new(inner: Arc<dyn SourceFetcher>, policy: RetryPolicy, attempt_timeout: Duration) -> Self {
        let attempt_timeout = inner.fetch_timeout(attempt_timeout);
        Self {
            inner,
            policy,
            attempt_timeout,
        }
    }
}

#[async_trait]
impl SourceFetcher for RetryingSource {
    fn source(&self) -> SourceId {
        self.inner.source()
    }

    fn provides(&self) -> &'static [FactKey] {
        self.inner.provides()
    }

    async fn fetch(&self, company: &Company) -> Result<SourceSnapshot, FetchError> {
        let source_id = self.inner.source();
        let operation = format!("{} {}", source_id, company.ticker);
        let inner = &self.inner;
        let attempt_timeout = self.attempt_timeout;
        retry_with_policy(&self.policy, &operation, || async move {
            tokio::time::timeout(attempt_timeout, inner.fetch(company))
                .await
                .unwrap_or(Err(FetchError::Timeout { source_id }))
        })
        .await
    }

    /// Covers every attempt plus the backoff between them
    fn fetch_timeout(&self, _default: Duration) -> Duration {
        let attempts = self.policy.max_attempts.max(1);
        let backoff: Duration = (0..attempts - 1)
            .map(|attempt| self.policy.delay_for_attempt(attempt) + self.policy.jitter)
            .sum();
        self.attempt_timeout * attempts + backoff
    }
}
