//! Source Fetcher Trait
//!
//! Every data source (JSON APIs, scraped pages, operator input) implements
//! `SourceFetcher`. A broken selector or an expired API key is then a failure
//! of one implementation, reported as a `FetchError`, and never reaches the
//! reconciler.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::entities::company::Company;
use crate::domain::entities::source::SourceId;
use crate::domain::errors::FetchError;
use crate::domain::value_objects::fact_key::FactKey;
use crate::domain::value_objects::reading::SourceSnapshot;

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    fn source(&self) -> SourceId;

    /// Facts this source can report; a failed fetch becomes a missing
    /// reading for each of them
    fn provides(&self) -> &'static [FactKey];

    async fn fetch(&self, company: &Company) -> Result<SourceSnapshot, FetchError>;

    /// Upper bound on one `fetch`, given the batch-wide default
    fn fetch_timeout(&self, default: Duration) -> Duration {
        default
    }
}
