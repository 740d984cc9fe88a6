//! TTL cache for the read API listing
//!
//! Owned by the router state; there is no process-wide cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::errors::PersistenceError;
use crate::domain::repositories::CompanyRepository;
use crate::domain::services::listing::CompanyListing;

#[derive(Debug, Clone)]
struct CachedListing {
    loaded_at: Instant,
    listings: Arc<Vec<CompanyListing>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
pub struct ListingCache {
    ttl: Duration,
    entry: Mutex<Option<CachedListing>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ListingCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether an entry loaded at `loaded_at` is stale at `now`
    pub fn is_expired_at(&self, loaded_at: Instant, now: Instant) -> bool {
        now.saturating_duration_since(loaded_at) >= self.ttl
    }

    /// Whether the current entry is stale at `now`. An empty cache is expired.
    pub async fn is_expired(&self, now: Instant) -> bool {
        match &*self.entry.lock().await {
            Some(cached) => self.is_expired_at(cached.loaded_at, now),
            None => true,
        }
    }

    /// Cached listing, reloaded from the repository once the TTL has passed.
    /// Concurrent callers wait for a single reload.
    pub async fn get_or_load(
        &self,
        repository: &dyn CompanyRepository,
    ) -> Result<Arc<Vec<CompanyListing>>, PersistenceError> {
        let mut entry = self.entry.lock().await;
        let now = Instant::now();

        if let Some(cached) = entry.as_ref() {
            if !self.is_expired_at(cached.loaded_at, now) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(cached.listings.clone());
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let records = repository.list_all().await?;
        let listings: Arc<Vec<CompanyListing>> =
            Arc::new(records.iter().map(CompanyListing::from_record).collect());
        debug!(companies = listings.len(), "Listing cache reloaded");

        *entry = Some(CachedListing {
            loaded_at: now,
            listings: listings.clone(),
        });
        Ok(listings)
    }

    pub async fn invalidate(&self) {
        *self.entry.lock().await = None;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
