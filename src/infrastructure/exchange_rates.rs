//! Live exchange rates for the reconciler
//!
//! Rates are pulled from a provider once per batch and cached; any currency
//! the provider cannot quote keeps its fallback rate.

use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::errors::FetchError;
use crate::domain::services::currency_converter::{CurrencyConverter, RateTable};
use crate::domain::value_objects::currency::Currency;
use crate::infrastructure::alpha_vantage_client::AlphaVantageApi;

const RATE_CACHE_CAPACITY: usize = 32;
pub const DEFAULT_RATE_TTL: Duration = Duration::from_secs(3600);

#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Units of `to` per unit of `from`
    async fn exchange_rate(&self, from: &Currency, to: &Currency) -> Result<f64, FetchError>;
}

#[async_trait]
impl RateProvider for AlphaVantageApi {
    async fn exchange_rate(&self, from: &Currency, to: &Currency) -> Result<f64, FetchError> {
        AlphaVantageApi::exchange_rate(self, from, to).await
    }
}

/// Rate table shared with the reconciler while the service updates it
#[derive(Debug, Default)]
pub struct LiveRates {
    table: RwLock<RateTable>,
}

impl LiveRates {
    pub fn new(table: RateTable) -> Self {
        Self {
            table: RwLock::new(table),
        }
    }

    pub fn pivot(&self) -> Currency {
        self.table
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .pivot()
            .clone()
    }

    fn set_rate(&self, currency: Currency, rate_to_pivot: f64) -> bool {
        self.table
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .set_rate(currency, rate_to_pivot)
    }
}

impl CurrencyConverter for LiveRates {
    fn rate(&self, from: &Currency, to: &Currency) -> Option<f64> {
        self.table
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .rate(from, to)
    }
}

pub struct ExchangeRateService {
    provider: Option<Arc<dyn RateProvider>>,
    rates: Arc<LiveRates>,
    cache: Mutex<LruCache<Currency, (f64, Instant)>>,
    ttl: Duration,
}

impl ExchangeRateService {
    pub fn new(provider: Option<Arc<dyn RateProvider>>, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(RATE_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            provider,
            rates: Arc::new(LiveRates::default()),
            cache: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Fallback rates only
    pub fn offline() -> Self {
        Self::new(None, DEFAULT_RATE_TTL)
    }

    pub fn converter(&self) -> Arc<dyn CurrencyConverter> {
        self.rates.clone()
    }

    /// Quote each currency against the pivot. Returns how many live rates are
    /// in effect afterwards; failures keep the previous rate.
    pub async fn refresh(&self, currencies: &[Currency]) -> usize {
        let Some(provider) = &self.provider else {
            info!("No exchange rate provider configured, using fallback rates");
            return 0;
        };
        let pivot = self.rates.pivot();
        let mut cache = self.cache.lock().await;
        let mut live = 0;

        for currency in currencies.iter().filter(|c| **c != pivot) {
            if let Some((_, fetched_at)) = cache.get(currency) {
                if fetched_at.elapsed() < self.ttl {
                    live += 1;
                    continue;
                }
            }

            match provider.exchange_rate(currency, &pivot).await {
                Ok(rate) if self.rates.set_rate(currency.clone(), rate) => {
                    info!("Exchange rate {}/{} = {}", currency, pivot, rate);
                    cache.put(currency.clone(), (rate, Instant::now()));
                    live += 1;
                }
                Ok(rate) => warn!("Ignoring unusable rate {}/{}: {}", currency, pivot, rate),
                Err(e) => warn!("Exchange rate {}/{} unavailable, keeping fallback: {}", currency, pivot, e),
            }
        }

        live
    }
}
