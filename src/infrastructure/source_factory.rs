//! Source Factory
//!
//! Builds the enabled data sources once per run. HTTP sources share one
//! client and are wrapped in the retry decorator; sources whose API key is
//! missing are left out with a log line instead of failing the run.

use reqwest::Client;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::domain::entities::source::SourceId;
use crate::domain::repositories::source_fetcher::SourceFetcher;
use crate::infrastructure::alpha_vantage_client::{AlphaVantageApi, AlphaVantageSource};
use crate::infrastructure::fmp_client::FmpSource;
use crate::infrastructure::http::build_client;
use crate::infrastructure::manual_source::ManualSource;
use crate::infrastructure::presentation_source::InvestorPresentationSource;
use crate::infrastructure::retrying_source::RetryingSource;
use crate::infrastructure::scrapers::{
    CompanyWebsiteSource, JuniorMiningSource, MiningFeedsSource, TradingViewSource,
};
use crate::infrastructure::yahoo_client::YahooFinanceSource;
use crate::rate_limit::create_pacing_limiter;

/// Sources for one run, in reconciliation order
pub struct SourceRegistry {
    pub sources: Vec<Arc<dyn SourceFetcher>>,
    /// Shared with the exchange rate service when Alpha Vantage is configured
    pub alpha_vantage: Option<Arc<AlphaVantageApi>>,
}

impl SourceRegistry {
    pub fn source_ids(&self) -> Vec<SourceId> {
        self.sources.iter().map(|s| s.source()).collect()
    }
}

pub struct SourceFactory;

impl SourceFactory {
    /// Create every enabled source. The manual source is only created for
    /// interactive runs.
    pub fn create_all(config: &AppConfig, interactive: bool) -> SourceRegistry {
        let mut registry = SourceRegistry {
            sources: Vec::new(),
            alpha_vantage: None,
        };

        let client = match build_client(config.source_timeout) {
            Ok(client) => Some(client),
            Err(e) => {
                error!("✗ Failed to build HTTP client, web sources disabled: {}", e);
                None
            }
        };

        for source in &config.enabled_sources {
            let created: Option<Arc<dyn SourceFetcher>> = match source {
                SourceId::Manual => Self::create_manual(config, interactive),
                SourceId::InvestorPresentation => Some(Arc::new(
                    InvestorPresentationSource::new(config.presentations_dir.clone()),
                ) as Arc<dyn SourceFetcher>),
                _ => client
                    .as_ref()
                    .and_then(|client| Self::create_http(config, *source, client, &mut registry))
                    .map(|inner| {
                        Arc::new(RetryingSource::new(
                            inner,
                            config.retry_policy(),
                            config.source_timeout,
                        )) as Arc<dyn SourceFetcher>
                    }),
            };

            if let Some(fetcher) = created {
                info!("✓ {} source enabled", source);
                registry.sources.push(fetcher);
            }
        }

        info!("SourceFactory created {} sources", registry.sources.len());
        registry
    }

    fn create_http(
        config: &AppConfig,
        source: SourceId,
        client: &Client,
        registry: &mut SourceRegistry,
    ) -> Option<Arc<dyn SourceFetcher>> {
        let client = client.clone();
        match source {
            SourceId::YahooFinance => Some(Arc::new(YahooFinanceSource::new(client))),
            SourceId::TradingView => Some(Arc::new(TradingViewSource::new(client))),
            SourceId::MiningFeeds => Some(Arc::new(MiningFeedsSource::new(client))),
            SourceId::JuniorMiningNetwork => Some(Arc::new(JuniorMiningSource::new(client))),
            SourceId::CompanyWebsite => Some(Arc::new(CompanyWebsiteSource::new(client))),
            SourceId::AlphaVantage => {
                let Some(api_key) = config.api_key_for(source) else {
                    warn!("ALPHA_VANTAGE_API_KEY not set, Alpha Vantage source not created");
                    return None;
                };
                let limiter = create_pacing_limiter(config.alpha_vantage_calls_per_minute);
                let api = Arc::new(AlphaVantageApi::new(client, api_key, limiter));
                registry.alpha_vantage = Some(api.clone());
                Some(Arc::new(AlphaVantageSource::new(api)))
            }
            SourceId::FinancialModelingPrep => {
                let Some(api_key) = config.api_key_for(source) else {
                    warn!("FMP_API_KEY not set, Financial Modeling Prep source not created");
                    return None;
                };
                Some(Arc::new(FmpSource::new(client, api_key)))
            }
            SourceId::Manual | SourceId::InvestorPresentation => None,
        }
    }

    fn create_manual(config: &AppConfig, interactive: bool) -> Option<Arc<dyn SourceFetcher>> {
        if !interactive {
            info!("Non-interactive run, manual source not created");
            return None;
        }
        Some(Arc::new(ManualSource::stdio(config.manual_prompt_timeout)))
    }
}
