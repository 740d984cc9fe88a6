use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::entities::source::SourceId;
use crate::domain::services::gold_equivalent::SILVER_GOLD_RATIO;
use crate::retry::RetryPolicy;

/// Where reconciled records are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    Json,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "db" => Ok(StorageBackend::Sqlite),
            "json" => Ok(StorageBackend::Json),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

/// Runtime configuration for batch runs and the read API
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub companies_csv: PathBuf,
    pub data_dir: PathBuf,
    pub database_url: String,
    pub storage_backend: StorageBackend,
    pub provenance_log_path: PathBuf,
    pub presentations_dir: PathBuf,

    // Batch
    pub max_concurrent_tickers: usize, // 2..=5 tickers in flight
    pub source_timeout: Duration,      // Per-source fetch timeout
    pub fetch_max_attempts: u32,
    pub fetch_base_delay: Duration,
    pub enabled_sources: Vec<SourceId>,
    pub silver_gold_ratio: f64,

    // Source credentials, never hardcoded
    pub alpha_vantage_api_key: Option<String>,
    pub fmp_api_key: Option<String>,
    pub alpha_vantage_calls_per_minute: u32,
    pub manual_prompt_timeout: Duration,

    // Read API
    pub api_bind_addr: SocketAddr,
    pub api_cache_ttl: Duration,
    pub api_requests_per_minute: u32,
    pub public_dir: PathBuf,
}

pub const MIN_CONCURRENT_TICKERS: usize = 2;
pub const MAX_CONCURRENT_TICKERS: usize = 5;

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            companies_csv: PathBuf::from("public/data/companies.csv"),
            data_dir: PathBuf::from("data"),
            database_url: "sqlite://data/mining_companies.db".to_string(),
            storage_backend: StorageBackend::Sqlite,
            provenance_log_path: PathBuf::from("data/provenance.log"),
            presentations_dir: PathBuf::from("data/presentations"),

            max_concurrent_tickers: MIN_CONCURRENT_TICKERS,
            source_timeout: Duration::from_secs(30),
            fetch_max_attempts: 3,
            fetch_base_delay: Duration::from_secs(5),
            enabled_sources: vec![
                SourceId::YahooFinance,
                SourceId::AlphaVantage,
                SourceId::FinancialModelingPrep,
                SourceId::TradingView,
                SourceId::MiningFeeds,
                SourceId::JuniorMiningNetwork,
                SourceId::CompanyWebsite,
                SourceId::InvestorPresentation,
            ],
            silver_gold_ratio: SILVER_GOLD_RATIO,

            alpha_vantage_api_key: None,
            fmp_api_key: None,
            alpha_vantage_calls_per_minute: 4, // Free tier allows ~4.5
            manual_prompt_timeout: Duration::from_secs(60),

            api_bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            api_cache_ttl: Duration::from_secs(15 * 60),
            api_requests_per_minute: 100,
            public_dir: PathBuf::from("public"),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl AppConfig {
    /// Load configuration from environment variables, keeping defaults for
    /// anything unset or invalid
    pub fn from_env() -> AppConfig {
        let mut config = AppConfig::default();

        if let Ok(path) = std::env::var("COMPANIES_CSV") {
            config.companies_csv = PathBuf::from(path);
        }

        if let Ok(dir) = std::env::var("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }

        if let Ok(backend) = std::env::var("STORAGE_BACKEND") {
            match backend.parse::<StorageBackend>() {
                Ok(value) => config.storage_backend = value,
                Err(e) => tracing::warn!(
                    "Invalid STORAGE_BACKEND: {}, using default: {:?}",
                    e,
                    config.storage_backend
                ),
            }
        }

        if let Ok(path) = std::env::var("PROVENANCE_LOG") {
            config.provenance_log_path = PathBuf::from(path);
        }

        if let Ok(dir) = std::env::var("PRESENTATIONS_DIR") {
            config.presentations_dir = PathBuf::from(dir);
        }

        if let Ok(concurrency) = std::env::var("MAX_CONCURRENT_TICKERS") {
            match concurrency.parse::<usize>() {
                Ok(value) if (MIN_CONCURRENT_TICKERS..=MAX_CONCURRENT_TICKERS).contains(&value) => {
                    config.max_concurrent_tickers = value;
                }
                Ok(value) => {
                    tracing::warn!(
                        "Invalid MAX_CONCURRENT_TICKERS value: {} (must be between {} and {}), using default: {}",
                        value, MIN_CONCURRENT_TICKERS, MAX_CONCURRENT_TICKERS, config.max_concurrent_tickers
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse MAX_CONCURRENT_TICKERS '{}': {}, using default: {}",
                        concurrency,
                        e,
                        config.max_concurrent_tickers
                    );
                }
            }
        }

        if let Ok(timeout) = std::env::var("SOURCE_TIMEOUT_MS") {
            if let Ok(value) = timeout.parse::<u64>() {
                if value > 0 {
                    config.source_timeout = Duration::from_millis(value);
                }
            }
        }

        if let Ok(attempts) = std::env::var("FETCH_MAX_ATTEMPTS") {
            if let Ok(value) = attempts.parse::<u32>() {
                if (1..=10).contains(&value) {
                    config.fetch_max_attempts = value;
                }
            }
        }

        if let Ok(delay) = std::env::var("FETCH_BASE_DELAY_MS") {
            if let Ok(value) = delay.parse::<u64>() {
                config.fetch_base_delay = Duration::from_millis(value);
            }
        }

        if let Ok(sources) = std::env::var("ENABLED_SOURCES") {
            match parse_sources(&sources) {
                Ok(list) if !list.is_empty() => config.enabled_sources = list,
                Ok(_) => tracing::warn!("ENABLED_SOURCES is empty, using default sources"),
                Err(e) => tracing::warn!("Invalid ENABLED_SOURCES: {}, using default sources", e),
            }
        }

        if let Ok(ratio) = std::env::var("SILVER_GOLD_RATIO") {
            match ratio.parse::<f64>() {
                Ok(value) if value.is_finite() && value > 0.0 => config.silver_gold_ratio = value,
                _ => tracing::warn!(
                    "Invalid SILVER_GOLD_RATIO '{}', using default: {}",
                    ratio,
                    config.silver_gold_ratio
                ),
            }
        }

        config.alpha_vantage_api_key = std::env::var("ALPHA_VANTAGE_API_KEY").ok().and_then(non_empty);
        config.fmp_api_key = std::env::var("FMP_API_KEY").ok().and_then(non_empty);

        if let Ok(rate) = std::env::var("ALPHA_VANTAGE_CALLS_PER_MINUTE") {
            if let Ok(value) = rate.parse::<u32>() {
                if value > 0 {
                    config.alpha_vantage_calls_per_minute = value;
                }
            }
        }

        if let Ok(timeout) = std::env::var("MANUAL_PROMPT_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse::<u64>() {
                config.manual_prompt_timeout = Duration::from_secs(value);
            }
        }

        if let Ok(addr) = std::env::var("API_BIND_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(value) => config.api_bind_addr = value,
                Err(e) => tracing::warn!(
                    "Failed to parse API_BIND_ADDR '{}': {}, using default: {}",
                    addr,
                    e,
                    config.api_bind_addr
                ),
            }
        }

        if let Ok(ttl) = std::env::var("API_CACHE_TTL_SECONDS") {
            if let Ok(value) = ttl.parse::<u64>() {
                config.api_cache_ttl = Duration::from_secs(value);
            }
        }

        if let Ok(limit) = std::env::var("API_REQUESTS_PER_MINUTE") {
            if let Ok(value) = limit.parse::<u32>() {
                if value > 0 {
                    config.api_requests_per_minute = value;
                }
            }
        }

        if let Ok(dir) = std::env::var("PUBLIC_DIR") {
            config.public_dir = PathBuf::from(dir);
        }

        config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.fetch_max_attempts, self.fetch_base_delay)
    }

    /// Directory holding one JSON document per ticker
    pub fn json_store_dir(&self) -> PathBuf {
        self.data_dir.join("companies")
    }

    pub fn api_key_for(&self, source: SourceId) -> Option<&str> {
        match source {
            SourceId::AlphaVantage => self.alpha_vantage_api_key.as_deref(),
            SourceId::FinancialModelingPrep => self.fmp_api_key.as_deref(),
            _ => None,
        }
    }
}

/// Parse a comma-separated source list, e.g. `yahoo,tradingview,mining_feeds`
pub fn parse_sources(list: &str) -> Result<Vec<SourceId>, String> {
    let mut sources = Vec::new();
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let source = name.parse::<SourceId>().map_err(|e| e.to_string())?;
        if !sources.contains(&source) {
            sources.push(source);
        }
    }
    Ok(sources)
}
