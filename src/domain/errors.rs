use thiserror::Error;

use crate::domain::entities::source::SourceId;

/// Invalid input at a domain boundary (currency codes, tickers)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid currency code: '{0}'")]
    InvalidCurrency(String),

    #[error("Invalid ticker: '{0}'")]
    InvalidTicker(String),
}

/// Misconfiguration detected while building fact specs, sources or settings.
///
/// These are programming or deployment errors and are the only failures
/// reconciliation setup is allowed to surface.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid variance threshold for {fact}: {value}")]
    InvalidThreshold { fact: String, value: f64 },

    #[error("Unknown source: '{0}'")]
    UnknownSource(String),

    #[error("Missing API key for {0}")]
    MissingApiKey(SourceId),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Failure of a single source fetch.
///
/// A fetch failure never reaches the reconciler: the batch driver degrades
/// it into a missing reading for every fact the source provides.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchError {
    #[error("{source_id} request timed out")]
    Timeout { source_id: SourceId },

    #[error("{source_id} transport error: {message}")]
    Transport { source_id: SourceId, message: String },

    #[error("{source_id} returned HTTP {status}")]
    HttpStatus { source_id: SourceId, status: u16 },

    #[error("{source_id} returned malformed data: {message}")]
    Parse { source_id: SourceId, message: String },

    #[error("{source_id} has no data for {ticker}")]
    NotFound { source_id: SourceId, ticker: String },

    #[error("{source_id} does not cover {ticker}")]
    Unsupported { source_id: SourceId, ticker: String },

    #[error("{source_id} page for {ticker} names '{found}', which does not match")]
    NameMismatch {
        source_id: SourceId,
        ticker: String,
        found: String,
    },

    #[error("{source_id} rate limit reached: {message}")]
    RateLimited { source_id: SourceId, message: String },
}

impl FetchError {
    pub fn source_id(&self) -> SourceId {
        match self {
            FetchError::Timeout { source_id }
            | FetchError::Transport { source_id, .. }
            | FetchError::HttpStatus { source_id, .. }
            | FetchError::Parse { source_id, .. }
            | FetchError::NotFound { source_id, .. }
            | FetchError::Unsupported { source_id, .. }
            | FetchError::NameMismatch { source_id, .. }
            | FetchError::RateLimited { source_id, .. } => *source_id,
        }
    }

    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. }
            | FetchError::Transport { .. }
            | FetchError::RateLimited { .. } => true,
            FetchError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            FetchError::Parse { .. }
            | FetchError::NotFound { .. }
            | FetchError::Unsupported { .. }
            | FetchError::NameMismatch { .. } => false,
        }
    }
}

/// Failure while loading the company list
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to read companies file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Malformed CSV record at line {line}: {message}")]
    Csv { line: u64, message: String },

    #[error("Missing required column {0}")]
    MissingColumn(String),
}

/// Failure of a persistence sink. Propagated to the batch driver,
/// which logs it and moves on to the next ticker.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt stored record for {ticker}: {message}")]
    Corrupt { ticker: String, message: String },
}

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        PersistenceError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_and_server_errors_are_retryable() {
        let timeout = FetchError::Timeout {
            source_id: SourceId::YahooFinance,
        };
        let server = FetchError::HttpStatus {
            source_id: SourceId::YahooFinance,
            status: 503,
        };
        let throttled = FetchError::HttpStatus {
            source_id: SourceId::FinancialModelingPrep,
            status: 429,
        };
        assert!(timeout.is_retryable());
        assert!(server.is_retryable());
        assert!(throttled.is_retryable());
    }

    #[test]
    fn test_data_errors_are_not_retryable() {
        let not_found = FetchError::NotFound {
            source_id: SourceId::MiningFeeds,
            ticker: "XYZ.TO".to_string(),
        };
        let client_error = FetchError::HttpStatus {
            source_id: SourceId::TradingView,
            status: 404,
        };
        assert!(!not_found.is_retryable());
        assert!(!client_error.is_retryable());
    }

    #[test]
    fn test_fetch_error_carries_source() {
        let err = FetchError::Parse {
            source_id: SourceId::AlphaVantage,
            message: "missing field".to_string(),
        };
        assert_eq!(err.source_id(), SourceId::AlphaVantage);
        assert_eq!(
            err.to_string(),
            "alpha_vantage returned malformed data: missing field"
        );
    }
}
