use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter configuration
pub struct RateLimiterConfig {
    /// Maximum requests per minute
    pub requests_per_minute: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 100, // Default: 100 requests per minute
        }
    }
}

/// Process-local rate limiter, shared by handle
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Create a new rate limiter; a zero rate is raised to one per minute
pub fn create_rate_limiter(config: RateLimiterConfig) -> GlobalRateLimiter {
    let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)))
}

/// Limiter for paced API sources. Burst is one call, so waiting on it spaces
/// calls evenly across the minute.
pub fn create_pacing_limiter(calls_per_minute: u32) -> GlobalRateLimiter {
    let per_minute = NonZeroU32::new(calls_per_minute).unwrap_or(NonZeroU32::MIN);
    let quota = Quota::per_minute(per_minute).allow_burst(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(quota))
}

/// Middleware to apply rate limiting
pub async fn rate_limit_middleware(
    State(limiter): State<GlobalRateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    match limiter.check() {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::warn!("Rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded. Please try again later.",
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_creation() {
        let config = RateLimiterConfig {
            requests_per_minute: 50,
        };
        let limiter = create_rate_limiter(config);

        // Should allow first request
        assert!(limiter.check().is_ok());
    }

    #[test]
    fn test_default_config() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.requests_per_minute, 100);
    }

    #[test]
    fn test_zero_rate_does_not_panic() {
        let limiter = create_rate_limiter(RateLimiterConfig {
            requests_per_minute: 0,
        });
        assert!(limiter.check().is_ok());
    }

    #[test]
    fn test_pacing_limiter_allows_one_call_at_a_time() {
        let limiter = create_pacing_limiter(4);
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }
}
