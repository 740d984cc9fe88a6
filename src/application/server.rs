//! Read API router and server lifecycle

use axum::{middleware, routing::get, Router};
use std::net::SocketAddr;
use std::path::Path;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::application::handlers::companies_handler::{
    get_company, get_listing, health_check, ApiState,
};
use crate::rate_limit::{create_rate_limiter, rate_limit_middleware, RateLimiterConfig};

/// API routes, static frontend fallback, global rate limit, CORS and tracing
pub fn build_router(state: ApiState, public_dir: &Path, requests_per_minute: u32) -> Router {
    let limiter = create_rate_limiter(RateLimiterConfig {
        requests_per_minute,
    });

    Router::new()
        .route("/health", get(health_check))
        .route("/api/data", get(get_listing))
        .route("/api/companies/:ticker", get(get_company))
        .with_state(state)
        .fallback_service(ServeDir::new(public_dir))
        .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Serve until Ctrl+C or SIGTERM
pub async fn serve(app: Router, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("✓ Read API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Read API stopped");
    Ok(())
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C signal"),
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("Received SIGTERM signal");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutting down gracefully...");
}
