use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderName, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::application::listing_cache::ListingCache;
use crate::domain::repositories::CompanyRepository;
use crate::domain::services::listing::{
    filter_listings, sort_listings, CompanyListing, SortKey, SortOrder,
};

/// Shared state for the read API
#[derive(Clone)]
pub struct ApiState {
    pub repository: Arc<dyn CompanyRepository>,
    pub cache: Arc<ListingCache>,
}

impl ApiState {
    pub fn new(repository: Arc<dyn CompanyRepository>, cache: Arc<ListingCache>) -> Self {
        Self { repository, cache }
    }
}

/// Query parameters for the listing endpoint
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListingQuery {
    /// Column to sort by (name, ticker, any fact column, ev_per_oz, market_cap_per_oz)
    pub sort: Option<String>,
    /// `asc` (default) or `desc`
    pub order: Option<String>,
    /// Case-insensitive name or ticker filter
    pub search: Option<String>,
    /// Pagination page number (default 1)
    pub page: Option<u32>,
    /// Results per page (max 100); everything when absent
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListingResponse {
    pub companies: Vec<CompanyListing>,
    pub total: usize,
    pub page: u32,
    pub limit: Option<u32>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn parse_order(order: Option<&str>) -> Result<SortOrder, ApiError> {
    match order.map(|o| o.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("asc") => Ok(SortOrder::Ascending),
        Some("desc") => Ok(SortOrder::Descending),
        Some(other) => Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Invalid order: {}", other),
        )),
    }
}

/// Comparison table of every stored company
pub async fn get_listing(
    State(state): State<ApiState>,
    Query(params): Query<ListingQuery>,
) -> Result<([(HeaderName, String); 1], Json<ListingResponse>), ApiError> {
    let sort = params
        .sort
        .as_deref()
        .map(str::parse::<SortKey>)
        .transpose()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    let order = parse_order(params.order.as_deref())?;

    let cached = state
        .cache
        .get_or_load(state.repository.as_ref())
        .await
        .map_err(|e| {
            error!("Failed to load listing: {}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load companies")
        })?;

    let mut listings = filter_listings(cached.to_vec(), params.search.as_deref().unwrap_or(""));
    if let Some(sort) = sort {
        sort_listings(&mut listings, sort, order);
    }
    let total = listings.len();

    // Parse pagination
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.map(|limit| limit.clamp(1, 100));
    let companies = match limit {
        Some(limit) => listings
            .into_iter()
            .skip((page as usize - 1) * limit as usize)
            .take(limit as usize)
            .collect(),
        None => listings,
    };

    let cache_control = format!("public, max-age={}", state.cache.ttl().as_secs());
    Ok((
        [(header::CACHE_CONTROL, cache_control)],
        Json(ListingResponse {
            companies,
            total,
            page,
            limit,
        }),
    ))
}

/// One company by ticker
pub async fn get_company(
    State(state): State<ApiState>,
    Path(ticker): Path<String>,
) -> Result<Json<CompanyListing>, ApiError> {
    let ticker = ticker.trim().to_ascii_uppercase();
    match state.repository.get(&ticker).await {
        Ok(Some(record)) => Ok(Json(CompanyListing::from_record(&record))),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Unknown ticker: {}", ticker),
        )),
        Err(e) => {
            error!(ticker = %ticker, "Failed to load company: {}", e);
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load company",
            ))
        }
    }
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
