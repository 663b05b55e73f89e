//! HTTP surface for the dashboard client.
//!
//! All read parameters are parsed leniently: bad pages, sorts, timeframes
//! and levels fall back to safe defaults instead of a 4xx. The only client
//! error on this surface is the sources write path, which requires `url`
//! and `domain`.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{debug, error};

use crate::cache::{fingerprint, Cache, TTL_REFERENCE_SECS};
use crate::listing::{self, ListingParams};
use crate::scoring::TrendingLevel;
use crate::store::{ContentSort, NewSource, RecordStore};
use crate::trending::{self, Timeframe, TrendingFilters, TrendingSort, CACHE_VERSION};

/// Shared state: the injected collaborators, constructed once per process.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub cache: Cache,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/content", get(list_content))
        .route("/api/trending", get(trending_feed))
        .route("/api/categories", get(list_categories))
        .route("/api/domains", get(list_domains))
        .route("/api/stats", get(category_stats))
        .route("/api/sources", get(list_sources).post(create_source))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Lenient page parse: unparseable or non-positive values mean page 1.
fn parse_page(raw: Option<&str>) -> u64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
        .map(|n| n as u64)
        .unwrap_or(1)
}

/// Trim a query value; blank means absent.
fn clean(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Comma-separated list parameter.
fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Short anonymized id for logging user search text; never log it raw.
fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn internal_error(message: &'static str, err: anyhow::Error) -> Response {
    // The generic message goes to the client; detail stays in the logs.
    error!(error = ?err, "{message}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContentParams {
    page: Option<String>,
    category: Option<String>,
    domain: Option<String>,
    q: Option<String>,
    sort: Option<String>,
    #[serde(rename = "dateFrom")]
    date_from: Option<String>,
    #[serde(rename = "dateTo")]
    date_to: Option<String>,
}

async fn list_content(State(state): State<AppState>, Query(p): Query<ContentParams>) -> Response {
    let params = ListingParams {
        page: parse_page(p.page.as_deref()),
        category: clean(p.category),
        domain: clean(p.domain),
        search: clean(p.q),
        sort: p.sort.as_deref().map(ContentSort::parse).unwrap_or_default(),
        date_from: clean(p.date_from),
        date_to: clean(p.date_to),
    };
    if let Some(q) = params.search.as_deref() {
        debug!(q = %anon_hash(q), "content search");
    }
    match listing::fetch(state.store.as_ref(), &state.cache, &params).await {
        Ok(value) => Json(value).into_response(),
        Err(err) => internal_error("failed to fetch content", err),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TrendingParams {
    page: Option<String>,
    q: Option<String>,
    timeframe: Option<String>,
    sort: Option<String>,
    category: Option<String>,
    categories: Option<String>,
    sources: Option<String>,
    level: Option<String>,
}

async fn trending_feed(State(state): State<AppState>, Query(p): Query<TrendingParams>) -> Response {
    let page = parse_page(p.page.as_deref());
    let mut categories = split_list(p.categories.as_deref());
    if let Some(cat) = clean(p.category) {
        if !categories.contains(&cat) {
            categories.push(cat);
        }
    }
    let filters = TrendingFilters {
        timeframe: p
            .timeframe
            .as_deref()
            .map(Timeframe::parse)
            .unwrap_or_default(),
        categories,
        sources: split_list(p.sources.as_deref()),
        level: p
            .level
            .as_deref()
            .map(TrendingLevel::parse)
            .unwrap_or_default(),
        search: clean(p.q),
    };
    // The feed's wire default is recency; an explicit junk value still
    // parses to the pipeline default.
    let sort = p
        .sort
        .as_deref()
        .map(TrendingSort::parse)
        .unwrap_or(TrendingSort::Recency);
    if let Some(q) = filters.search.as_deref() {
        debug!(q = %anon_hash(q), "trending search");
    }

    match trending::fetch(state.store.as_ref(), &state.cache, page, &filters, sort).await {
        Ok(value) => Json(value).into_response(),
        Err(err) => {
            error!(error = ?err, "trending feed failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "failed to fetch trending data",
                    "items": [],
                    "total": 0,
                    "nextPage": null,
                })),
            )
                .into_response()
        }
    }
}

async fn list_categories(State(state): State<AppState>) -> Response {
    let key = fingerprint(&[Some("categories"), Some(CACHE_VERSION)]);
    if let Some(hit) = state.cache.get_json(&key).await {
        return Json(hit).into_response();
    }
    match state.store.categories().await {
        Ok(list) => {
            let value = json!(list);
            state.cache.put_detached(key, &value, TTL_REFERENCE_SECS);
            Json(value).into_response()
        }
        Err(err) => internal_error("failed to fetch categories", err),
    }
}

async fn list_domains(State(state): State<AppState>) -> Response {
    let key = fingerprint(&[Some("domains"), Some(CACHE_VERSION)]);
    if let Some(hit) = state.cache.get_json(&key).await {
        return Json(hit).into_response();
    }
    match state.store.domains().await {
        Ok(list) => {
            let value = json!(list);
            state.cache.put_detached(key, &value, TTL_REFERENCE_SECS);
            Json(value).into_response()
        }
        Err(err) => internal_error("failed to fetch domains", err),
    }
}

async fn category_stats(State(state): State<AppState>) -> Response {
    let key = fingerprint(&[Some("stats"), Some("categories"), Some(CACHE_VERSION)]);
    if let Some(hit) = state.cache.get_json(&key).await {
        return Json(hit).into_response();
    }
    match state.store.category_counts().await {
        Ok(rows) => {
            let mut counts: BTreeMap<String, u64> = BTreeMap::new();
            for (category, n) in rows {
                *counts
                    .entry(category.unwrap_or_else(|| "Unknown".to_string()))
                    .or_insert(0) += n;
            }
            let value = json!(counts);
            state.cache.put_detached(key, &value, TTL_REFERENCE_SECS);
            Json(value).into_response()
        }
        Err(err) => internal_error("failed to fetch stats", err),
    }
}

async fn list_sources(State(state): State<AppState>) -> Response {
    // Not cached: a POST upsert must be visible immediately.
    match state.store.active_sources().await {
        Ok(sources) => Json(json!(sources)).into_response(),
        Err(err) => internal_error("failed to fetch sources", err),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SourcePayload {
    url: Option<String>,
    domain: Option<String>,
    category: Option<String>,
}

async fn create_source(State(state): State<AppState>, Json(body): Json<SourcePayload>) -> Response {
    let (Some(url), Some(domain)) = (clean(body.url), clean(body.domain)) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "url and domain required" })),
        )
            .into_response();
    };
    let source = NewSource {
        url,
        domain,
        category: clean(body.category),
    };
    match state.store.upsert_source(source).await {
        Ok(created) => Json(json!(created)).into_response(),
        Err(err) => internal_error("failed to save source", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_parsing_defaults_to_one() {
        assert_eq!(parse_page(None), 1);
        assert_eq!(parse_page(Some("")), 1);
        assert_eq!(parse_page(Some("abc")), 1);
        assert_eq!(parse_page(Some("0")), 1);
        assert_eq!(parse_page(Some("-3")), 1);
        assert_eq!(parse_page(Some(" 4 ")), 4);
    }

    #[test]
    fn list_splitting_drops_blanks() {
        assert_eq!(split_list(Some("a, b ,,c")), vec!["a", "b", "c"]);
        assert_eq!(split_list(Some("")), Vec::<String>::new());
        assert_eq!(split_list(None), Vec::<String>::new());
    }

    #[test]
    fn anon_hash_is_short_and_stable() {
        let h = anon_hash("market crash");
        assert_eq!(h.len(), 12);
        assert_eq!(h, anon_hash("market crash"));
        assert_ne!(h, anon_hash("market rally"));
    }
}
