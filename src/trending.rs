//! Trending read pipeline: cache lookup, concurrent page/count store
//! queries, graceful degradation to synthetic records, normalization and
//! scoring, post-score level filtering, in-memory sorting, pagination.
//!
//! The pipeline itself is a pure transformation over the fetched page; the
//! only side effects are the cache get before it and the detached cache set
//! after it. Concurrent requests may race on the set. Last write wins;
//! every writer for the same fingerprint computes the same value inside the
//! TTL window.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::cache::{fingerprint, Cache, TTL_TRENDING_SECS};
use crate::fallback::{self, SYNTHETIC_TOTAL};
use crate::records::TrendingItem;
use crate::scoring::TrendingLevel;
use crate::store::{ContentSort, RecordFilter, RecordQuery, RecordStore};

pub const PAGE_SIZE: u64 = 20;

/// Cache key version tag; bump when the cached result shape changes.
pub(crate) const CACHE_VERSION: &str = "v1";

/// Time window the trending feed looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeframe {
    Now,
    Today,
    Week,
    /// No date restriction; the wire default, so a feed over older data is
    /// not empty out of the box.
    #[default]
    Month,
}

impl Timeframe {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "now" => Self::Now,
            "today" => Self::Today,
            "week" => Self::Week,
            _ => Self::Month,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Now => "now",
            Self::Today => "today",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// Inclusive lower date bound implied by the timeframe.
    pub fn date_from(&self, now: DateTime<Utc>) -> Option<String> {
        let day = |dt: DateTime<Utc>| dt.format("%Y-%m-%d").to_string();
        match self {
            Self::Now | Self::Today => Some(day(now)),
            Self::Week => Some(day(now - Duration::days(6))),
            Self::Month => None,
        }
    }
}

/// Sort order for the trending feed, applied in memory over scored items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrendingSort {
    #[default]
    TrendingScore,
    Recency,
    Engagement,
    QualityScore,
}

impl TrendingSort {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "recency" => Self::Recency,
            "engagement" => Self::Engagement,
            "quality-score" => Self::QualityScore,
            _ => Self::TrendingScore,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrendingScore => "trending-score",
            Self::Recency => "recency",
            Self::Engagement => "engagement",
            Self::QualityScore => "quality-score",
        }
    }
}

/// Active filters for one trending request. Empty fields restrict nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrendingFilters {
    pub timeframe: Timeframe,
    pub categories: Vec<String>,
    pub sources: Vec<String>,
    pub level: TrendingLevel,
    /// Raw search text; normalized when the predicate is built.
    pub search: Option<String>,
}

/// One page of the trending feed; the unit that gets cached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendingResult {
    pub items: Vec<TrendingItem>,
    pub total: u64,
    pub next_page: Option<u64>,
}

fn cache_key(page: u64, filters: &TrendingFilters, sort: TrendingSort) -> String {
    let page = page.to_string();
    let page_size = PAGE_SIZE.to_string();
    let categories = filters.categories.join(",");
    let sources = filters.sources.join(",");
    fingerprint(&[
        Some("trending"),
        Some(&page),
        Some(&page_size),
        Some(filters.timeframe.as_str()),
        (!categories.is_empty()).then_some(categories.as_str()),
        (!sources.is_empty()).then_some(sources.as_str()),
        Some(filters.level.as_str()),
        filters.search.as_deref(),
        Some(sort.as_str()),
        Some(CACHE_VERSION),
    ])
}

fn build_filter(filters: &TrendingFilters, now: DateTime<Utc>) -> RecordFilter {
    RecordFilter {
        categories: filters.categories.clone(),
        domains: filters.sources.clone(),
        search: RecordFilter::normalize_search(filters.search.as_deref()),
        date_from: filters.timeframe.date_from(now),
        ..Default::default()
    }
}

fn sort_items(items: &mut [TrendingItem], sort: TrendingSort) {
    // Stable sort: ties keep the store's date-descending input order.
    match sort {
        TrendingSort::TrendingScore => {
            items.sort_by(|a, b| b.trending_score.total_cmp(&a.trending_score))
        }
        TrendingSort::Recency => items.sort_by(|a, b| {
            b.date
                .as_deref()
                .unwrap_or("")
                .cmp(a.date.as_deref().unwrap_or(""))
        }),
        TrendingSort::Engagement => items.sort_by(|a, b| b.engagement.cmp(&a.engagement)),
        TrendingSort::QualityScore => items.sort_by(|a, b| {
            b.quality_score
                .unwrap_or(0.0)
                .total_cmp(&a.quality_score.unwrap_or(0.0))
        }),
    }
}

/// Compute one trending page against an explicit `now` (injectable for
/// deterministic tests). Store failures degrade to synthetic records; this
/// function only fails on internal serialization problems.
pub async fn fetch_at(
    store: &dyn RecordStore,
    cache: &Cache,
    page: u64,
    filters: &TrendingFilters,
    sort: TrendingSort,
    now: DateTime<Utc>,
) -> Result<Value> {
    let page = page.max(1);
    let key = cache_key(page, filters, sort);
    if let Some(hit) = cache.get_json(&key).await {
        return Ok(hit);
    }

    let filter = build_filter(filters, now);
    // Saturating arithmetic: the page number is lenient wire input and may
    // be arbitrarily large.
    let skip = page.saturating_sub(1).saturating_mul(PAGE_SIZE);
    let query = RecordQuery {
        filter: filter.clone(),
        order: ContentSort::DateDesc,
        skip,
        take: PAGE_SIZE,
    };

    // Independent reads over the same predicate; no ordering dependency.
    let (rows, total) = match tokio::join!(store.fetch(&query), store.count(&filter)) {
        (Ok(rows), Ok(total)) => (rows, total),
        (rows_result, count_result) => {
            let err = rows_result
                .err()
                .or(count_result.err())
                .unwrap_or_else(|| anyhow::anyhow!("unknown store failure"));
            warn!(error = %err, "record store unavailable; serving synthetic trending data");
            counter!("trendfeed_store_fallbacks_total").increment(1);
            (fallback::generate(skip, PAGE_SIZE, &filter), SYNTHETIC_TOTAL)
        }
    };

    let fetched = rows.len() as u64;
    let mut items: Vec<TrendingItem> = rows
        .iter()
        .map(|r| TrendingItem::from_record(r, now))
        .collect();

    // Page-local approximation: the level filter runs over the fetched
    // window, not the whole store.
    if filters.level != TrendingLevel::All {
        items.retain(|i| i.trending_level == filters.level);
    }
    sort_items(&mut items, sort);

    let has_more = skip.saturating_add(fetched) < total;
    let result = TrendingResult {
        items,
        total,
        next_page: has_more.then(|| page + 1),
    };

    let value = serde_json::to_value(&result).context("serializing trending result")?;
    cache.put_detached(key, &value, TTL_TRENDING_SECS);
    Ok(value)
}

/// `fetch_at` against the current wall clock.
pub async fn fetch(
    store: &dyn RecordStore,
    cache: &Cache,
    page: u64,
    filters: &TrendingFilters,
    sort: TrendingSort,
) -> Result<Value> {
    fetch_at(store, cache, page, filters, sort, Utc::now()).await
}
