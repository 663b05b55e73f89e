//! Content listing pipeline: filtered, store-sorted, paginated records.
//!
//! Same cache-aside shape as the trending pipeline, but ordering is pushed
//! to the store and there is no synthetic fallback here: a store outage
//! propagates and the API layer answers with a generic error document.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{fingerprint, Cache, TTL_CONTENT_SECS};
use crate::records::TrendingItem;
use crate::store::{ContentSort, RecordFilter, RecordQuery, RecordStore};
use crate::trending::{CACHE_VERSION, PAGE_SIZE};

/// Parameters of one listing request, already defaulted by the API layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingParams {
    pub page: u64,
    pub category: Option<String>,
    pub domain: Option<String>,
    /// Raw search text; normalized when the predicate is built.
    pub search: Option<String>,
    pub sort: ContentSort,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

/// One listing page; the cached unit for the content endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListingResult {
    pub items: Vec<TrendingItem>,
    pub total: u64,
    pub next_page: Option<u64>,
}

fn cache_key(page: u64, params: &ListingParams) -> String {
    let page = page.to_string();
    let page_size = PAGE_SIZE.to_string();
    fingerprint(&[
        Some("content"),
        Some(&page),
        Some(&page_size),
        params.category.as_deref(),
        params.domain.as_deref(),
        params.search.as_deref(),
        Some(params.sort.as_str()),
        params.date_from.as_deref(),
        params.date_to.as_deref(),
        Some(CACHE_VERSION),
    ])
}

fn build_filter(params: &ListingParams) -> RecordFilter {
    RecordFilter {
        category: params.category.clone(),
        domain: params.domain.clone(),
        search: RecordFilter::normalize_search(params.search.as_deref()),
        date_from: params.date_from.clone(),
        date_to: params.date_to.clone(),
        ..Default::default()
    }
}

/// Compute one listing page against an explicit `now`. Store failures
/// propagate to the caller.
pub async fn fetch_at(
    store: &dyn RecordStore,
    cache: &Cache,
    params: &ListingParams,
    now: DateTime<Utc>,
) -> Result<Value> {
    let page = params.page.max(1);
    let key = cache_key(page, params);
    if let Some(hit) = cache.get_json(&key).await {
        return Ok(hit);
    }

    let filter = build_filter(params);
    // Saturating arithmetic: the page number is lenient wire input and may
    // be arbitrarily large.
    let skip = page.saturating_sub(1).saturating_mul(PAGE_SIZE);
    let query = RecordQuery {
        filter: filter.clone(),
        order: params.sort,
        skip,
        take: PAGE_SIZE,
    };

    let (rows, total) = match tokio::join!(store.fetch(&query), store.count(&filter)) {
        (Ok(rows), Ok(total)) => (rows, total),
        (rows_result, count_result) => {
            return Err(rows_result
                .err()
                .or(count_result.err())
                .unwrap_or_else(|| anyhow::anyhow!("unknown store failure"))
                .context("content listing query"));
        }
    };

    let fetched = rows.len() as u64;
    let items: Vec<TrendingItem> = rows
        .iter()
        .map(|r| TrendingItem::from_record(r, now))
        .collect();

    let has_more = skip.saturating_add(fetched) < total;
    let result = ListingResult {
        items,
        total,
        next_page: has_more.then(|| page + 1),
    };

    let value = serde_json::to_value(&result).context("serializing listing result")?;
    cache.put_detached(key, &value, TTL_CONTENT_SECS);
    Ok(value)
}

/// `fetch_at` against the current wall clock.
pub async fn fetch(store: &dyn RecordStore, cache: &Cache, params: &ListingParams) -> Result<Value> {
    fetch_at(store, cache, params, Utc::now()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::ContentRecord;
    use crate::store::{DisconnectedStore, MemoryStore};

    fn now() -> DateTime<Utc> {
        "2026-08-01T12:00:00Z".parse().expect("fixed now")
    }

    fn record(id: &str, category: &str, domain: &str, date: &str, quality: &str) -> ContentRecord {
        ContentRecord {
            id: id.into(),
            category: Some(category.into()),
            domain: Some(domain.into()),
            title: Some(format!("Article {id}")),
            published_at: Some(date.into()),
            quality_score: Some(quality.into()),
            ..Default::default()
        }
    }

    fn result_from(value: Value) -> ListingResult {
        serde_json::from_value(value).expect("listing result shape")
    }

    fn store() -> MemoryStore {
        MemoryStore::new(vec![
            record("a", "Tech", "tech.io", "2026-07-03", "40"),
            record("b", "Tech", "tech.io", "2026-07-01", "90"),
            record("c", "Health", "health.org", "2026-07-02", "70"),
        ])
    }

    #[tokio::test]
    async fn default_listing_sorts_by_date_desc() {
        let p = result_from(
            fetch_at(&store(), &Cache::disabled(), &ListingParams::default(), now())
                .await
                .expect("listing"),
        );
        assert_eq!(
            p.items.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "c", "b"]
        );
        assert_eq!(p.total, 3);
        assert_eq!(p.next_page, None);
    }

    #[tokio::test]
    async fn filters_and_quality_sort_combine() {
        let params = ListingParams {
            category: Some("Tech".into()),
            sort: ContentSort::QualityDesc,
            ..Default::default()
        };
        let p = result_from(
            fetch_at(&store(), &Cache::disabled(), &params, now())
                .await
                .expect("listing"),
        );
        assert_eq!(
            p.items.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
            vec!["b", "a"]
        );
        assert_eq!(p.total, 2);
    }

    #[tokio::test]
    async fn date_bounds_are_inclusive() {
        let params = ListingParams {
            date_from: Some("2026-07-02".into()),
            date_to: Some("2026-07-03".into()),
            ..Default::default()
        };
        let p = result_from(
            fetch_at(&store(), &Cache::disabled(), &params, now())
                .await
                .expect("listing"),
        );
        assert_eq!(p.total, 2);
    }

    #[tokio::test]
    async fn enormous_page_numbers_serve_an_empty_page() {
        let params = ListingParams {
            page: u64::MAX,
            ..Default::default()
        };
        let p = result_from(
            fetch_at(&store(), &Cache::disabled(), &params, now())
                .await
                .expect("huge page"),
        );
        assert!(p.items.is_empty());
        assert_eq!(p.next_page, None);
        assert_eq!(p.total, 3);
    }

    #[tokio::test]
    async fn store_outage_propagates_instead_of_degrading() {
        let err = fetch_at(
            &DisconnectedStore,
            &Cache::disabled(),
            &ListingParams::default(),
            now(),
        )
        .await
        .expect_err("listing must fail without a store");
        assert!(err.to_string().contains("content listing query"));
    }

    #[test]
    fn cache_key_distinguishes_every_parameter() {
        let base = ListingParams {
            page: 1,
            category: Some("Tech".into()),
            domain: Some("tech.io".into()),
            search: Some("ai".into()),
            sort: ContentSort::QualityDesc,
            date_from: Some("2026-07-01".into()),
            date_to: Some("2026-07-31".into()),
        };
        let key = cache_key(base.page, &base);
        let variants = vec![
            ListingParams { page: 2, ..base.clone() },
            ListingParams { category: None, ..base.clone() },
            ListingParams { domain: Some("health.org".into()), ..base.clone() },
            ListingParams { search: None, ..base.clone() },
            ListingParams { sort: ContentSort::DateDesc, ..base.clone() },
            ListingParams { date_from: None, ..base.clone() },
            ListingParams { date_to: Some("2026-08-31".into()), ..base.clone() },
        ];
        for (i, v) in variants.iter().enumerate() {
            assert_ne!(key, cache_key(v.page.max(1), v), "variant {i} collided");
        }
    }
}
