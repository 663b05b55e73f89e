//! Record query interface: the seam between the read pipelines and the
//! persistent record store.
//!
//! The pipelines only ever talk to `RecordStore`; which implementation sits
//! behind it is decided once at startup (`from_env`) and injected through
//! `AppState`. Filter matching lives here, on `RecordFilter`, so the
//! in-memory store and the synthetic fallback generator share one predicate
//! and cannot drift apart.

mod memory;
mod postgres;

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::records::{ContentRecord, MonitoredSource};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_SEED_PATH: &str = "TRENDFEED_SEED_PATH";

const DEFAULT_SEED_PATHS: [&str; 2] = ["config/records.toml", "config/records.json"];

/// Minimum search length; shorter queries are treated as "no search" to
/// avoid single-character false-positive floods.
pub const MIN_SEARCH_LEN: usize = 2;

/// Filter over content records. Empty/absent fields impose no restriction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    /// Exact category match.
    pub category: Option<String>,
    /// Category membership; ignored when empty.
    pub categories: Vec<String>,
    /// Exact domain match.
    pub domain: Option<String>,
    /// Domain membership; ignored when empty.
    pub domains: Vec<String>,
    /// Normalized free-text search (lowercased, length >= MIN_SEARCH_LEN).
    pub search: Option<String>,
    /// Inclusive lexicographic date bounds on the `YYYY-MM-DD` prefix.
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

impl RecordFilter {
    /// Normalize a raw search query: trim, drop sub-minimum lengths,
    /// lowercase. Returns `None` for "no search".
    pub fn normalize_search(raw: Option<&str>) -> Option<String> {
        let q = raw?.trim();
        if q.chars().count() < MIN_SEARCH_LEN {
            return None;
        }
        Some(q.to_lowercase())
    }

    /// Case-insensitive substring search over title, summary, keyword blobs,
    /// category and domain. One policy for every surface.
    fn matches_search(&self, r: &ContentRecord) -> bool {
        let Some(q) = self.search.as_deref() else {
            return true;
        };
        [
            r.title.as_deref(),
            r.summary.as_deref(),
            r.keywords.as_deref(),
            r.trending_keywords.as_deref(),
            r.category.as_deref(),
            r.domain.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(q))
    }

    /// Evaluate the whole predicate against a raw record.
    pub fn matches(&self, r: &ContentRecord) -> bool {
        if let Some(cat) = self.category.as_deref() {
            if r.category.as_deref() != Some(cat) {
                return false;
            }
        }
        if !self.categories.is_empty()
            && !r
                .category
                .as_deref()
                .is_some_and(|c| self.categories.iter().any(|want| want == c))
        {
            return false;
        }
        if let Some(dom) = self.domain.as_deref() {
            if r.domain.as_deref() != Some(dom) {
                return false;
            }
        }
        if !self.domains.is_empty()
            && !r
                .domain
                .as_deref()
                .is_some_and(|d| self.domains.iter().any(|want| want == d))
        {
            return false;
        }
        if let Some(from) = self.date_from.as_deref() {
            match r.published_at.as_deref().map(date_key) {
                Some(d) if d >= from => {}
                _ => return false,
            }
        }
        if let Some(to) = self.date_to.as_deref() {
            match r.published_at.as_deref().map(date_key) {
                Some(d) if d <= to => {}
                _ => return false,
            }
        }
        self.matches_search(r)
    }
}

/// `YYYY-MM-DD` prefix of a stored date string, for bound comparison.
pub(crate) fn date_key(raw: &str) -> &str {
    raw.get(..10).unwrap_or(raw)
}

/// Store-side ordering for the content listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentSort {
    #[default]
    DateDesc,
    DateAsc,
    QualityDesc,
    QualityAsc,
    SentimentDesc,
    SentimentAsc,
    TitleAsc,
    TitleDesc,
}

impl ContentSort {
    /// Lenient wire parse; unknown values fall back to the default.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "date-asc" => Self::DateAsc,
            "quality-desc" => Self::QualityDesc,
            "quality-asc" => Self::QualityAsc,
            "sentiment-desc" => Self::SentimentDesc,
            "sentiment-asc" => Self::SentimentAsc,
            "title-asc" => Self::TitleAsc,
            "title-desc" => Self::TitleDesc,
            _ => Self::DateDesc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DateDesc => "date-desc",
            Self::DateAsc => "date-asc",
            Self::QualityDesc => "quality-desc",
            Self::QualityAsc => "quality-asc",
            Self::SentimentDesc => "sentiment-desc",
            Self::SentimentAsc => "sentiment-asc",
            Self::TitleAsc => "title-asc",
            Self::TitleDesc => "title-desc",
        }
    }
}

/// One page window over a filtered, ordered record set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    pub filter: RecordFilter,
    pub order: ContentSort,
    pub skip: u64,
    pub take: u64,
}

/// Payload for the sources write path.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewSource {
    pub url: String,
    pub domain: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// Query interface over the record store. All methods are independent
/// reads except `upsert_source`.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the `[skip, skip+take)` window of records matching the filter.
    async fn fetch(&self, query: &RecordQuery) -> Result<Vec<ContentRecord>>;
    /// Total matching count under the same predicate, pre-pagination.
    async fn count(&self, filter: &RecordFilter) -> Result<u64>;
    /// Distinct non-null categories, ascending.
    async fn categories(&self) -> Result<Vec<String>>;
    /// Distinct non-null domains, ascending.
    async fn domains(&self) -> Result<Vec<String>>;
    /// Record counts grouped by category (`None` = uncategorized).
    async fn category_counts(&self) -> Result<Vec<(Option<String>, u64)>>;
    /// Active monitored sources, ordered by domain.
    async fn active_sources(&self) -> Result<Vec<MonitoredSource>>;
    /// Insert or reactivate a monitored source.
    async fn upsert_source(&self, source: NewSource) -> Result<MonitoredSource>;
}

/// A store that was never configured. Every read fails, which the trending
/// pipeline degrades around with synthetic data.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectedStore;

#[async_trait::async_trait]
impl RecordStore for DisconnectedStore {
    async fn fetch(&self, _query: &RecordQuery) -> Result<Vec<ContentRecord>> {
        Err(anyhow!("record store is not configured"))
    }
    async fn count(&self, _filter: &RecordFilter) -> Result<u64> {
        Err(anyhow!("record store is not configured"))
    }
    async fn categories(&self) -> Result<Vec<String>> {
        Err(anyhow!("record store is not configured"))
    }
    async fn domains(&self) -> Result<Vec<String>> {
        Err(anyhow!("record store is not configured"))
    }
    async fn category_counts(&self) -> Result<Vec<(Option<String>, u64)>> {
        Err(anyhow!("record store is not configured"))
    }
    async fn active_sources(&self) -> Result<Vec<MonitoredSource>> {
        Err(anyhow!("record store is not configured"))
    }
    async fn upsert_source(&self, _source: NewSource) -> Result<MonitoredSource> {
        Err(anyhow!("record store is not configured"))
    }
}

/// Pick a store implementation from the environment:
/// 1) `DATABASE_URL` -> Postgres (lazy pool; outages surface per query)
/// 2) `TRENDFEED_SEED_PATH` or `config/records.{toml,json}` -> seeded memory store
/// 3) otherwise a disconnected store (trending serves synthetic data)
pub fn from_env() -> Arc<dyn RecordStore> {
    if let Ok(url) = std::env::var(ENV_DATABASE_URL) {
        if !url.trim().is_empty() {
            match PostgresStore::connect_lazy(&url) {
                Ok(store) => {
                    let store = Arc::new(store);
                    let migrator = Arc::clone(&store);
                    // Best-effort: a down database at boot only delays
                    // schema setup, it does not fail startup.
                    tokio::spawn(async move {
                        if let Err(err) = migrator.run_migrations().await {
                            warn!(error = %err, "migrations not applied; continuing with lazy pool");
                        }
                    });
                    info!("record store: postgres (lazy pool)");
                    return store;
                }
                Err(err) => warn!(error = %err, "invalid DATABASE_URL, falling back"),
            }
        }
    }
    if let Ok(path) = std::env::var(ENV_SEED_PATH) {
        match MemoryStore::load_from_path(Path::new(&path)) {
            Ok(store) => {
                info!(%path, "record store: seeded memory");
                return Arc::new(store);
            }
            Err(err) => warn!(%path, error = %err, "failed to load seed file"),
        }
    }
    for candidate in DEFAULT_SEED_PATHS {
        let p = Path::new(candidate);
        if p.exists() {
            match MemoryStore::load_from_path(p) {
                Ok(store) => {
                    info!(path = candidate, "record store: seeded memory");
                    return Arc::new(store);
                }
                Err(err) => warn!(path = candidate, error = %err, "failed to load seed file"),
            }
        }
    }
    warn!("no record store configured; reads will degrade to synthetic data");
    Arc::new(DisconnectedStore)
}
