//! In-memory record store.
//!
//! Primary test double for the pipelines, and the no-database dev mode when
//! a seed file is supplied. Seed files follow the usual config convention:
//! TOML or JSON, format sniffed from content with the extension as a hint.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::RwLock;

use anyhow::{anyhow, Context, Result};

use crate::records::{parse_decimal, ContentRecord, MonitoredSource};

use super::{date_key, ContentSort, NewSource, RecordFilter, RecordQuery, RecordStore};

#[derive(Debug, Default)]
struct Inner {
    records: Vec<ContentRecord>,
    sources: Vec<MonitoredSource>,
}

/// Thread-safe in-memory store over a fixed record set.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new(records: Vec<ContentRecord>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                records,
                sources: Vec::new(),
            }),
        }
    }

    pub fn with_sources(records: Vec<ContentRecord>, sources: Vec<MonitoredSource>) -> Self {
        Self {
            inner: RwLock::new(Inner { records, sources }),
        }
    }

    /// Load records from a seed file. Supports TOML (`[[records]]` tables)
    /// and JSON (bare array or `{"records": [...]}`).
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading record seed from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let records = parse_seed(&content, &ext)?;
        Ok(Self::new(records))
    }

    fn compare(a: &ContentRecord, b: &ContentRecord, order: ContentSort) -> Ordering {
        fn num(v: Option<&str>) -> f64 {
            parse_decimal(v).unwrap_or(f64::NEG_INFINITY)
        }
        let date = |r: &ContentRecord| r.published_at.clone().unwrap_or_default();
        let title = |r: &ContentRecord| r.title.clone().unwrap_or_default();
        match order {
            ContentSort::DateDesc => date(b).cmp(&date(a)),
            ContentSort::DateAsc => date(a).cmp(&date(b)),
            ContentSort::QualityDesc => {
                num(b.quality_score.as_deref()).total_cmp(&num(a.quality_score.as_deref()))
            }
            ContentSort::QualityAsc => {
                num(a.quality_score.as_deref()).total_cmp(&num(b.quality_score.as_deref()))
            }
            ContentSort::SentimentDesc => {
                num(b.sentiment_score.as_deref()).total_cmp(&num(a.sentiment_score.as_deref()))
            }
            ContentSort::SentimentAsc => {
                num(a.sentiment_score.as_deref()).total_cmp(&num(b.sentiment_score.as_deref()))
            }
            ContentSort::TitleAsc => title(a).cmp(&title(b)),
            ContentSort::TitleDesc => title(b).cmp(&title(a)),
        }
    }
}

fn parse_seed(content: &str, ext_hint: &str) -> Result<Vec<ContentRecord>> {
    let try_toml = ext_hint == "toml" || content.contains("[[records]]");
    if try_toml {
        if let Ok(v) = parse_toml(content) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(content) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(content) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported record seed format"))
}

fn parse_toml(s: &str) -> Result<Vec<ContentRecord>> {
    #[derive(serde::Deserialize)]
    struct Seed {
        records: Vec<ContentRecord>,
    }
    let seed: Seed = toml::from_str(s)?;
    Ok(seed.records)
}

fn parse_json(s: &str) -> Result<Vec<ContentRecord>> {
    #[derive(serde::Deserialize)]
    struct Seed {
        records: Vec<ContentRecord>,
    }
    if let Ok(v) = serde_json::from_str::<Vec<ContentRecord>>(s) {
        return Ok(v);
    }
    let seed: Seed = serde_json::from_str(s)?;
    Ok(seed.records)
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn fetch(&self, query: &RecordQuery) -> Result<Vec<ContentRecord>> {
        let inner = self.inner.read().map_err(|_| anyhow!("store lock poisoned"))?;
        let mut matched: Vec<ContentRecord> = inner
            .records
            .iter()
            .filter(|r| query.filter.matches(r))
            .cloned()
            .collect();
        matched.sort_by(|a, b| Self::compare(a, b, query.order));
        let skip = query.skip.min(matched.len() as u64) as usize;
        let end = query
            .skip
            .saturating_add(query.take)
            .min(matched.len() as u64) as usize;
        Ok(matched[skip..end].to_vec())
    }

    async fn count(&self, filter: &RecordFilter) -> Result<u64> {
        let inner = self.inner.read().map_err(|_| anyhow!("store lock poisoned"))?;
        Ok(inner.records.iter().filter(|r| filter.matches(r)).count() as u64)
    }

    async fn categories(&self) -> Result<Vec<String>> {
        let inner = self.inner.read().map_err(|_| anyhow!("store lock poisoned"))?;
        let set: BTreeSet<String> = inner
            .records
            .iter()
            .filter_map(|r| r.category.clone())
            .filter(|c| !c.is_empty())
            .collect();
        Ok(set.into_iter().collect())
    }

    async fn domains(&self) -> Result<Vec<String>> {
        let inner = self.inner.read().map_err(|_| anyhow!("store lock poisoned"))?;
        let set: BTreeSet<String> = inner
            .records
            .iter()
            .filter_map(|r| r.domain.clone())
            .filter(|d| !d.is_empty())
            .collect();
        Ok(set.into_iter().collect())
    }

    async fn category_counts(&self) -> Result<Vec<(Option<String>, u64)>> {
        let inner = self.inner.read().map_err(|_| anyhow!("store lock poisoned"))?;
        let mut counts: BTreeMap<Option<String>, u64> = BTreeMap::new();
        for r in &inner.records {
            *counts.entry(r.category.clone()).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn active_sources(&self) -> Result<Vec<MonitoredSource>> {
        let inner = self.inner.read().map_err(|_| anyhow!("store lock poisoned"))?;
        let mut out: Vec<MonitoredSource> = inner
            .sources
            .iter()
            .filter(|s| s.is_active)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.domain.cmp(&b.domain));
        Ok(out)
    }

    async fn upsert_source(&self, source: NewSource) -> Result<MonitoredSource> {
        let mut inner = self.inner.write().map_err(|_| anyhow!("store lock poisoned"))?;
        if let Some(existing) = inner.sources.iter_mut().find(|s| s.url == source.url) {
            existing.domain = source.domain;
            existing.category = source.category;
            existing.is_active = true;
            return Ok(existing.clone());
        }
        let created = MonitoredSource {
            url: source.url,
            domain: source.domain,
            category: source.category,
            is_active: true,
        };
        inner.sources.push(created.clone());
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, category: &str, date: &str, quality: &str) -> ContentRecord {
        ContentRecord {
            id: id.into(),
            category: Some(category.into()),
            domain: Some("example.com".into()),
            title: Some(format!("title {id}")),
            published_at: Some(date.into()),
            quality_score: Some(quality.into()),
            ..Default::default()
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::new(vec![
            record("a", "Tech", "2026-07-03", "40"),
            record("b", "Tech", "2026-07-01", "90.5"),
            record("c", "Health", "2026-07-02", "70"),
        ])
    }

    #[tokio::test]
    async fn fetch_sorts_and_windows() {
        let s = store();
        let q = RecordQuery {
            order: ContentSort::DateDesc,
            skip: 0,
            take: 2,
            ..Default::default()
        };
        let rows = s.fetch(&q).await.expect("fetch");
        assert_eq!(
            rows.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec!["a", "c"]
        );

        let q = RecordQuery {
            order: ContentSort::QualityDesc,
            skip: 1,
            take: 10,
            ..Default::default()
        };
        let rows = s.fetch(&q).await.expect("fetch");
        assert_eq!(
            rows.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            vec!["c", "a"]
        );
    }

    #[tokio::test]
    async fn window_past_the_end_is_empty_not_an_error() {
        let s = store();
        let q = RecordQuery {
            skip: 50,
            take: 20,
            ..Default::default()
        };
        assert!(s.fetch(&q).await.expect("fetch").is_empty());
    }

    #[tokio::test]
    async fn count_honors_the_filter() {
        let s = store();
        let f = RecordFilter {
            category: Some("Tech".into()),
            ..Default::default()
        };
        assert_eq!(s.count(&f).await.expect("count"), 2);
        assert_eq!(s.count(&RecordFilter::default()).await.expect("count"), 3);
    }

    #[tokio::test]
    async fn distinct_lists_are_sorted_and_deduped() {
        let s = store();
        assert_eq!(s.categories().await.expect("cats"), vec!["Health", "Tech"]);
        assert_eq!(s.domains().await.expect("doms"), vec!["example.com"]);
    }

    #[tokio::test]
    async fn category_counts_keep_the_null_bucket() {
        let mut records = vec![record("a", "Tech", "2026-07-01", "1")];
        records.push(ContentRecord {
            id: "n".into(),
            ..Default::default()
        });
        let s = MemoryStore::new(records);
        let counts = s.category_counts().await.expect("counts");
        assert!(counts.contains(&(None, 1)));
        assert!(counts.contains(&(Some("Tech".into()), 1)));
    }

    #[tokio::test]
    async fn upsert_reactivates_existing_source() {
        let s = MemoryStore::with_sources(
            Vec::new(),
            vec![MonitoredSource {
                url: "https://example.com/feed".into(),
                domain: "example.com".into(),
                category: None,
                is_active: false,
            }],
        );
        assert!(s.active_sources().await.expect("sources").is_empty());

        let updated = s
            .upsert_source(NewSource {
                url: "https://example.com/feed".into(),
                domain: "example.com".into(),
                category: Some("Tech".into()),
            })
            .await
            .expect("upsert");
        assert!(updated.is_active);
        assert_eq!(updated.category.as_deref(), Some("Tech"));
        assert_eq!(s.active_sources().await.expect("sources").len(), 1);
    }

    #[test]
    fn seed_parses_toml_and_json() {
        let toml_seed = r#"
            [[records]]
            id = "t1"
            title = "from toml"
            category = "Tech"
        "#;
        let parsed = parse_seed(toml_seed, "toml").expect("toml seed");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, "t1");

        let json_seed = r#"[{"id": "j1", "title": "from json"}]"#;
        let parsed = parse_seed(json_seed, "json").expect("json seed");
        assert_eq!(parsed[0].id, "j1");

        let wrapped = r#"{"records": [{"id": "j2"}]}"#;
        let parsed = parse_seed(wrapped, "json").expect("wrapped json seed");
        assert_eq!(parsed[0].id, "j2");

        assert!(parse_seed("definitely not a seed", "txt").is_err());
    }
}
