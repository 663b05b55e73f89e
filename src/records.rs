//! Raw store records and their normalized, dashboard-facing form.
//!
//! The store keeps everything stringly typed (decimal scores and dates are
//! text columns, keyword lists are serialized blobs). `TrendingItem::from_record`
//! is the single place where those strings become typed, defaulted values;
//! downstream code never re-parses them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::{self, TrendingLevel};

/// Raw content record as returned by the record store. Read-only here;
/// writes happen in the scraping job, outside this service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContentRecord {
    pub id: String,
    pub domain: Option<String>,
    pub category: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    /// Long-form article text; used as a summary fallback when `summary`
    /// is absent.
    #[serde(default)]
    pub body: Option<String>,
    pub url: Option<String>,
    /// Lexicographically sortable `YYYY-MM-DD` or a full timestamp.
    pub published_at: Option<String>,
    /// Serialized list: JSON array or comma/pipe-separated text.
    pub keywords: Option<String>,
    pub trending_keywords: Option<String>,
    pub sentiment_label: Option<String>,
    /// Decimal string, conventionally in [-1, 1].
    pub sentiment_score: Option<String>,
    /// Decimal string, conventionally in [0, 100].
    pub quality_score: Option<String>,
    pub cover_image: Option<String>,
}

/// A monitored scraping source, managed via the sources endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MonitoredSource {
    pub url: String,
    pub domain: String,
    pub category: Option<String>,
    pub is_active: bool,
}

/// Decode a serialized keyword list. JSON array first; anything else is
/// split on commas/pipes. Junk input degrades to the split path,
/// empty input to an empty list.
pub fn parse_string_array(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    if raw.trim().is_empty() {
        return Vec::new();
    }
    if let Ok(serde_json::Value::Array(values)) = serde_json::from_str(raw) {
        return values
            .into_iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect();
    }
    raw.split(|c| c == ',' || c == '|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a decimal string; `None` when absent or unparseable.
pub fn parse_decimal(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
}

/// Normalized item served to the dashboard. Constructed per request from a
/// `ContentRecord`, never persisted (beyond living inside a cached page).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingItem {
    pub id: String,
    pub title: String,
    pub summary: Option<String>,
    pub domain: Option<String>,
    pub category: Option<String>,
    pub date: Option<String>,
    pub url: Option<String>,
    pub keywords: Vec<String>,
    pub trending_keywords: Vec<String>,
    pub sentiment_label: Option<String>,
    pub sentiment_score: Option<f64>,
    pub cover_image: Option<String>,
    pub quality_score: Option<f64>,
    /// Distinct combined keyword + trending-keyword count; the "engagement"
    /// sort key.
    pub engagement: usize,
    /// Composite score in [0,1], see `scoring`.
    pub trending_score: f64,
    pub trending_level: TrendingLevel,
}

impl TrendingItem {
    /// Normalize a raw record and score it against `now`.
    pub fn from_record(r: &ContentRecord, now: DateTime<Utc>) -> Self {
        let keywords = parse_string_array(r.keywords.as_deref());
        let trending_keywords = parse_string_array(r.trending_keywords.as_deref());
        // Combined tag count, deduplicated: a tag that is both a keyword and
        // a trending keyword counts once.
        let engagement = keywords
            .iter()
            .chain(trending_keywords.iter())
            .collect::<std::collections::BTreeSet<_>>()
            .len();

        let quality = parse_decimal(r.quality_score.as_deref());
        let sentiment = parse_decimal(r.sentiment_score.as_deref());
        let score = scoring::trending_score(
            r.published_at.as_deref(),
            engagement,
            quality,
            sentiment,
            now,
        );

        Self {
            id: r.id.clone(),
            title: r
                .title
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or("Untitled")
                .to_string(),
            summary: r.summary.clone().or_else(|| r.body.clone()),
            domain: r.domain.clone(),
            category: r.category.clone(),
            date: r.published_at.clone(),
            url: r.url.clone(),
            keywords,
            trending_keywords,
            sentiment_label: r.sentiment_label.clone(),
            sentiment_score: sentiment,
            cover_image: r.cover_image.clone(),
            quality_score: quality,
            engagement,
            trending_score: score,
            trending_level: TrendingLevel::from_score(score),
        }
    }
}
