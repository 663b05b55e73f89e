//! Synthetic record generator for store outages.
//!
//! Keeps the trending read path available: when the record store errors,
//! the pipeline serves a well-formed page built from this fixed pool
//! instead of failing. Records are cycled from small template pools with
//! randomized dates and scores, filtered through the same predicate as
//! live records, then windowed. Not a cache, not persisted; scores and
//! dates re-randomize on every invocation.

use chrono::{Duration, Utc};
use rand::Rng;

use crate::records::ContentRecord;
use crate::store::RecordFilter;

/// Fixed total reported while degraded, so pagination stays exercisable.
pub const SYNTHETIC_TOTAL: u64 = 100;

/// Size of the generated pool before filtering.
pub const POOL_SIZE: usize = 50;

const TITLES: [&str; 10] = [
    "AI Revolution in Financial Markets",
    "Mental Health Awareness Trends",
    "Insurance Industry Digital Transformation",
    "Cryptocurrency Market Analysis",
    "Sustainable Investment Strategies",
    "Healthcare Technology Innovations",
    "Remote Work Productivity Tips",
    "Climate Change Economic Impact",
    "Cybersecurity Best Practices",
    "E-commerce Growth Patterns",
];

const DOMAINS: [&str; 5] = [
    "finance.com",
    "health.org",
    "insurance.net",
    "tech.io",
    "business.co",
];

const CATEGORIES: [&str; 5] = [
    "Financial Markets",
    "Mental Health",
    "Insurance",
    "Technology",
    "Business",
];

const KEYWORDS: [&str; 8] = [
    "AI",
    "trending",
    "analysis",
    "market",
    "digital",
    "innovation",
    "growth",
    "strategy",
];

const COVER_IMAGES: [&str; 5] = [
    "https://images.unsplash.com/photo-1551288049-bebda4e38f71?w=400&h=200&fit=crop",
    "https://images.unsplash.com/photo-1576091160399-112ba8d25d1f?w=400&h=200&fit=crop",
    "https://images.unsplash.com/photo-1559136555-9303baea8ebd?w=400&h=200&fit=crop",
    "https://images.unsplash.com/photo-1460925895917-afdab827c52f?w=400&h=200&fit=crop",
    "https://images.unsplash.com/photo-1507003211169-0a1dd7228f2d?w=400&h=200&fit=crop",
];

const SENTIMENT_LABELS: [&str; 3] = ["positive", "negative", "neutral"];

fn json_list(items: &[&str]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

fn synthetic_record(index: usize) -> ContentRecord {
    let mut rng = rand::rng();
    let date = (Utc::now() - Duration::days(rng.random_range(0..30i64)))
        .format("%Y-%m-%d")
        .to_string();
    let keyword_count = rng.random_range(2..=6).min(KEYWORDS.len());
    let trending_count = rng.random_range(1..=3).min(KEYWORDS.len());
    let domain = DOMAINS[index % DOMAINS.len()];

    ContentRecord {
        id: format!("mock-{}", index + 1),
        domain: Some(domain.to_string()),
        category: Some(CATEGORIES[index % CATEGORIES.len()].to_string()),
        title: Some(TITLES[index % TITLES.len()].to_string()),
        summary: Some(format!(
            "This is a mock summary for article {}. It contains relevant information about trending topics.",
            index + 1
        )),
        body: None,
        url: Some(format!("https://{domain}/article-{}", index + 1)),
        published_at: Some(date),
        keywords: Some(json_list(&KEYWORDS[..keyword_count])),
        trending_keywords: Some(json_list(&KEYWORDS[..trending_count])),
        sentiment_label: Some(
            SENTIMENT_LABELS[rng.random_range(0..SENTIMENT_LABELS.len())].to_string(),
        ),
        sentiment_score: Some(format!("{:.2}", rng.random_range(-1.0..1.0))),
        quality_score: Some(format!("{:.1}", rng.random_range(0.0..100.0))),
        cover_image: Some(COVER_IMAGES[index % COVER_IMAGES.len()].to_string()),
    }
}

/// Generate the `[skip, skip+take)` window of synthetic records matching
/// the given filter.
pub fn generate(skip: u64, take: u64, filter: &RecordFilter) -> Vec<ContentRecord> {
    let filtered: Vec<ContentRecord> = (0..POOL_SIZE)
        .map(synthetic_record)
        .filter(|r| filter.matches(r))
        .collect();
    let skip = skip.min(filtered.len() as u64) as usize;
    let end = (skip as u64)
        .saturating_add(take)
        .min(filtered.len() as u64) as usize;
    filtered[skip..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfiltered_pool_windows_cleanly() {
        assert_eq!(generate(0, 20, &RecordFilter::default()).len(), 20);
        assert_eq!(generate(40, 20, &RecordFilter::default()).len(), 10);
        assert!(generate(60, 20, &RecordFilter::default()).is_empty());
    }

    #[test]
    fn records_are_well_formed() {
        let rows = generate(0, 5, &RecordFilter::default());
        for (i, r) in rows.iter().enumerate() {
            assert_eq!(r.id, format!("mock-{}", i + 1));
            assert!(r.title.is_some());
            assert!(r.published_at.is_some());
            // Keyword blobs decode as JSON arrays.
            assert!(!crate::records::parse_string_array(r.keywords.as_deref()).is_empty());
            let sentiment =
                crate::records::parse_decimal(r.sentiment_score.as_deref()).expect("sentiment");
            assert!((-1.0..=1.0).contains(&sentiment));
            let quality =
                crate::records::parse_decimal(r.quality_score.as_deref()).expect("quality");
            assert!((0.0..=100.0).contains(&quality));
        }
    }

    #[test]
    fn category_filter_is_honored() {
        let filter = RecordFilter {
            category: Some("Technology".to_string()),
            ..Default::default()
        };
        let rows = generate(0, 50, &filter);
        assert!(!rows.is_empty());
        assert!(rows
            .iter()
            .all(|r| r.category.as_deref() == Some("Technology")));
    }

    #[test]
    fn search_filter_is_honored() {
        let filter = RecordFilter {
            search: RecordFilter::normalize_search(Some("insurance")),
            ..Default::default()
        };
        let rows = generate(0, 50, &filter);
        assert!(!rows.is_empty());
        for r in &rows {
            assert!(filter.matches(r));
        }
    }

    #[test]
    fn scores_rerandomize_per_invocation() {
        // Only shape is stable across calls; do not assert equal payloads.
        let a = generate(0, 50, &RecordFilter::default());
        let b = generate(0, 50, &RecordFilter::default());
        assert_eq!(a.len(), b.len());
        assert_eq!(a[0].id, b[0].id);
        assert_eq!(a[0].title, b[0].title);
    }
}
