//! Trending score primitives: recency/frequency/quality/sentiment signals
//! in [0,1], a weighted composite, and the discrete level bands.
//!
//! Every function here is total. Missing or unparseable inputs fall back
//! to neutral defaults instead of erroring, so a half-populated record
//! still gets a usable score.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// Composite weights. Tunable constants, deliberately not configurable.
pub const W_RECENCY: f64 = 0.45;
pub const W_FREQUENCY: f64 = 0.25;
pub const W_QUALITY: f64 = 0.20;
pub const W_SENTIMENT: f64 = 0.10;

/// Neutral fallback when a signal is absent or unparseable.
pub const NEUTRAL: f64 = 0.5;

/// Combined keyword count at which the frequency signal saturates.
pub const FREQUENCY_SATURATION: usize = 12;

/// Parse a store date string. Accepts RFC 3339, a bare `YYYY-MM-DD`,
/// or a naive `YYYY-MM-DDTHH:MM:SS` timestamp (treated as UTC).
pub fn parse_publication_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

/// Step function over the absolute age in hours between `now` and the
/// record date. Unknown dates score the neutral 0.5.
pub fn recency_weight(date: Option<&str>, now: DateTime<Utc>) -> f64 {
    let Some(parsed) = date.and_then(parse_publication_date) else {
        return NEUTRAL;
    };
    let hours = (now - parsed).num_seconds().abs() as f64 / 3600.0;
    if hours <= 2.0 {
        1.0
    } else if hours <= 24.0 {
        0.85
    } else if hours <= 24.0 * 7.0 {
        0.6
    } else if hours <= 24.0 * 30.0 {
        0.3
    } else {
        0.1
    }
}

/// Normalized inputs in [0,1], one per composite term.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScoreInputs {
    pub recency: f64,
    pub frequency: f64,
    pub quality: f64,
    pub sentiment: f64,
}

impl ScoreInputs {
    /// Build the four signals from raw record values.
    ///
    /// - `quality` is the raw 0..100 score, `sentiment` the raw -1..1 score;
    ///   both default to neutral when `None`.
    /// - Sentiment contributes by intensity, not polarity: strongly negative
    ///   content trends as readily as strongly positive.
    pub fn from_parts(
        date: Option<&str>,
        keyword_count: usize,
        quality: Option<f64>,
        sentiment: Option<f64>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            recency: recency_weight(date, now),
            frequency: (keyword_count as f64 / FREQUENCY_SATURATION as f64).min(1.0),
            quality: quality.map(|q| (q / 100.0).min(1.0)).unwrap_or(NEUTRAL),
            sentiment: sentiment.map(|s| s.abs().min(1.0)).unwrap_or(NEUTRAL),
        }
    }

    /// Weighted composite, clamped into [0,1].
    pub fn composite(&self) -> f64 {
        let raw = self.recency * W_RECENCY
            + self.frequency * W_FREQUENCY
            + self.quality * W_QUALITY
            + self.sentiment * W_SENTIMENT;
        raw.clamp(0.0, 1.0)
    }
}

/// Convenience wrapper: raw parts straight to the composite score.
pub fn trending_score(
    date: Option<&str>,
    keyword_count: usize,
    quality: Option<f64>,
    sentiment: Option<f64>,
    now: DateTime<Utc>,
) -> f64 {
    ScoreInputs::from_parts(date, keyword_count, quality, sentiment, now).composite()
}

/// Coarse trending bucket derived from the composite score.
///
/// `All` is the baseline bucket, not a rejection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendingLevel {
    Hot,
    Rising,
    New,
    #[default]
    All,
}

impl TrendingLevel {
    /// Band boundaries are inclusive lower bounds: 0.75 / 0.50 / 0.25.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.75 {
            Self::Hot
        } else if score >= 0.5 {
            Self::Rising
        } else if score >= 0.25 {
            Self::New
        } else {
            Self::All
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Rising => "rising",
            Self::New => "new",
            Self::All => "all",
        }
    }

    /// Lenient wire parse; anything unknown means "no level filter".
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hot" => Self::Hot,
            "rising" => Self::Rising,
            "new" => Self::New,
            _ => Self::All,
        }
    }
}
