//! Postgres-backed record store.
//!
//! Predicates are assembled dynamically with `QueryBuilder` so the same
//! `RecordFilter` drives both the page query and the count query. The pool
//! is created lazily: an unreachable database shows up as per-query errors,
//! which the trending pipeline degrades around instead of failing startup.

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions, Postgres};
use sqlx::QueryBuilder;

use crate::records::{ContentRecord, MonitoredSource};

use super::{ContentSort, NewSource, RecordFilter, RecordQuery, RecordStore};

const RECORD_COLUMNS: &str = "id, domain, category, title, summary, body, url, published_at, \
     keywords, trending_keywords, sentiment_label, sentiment_score, quality_score, cover_image";

/// Decimal-string sort expression that tolerates junk values: anything that
/// is not a plain decimal sorts with the NULLs.
fn numeric_text(column: &str) -> String {
    format!(r"CASE WHEN {column} ~ '^-?\d+(\.\d+)?$' THEN {column}::numeric END")
}

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Build a lazy pool; no connection is attempted until the first query.
    pub fn connect_lazy(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy(url)
            .context("parsing DATABASE_URL")?;
        Ok(Self { pool })
    }

    /// Apply embedded migrations. Best-effort at startup; callers log and
    /// continue on failure.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("running migrations")?;
        Ok(())
    }

    fn apply_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &RecordFilter) {
        if let Some(cat) = &f.category {
            qb.push(" AND category = ");
            qb.push_bind(cat.clone());
        }
        if !f.categories.is_empty() {
            qb.push(" AND category = ANY(");
            qb.push_bind(f.categories.clone());
            qb.push(")");
        }
        if let Some(dom) = &f.domain {
            qb.push(" AND domain = ");
            qb.push_bind(dom.clone());
        }
        if !f.domains.is_empty() {
            qb.push(" AND domain = ANY(");
            qb.push_bind(f.domains.clone());
            qb.push(")");
        }
        if let Some(from) = &f.date_from {
            qb.push(" AND LEFT(published_at, 10) >= ");
            qb.push_bind(from.clone());
        }
        if let Some(to) = &f.date_to {
            qb.push(" AND LEFT(published_at, 10) <= ");
            qb.push_bind(to.clone());
        }
        if let Some(q) = &f.search {
            let pattern = format!("%{}%", escape_like(q));
            qb.push(" AND (");
            let columns = [
                "title",
                "summary",
                "keywords",
                "trending_keywords",
                "category",
                "domain",
            ];
            for (i, col) in columns.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push(format!("{col} ILIKE "));
                qb.push_bind(pattern.clone());
            }
            qb.push(")");
        }
    }

    fn order_sql(order: ContentSort) -> String {
        match order {
            ContentSort::DateDesc => "published_at DESC NULLS LAST".to_string(),
            ContentSort::DateAsc => "published_at ASC NULLS LAST".to_string(),
            ContentSort::QualityDesc => format!("{} DESC NULLS LAST", numeric_text("quality_score")),
            ContentSort::QualityAsc => format!("{} ASC NULLS LAST", numeric_text("quality_score")),
            ContentSort::SentimentDesc => {
                format!("{} DESC NULLS LAST", numeric_text("sentiment_score"))
            }
            ContentSort::SentimentAsc => {
                format!("{} ASC NULLS LAST", numeric_text("sentiment_score"))
            }
            ContentSort::TitleAsc => "title ASC NULLS LAST".to_string(),
            ContentSort::TitleDesc => "title DESC NULLS LAST".to_string(),
        }
    }
}

/// Escape LIKE metacharacters so a user query matches literally.
fn escape_like(q: &str) -> String {
    let mut out = String::with_capacity(q.len());
    for c in q.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[async_trait::async_trait]
impl RecordStore for PostgresStore {
    async fn fetch(&self, query: &RecordQuery) -> Result<Vec<ContentRecord>> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {RECORD_COLUMNS} FROM content_records WHERE 1=1"
        ));
        Self::apply_filter(&mut qb, &query.filter);
        qb.push(" ORDER BY ");
        qb.push(Self::order_sql(query.order));
        qb.push(" LIMIT ");
        qb.push_bind(query.take.min(i64::MAX as u64) as i64);
        qb.push(" OFFSET ");
        qb.push_bind(query.skip.min(i64::MAX as u64) as i64);

        let rows = qb
            .build_query_as::<ContentRecord>()
            .fetch_all(&self.pool)
            .await
            .context("fetching content page")?;
        Ok(rows)
    }

    async fn count(&self, filter: &RecordFilter) -> Result<u64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM content_records WHERE 1=1");
        Self::apply_filter(&mut qb, filter);
        let total: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("counting content records")?;
        Ok(total.max(0) as u64)
    }

    async fn categories(&self) -> Result<Vec<String>> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT category FROM content_records \
             WHERE category IS NOT NULL AND category <> '' ORDER BY category ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("listing categories")?;
        Ok(rows)
    }

    async fn domains(&self) -> Result<Vec<String>> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT domain FROM content_records \
             WHERE domain IS NOT NULL AND domain <> '' ORDER BY domain ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("listing domains")?;
        Ok(rows)
    }

    async fn category_counts(&self) -> Result<Vec<(Option<String>, u64)>> {
        let rows: Vec<(Option<String>, i64)> = sqlx::query_as(
            "SELECT category, COUNT(*) FROM content_records GROUP BY category",
        )
        .fetch_all(&self.pool)
        .await
        .context("grouping records by category")?;
        Ok(rows
            .into_iter()
            .map(|(cat, n)| (cat, n.max(0) as u64))
            .collect())
    }

    async fn active_sources(&self) -> Result<Vec<MonitoredSource>> {
        let rows: Vec<MonitoredSource> = sqlx::query_as(
            "SELECT url, domain, category, is_active FROM monitored_sources \
             WHERE is_active ORDER BY domain ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("listing monitored sources")?;
        Ok(rows)
    }

    async fn upsert_source(&self, source: NewSource) -> Result<MonitoredSource> {
        let row: MonitoredSource = sqlx::query_as(
            "INSERT INTO monitored_sources (url, domain, category, is_active) \
             VALUES ($1, $2, $3, TRUE) \
             ON CONFLICT (url) DO UPDATE \
             SET domain = EXCLUDED.domain, category = EXCLUDED.category, is_active = TRUE \
             RETURNING url, domain, category, is_active",
        )
        .bind(source.url)
        .bind(source.domain)
        .bind(source.category)
        .fetch_one(&self.pool)
        .await
        .context("upserting monitored source")?;
        Ok(row)
    }
}
