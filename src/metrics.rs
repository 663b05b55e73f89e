//! Prometheus exposition.
//!
//! The recorder is installed once at startup; the counters emitted by the
//! cache and trending pipeline are no-ops before that. Everything this
//! service exports is prefixed `trendfeed_`.

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    handle: PrometheusHandle,
}

impl Metrics {
    pub fn init(trending_ttl_secs: u64) -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");

        describe_counter!(
            "trendfeed_cache_hits_total",
            "Cache lookups answered from Redis."
        );
        describe_counter!(
            "trendfeed_cache_misses_total",
            "Cache lookups that fell through to the store."
        );
        describe_counter!(
            "trendfeed_cache_errors_total",
            "Cache transport failures, each served as a miss."
        );
        describe_counter!(
            "trendfeed_store_fallbacks_total",
            "Trending pages served from synthetic data during store outages."
        );
        describe_gauge!(
            "trendfeed_trending_cache_ttl_seconds",
            "Configured TTL for cached trending pages."
        );
        gauge!("trendfeed_trending_cache_ttl_seconds").set(trending_ttl_secs as f64);

        Self { handle }
    }

    /// Router exposing `/metrics` in the Prometheus text format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
