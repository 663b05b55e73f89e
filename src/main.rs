//! Trending content feed service, binary entrypoint.
//! Boots the Axum HTTP server, wiring the record store, cache, and metrics.
//!
//! See `README.md` for quickstart and `DESIGN.md` for architecture notes.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trendfeed::api::{self, AppState};
use trendfeed::cache::{Cache, TTL_TRENDING_SECS};
use trendfeed::metrics::Metrics;
use trendfeed::store;

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - TRENDFEED_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("TRENDFEED_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trendfeed=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments. This enables
    // DATABASE_URL / REDIS_URL / TRENDFEED_SEED_PATH from .env.
    let _ = dotenvy::dotenv();

    // Initialize dev tracing early (no-op in production).
    enable_dev_tracing();

    // Collaborators are built once here and injected; everything below the
    // router treats them as opaque interfaces.
    let state = AppState {
        store: store::from_env(),
        cache: Cache::from_env().await,
    };

    let metrics = Metrics::init(TTL_TRENDING_SECS);
    let router = api::router(state).merge(metrics.router());

    Ok(router.into())
}
