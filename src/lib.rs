// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod cache;
pub mod fallback;
pub mod listing;
pub mod metrics;
pub mod records;
pub mod scoring;
pub mod store;
pub mod trending;

// ---- Re-exports for stable public API ----
// Convenient router access: `trendfeed::api::router` or `trendfeed::router`
pub use crate::api::{router, AppState};
pub use crate::cache::Cache;
