//! Telemetry metric name constants.
//!
//! Centralised metric names for catalog cache operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `ratatoskr_catalog_`. Counters end in
//! `_total`, histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `cache` — which cache answered: "models" or "endpoints"
//! - `tier` — "memory" or "disk"
//! - `provider` — provider name (e.g. "openrouter", "litellm")
//! - `status` — outcome: "ok", "error" or "timeout"

/// Reads answered from cache without a fetch.
///
/// Labels: `cache`, `tier`.
pub const CACHE_HITS_TOTAL: &str = "ratatoskr_catalog_cache_hits_total";

/// Reads not answered from cache.
///
/// Labels: `cache`.
pub const CACHE_MISSES_TOTAL: &str = "ratatoskr_catalog_cache_misses_total";

/// Upstream fetches issued.
///
/// Labels: `provider`, `status`.
pub const FETCHES_TOTAL: &str = "ratatoskr_catalog_fetches_total";

/// Upstream fetch duration in seconds.
///
/// Labels: `provider`.
pub const FETCH_DURATION_SECONDS: &str = "ratatoskr_catalog_fetch_duration_seconds";

/// Fetch failures answered from the durable tier instead.
///
/// Labels: `provider`.
pub const STALE_FALLBACKS_TOTAL: &str = "ratatoskr_catalog_stale_fallbacks_total";

/// Suspicious fetches merged with the previous snapshot.
///
/// Labels: `provider`.
pub const RECONCILIATIONS_TOTAL: &str = "ratatoskr_catalog_reconciliations_total";

/// Callers that joined an already in-flight endpoint fetch.
///
/// Labels: `provider`.
pub const COALESCED_TOTAL: &str = "ratatoskr_catalog_coalesced_total";

/// Durable-tier writes that failed (the fast tier was still updated).
///
/// Labels: `cache`.
pub const PERSIST_FAILURES_TOTAL: &str = "ratatoskr_catalog_persist_failures_total";
