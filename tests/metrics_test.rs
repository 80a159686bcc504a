//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use ratatoskr_catalog::{
    Catalog, CatalogError, CatalogFetcher, Catalogs, EndpointKey, FetchOptions, FlushMode,
    FnFetcher, ModelRecord, Provider, telemetry,
};

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Sum counter values matching a metric name and one label value.
fn counter_with_label(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Check if any histogram entries exist for a given metric name.
fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

/// Runs async code within a local recorder scope on the multi-thread runtime.
///
/// `block_in_place` ensures the sync `with_local_recorder` closure stays
/// on the current thread while `block_on` drives the inner async work.
/// Work moved onto spawned tasks is not captured.
fn recorded<F: Future>(fut: F) -> (F::Output, SnapshotVec) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let output = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
    });
    (output, snapshotter.snapshot().into_vec())
}

fn catalog(n: usize) -> Catalog {
    (0..n)
        .map(|i| (format!("model-{i}"), ModelRecord::new(4096)))
        .collect()
}

fn serving(n: usize) -> Arc<dyn CatalogFetcher> {
    Arc::new(FnFetcher::new("serving", move |_options| async move {
        Ok(catalog(n))
    }))
}

fn failing() -> Arc<dyn CatalogFetcher> {
    Arc::new(FnFetcher::new("failing", |_options| async {
        Err(CatalogError::Http("connection refused".to_string()))
    }))
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn fetch_then_hit_records_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let catalogs = Catalogs::builder()
        .cache_dir(dir.path())
        .fetcher(Provider::OpenRouter, serving(3))
        .build()
        .unwrap();
    let options = FetchOptions::new(Provider::OpenRouter);

    let (results, snapshot) = recorded(async {
        let first = catalogs.catalog.get_catalog(&options).await;
        let second = catalogs.catalog.get_catalog(&options).await;
        (first, second)
    });
    assert!(results.0.is_ok());
    assert!(results.1.is_ok());

    assert_eq!(
        counter_with_label(&snapshot, telemetry::FETCHES_TOTAL, "status", "ok"),
        1
    );
    assert!(
        has_histogram(&snapshot, telemetry::FETCH_DURATION_SECONDS),
        "expected a duration histogram entry"
    );
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn failed_fetch_with_snapshot_records_stale_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let options = FetchOptions::new(Provider::OpenRouter);

    let warm = Catalogs::builder()
        .cache_dir(dir.path())
        .fetcher(Provider::OpenRouter, serving(3))
        .build()
        .unwrap();
    warm.catalog.get_catalog(&options).await.unwrap();

    let cold = Catalogs::builder()
        .cache_dir(dir.path())
        .fetcher(Provider::OpenRouter, failing())
        .build()
        .unwrap();
    cold.catalog.flush_catalog(&options, FlushMode::Evict);
    let (result, snapshot) = recorded(cold.catalog.get_catalog(&options));

    assert_eq!(result.unwrap().len(), 3);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::FETCHES_TOTAL, "status", "error"),
        1
    );
    assert_eq!(counter_total(&snapshot, telemetry::STALE_FALLBACKS_TOTAL), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn timeout_is_labelled() {
    let dir = tempfile::tempdir().unwrap();
    let catalogs = Catalogs::builder()
        .cache_dir(dir.path())
        .fetch_timeout(Duration::from_millis(20))
        .fetcher(
            Provider::OpenRouter,
            Arc::new(FnFetcher::new("slow", |_options| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(catalog(1))
            })),
        )
        .build()
        .unwrap();

    let (result, snapshot) =
        recorded(catalogs.catalog.get_catalog(&FetchOptions::new(Provider::OpenRouter)));

    assert!(matches!(result, Err(CatalogError::Timeout(_))));
    assert_eq!(
        counter_with_label(&snapshot, telemetry::FETCHES_TOTAL, "status", "timeout"),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn suspicious_fetch_records_reconciliation() {
    let dir = tempfile::tempdir().unwrap();
    let listings = Arc::new(std::sync::Mutex::new(vec![catalog(100), catalog(2)]));
    let catalogs = Catalogs::builder()
        .cache_dir(dir.path())
        .min_entries(Provider::OpenRouter, 50)
        .fetcher(
            Provider::OpenRouter,
            Arc::new(FnFetcher::new("shrinking", move |_options| {
                let next = listings.lock().unwrap().remove(0);
                async move { Ok(next) }
            })),
        )
        .build()
        .unwrap();
    let options = FetchOptions::new(Provider::OpenRouter);

    catalogs.catalog.refresh_catalog(&options).await;
    let (refreshed, snapshot) = recorded(catalogs.catalog.refresh_catalog(&options));

    assert_eq!(refreshed.len(), 100);
    assert_eq!(counter_total(&snapshot, telemetry::RECONCILIATIONS_TOTAL), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn joined_endpoint_fetch_records_coalesced() {
    let dir = tempfile::tempdir().unwrap();
    let endpoints = Catalogs::builder()
        .cache_dir(dir.path())
        .build()
        .unwrap()
        .endpoints;
    let key = EndpointKey::new(Provider::OpenRouter, "anthropic/claude-sonnet-4");

    let (results, snapshot) = recorded(join_all((0..4).map(|_| {
        endpoints.get_with(&key, || async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(catalog(2))
        })
    })));

    assert!(results.iter().all(|c| c.len() == 2));
    assert_eq!(counter_total(&snapshot, telemetry::COALESCED_TOTAL), 3);
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let dir = tempfile::tempdir().unwrap();
    let catalogs = Catalogs::builder()
        .cache_dir(dir.path())
        .fetcher(Provider::OpenRouter, serving(1))
        .build()
        .unwrap();
    let _catalog = catalogs
        .catalog
        .get_catalog(&FetchOptions::new(Provider::OpenRouter))
        .await
        .unwrap();
}
