//! Two-tier entry store: moka fast tier over per-key JSON files.
//!
//! # Tiers
//!
//! - **Memory**: `moka::sync::Cache<String, Arc<Catalog>>` with a soft
//!   residency TTL (default 5 minutes). Expiry here is never data loss.
//! - **Disk**: one `{key}_{kind}.json` file per key holding nothing but the
//!   serialized catalog. Written atomically (temp file in the same
//!   directory, then rename); never expired.
//!
//! A fast-tier miss always falls back to the durable file and repopulates the
//! fast tier, so once a key has been stored, [`EntryStore::get`] keeps
//! returning data until [`EntryStore::evict`] *and* the file is gone. Evict
//! only touches memory, deliberately: the file remains the last known-good
//! snapshot.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use moka::sync::Cache;
use tracing::{debug, warn};

use crate::telemetry;
use crate::types::Catalog;
use crate::{CatalogError, Result};

/// Default fast-tier residency before an entry is recycled from memory.
pub const DEFAULT_RESIDENCY: Duration = Duration::from_secs(5 * 60);

/// Default maximum number of keys held in memory.
pub const DEFAULT_MAX_ENTRIES: u64 = 1_000;

/// Which family of files a store owns; decides the file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Full provider catalogs: `{key}_models.json`.
    Models,
    /// Per-item endpoint lists: `{key}_endpoints.json`.
    Endpoints,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Models => "models",
            Self::Endpoints => "endpoints",
        }
    }
}

/// Which tier answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Memory,
    Disk,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Disk => "disk",
        }
    }
}

/// Two-tier catalog store. See module docs.
pub struct EntryStore {
    memory: Cache<String, Arc<Catalog>>,
    dir: PathBuf,
    kind: StoreKind,
    pending_writes: Arc<PendingWrites>,
    next_write: AtomicU64,
}

impl EntryStore {
    /// Create a store with default residency and capacity.
    pub fn new(dir: impl Into<PathBuf>, kind: StoreKind) -> Self {
        Self::with_limits(dir, kind, DEFAULT_RESIDENCY, DEFAULT_MAX_ENTRIES)
    }

    /// Create a store with a custom residency TTL and fast-tier capacity.
    pub fn with_limits(
        dir: impl Into<PathBuf>,
        kind: StoreKind,
        residency: Duration,
        max_entries: u64,
    ) -> Self {
        let memory = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(residency)
            .build();
        Self {
            memory,
            dir: dir.into(),
            kind,
            pending_writes: Arc::default(),
            next_write: AtomicU64::new(0),
        }
    }

    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    /// Path of the durable file for `key`.
    pub fn durable_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}_{}.json", self.kind.as_str()))
    }

    /// Fast tier only. Never touches the filesystem.
    pub fn peek(&self, key: &str) -> Option<Catalog> {
        self.memory.get(key).map(|c| Catalog::clone(&c))
    }

    /// Read through both tiers.
    pub async fn get(&self, key: &str) -> Option<Catalog> {
        self.lookup(key).await.map(|(catalog, _)| catalog)
    }

    /// Read through both tiers, reporting which one answered.
    ///
    /// A valid durable file repopulates the fast tier; an invalid or missing
    /// one yields `None`.
    pub async fn lookup(&self, key: &str) -> Option<(Catalog, Tier)> {
        let cache = self.kind.as_str();
        if let Some(catalog) = self.peek(key) {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL,
                "cache" => cache,
                "tier" => Tier::Memory.as_str(),
            )
            .increment(1);
            return Some((catalog, Tier::Memory));
        }

        match self.load_durable(key).await {
            Some(catalog) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL,
                    "cache" => cache,
                    "tier" => Tier::Disk.as_str(),
                )
                .increment(1);
                Some((self.warm(key, catalog), Tier::Disk))
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => cache).increment(1);
                None
            }
        }
    }

    /// Disk only, without repopulating the fast tier.
    pub async fn load_durable(&self, key: &str) -> Option<Catalog> {
        let path = self.durable_path(key);
        match tokio::task::spawn_blocking(move || load_file(&path)).await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(key, error = %e, "durable read task failed");
                None
            }
        }
    }

    /// Populate the fast tier from a durable read unless a concurrent put
    /// got there first; returns whichever copy is now resident.
    pub(crate) fn warm(&self, key: &str, catalog: Catalog) -> Catalog {
        let entry = self
            .memory
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(catalog));
        Catalog::clone(entry.value())
    }

    /// Store `catalog` under `key`.
    ///
    /// The fast tier is replaced synchronously; the durable write is
    /// best-effort and its failure is only logged. Overlapping puts for one
    /// key leave both tiers holding the last one issued: a durable write
    /// that has been superseded by then is dropped instead of renamed.
    pub async fn put(&self, key: &str, catalog: Catalog) {
        let catalog = Arc::new(catalog);
        let generation = {
            let mut pending = lock(&self.pending_writes);
            let generation = self.next_write.fetch_add(1, Ordering::Relaxed);
            self.memory.insert(key.to_string(), Arc::clone(&catalog));
            pending.insert(key.to_string(), generation);
            generation
        };

        let path = self.durable_path(key);
        let pending = Arc::clone(&self.pending_writes);
        let owned_key = key.to_string();
        let result = tokio::task::spawn_blocking(move || {
            write_latest(&path, &owned_key, generation, &catalog, &pending)
        })
        .await;
        let error = match result {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(e) => e.to_string(),
        };
        metrics::counter!(telemetry::PERSIST_FAILURES_TOTAL, "cache" => self.kind.as_str())
            .increment(1);
        warn!(key, error = %error, "failed to persist catalog; memory copy still served");
    }

    /// Drop the fast-tier copy of `key`. The durable file is left intact.
    pub fn evict(&self, key: &str) {
        self.memory.invalidate(key);
    }
}

/// Latest issued durable write per key, removed once it lands.
type PendingWrites = Mutex<HashMap<String, u64>>;

fn lock(pending: &PendingWrites) -> MutexGuard<'_, HashMap<String, u64>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Durable file helpers
// ============================================================================

/// Load and validate a catalog file.
///
/// Returns `None` on missing or invalid file (logs a warning on invalid).
fn load_file(path: &Path) -> Option<Catalog> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read cached catalog");
            return None;
        }
    };
    match Catalog::from_json(&content) {
        Ok(catalog) => {
            debug!(path = %path.display(), entries = catalog.len(), "loaded catalog from disk");
            Some(catalog)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring invalid cached catalog");
            None
        }
    }
}

/// Save a catalog file atomically (temp file in the same directory + rename).
#[cfg(test)]
fn save_file(path: &Path, catalog: &Catalog) -> Result<()> {
    persist_file(write_temp(path, catalog)?, path)
}

/// Write `catalog` for `key` unless a later put for the same key has been
/// issued meanwhile. The pending map stays locked through the rename, so
/// renames for one key land in issue order.
fn write_latest(
    path: &Path,
    key: &str,
    generation: u64,
    catalog: &Catalog,
    pending: &PendingWrites,
) -> Result<()> {
    let tmp = write_temp(path, catalog);
    let mut pending = lock(pending);
    if pending.get(key) != Some(&generation) {
        debug!(key, generation, "dropping superseded durable write");
        return Ok(());
    }
    pending.remove(key);
    persist_file(tmp?, path)
}

/// Serialize `catalog` into a temp file next to `path`.
fn write_temp(path: &Path, catalog: &Catalog) -> Result<tempfile::NamedTempFile> {
    let parent = path
        .parent()
        .ok_or_else(|| CatalogError::Io(format!("no parent directory for {}", path.display())))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        CatalogError::Io(format!(
            "failed to create cache dir {}: {e}",
            parent.display()
        ))
    })?;

    let json = serde_json::to_string_pretty(catalog)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(json.as_bytes())?;
    tmp.as_file().sync_all()?;
    Ok(tmp)
}

fn persist_file(tmp: tempfile::NamedTempFile, path: &Path) -> Result<()> {
    tmp.persist(path).map_err(|e| {
        CatalogError::Io(format!(
            "failed to rename cache file into {}: {}",
            path.display(),
            e.error
        ))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModelRecord;

    fn sample(ids: &[&str]) -> Catalog {
        ids.iter()
            .map(|id| (id.to_string(), ModelRecord::new(4096)))
            .collect()
    }

    #[test]
    fn durable_path_uses_kind_suffix() {
        let models = EntryStore::new("/cache", StoreKind::Models);
        let endpoints = EntryStore::new("/cache", StoreKind::Endpoints);
        assert_eq!(
            models.durable_path("openrouter"),
            PathBuf::from("/cache/openrouter_models.json")
        );
        assert_eq!(
            endpoints.durable_path("openrouter_gpt-4"),
            PathBuf::from("/cache/openrouter_gpt-4_endpoints.json")
        );
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_models.json");

        save_file(&path, &sample(&["a", "b"])).unwrap();
        let loaded = load_file(&path).unwrap();
        assert_eq!(loaded, sample(&["a", "b"]));
    }

    #[test]
    fn save_creates_parent_dirs_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("deep").join("nested");
        let path = nested.join("x_models.json");

        save_file(&path, &sample(&["a"])).unwrap();

        let names: Vec<_> = std::fs::read_dir(&nested)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("x_models.json")]);
    }

    #[test]
    fn load_missing_returns_none() {
        assert!(load_file(Path::new("/nonexistent/x_models.json")).is_none());
    }

    #[test]
    fn load_invalid_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_models.json");

        std::fs::write(&path, "this is not valid json").unwrap();
        assert!(load_file(&path).is_none());

        std::fs::write(&path, r#"{"m1": {"context_window": 0}}"#).unwrap();
        assert!(load_file(&path).is_none());
    }

    #[tokio::test]
    async fn get_falls_back_to_disk_and_repopulates() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntryStore::new(dir.path(), StoreKind::Models);
        save_file(&store.durable_path("glama"), &sample(&["m1"])).unwrap();

        assert!(store.peek("glama").is_none());
        let (catalog, tier) = store.lookup("glama").await.unwrap();
        assert_eq!(tier, Tier::Disk);
        assert!(catalog.contains("m1"));

        let (_, tier) = store.lookup("glama").await.unwrap();
        assert_eq!(tier, Tier::Memory);
    }

    #[tokio::test]
    async fn evict_keeps_durable_copy() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntryStore::new(dir.path(), StoreKind::Models);

        store.put("glama", sample(&["m1"])).await;
        store.evict("glama");

        assert!(store.peek("glama").is_none());
        assert!(store.durable_path("glama").exists());
        assert_eq!(store.get("glama").await, Some(sample(&["m1"])));
    }

    #[tokio::test]
    async fn put_survives_unwritable_directory() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the cache directory should be.
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, "").unwrap();
        let store = EntryStore::new(&blocker, StoreKind::Models);

        store.put("glama", sample(&["m1"])).await;
        assert_eq!(store.peek("glama"), Some(sample(&["m1"])));
    }

    #[test]
    fn superseded_write_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("glama_models.json");
        let pending = PendingWrites::default();
        lock(&pending).insert("glama".to_string(), 2);

        // The newer write lands first, the older one finishes afterwards.
        write_latest(&path, "glama", 2, &sample(&["newer"]), &pending).unwrap();
        write_latest(&path, "glama", 1, &sample(&["older"]), &pending).unwrap();

        assert_eq!(load_file(&path), Some(sample(&["newer"])));
        assert!(lock(&pending).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn overlapping_puts_leave_tiers_in_agreement() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntryStore::new(dir.path(), StoreKind::Models);
        let names: Vec<String> = (0..32).map(|i| format!("m{i}")).collect();

        futures_util::future::join_all(
            names
                .iter()
                .map(|name| store.put("glama", sample(&[name.as_str()]))),
        )
        .await;

        let resident = store.peek("glama").unwrap();
        store.evict("glama");
        assert_eq!(store.get("glama").await, Some(resident));
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1, "no temp files left behind");
    }

    #[tokio::test]
    async fn residency_expiry_is_not_data_loss() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntryStore::with_limits(
            dir.path(),
            StoreKind::Models,
            Duration::from_millis(20),
            100,
        );

        store.put("glama", sample(&["m1"])).await;
        std::thread::sleep(Duration::from_millis(60));

        assert!(store.peek("glama").is_none());
        assert_eq!(store.get("glama").await, Some(sample(&["m1"])));
    }
}
