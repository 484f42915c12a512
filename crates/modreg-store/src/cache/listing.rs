//! Staleness-bounded cache of the installed-module listing.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::TimeDelta;
use modreg_manifest::Capability;

use super::backend::{CacheBackend, CacheEntry, MemoryCache};
use crate::clock::{Clock, SystemClock};
use crate::installed::InstalledStore;
use crate::record::InstalledModuleRecord;
use crate::Result;

/// Default maximum age of a served listing.
pub const DEFAULT_STALENESS_SECS: u64 = 60;

/// Cache key of the full listing.
pub const LISTING_KEY: &str = "core.modules.all";

/// Full listing of installed modules, reloaded from the store once it is
/// older than the staleness window.
///
/// Each call either serves the cached listing or reloads and replaces it,
/// never a mix. The check and the reload happen under one mutex, so
/// concurrent callers that find the entry stale cause a single reload.
#[derive(Debug)]
pub struct ListingCache {
    store: InstalledStore,
    backend: Arc<dyn CacheBackend>,
    clock: Arc<dyn Clock>,
    window: TimeDelta,
    guard: Mutex<()>,
}

impl ListingCache {
    /// A process-local cache over `store` with the default window.
    pub fn new(store: InstalledStore) -> Self {
        Self {
            store,
            backend: Arc::new(MemoryCache::new()),
            clock: Arc::new(SystemClock),
            window: window(DEFAULT_STALENESS_SECS),
            guard: Mutex::new(()),
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_staleness_secs(mut self, secs: u64) -> Self {
        self.window = window(secs);
        self
    }

    pub fn store(&self) -> &InstalledStore {
        &self.store
    }

    /// Every installed module, at most one staleness window old.
    pub fn list_all(&self) -> Result<Vec<InstalledModuleRecord>> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now();

        if let Some(entry) = self.backend.load(LISTING_KEY)? {
            if now.signed_duration_since(entry.stored_at) < self.window {
                match serde_json::from_value(entry.payload) {
                    Ok(records) => return Ok(records),
                    Err(e) => tracing::warn!(error = %e, "Discarding undecodable module listing"),
                }
            }
        }

        tracing::debug!("Reloading module listing");
        let records = self.store.list_all()?;
        let entry = CacheEntry {
            stored_at: now,
            payload: serde_json::to_value(&records)?,
        };
        self.backend.store(LISTING_KEY, &entry)?;
        Ok(records)
    }

    /// Cached modules with `capability` enabled.
    pub fn list_where(&self, capability: Capability) -> Result<Vec<InstalledModuleRecord>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|record| record.flags.has(capability))
            .collect())
    }

    /// Drop the cached listing so the next call reloads.
    pub fn invalidate(&self) -> Result<()> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        self.backend.remove(LISTING_KEY)
    }
}

fn window(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Filter, Row, Storage};
    use crate::{Database, ManualClock, MemoryStorage};
    use modreg_manifest::{CapabilityFlags, EventTargets, TableSchema};
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts fetches so tests can tell cache hits from reloads.
    #[derive(Default)]
    struct CountingStorage {
        inner: MemoryStorage,
        fetches: AtomicUsize,
    }

    impl Storage for CountingStorage {
        fn create_table(&self, partition: &str, table: &str, schema: &TableSchema) -> Result<()> {
            self.inner.create_table(partition, table, schema)
        }

        fn has_table(&self, partition: &str, table: &str) -> Result<bool> {
            self.inner.has_table(partition, table)
        }

        fn fetch(&self, partition: &str, table: &str, filter: &Filter) -> Result<Vec<Row>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch(partition, table, filter)
        }

        fn insert(&self, partition: &str, table: &str, row: Row) -> Result<()> {
            self.inner.insert(partition, table, row)
        }

        fn update(
            &self,
            partition: &str,
            table: &str,
            filter: &Filter,
            changes: &Row,
        ) -> Result<usize> {
            self.inner.update(partition, table, filter, changes)
        }

        fn upsert(&self, partition: &str, table: &str, key_column: &str, row: Row) -> Result<()> {
            self.inner.upsert(partition, table, key_column, row)
        }
    }

    fn record(module: &str) -> InstalledModuleRecord {
        InstalledModuleRecord {
            module: module.into(),
            hash: String::new(),
            version: "1.0.0".into(),
            database: "default".into(),
            flags: CapabilityFlags {
                context: module == "board",
                ..Default::default()
            },
            configs: Default::default(),
            targets: EventTargets::new(),
        }
    }

    fn setup() -> (ListingCache, Arc<ManualClock>) {
        let db = Database::new(Arc::new(MemoryStorage::new()), "default");
        let store = InstalledStore::open(db, "module").unwrap();
        let clock = Arc::new(ManualClock::default());
        let cache = ListingCache::new(store).with_clock(clock.clone());
        (cache, clock)
    }

    #[test]
    fn serves_cached_listing_within_window() {
        let (cache, clock) = setup();
        cache.store().upsert(&record("blog")).unwrap();
        assert_eq!(cache.list_all().unwrap().len(), 1);

        cache.store().upsert(&record("wiki")).unwrap();
        clock.advance_secs(59);
        assert_eq!(cache.list_all().unwrap().len(), 1);

        clock.advance_secs(1);
        assert_eq!(cache.list_all().unwrap().len(), 2);
    }

    #[test]
    fn invalidate_forces_reload() {
        let (cache, _clock) = setup();
        cache.list_all().unwrap();
        cache.store().upsert(&record("blog")).unwrap();

        cache.invalidate().unwrap();
        assert_eq!(cache.list_all().unwrap().len(), 1);
    }

    #[test]
    fn list_where_filters_cached_listing() {
        let (cache, _clock) = setup();
        cache.store().upsert(&record("blog")).unwrap();
        cache.store().upsert(&record("board")).unwrap();

        let context = cache.list_where(Capability::Context).unwrap();
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].module, "board");
    }

    #[test]
    fn concurrent_callers_share_one_reload() {
        let storage = Arc::new(CountingStorage::default());
        let db = Database::new(storage.clone(), "default");
        let store = InstalledStore::open(db, "module").unwrap();
        let clock = Arc::new(ManualClock::default());
        let cache = ListingCache::new(store).with_clock(clock.clone());
        cache.store().upsert(&record("blog")).unwrap();
        cache.list_all().unwrap();

        cache.store().upsert(&record("wiki")).unwrap();
        clock.advance_secs(60);
        storage.fetches.store(0, Ordering::SeqCst);

        let threads = 8;
        let barrier = Barrier::new(threads);
        let listings: Vec<Vec<InstalledModuleRecord>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        cache.list_all().unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(storage.fetches.load(Ordering::SeqCst), 1);
        for listing in &listings {
            assert_eq!(listing, &listings[0]);
            assert_eq!(listing.len(), 2);
        }
    }

    #[test]
    fn window_saturates() {
        assert_eq!(window(60), TimeDelta::seconds(60));
        assert_eq!(window(u64::MAX), TimeDelta::MAX);
    }
}
