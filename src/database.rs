//! The storage layer façade: owns the disk manager, catalog, per-table
//! indexes and page caches, and routes CRUD to them.

use crate::access::index::RecordIndex;
use crate::access::tuple::{RecordId, TupleId};
use crate::catalog::{Catalog, Schema};
use crate::storage::disk::DiskManager;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{HeapPage, PageId};
use crate::storage::PAGE_SIZE;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// Cached pages are mutated in place and written back on flush. The cache
// has no eviction policy and no size bound; tables are assumed to fit.
type PageCache = Mutex<HashMap<PageId, HeapPage>>;

struct DatabaseState {
    base_path: PathBuf,
    disk: DiskManager,
    catalog: Catalog,
    indexes: HashMap<String, RecordIndex>,
    page_caches: HashMap<String, PageCache>,
}

/// A table-oriented record store over per-table heap files.
///
/// All mutations are serialized by an exclusive lock; reads share it.
/// Record IDs returned by [`Database::insert`] are stable handles, issued
/// in lock-grant order and never reused within a table's lifetime.
pub struct Database {
    state: RwLock<Option<DatabaseState>>,
}

impl Database {
    /// Create a closed database handle; call [`Database::open`] before use.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(None),
        }
    }

    /// Open the store rooted at `path`, creating the directory if needed,
    /// and load the catalog plus one index per known table.
    pub fn open(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        let mut guard = self.state.write();
        if guard.is_some() {
            return Err(StorageError::AlreadyOpen);
        }

        let base_path = path.as_ref().to_path_buf();
        let disk = DiskManager::open(&base_path)?;
        let catalog = Catalog::new(&base_path);
        catalog.load()?;

        let mut indexes = HashMap::new();
        let mut page_caches = HashMap::new();
        for table in catalog.list_tables() {
            let index = RecordIndex::new(&table, &base_path);
            index.load()?;
            indexes.insert(table.clone(), index);
            page_caches.insert(table, Mutex::new(HashMap::new()));
        }

        info!(
            "opened storage at {} ({} tables)",
            base_path.display(),
            indexes.len()
        );
        *guard = Some(DatabaseState {
            base_path,
            disk,
            catalog,
            indexes,
            page_caches,
        });
        Ok(())
    }

    /// Flush and release everything. A no-op when already closed.
    pub fn close(&self) -> StorageResult<()> {
        let mut guard = self.state.write();
        if let Some(state) = guard.as_ref() {
            state.flush()?;
            state.disk.close();
            info!("closed storage at {}", state.base_path.display());
        }
        *guard = None;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.state.read().is_some()
    }

    /// Declare a new table. The schema is persisted immediately; the heap
    /// file appears on the first insert.
    pub fn create_table(&self, name: &str, schema: Schema) -> StorageResult<()> {
        let mut guard = self.state.write();
        let state = guard.as_mut().ok_or(StorageError::NotOpen)?;

        state.catalog.create_table(name, schema)?;
        state
            .indexes
            .insert(name.to_string(), RecordIndex::new(name, &state.base_path));
        state
            .page_caches
            .insert(name.to_string(), Mutex::new(HashMap::new()));
        Ok(())
    }

    /// Store a record and return its new logical ID.
    pub fn insert(&self, table: &str, record: &[u8]) -> StorageResult<RecordId> {
        let guard = self.state.write();
        let state = guard.as_ref().ok_or(StorageError::NotOpen)?;
        if !state.catalog.table_exists(table) {
            return Err(StorageError::UnknownTable(table.to_string()));
        }

        let tid = state.place_record(table, record)?;
        let id = state.index(table)?.insert(tid);
        debug!(
            "inserted record {} of '{}' at {} slot {}",
            id, table, tid.page_id, tid.slot_id
        );
        Ok(id)
    }

    /// Fetch a record's bytes by logical ID.
    pub fn get(&self, table: &str, id: RecordId) -> StorageResult<Vec<u8>> {
        let guard = self.state.read();
        let state = guard.as_ref().ok_or(StorageError::NotOpen)?;

        let tid = state.location(table, id)?;
        state.with_page(table, tid.page_id, |page| {
            Ok(page.get_record(tid.slot_id)?.to_vec())
        })
    }

    /// Overwrite a record in place. The new bytes must have the same
    /// length as the stored record.
    pub fn update(&self, table: &str, id: RecordId, record: &[u8]) -> StorageResult<()> {
        let guard = self.state.write();
        let state = guard.as_ref().ok_or(StorageError::NotOpen)?;

        let tid = state.location(table, id)?;
        state.with_page(table, tid.page_id, |page| {
            page.update_record(tid.slot_id, record)
        })
    }

    /// Tombstone a record and drop its ID from the index. The deletion is
    /// not durable until the next flush.
    pub fn delete_record(&self, table: &str, id: RecordId) -> StorageResult<()> {
        let guard = self.state.write();
        let state = guard.as_ref().ok_or(StorageError::NotOpen)?;

        let tid = state.location(table, id)?;
        state.with_page(table, tid.page_id, |page| page.delete_record(tid.slot_id))?;
        state.index(table)?.delete(id)
    }

    /// Enumerate every record in a table, optionally filtered. The record
    /// set is snapshotted from the index; entries whose pages or slots
    /// fail to read are skipped rather than failing the whole scan.
    pub fn scan(
        &self,
        table: &str,
        filter: Option<&dyn Fn(&[u8]) -> bool>,
    ) -> StorageResult<Vec<Vec<u8>>> {
        let guard = self.state.read();
        let state = guard.as_ref().ok_or(StorageError::NotOpen)?;
        if !state.catalog.table_exists(table) {
            return Err(StorageError::UnknownTable(table.to_string()));
        }

        let snapshot = state.index(table)?.all_records();
        let mut results = Vec::new();
        for (id, tid) in snapshot {
            let record = state.with_page(table, tid.page_id, |page| {
                Ok(page.get_record(tid.slot_id)?.to_vec())
            });
            match record {
                Ok(bytes) => {
                    if filter.map_or(true, |keep| keep(&bytes)) {
                        results.push(bytes);
                    }
                }
                Err(err) => warn!("scan of '{}' skipping record {}: {}", table, id, err),
            }
        }
        Ok(results)
    }

    /// Persist the catalog, then every index, then every dirty page.
    pub fn flush(&self) -> StorageResult<()> {
        let guard = self.state.write();
        let state = guard.as_ref().ok_or(StorageError::NotOpen)?;
        state.flush()
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        // Best effort flush-and-close on drop.
        let _ = self.close();
    }
}

impl DatabaseState {
    fn index(&self, table: &str) -> StorageResult<&RecordIndex> {
        self.indexes
            .get(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))
    }

    fn location(&self, table: &str, id: RecordId) -> StorageResult<TupleId> {
        self.index(table)?
            .search(id)
            .ok_or(StorageError::RecordNotFound(id))
    }

    // Runs `f` against the cached page, reading it from disk on a miss.
    fn with_page<T>(
        &self,
        table: &str,
        page_id: PageId,
        f: impl FnOnce(&mut HeapPage) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let cache = self
            .page_caches
            .get(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?;
        let mut cache = cache.lock();

        let page = match cache.entry(page_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let mut buf = Box::new([0u8; PAGE_SIZE]);
                self.disk.read_page(table, page_id, buf.as_mut_slice())?;
                entry.insert(HeapPage::load(buf.as_slice())?)
            }
        };
        f(page)
    }

    // First fit: try every existing page in ascending order, then
    // allocate a fresh one. Full or unreadable pages are skipped.
    fn place_record(&self, table: &str, record: &[u8]) -> StorageResult<TupleId> {
        let page_count = self.disk.page_count(table)?;
        for pid in 0..page_count {
            let page_id = PageId(pid);
            if let Ok(slot_id) = self.with_page(table, page_id, |page| page.insert_record(record))
            {
                return Ok(TupleId::new(page_id, slot_id));
            }
        }

        let page_id = self.disk.allocate_page(table)?;
        let mut page = HeapPage::new(page_id);
        let slot_id = page.insert_record(record)?;

        let cache = self
            .page_caches
            .get(table)
            .ok_or_else(|| StorageError::UnknownTable(table.to_string()))?;
        cache.lock().insert(page_id, page);
        Ok(TupleId::new(page_id, slot_id))
    }

    fn flush(&self) -> StorageResult<()> {
        // Metadata first, then indexes, then data pages. On a crash
        // mid-flush the metadata may refer to pages not yet persisted;
        // accepted for a store without a write-ahead log.
        self.catalog.save()?;
        for index in self.indexes.values() {
            index.save()?;
        }

        let mut flushed = 0;
        for (table, cache) in &self.page_caches {
            let mut cache = cache.lock();
            for (page_id, page) in cache.iter_mut() {
                if page.is_dirty() {
                    self.disk.write_page(table, *page_id, page.data())?;
                    page.set_clean();
                    flushed += 1;
                }
            }
        }

        debug!("flush complete ({flushed} dirty pages written)");
        Ok(())
    }
}
