//! Logical-ID index: a per-table mapping from stable record IDs to
//! physical `(page, slot)` locations, plus the next ID to issue.

use crate::access::tuple::{RecordId, TupleId};
use crate::storage::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Serialize, Deserialize)]
struct IndexState {
    index: HashMap<RecordId, TupleId>,
    next_id: RecordId,
}

/// An in-memory index, durable only through explicit [`RecordIndex::save`].
pub struct RecordIndex {
    table: String,
    base_path: PathBuf,
    state: RwLock<IndexState>,
}

impl RecordIndex {
    pub fn new(table: &str, base_path: impl Into<PathBuf>) -> Self {
        Self {
            table: table.to_string(),
            base_path: base_path.into(),
            state: RwLock::new(IndexState {
                index: HashMap::new(),
                next_id: RecordId(1),
            }),
        }
    }

    /// Load the index from `<table>.idx`. A missing file leaves the index
    /// empty with the next ID at 1.
    pub fn load(&self) -> StorageResult<()> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(());
        }

        let data = std::fs::read_to_string(&path)?;
        *self.state.write() = serde_json::from_str(&data)?;
        Ok(())
    }

    /// Persist the index to `<table>.idx`.
    pub fn save(&self) -> StorageResult<()> {
        let state = self.state.read();
        let data = serde_json::to_string_pretty(&*state)?;
        std::fs::write(self.index_path(), data)?;
        Ok(())
    }

    /// Register a location under a freshly issued ID. IDs are issued
    /// monotonically from 1 and never reused within a table's lifetime.
    pub fn insert(&self, tid: TupleId) -> RecordId {
        let mut state = self.state.write();
        let id = state.next_id;
        state.index.insert(id, tid);
        state.next_id = RecordId(id.0 + 1);
        id
    }

    pub fn search(&self, id: RecordId) -> Option<TupleId> {
        self.state.read().index.get(&id).copied()
    }

    /// Repoint an existing ID to a new location.
    pub fn update(&self, id: RecordId, tid: TupleId) -> StorageResult<()> {
        let mut state = self.state.write();
        match state.index.get_mut(&id) {
            Some(existing) => {
                *existing = tid;
                Ok(())
            }
            None => Err(StorageError::RecordNotFound(id)),
        }
    }

    pub fn delete(&self, id: RecordId) -> StorageResult<()> {
        let mut state = self.state.write();
        match state.index.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StorageError::RecordNotFound(id)),
        }
    }

    /// A copy of the whole mapping, safe to iterate without the lock.
    pub fn all_records(&self) -> HashMap<RecordId, TupleId> {
        self.state.read().index.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().index.is_empty()
    }

    fn index_path(&self) -> PathBuf {
        self.base_path.join(format!("{}.idx", self.table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::PageId;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_ids_start_at_one_and_increase() -> Result<()> {
        let dir = tempdir()?;
        let index = RecordIndex::new("users", dir.path());

        let id1 = index.insert(TupleId::new(PageId(0), 0));
        let id2 = index.insert(TupleId::new(PageId(0), 1));
        let id3 = index.insert(TupleId::new(PageId(1), 0));

        assert_eq!(id1, RecordId(1));
        assert_eq!(id2, RecordId(2));
        assert_eq!(id3, RecordId(3));
        Ok(())
    }

    #[test]
    fn test_search() -> Result<()> {
        let dir = tempdir()?;
        let index = RecordIndex::new("users", dir.path());

        let tid = TupleId::new(PageId(4), 7);
        let id = index.insert(tid);

        assert_eq!(index.search(id), Some(tid));
        assert_eq!(index.search(RecordId(99)), None);
        Ok(())
    }

    #[test]
    fn test_update() -> Result<()> {
        let dir = tempdir()?;
        let index = RecordIndex::new("users", dir.path());

        let id = index.insert(TupleId::new(PageId(0), 0));
        index.update(id, TupleId::new(PageId(2), 5))?;
        assert_eq!(index.search(id), Some(TupleId::new(PageId(2), 5)));

        let err = index
            .update(RecordId(42), TupleId::new(PageId(0), 0))
            .unwrap_err();
        assert!(matches!(err, StorageError::RecordNotFound(RecordId(42))));
        Ok(())
    }

    #[test]
    fn test_delete() -> Result<()> {
        let dir = tempdir()?;
        let index = RecordIndex::new("users", dir.path());

        let id = index.insert(TupleId::new(PageId(0), 0));
        index.delete(id)?;
        assert_eq!(index.search(id), None);

        let err = index.delete(id).unwrap_err();
        assert!(matches!(err, StorageError::RecordNotFound(_)));
        Ok(())
    }

    #[test]
    fn test_deleted_ids_are_not_reissued() -> Result<()> {
        let dir = tempdir()?;
        let index = RecordIndex::new("users", dir.path());

        let id1 = index.insert(TupleId::new(PageId(0), 0));
        index.delete(id1)?;
        let id2 = index.insert(TupleId::new(PageId(0), 0));
        assert!(id2 > id1);
        Ok(())
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let dir = tempdir()?;
        {
            let index = RecordIndex::new("users", dir.path());
            index.insert(TupleId::new(PageId(0), 0));
            index.insert(TupleId::new(PageId(0), 1));
            index.delete(RecordId(1))?;
            index.save()?;
        }

        let index = RecordIndex::new("users", dir.path());
        index.load()?;
        assert_eq!(index.len(), 1);
        assert_eq!(index.search(RecordId(2)), Some(TupleId::new(PageId(0), 1)));

        // next_id persists: a new insert continues the sequence.
        assert_eq!(index.insert(TupleId::new(PageId(1), 0)), RecordId(3));
        Ok(())
    }

    #[test]
    fn test_load_missing_file() -> Result<()> {
        let dir = tempdir()?;
        let index = RecordIndex::new("users", dir.path());
        index.load()?;
        assert!(index.is_empty());
        assert_eq!(index.insert(TupleId::new(PageId(0), 0)), RecordId(1));
        Ok(())
    }

    #[test]
    fn test_index_file_shape() -> Result<()> {
        let dir = tempdir()?;
        let index = RecordIndex::new("users", dir.path());
        index.insert(TupleId::new(PageId(0), 0));
        index.save()?;

        let raw = std::fs::read_to_string(dir.path().join("users.idx"))?;
        let json: serde_json::Value = serde_json::from_str(&raw)?;
        assert_eq!(json["next_id"], 2);
        assert_eq!(json["index"]["1"]["page_id"], 0);
        assert_eq!(json["index"]["1"]["slot_id"], 0);
        Ok(())
    }
}
