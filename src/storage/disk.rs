use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageId;
use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const PAGE_SIZE: usize = 4096;

#[derive(Default)]
struct DiskState {
    files: HashMap<String, File>,
    page_counters: HashMap<String, u32>,
}

impl DiskState {
    // Lazily opens the table's heap file (created if absent) and seeds its
    // page counter from the current file length.
    fn table_file(&mut self, base_path: &Path, table: &str) -> StorageResult<&mut File> {
        if !self.files.contains_key(table) {
            let path = base_path.join(format!("{table}.tbl"));
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(&path)?;

            let pages = (file.metadata()?.len() / PAGE_SIZE as u64) as u32;
            self.page_counters.entry(table.to_string()).or_insert(pages);
            self.files.insert(table.to_string(), file);
        }

        Ok(self
            .files
            .get_mut(table)
            .expect("file handle inserted above"))
    }
}

/// Translates `(table, page_id)` to whole-page file I/O.
///
/// Each table owns one heap file at `<base>/<table>.tbl` whose length is a
/// multiple of [`PAGE_SIZE`]; page `i` occupies bytes
/// `[i * PAGE_SIZE, (i + 1) * PAGE_SIZE)`.
pub struct DiskManager {
    base_path: PathBuf,
    state: Mutex<DiskState>,
}

impl DiskManager {
    /// Open a disk manager rooted at `base_path`, creating the directory
    /// if it does not exist.
    pub fn open(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;

        Ok(Self {
            base_path,
            state: Mutex::new(DiskState::default()),
        })
    }

    /// Read one whole page into `buf`, which must be exactly `PAGE_SIZE`
    /// bytes. Fails if the heap file is shorter than the requested region.
    pub fn read_page(&self, table: &str, page_id: PageId, buf: &mut [u8]) -> StorageResult<()> {
        if buf.len() != PAGE_SIZE {
            return Err(StorageError::InvalidPageData { len: buf.len() });
        }

        let mut state = self.state.lock();
        let file = state.table_file(&self.base_path, table)?;

        let offset = page_offset(page_id);
        if offset + PAGE_SIZE as u64 > file.metadata()?.len() {
            return Err(StorageError::PageNotFound {
                table: table.to_string(),
                page_id,
            });
        }

        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    /// Write one whole page and sync the file. This is the crate's only
    /// durability guarantee.
    pub fn write_page(&self, table: &str, page_id: PageId, data: &[u8]) -> StorageResult<()> {
        if data.len() != PAGE_SIZE {
            return Err(StorageError::InvalidPageData { len: data.len() });
        }

        let mut state = self.state.lock();
        let file = state.table_file(&self.base_path, table)?;

        file.seek(SeekFrom::Start(page_offset(page_id)))?;
        file.write_all(data)?;
        file.sync_all()?;

        debug!("wrote page {} of table '{}'", page_id, table);
        Ok(())
    }

    /// Hand out the next page ID for a table. Allocation does not extend
    /// the heap file; the space appears when the page is first written, so
    /// an allocation that is never written is forgotten on the next open.
    pub fn allocate_page(&self, table: &str) -> StorageResult<PageId> {
        let mut state = self.state.lock();
        state.table_file(&self.base_path, table)?;

        let counter = state
            .page_counters
            .get_mut(table)
            .expect("counter seeded by table_file");
        let page_id = PageId(*counter);
        *counter += 1;

        debug!("allocated page {} for table '{}'", page_id, table);
        Ok(page_id)
    }

    /// The number of pages allocated for a table so far.
    pub fn page_count(&self, table: &str) -> StorageResult<u32> {
        let mut state = self.state.lock();
        state.table_file(&self.base_path, table)?;
        Ok(state.page_counters[table])
    }

    /// Close every open heap file. Durability was already provided by
    /// `write_page`; no further sync happens here.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.files.clear();
    }
}

fn page_offset(page_id: PageId) -> u64 {
    page_id.0 as u64 * PAGE_SIZE as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_base_dir() -> Result<()> {
        let dir = tempdir()?;
        let base = dir.path().join("nested").join("data");

        let _dm = DiskManager::open(&base)?;
        assert!(base.is_dir());
        Ok(())
    }

    #[test]
    fn test_write_and_read_page() -> Result<()> {
        let dir = tempdir()?;
        let dm = DiskManager::open(dir.path())?;

        let mut data = vec![0u8; PAGE_SIZE];
        data[0] = 42;
        data[PAGE_SIZE - 1] = 24;
        dm.write_page("users", PageId(0), &data)?;

        let mut buf = vec![0u8; PAGE_SIZE];
        dm.read_page("users", PageId(0), &mut buf)?;
        assert_eq!(buf[0], 42);
        assert_eq!(buf[PAGE_SIZE - 1], 24);
        Ok(())
    }

    #[test]
    fn test_tables_are_isolated() -> Result<()> {
        let dir = tempdir()?;
        let dm = DiskManager::open(dir.path())?;

        dm.write_page("users", PageId(0), &vec![1u8; PAGE_SIZE])?;
        dm.write_page("orders", PageId(0), &vec![2u8; PAGE_SIZE])?;

        let mut buf = vec![0u8; PAGE_SIZE];
        dm.read_page("users", PageId(0), &mut buf)?;
        assert!(buf.iter().all(|&b| b == 1));
        dm.read_page("orders", PageId(0), &mut buf)?;
        assert!(buf.iter().all(|&b| b == 2));

        assert!(dir.path().join("users.tbl").exists());
        assert!(dir.path().join("orders.tbl").exists());
        Ok(())
    }

    #[test]
    fn test_read_past_end_of_file() -> Result<()> {
        let dir = tempdir()?;
        let dm = DiskManager::open(dir.path())?;

        let mut buf = vec![0u8; PAGE_SIZE];
        let err = dm.read_page("users", PageId(0), &mut buf).unwrap_err();
        assert!(matches!(err, StorageError::PageNotFound { .. }));
        Ok(())
    }

    #[test]
    fn test_wrong_buffer_length() -> Result<()> {
        let dir = tempdir()?;
        let dm = DiskManager::open(dir.path())?;

        let mut small = vec![0u8; 100];
        assert!(matches!(
            dm.read_page("users", PageId(0), &mut small).unwrap_err(),
            StorageError::InvalidPageData { len: 100 }
        ));
        assert!(matches!(
            dm.write_page("users", PageId(0), &small).unwrap_err(),
            StorageError::InvalidPageData { len: 100 }
        ));
        Ok(())
    }

    #[test]
    fn test_allocate_is_monotonic() -> Result<()> {
        let dir = tempdir()?;
        let dm = DiskManager::open(dir.path())?;

        assert_eq!(dm.page_count("users")?, 0);
        assert_eq!(dm.allocate_page("users")?, PageId(0));
        assert_eq!(dm.allocate_page("users")?, PageId(1));
        assert_eq!(dm.page_count("users")?, 2);

        // Counters are per table.
        assert_eq!(dm.allocate_page("orders")?, PageId(0));
        Ok(())
    }

    #[test]
    fn test_counter_seeded_from_file_length() -> Result<()> {
        let dir = tempdir()?;
        {
            let dm = DiskManager::open(dir.path())?;
            dm.write_page("users", PageId(0), &vec![0u8; PAGE_SIZE])?;
            dm.write_page("users", PageId(1), &vec![0u8; PAGE_SIZE])?;
            dm.close();
        }

        let dm = DiskManager::open(dir.path())?;
        assert_eq!(dm.page_count("users")?, 2);
        assert_eq!(dm.allocate_page("users")?, PageId(2));
        Ok(())
    }

    #[test]
    fn test_unwritten_allocation_is_forgotten() -> Result<()> {
        let dir = tempdir()?;
        {
            let dm = DiskManager::open(dir.path())?;
            let first = dm.allocate_page("users")?;
            dm.write_page("users", first, &vec![0u8; PAGE_SIZE])?;
            let _ = dm.allocate_page("users")?;
            assert_eq!(dm.page_count("users")?, 2);
        }

        // The second allocation was never written, so the counter resets
        // to the file length on reopen.
        let dm = DiskManager::open(dir.path())?;
        assert_eq!(dm.page_count("users")?, 1);
        Ok(())
    }

    #[test]
    fn test_overwrite_page() -> Result<()> {
        let dir = tempdir()?;
        let dm = DiskManager::open(dir.path())?;

        dm.write_page("users", PageId(0), &vec![1u8; PAGE_SIZE])?;
        dm.write_page("users", PageId(0), &vec![2u8; PAGE_SIZE])?;

        let mut buf = vec![0u8; PAGE_SIZE];
        dm.read_page("users", PageId(0), &mut buf)?;
        assert!(buf.iter().all(|&b| b == 2));
        assert_eq!(dm.page_count("users")?, 1);
        Ok(())
    }
}
