use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageId;
use crate::storage::PAGE_SIZE;

// Header layout (18 bytes), all little-endian:
// [PageID: 4][SlotCount: 2][FreeStart: 2][FreeEnd: 2][NextPageID: 4][PrevPageID: 4]
pub const HEADER_SIZE: usize = 18;
const PAGE_ID_OFFSET: usize = 0;
const SLOT_COUNT_OFFSET: usize = 4;
const FREE_START_OFFSET: usize = 6;
const FREE_END_OFFSET: usize = 8;
const NEXT_PAGE_ID_OFFSET: usize = 10;
const PREV_PAGE_ID_OFFSET: usize = 14;

// Slot directory entry (2 bytes offset, 2 bytes size). A size of 0 marks
// an empty slot, tombstoned or never used.
pub const SLOT_SIZE: usize = 4;

// Byte image of -1_i32: the "no page" sentinel for the next/prev links.
const NO_PAGE: u32 = 0xFFFF_FFFF;

/// A fixed-size slotted page.
///
/// The slot directory grows down from the header; record data grows up
/// from the end of the page. Deleted records leave a tombstoned slot and
/// an unreclaimed hole in the record region (no compaction).
#[derive(Debug)]
pub struct HeapPage {
    data: Box<[u8; PAGE_SIZE]>,
    dirty: bool,
}

impl HeapPage {
    /// Create an empty page. The page starts dirty: it exists only in
    /// memory until it is written out.
    pub fn new(page_id: PageId) -> Self {
        let mut page = Self {
            data: Box::new([0u8; PAGE_SIZE]),
            dirty: true,
        };

        page.data[PAGE_ID_OFFSET..PAGE_ID_OFFSET + 4].copy_from_slice(&page_id.0.to_le_bytes());
        page.set_slot_count(0);
        page.set_free_start(HEADER_SIZE as u16);
        page.set_free_end(PAGE_SIZE as u16);
        page.data[NEXT_PAGE_ID_OFFSET..NEXT_PAGE_ID_OFFSET + 4]
            .copy_from_slice(&NO_PAGE.to_le_bytes());
        page.data[PREV_PAGE_ID_OFFSET..PREV_PAGE_ID_OFFSET + 4]
            .copy_from_slice(&NO_PAGE.to_le_bytes());

        page
    }

    /// Load a page from its on-disk image, verbatim. The page starts clean.
    pub fn load(data: &[u8]) -> StorageResult<Self> {
        if data.len() != PAGE_SIZE {
            return Err(StorageError::InvalidPageData { len: data.len() });
        }

        let mut page = Self {
            data: Box::new([0u8; PAGE_SIZE]),
            dirty: false,
        };
        page.data.copy_from_slice(data);
        Ok(page)
    }

    /// Insert a record, reusing the first tombstoned slot if one exists,
    /// otherwise appending a new slot. Returns the slot index.
    pub fn insert_record(&mut self, record: &[u8]) -> StorageResult<u16> {
        let record_size = record.len();

        // The slot entry is charged even when a tombstone is reused.
        let required = record_size + SLOT_SIZE;
        let available = (self.free_end() - self.free_start()) as usize;
        if available < required {
            return Err(StorageError::PageFull {
                required,
                available,
            });
        }

        let slot_count = self.slot_count();
        let slot_id = match (0..slot_count).find(|&i| self.read_slot(i).1 == 0) {
            Some(empty) => empty,
            None => {
                self.set_slot_count(slot_count + 1);
                self.set_free_start(self.free_start() + SLOT_SIZE as u16);
                slot_count
            }
        };

        let record_offset = self.free_end() - record_size as u16;
        self.data[record_offset as usize..record_offset as usize + record_size]
            .copy_from_slice(record);
        self.write_slot(slot_id, record_offset, record_size as u16);
        self.set_free_end(record_offset);
        self.dirty = true;

        Ok(slot_id)
    }

    /// Read the record stored in a slot.
    pub fn get_record(&self, slot_id: u16) -> StorageResult<&[u8]> {
        let slot_count = self.slot_count();
        if slot_id >= slot_count {
            return Err(StorageError::InvalidSlotId {
                slot_id,
                max_slot: slot_count.saturating_sub(1),
            });
        }

        let (offset, size) = self.read_slot(slot_id);
        if size == 0 {
            return Err(StorageError::EmptySlot { slot_id });
        }

        let end = offset as usize + size as usize;
        if end > PAGE_SIZE {
            return Err(StorageError::CorruptSlot {
                slot_id,
                offset,
                size,
            });
        }

        Ok(&self.data[offset as usize..end])
    }

    /// Overwrite a record in place. The new record must have exactly the
    /// stored size; size-changing updates are not supported.
    pub fn update_record(&mut self, slot_id: u16, record: &[u8]) -> StorageResult<()> {
        let slot_count = self.slot_count();
        if slot_id >= slot_count {
            return Err(StorageError::InvalidSlotId {
                slot_id,
                max_slot: slot_count.saturating_sub(1),
            });
        }

        let (offset, size) = self.read_slot(slot_id);
        if size == 0 {
            return Err(StorageError::EmptySlot { slot_id });
        }
        if record.len() != size as usize {
            return Err(StorageError::SizeMismatch {
                expected: size,
                actual: record.len(),
            });
        }

        self.data[offset as usize..offset as usize + size as usize].copy_from_slice(record);
        self.dirty = true;
        Ok(())
    }

    /// Tombstone a slot. The record region is not reclaimed.
    pub fn delete_record(&mut self, slot_id: u16) -> StorageResult<()> {
        let slot_count = self.slot_count();
        if slot_id >= slot_count {
            return Err(StorageError::InvalidSlotId {
                slot_id,
                max_slot: slot_count.saturating_sub(1),
            });
        }

        let (_, size) = self.read_slot(slot_id);
        if size == 0 {
            return Err(StorageError::EmptySlot { slot_id });
        }

        self.write_slot(slot_id, 0, 0);
        self.dirty = true;
        Ok(())
    }

    pub fn page_id(&self) -> PageId {
        let bytes = [
            self.data[PAGE_ID_OFFSET],
            self.data[PAGE_ID_OFFSET + 1],
            self.data[PAGE_ID_OFFSET + 2],
            self.data[PAGE_ID_OFFSET + 3],
        ];
        PageId(u32::from_le_bytes(bytes))
    }

    pub fn slot_count(&self) -> u16 {
        u16::from_le_bytes([self.data[SLOT_COUNT_OFFSET], self.data[SLOT_COUNT_OFFSET + 1]])
    }

    /// Bytes between the end of the slot directory and the start of the
    /// record region.
    pub fn free_space(&self) -> usize {
        (self.free_end() - self.free_start()) as usize
    }

    pub fn next_page_id(&self) -> Option<PageId> {
        self.read_link(NEXT_PAGE_ID_OFFSET)
    }

    pub fn set_next_page_id(&mut self, next: Option<PageId>) {
        self.write_link(NEXT_PAGE_ID_OFFSET, next);
    }

    pub fn prev_page_id(&self) -> Option<PageId> {
        self.read_link(PREV_PAGE_ID_OFFSET)
    }

    pub fn set_prev_page_id(&mut self, prev: Option<PageId>) {
        self.write_link(PREV_PAGE_ID_OFFSET, prev);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the dirty flag after a successful whole-page write.
    pub fn set_clean(&mut self) {
        self.dirty = false;
    }

    /// The full page image for persistence.
    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    fn free_start(&self) -> u16 {
        u16::from_le_bytes([self.data[FREE_START_OFFSET], self.data[FREE_START_OFFSET + 1]])
    }

    fn set_free_start(&mut self, free_start: u16) {
        self.data[FREE_START_OFFSET..FREE_START_OFFSET + 2]
            .copy_from_slice(&free_start.to_le_bytes());
    }

    fn free_end(&self) -> u16 {
        u16::from_le_bytes([self.data[FREE_END_OFFSET], self.data[FREE_END_OFFSET + 1]])
    }

    fn set_free_end(&mut self, free_end: u16) {
        self.data[FREE_END_OFFSET..FREE_END_OFFSET + 2].copy_from_slice(&free_end.to_le_bytes());
    }

    fn set_slot_count(&mut self, slot_count: u16) {
        self.data[SLOT_COUNT_OFFSET..SLOT_COUNT_OFFSET + 2]
            .copy_from_slice(&slot_count.to_le_bytes());
    }

    fn read_slot(&self, slot_id: u16) -> (u16, u16) {
        let base = HEADER_SIZE + slot_id as usize * SLOT_SIZE;
        let offset = u16::from_le_bytes([self.data[base], self.data[base + 1]]);
        let size = u16::from_le_bytes([self.data[base + 2], self.data[base + 3]]);
        (offset, size)
    }

    fn write_slot(&mut self, slot_id: u16, offset: u16, size: u16) {
        let base = HEADER_SIZE + slot_id as usize * SLOT_SIZE;
        self.data[base..base + 2].copy_from_slice(&offset.to_le_bytes());
        self.data[base + 2..base + 4].copy_from_slice(&size.to_le_bytes());
    }

    fn read_link(&self, at: usize) -> Option<PageId> {
        let bytes = [
            self.data[at],
            self.data[at + 1],
            self.data[at + 2],
            self.data[at + 3],
        ];
        match u32::from_le_bytes(bytes) {
            NO_PAGE => None,
            id => Some(PageId(id)),
        }
    }

    fn write_link(&mut self, at: usize, link: Option<PageId>) {
        let value = match link {
            Some(PageId(id)) => id,
            None => NO_PAGE,
        };
        self.data[at..at + 4].copy_from_slice(&value.to_le_bytes());
        self.dirty = true;
    }
}
