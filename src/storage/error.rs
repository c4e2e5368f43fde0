//! Storage layer error types.

use thiserror::Error;

use crate::access::tuple::RecordId;
use crate::storage::page::PageId;

/// Errors that can occur in the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage layer is already open")]
    AlreadyOpen,

    #[error("Storage layer is not open")]
    NotOpen,

    #[error("Table '{0}' already exists")]
    DuplicateTable(String),

    #[error("Table '{0}' does not exist")]
    UnknownTable(String),

    #[error("Record {0} not found")]
    RecordNotFound(RecordId),

    #[error("Invalid slot ID: {slot_id} (max: {max_slot})")]
    InvalidSlotId { slot_id: u16, max_slot: u16 },

    #[error("Slot {slot_id} is empty")]
    EmptySlot { slot_id: u16 },

    #[error("Slot {slot_id} extends past page bounds: offset={offset}, size={size}")]
    CorruptSlot { slot_id: u16, offset: u16, size: u16 },

    #[error("Record size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: u16, actual: usize },

    #[error("Page is full: requires {required} bytes but only {available} available")]
    PageFull { required: usize, available: usize },

    #[error("Page data must be exactly PAGE_SIZE bytes, got {len}")]
    InvalidPageData { len: usize },

    #[error("Page {page_id} does not exist in table '{table}'")]
    PageNotFound { table: String, page_id: PageId },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata encoding error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
