use crate::storage::page::PageId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Stable logical handle for a record, issued per table starting at 1 and
/// never reused within a table's lifetime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RecordId(pub u64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

/// Physical location of a record within a table's heap file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TupleId {
    pub page_id: PageId,
    pub slot_id: u16,
}

impl TupleId {
    pub fn new(page_id: PageId, slot_id: u16) -> Self {
        Self { page_id, slot_id }
    }
}

impl PartialOrd for TupleId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TupleId {
    // Locations sort in heap-file order: page, then slot within the page.
    fn cmp(&self, other: &Self) -> Ordering {
        (self.page_id.0, self.slot_id).cmp(&(other.page_id.0, other.slot_id))
    }
}
