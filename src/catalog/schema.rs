use crate::access::value::DataType;
use serde::{Deserialize, Serialize};

/// A column declaration. `max_length` bounds STRING content bytes and is
/// ignored for the fixed-width types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub max_length: usize,
    #[serde(default)]
    pub nullable: bool,
}

/// An ordered sequence of columns. Immutable after creation; column order
/// defines serialization order and null-bitmap bit order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
