//! Row codec: maps typed tuples to and from their byte encoding.
//!
//! Wire form: a null bitmap of `ceil(columns / 8)` bytes (bit `i` is bit
//! `i % 8` of byte `i / 8`; set means null), followed by each non-null
//! field in declaration order with no padding. INT is 4 bytes LE, FLOAT
//! is 8 bytes LE (IEEE-754 bit pattern), STRING is a 2-byte LE length
//! followed by that many content bytes.

use crate::access::value::{DataType, Value};
use crate::catalog::schema::Schema;
use thiserror::Error;

/// Errors that can occur while encoding or decoding a row.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("Value count mismatch: expected {expected}, got {actual}")]
    ValueCountMismatch { expected: usize, actual: usize },

    #[error("Column '{column}' cannot be null")]
    NullNotAllowed { column: String },

    #[error("Type mismatch for column '{column}': expected {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },

    #[error("String too long for column '{column}': max {max}, got {actual}")]
    StringTooLong {
        column: String,
        max: usize,
        actual: usize,
    },

    #[error("Empty data")]
    EmptyData,

    #[error("Truncated data while reading {field}")]
    Truncated { field: String },
}

/// Result type for row codec operations.
pub type RowResult<T> = Result<T, RowError>;

/// Encode one value per schema column into the wire form.
pub fn serialize_row(schema: &Schema, values: &[Value]) -> RowResult<Vec<u8>> {
    let columns = &schema.columns;
    if values.len() != columns.len() {
        return Err(RowError::ValueCountMismatch {
            expected: columns.len(),
            actual: values.len(),
        });
    }

    let bitmap_size = (columns.len() + 7) / 8;
    let mut data = vec![0u8; bitmap_size];

    for (i, (column, value)) in columns.iter().zip(values).enumerate() {
        if value.is_null() {
            if !column.nullable {
                return Err(RowError::NullNotAllowed {
                    column: column.name.clone(),
                });
            }
            data[i / 8] |= 1 << (i % 8);
            continue;
        }

        match (column.data_type, value) {
            (DataType::Int, Value::Int(v)) => data.extend_from_slice(&v.to_le_bytes()),
            (DataType::Float, Value::Float(v)) => data.extend_from_slice(&v.to_le_bytes()),
            (DataType::String, Value::String(s)) => {
                if s.len() > column.max_length {
                    return Err(RowError::StringTooLong {
                        column: column.name.clone(),
                        max: column.max_length,
                        actual: s.len(),
                    });
                }
                data.extend_from_slice(&(s.len() as u16).to_le_bytes());
                data.extend_from_slice(s.as_bytes());
            }
            (expected, value) => {
                return Err(RowError::TypeMismatch {
                    column: column.name.clone(),
                    expected,
                    actual: value.data_type().unwrap_or(expected),
                });
            }
        }
    }

    Ok(data)
}

/// Decode the wire form back into one value per schema column.
pub fn deserialize_row(schema: &Schema, data: &[u8]) -> RowResult<Vec<Value>> {
    if data.is_empty() {
        return Err(RowError::EmptyData);
    }

    let columns = &schema.columns;
    let bitmap_size = (columns.len() + 7) / 8;
    if data.len() < bitmap_size {
        return Err(RowError::Truncated {
            field: "null bitmap".to_string(),
        });
    }

    let mut values = Vec::with_capacity(columns.len());
    let mut offset = bitmap_size;

    for (i, column) in columns.iter().enumerate() {
        if data[i / 8] & (1 << (i % 8)) != 0 {
            values.push(Value::Null);
            continue;
        }

        let truncated = || RowError::Truncated {
            field: format!("column '{}'", column.name),
        };

        match column.data_type {
            DataType::Int => {
                let bytes = data
                    .get(offset..offset + 4)
                    .ok_or_else(truncated)?
                    .try_into()
                    .expect("slice of length 4");
                values.push(Value::Int(i32::from_le_bytes(bytes)));
                offset += 4;
            }
            DataType::Float => {
                let bytes = data
                    .get(offset..offset + 8)
                    .ok_or_else(truncated)?
                    .try_into()
                    .expect("slice of length 8");
                values.push(Value::Float(f64::from_le_bytes(bytes)));
                offset += 8;
            }
            DataType::String => {
                let len_bytes: [u8; 2] = data
                    .get(offset..offset + 2)
                    .ok_or_else(truncated)?
                    .try_into()
                    .expect("slice of length 2");
                let len = u16::from_le_bytes(len_bytes) as usize;
                offset += 2;

                let content = data.get(offset..offset + len).ok_or_else(truncated)?;
                let s = String::from_utf8_lossy(content).into_owned();
                values.push(Value::String(s));
                offset += len;
            }
        }
    }

    Ok(values)
}
