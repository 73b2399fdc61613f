//! Translation between engine type tags / values and the client's value model.

use duckdb::arrow::datatypes::DataType;
use duckdb::types::Value;
use tracing::warn;

use crate::types::{RowValues, ValueKind};

/// Map a declared type name from the catalog (case-insensitive) to a value
/// kind. Total: anything unrecognized degrades to text.
pub fn kind_from_declared_type(type_name: &str) -> ValueKind {
    let t = type_name.to_lowercase();
    if t == "integer" || t == "int" {
        ValueKind::Integer
    } else if t == "double" || t == "float" || t == "real" || t.starts_with("numeric") {
        ValueKind::Float
    } else if t == "blob" {
        ValueKind::Blob
    } else if t == "boolean" || t == "bool" {
        ValueKind::Bool
    } else {
        ValueKind::Text
    }
}

/// Map a live result column's engine type to a value kind.
///
/// Intentionally partial: the mapping covers the engine types the driver can
/// fetch and must be extended per supported type. Unmapped types degrade to
/// [`ValueKind::Absent`] with a diagnostic instead of failing the execution.
pub fn kind_from_column_type(column_type: &DataType, column: &str) -> ValueKind {
    match column_type {
        DataType::Boolean => ValueKind::Bool,
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => ValueKind::Integer,
        DataType::Float16 | DataType::Float32 | DataType::Float64 => ValueKind::Float,
        DataType::Utf8 | DataType::LargeUtf8 => ValueKind::Text,
        DataType::Binary | DataType::LargeBinary => ValueKind::Blob,
        DataType::Null => ValueKind::Absent,
        other => {
            warn!("unsupported engine column type {other:?} for column {column}");
            ValueKind::Absent
        }
    }
}

/// Translate the engine value stored at one `(column, row)` slot into the
/// client value, directed by the kind recorded for that column.
///
/// Integer columns are read as 64-bit integers; text columns yield an owned
/// copy (an absent text value becomes a null-like value); NULL-tagged columns
/// yield a null-like value; byte-sequence columns are a known gap and always
/// produce an empty value; anything else leaves the slot absent with a
/// diagnostic.
pub(crate) fn translate_cell(kind: ValueKind, cell: &Value, column: &str) -> RowValues {
    if matches!(cell, Value::Null) {
        return RowValues::Null;
    }
    match kind {
        ValueKind::Integer => match engine_int64(cell) {
            Some(i) => RowValues::BigInt(i),
            None => {
                warn!("non-integer engine value in integer column {column}");
                RowValues::Absent
            }
        },
        ValueKind::Float => match engine_f64(cell) {
            Some(f) => RowValues::Float(f),
            None => {
                warn!("non-numeric engine value in float column {column}");
                RowValues::Absent
            }
        },
        ValueKind::Bool => match cell {
            Value::Boolean(b) => RowValues::Bool(*b),
            other => match engine_int64(other) {
                Some(i) => RowValues::Bool(i != 0),
                None => {
                    warn!("non-boolean engine value in boolean column {column}");
                    RowValues::Absent
                }
            },
        },
        ValueKind::Text => match cell {
            Value::Text(s) => RowValues::Text(s.clone()),
            other => match engine_text(other) {
                Some(s) => RowValues::Text(s),
                None => RowValues::Null,
            },
        },
        ValueKind::Blob => {
            // Byte-sequence fetch is not implemented; degrade loudly.
            warn!("byte-sequence column fetch is not implemented, returning empty value for column {column}");
            RowValues::Blob(Vec::new())
        }
        ValueKind::Absent => RowValues::Null,
    }
}

fn engine_int64(value: &Value) -> Option<i64> {
    match value {
        Value::Boolean(b) => Some(i64::from(*b)),
        Value::TinyInt(i) => Some(i64::from(*i)),
        Value::SmallInt(i) => Some(i64::from(*i)),
        Value::Int(i) => Some(i64::from(*i)),
        Value::BigInt(i) => Some(*i),
        Value::HugeInt(i) => i64::try_from(*i).ok(),
        Value::UTinyInt(u) => Some(i64::from(*u)),
        Value::USmallInt(u) => Some(i64::from(*u)),
        Value::UInt(u) => Some(i64::from(*u)),
        Value::UBigInt(u) => i64::try_from(*u).ok(),
        _ => None,
    }
}

fn engine_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Float(f) => Some(f64::from(*f)),
        Value::Double(f) => Some(*f),
        other => engine_int64(other).map(|i| i as f64),
    }
}

fn engine_text(value: &Value) -> Option<String> {
    match value {
        Value::Text(s) => Some(s.clone()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Double(f) => Some(f.to_string()),
        Value::Float(f) => Some(f.to_string()),
        other => engine_int64(other).map(|i| i.to_string()),
    }
}
