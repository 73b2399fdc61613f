use chrono::NaiveDateTime;

/// Values that can cross the driver boundary, either as bound parameters or as
/// fetched column values.
///
/// This is a closed sum: binding logic matches exhaustively on it, so an
/// unsupported kind is a compile-time-visible arm, not a runtime fallthrough.
/// `Blob` and `Timestamp` exist so that binding them can be rejected loudly
/// (see [`crate::params`]) instead of silently coercing to the wrong bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// NULL value
    Null,
    /// 32-bit integer value
    Int(i32),
    /// 64-bit integer value
    BigInt(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// Text/string value
    Text(String),
    /// Binary data (fetch yields an empty value; binding is rejected)
    Blob(Vec<u8>),
    /// Timestamp value (binding is rejected)
    Timestamp(NaiveDateTime),
    /// No value at all: an unmapped engine type or an invalid slot
    Absent,
}

impl RowValues {
    /// Check if this value is NULL (or absent, which the client treats alike).
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::Absent)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            RowValues::Int(i) => Some(i64::from(*i)),
            RowValues::BigInt(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(s) = self {
            Some(s)
        } else {
            None
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RowValues::Bool(b) => Some(*b),
            RowValues::Int(0) | RowValues::BigInt(0) => Some(false),
            RowValues::Int(1) | RowValues::BigInt(1) => Some(true),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(f) = self {
            Some(*f)
        } else {
            None
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            RowValues::Timestamp(ts) => Some(*ts),
            RowValues::Text(s) => {
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                    return Some(dt);
                }
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok()
            }
            _ => None,
        }
    }
}

/// Client-side kind tag for a result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Float,
    Text,
    Bool,
    Blob,
    /// No usable kind: NULL-typed column or an engine type without a mapping.
    Absent,
}

/// Description of one result or catalog column.
///
/// Built once per execution from the engine's column metadata; immutable until
/// the next execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    /// Column name with quoting stripped.
    pub name: String,
    /// Declared or inferred value kind.
    pub kind: ValueKind,
    /// Originating table label ("query" for live results).
    pub table: String,
    /// Derived from the catalog's not-null flag.
    pub required: bool,
    /// Integer primary keys alias the row identifier and are auto-generated.
    pub auto_generated: bool,
    /// Default value from the catalog, unquoted when it was quoted.
    pub default_value: Option<String>,
}

/// Which catalog entries `tables()` should list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Tables,
    Views,
    TablesAndViews,
    SystemTables,
    AllTables,
}

impl TableKind {
    pub(crate) fn wants_tables(self) -> bool {
        matches!(self, Self::Tables | Self::TablesAndViews | Self::AllTables)
    }

    pub(crate) fn wants_views(self) -> bool {
        matches!(self, Self::Views | Self::TablesAndViews | Self::AllTables)
    }

    pub(crate) fn wants_system(self) -> bool {
        matches!(self, Self::SystemTables | Self::AllTables)
    }
}

/// Capabilities the driver can be asked about by the client runtime.
///
/// The answers form the driver's compatibility contract and are fixed; see
/// [`crate::driver::DuckdbDriver::has_feature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverFeature {
    Blob,
    Transactions,
    Unicode,
    LastInsertId,
    PreparedQueries,
    PositionalPlaceholders,
    NamedPlaceholders,
    SimpleLocking,
    FinishQuery,
    LowPrecisionNumbers,
    EventNotifications,
    QuerySize,
    BatchOperations,
    MultipleResultSets,
    CancelQuery,
}
