//! Connection management: engine handle ownership, the live cursor registry,
//! transactions, catalog introspection and the notification registry.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use duckdb::Connection;
use tracing::{debug, warn};

use crate::conversion::kind_from_declared_type;
use crate::cursor::{CursorShared, DuckdbCursor};
use crate::error::{translate, DuckdbDriverError, ErrorCategory, StructuredError};
use crate::escape::{escape_identifier, strip_delimiters, IdentifierKind};
use crate::options::ConnectOptions;
use crate::types::{ColumnDescriptor, DriverFeature, TableKind};

pub type NotificationHandler = Box<dyn FnMut(&str, i64)>;

/// State shared between the driver and its cursors. Single-threaded by
/// design; the owning runtime serializes calls, so `Rc`/`RefCell` suffice.
#[derive(Default)]
pub(crate) struct DriverShared {
    pub(crate) conn: Option<Connection>,
    pub(crate) open: bool,
    pub(crate) open_error: bool,
    /// Non-owning registry of live cursors, for bulk teardown on close.
    pub(crate) cursors: Vec<Weak<RefCell<CursorShared>>>,
    pub(crate) notifications: Vec<String>,
    pub(crate) handler: Option<NotificationHandler>,
    pub(crate) last_error: Option<StructuredError>,
}

impl DriverShared {
    pub(crate) fn connection(&self) -> Result<&Connection, DuckdbDriverError> {
        if self.open && !self.open_error {
            if let Some(conn) = self.conn.as_ref() {
                return Ok(conn);
            }
        }
        Err(DuckdbDriverError::connection("Driver not open", ""))
    }
}

/// The DuckDB driver: owns the engine connection, creates cursors, and
/// provides transactions, introspection and notification bookkeeping.
pub struct DuckdbDriver {
    shared: Rc<RefCell<DriverShared>>,
}

impl Default for DuckdbDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl DuckdbDriver {
    pub fn new() -> Self {
        Self {
            shared: Rc::new(RefCell::new(DriverShared::default())),
        }
    }

    /// Open the database at `database` (empty or `:memory:` for in-memory),
    /// applying the semicolon-delimited `options` string. An already open
    /// driver is closed first.
    pub fn open(&self, database: &str, options: &str) -> Result<(), DuckdbDriverError> {
        if self.is_open() {
            self.close();
        }
        let opts = ConnectOptions::parse(options);
        debug!(database, ?opts, "opening database");
        let opened = opts.engine_config().and_then(|config| {
            if database.is_empty() || database == ":memory:" {
                Connection::open_in_memory_with_flags(config)
            } else {
                Connection::open_with_flags(database, config)
            }
        });
        let mut shared = self.shared.borrow_mut();
        match opened {
            Ok(conn) => {
                shared.conn = Some(conn);
                shared.open = true;
                shared.open_error = false;
                shared.last_error = None;
                Ok(())
            }
            Err(e) => {
                let err = DuckdbDriverError::from_engine(
                    "Error opening database",
                    ErrorCategory::Connection,
                    &e,
                );
                shared.conn = None;
                shared.open = false;
                shared.open_error = true;
                shared.last_error = Some(err.structured().clone());
                Err(err)
            }
        }
    }

    /// Close the database: finalize every registered live cursor in registry
    /// order, clear the notification set, and release the engine handles.
    /// No-op when not open.
    pub fn close(&self) {
        let cursors: Vec<Weak<RefCell<CursorShared>>> = {
            let shared = self.shared.borrow();
            if !shared.open && !shared.open_error {
                return;
            }
            shared.cursors.clone()
        };
        for weak in cursors {
            if let Some(cursor) = weak.upgrade() {
                cursor.borrow_mut().release();
            }
        }
        let mut shared = self.shared.borrow_mut();
        shared.cursors.retain(|w| w.strong_count() > 0);
        shared.notifications.clear();
        shared.handler = None;
        // Dropping the connection releases the engine connection and
        // database handles.
        shared.conn = None;
        shared.open = false;
        shared.open_error = false;
        debug!("database closed");
    }

    pub fn is_open(&self) -> bool {
        self.shared.borrow().open
    }

    pub fn is_open_error(&self) -> bool {
        self.shared.borrow().open_error
    }

    pub fn last_error(&self) -> Option<StructuredError> {
        self.shared.borrow().last_error.clone()
    }

    /// A fresh unprepared cursor, registered in the live set. Cursors
    /// deregister themselves on drop.
    pub fn create_cursor(&self) -> DuckdbCursor {
        DuckdbCursor::new(Rc::clone(&self.shared))
    }

    pub fn begin_transaction(&self) -> Result<(), DuckdbDriverError> {
        self.transaction_statement("BEGIN", "Unable to begin transaction")
    }

    pub fn commit_transaction(&self) -> Result<(), DuckdbDriverError> {
        self.transaction_statement("COMMIT", "Unable to commit transaction")
    }

    pub fn rollback_transaction(&self) -> Result<(), DuckdbDriverError> {
        self.transaction_statement("ROLLBACK", "Unable to rollback transaction")
    }

    fn transaction_statement(
        &self,
        sql: &str,
        description: &str,
    ) -> Result<(), DuckdbDriverError> {
        if !self.is_open() || self.is_open_error() {
            let err = DuckdbDriverError::connection("Driver not open", "");
            self.shared.borrow_mut().last_error = Some(err.structured().clone());
            return Err(err);
        }
        let mut cursor = self.create_cursor();
        let run = cursor.prepare(sql).and_then(|()| cursor.execute());
        run.map_err(|e| {
            let err = DuckdbDriverError::Transaction(translate(
                description,
                &e.structured().engine_message,
                ErrorCategory::Transaction,
                -1,
            ));
            self.shared.borrow_mut().last_error = Some(err.structured().clone());
            err
        })
    }

    /// List catalog entries of the requested kind, in query order. Empty when
    /// the driver is not open.
    pub fn tables(&self, kind: TableKind) -> Result<Vec<String>, DuckdbDriverError> {
        if !self.is_open() {
            return Ok(Vec::new());
        }
        let mut parts = Vec::new();
        if kind.wants_tables() {
            parts.push("SELECT table_name AS name FROM duckdb_tables()");
        }
        if kind.wants_views() {
            parts.push("SELECT view_name AS name FROM duckdb_views() WHERE NOT internal");
        }
        let mut names = Vec::new();
        if !parts.is_empty() {
            let sql = parts.join(" UNION ALL ");
            let mut cursor = self.create_cursor();
            cursor.prepare(&sql)?;
            cursor.execute()?;
            let mut idx = 0;
            while let Some(row) = cursor.fetch_row(idx)? {
                if let Some(name) = row.first().and_then(|v| v.as_text()) {
                    names.push(name.to_string());
                }
                idx += 1;
            }
        }
        if kind.wants_system() {
            names.push("duckdb_tables".to_string());
        }
        Ok(names)
    }

    /// Column descriptors for every column of `table`.
    pub fn record(&self, table: &str) -> Result<Vec<ColumnDescriptor>, DuckdbDriverError> {
        self.table_info(table, false)
    }

    /// Column descriptors for the primary-key columns of `table`.
    pub fn primary_index(&self, table: &str) -> Result<Vec<ColumnDescriptor>, DuckdbDriverError> {
        self.table_info(table, true)
    }

    fn table_info(
        &self,
        table: &str,
        only_primary: bool,
    ) -> Result<Vec<ColumnDescriptor>, DuckdbDriverError> {
        if !self.is_open() {
            return Ok(Vec::new());
        }
        let (schema, name) = split_table_name(table);
        let mut sql = String::from("PRAGMA ");
        if !schema.is_empty() {
            sql.push_str(&escape_identifier(&schema, IdentifierKind::Table));
            sql.push('.');
        }
        sql.push_str("table_info(");
        sql.push_str(&escape_identifier(&name, IdentifierKind::Table));
        sql.push(')');
        let mut cursor = self.create_cursor();
        cursor.prepare(&sql)?;
        cursor.execute()?;
        let mut fields = Vec::new();
        let mut idx = 0;
        // Row shape: cid, name, type, notnull, dflt_value, pk.
        while let Some(row) = cursor.fetch_row(idx)? {
            idx += 1;
            let is_primary = row.get(5).and_then(|v| v.as_bool()).unwrap_or(false);
            if only_primary && !is_primary {
                continue;
            }
            let column = row
                .get(1)
                .and_then(|v| v.as_text())
                .unwrap_or_default()
                .to_string();
            let type_name = row
                .get(2)
                .and_then(|v| v.as_text())
                .unwrap_or_default()
                .to_lowercase();
            let required = row.get(3).and_then(|v| v.as_bool()).unwrap_or(false);
            let default_value = row.get(4).and_then(|v| v.as_text()).map(unquote_default);
            fields.push(ColumnDescriptor {
                name: column,
                kind: kind_from_declared_type(&type_name),
                table: name.clone(),
                required,
                // An integer primary key aliases the row identifier.
                auto_generated: is_primary && type_name == "integer",
                default_value,
            });
        }
        Ok(fields)
    }

    /// Track `name` for change notifications. The engine offers no change
    /// hook, so the set is bookkeeping only; dispatch happens through
    /// [`Self::handle_notification`].
    pub fn subscribe_to_notification(&self, name: &str) -> bool {
        let mut shared = self.shared.borrow_mut();
        if !shared.open || shared.open_error {
            warn!("database not open, cannot subscribe to {name:?}");
            return false;
        }
        if shared.notifications.iter().any(|n| n == name) {
            warn!("already subscribed to {name:?}");
            return false;
        }
        shared.notifications.push(name.to_string());
        true
    }

    pub fn unsubscribe_from_notification(&self, name: &str) -> bool {
        let mut shared = self.shared.borrow_mut();
        if !shared.open || shared.open_error {
            warn!("database not open, cannot unsubscribe from {name:?}");
            return false;
        }
        let before = shared.notifications.len();
        shared.notifications.retain(|n| n != name);
        if shared.notifications.len() == before {
            warn!("not subscribed to {name:?}");
            return false;
        }
        true
    }

    pub fn subscribed_notifications(&self) -> Vec<String> {
        self.shared.borrow().notifications.clone()
    }

    /// Install the callback invoked by [`Self::handle_notification`].
    pub fn set_notification_handler(&self, handler: impl FnMut(&str, i64) + 'static) {
        self.shared.borrow_mut().handler = Some(Box::new(handler));
    }

    /// Dispatch one change event to the handler, if the name is subscribed.
    pub fn handle_notification(&self, name: &str, row_id: i64) {
        let subscribed = self
            .shared
            .borrow()
            .notifications
            .iter()
            .any(|n| n == name);
        if !subscribed {
            return;
        }
        // The handler runs outside the borrow so it may call back in.
        let handler = self.shared.borrow_mut().handler.take();
        if let Some(mut handler) = handler {
            handler(name, row_id);
            let mut shared = self.shared.borrow_mut();
            if shared.handler.is_none() {
                shared.handler = Some(handler);
            }
        }
    }

    /// Fixed capability set; part of the compatibility contract.
    pub fn has_feature(&self, feature: DriverFeature) -> bool {
        match feature {
            DriverFeature::Blob
            | DriverFeature::Transactions
            | DriverFeature::Unicode
            | DriverFeature::LastInsertId
            | DriverFeature::PreparedQueries
            | DriverFeature::PositionalPlaceholders
            | DriverFeature::SimpleLocking
            | DriverFeature::FinishQuery
            | DriverFeature::LowPrecisionNumbers
            | DriverFeature::EventNotifications => true,
            DriverFeature::NamedPlaceholders => cfg!(feature = "named-placeholders"),
            DriverFeature::QuerySize
            | DriverFeature::BatchOperations
            | DriverFeature::MultipleResultSets
            | DriverFeature::CancelQuery => false,
        }
    }

    /// Scoped access to the raw engine connection, for advanced callers.
    /// `None` when the driver is not open.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> T) -> Option<T> {
        let shared = self.shared.borrow();
        shared.conn.as_ref().map(f)
    }
}

impl Drop for DuckdbDriver {
    fn drop(&mut self) {
        self.close();
    }
}

/// Split a possibly schema-qualified, possibly delimited table name into
/// schema and bare name.
fn split_table_name(table: &str) -> (String, String) {
    match table.find('.') {
        Some(idx) => (
            strip_delimiters(&table[..idx]),
            strip_delimiters(&table[idx + 1..]),
        ),
        None => (String::new(), strip_delimiters(table)),
    }
}

fn unquote_default(raw: &str) -> String {
    let bytes = raw.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        if (first == b'\'' || first == b'"') && bytes[bytes.len() - 1] == first {
            return raw[1..raw.len() - 1].to_string();
        }
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_qualified_names() {
        assert_eq!(split_table_name("t"), (String::new(), "t".into()));
        assert_eq!(split_table_name("main.t"), ("main".into(), "t".into()));
        assert_eq!(split_table_name("\"s\".\"t\""), ("s".into(), "t".into()));
        assert_eq!(split_table_name("[s].[t]"), ("s".into(), "t".into()));
    }

    #[test]
    fn unquotes_catalog_defaults() {
        assert_eq!(unquote_default("'abc'"), "abc");
        assert_eq!(unquote_default("\"abc\""), "abc");
        assert_eq!(unquote_default("42"), "42");
        assert_eq!(unquote_default("'"), "'");
    }
}
