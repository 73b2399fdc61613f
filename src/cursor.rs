//! The result cursor: one prepared statement plus one materialized result.
//!
//! The engine's prepared statement borrows the connection, so it cannot be
//! stored across calls. `prepare` validates the statement against the engine
//! and keeps only the rewritten SQL and its placeholder plan; `execute`
//! re-prepares inside one scope, runs the statement, and materializes the
//! whole result column-major, mirroring the engine's own columnar buffers.
//! Rows are then served out of a lazy per-index cache.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use duckdb::params_from_iter;
use duckdb::types::Value;
use tracing::warn;

use crate::conversion::{kind_from_column_type, translate_cell};
use crate::driver::DriverShared;
use crate::error::{DuckdbDriverError, ErrorCategory, StructuredError};
use crate::params::{resolve_bindings, BoundValues};
use crate::placeholders::{scan, PlaceholderPlan};
use crate::types::{ColumnDescriptor, RowValues};

/// The statement kept between `prepare` and `execute`: the rewritten SQL and
/// the placeholder plan derived from scanning it.
#[derive(Debug, Clone)]
pub(crate) struct PreparedPlan {
    pub(crate) sql: String,
    pub(crate) plan: PlaceholderPlan,
}

/// One executed result, fully materialized. `data` is column-major:
/// `data[column][row]`.
#[derive(Debug, Default)]
pub(crate) struct MaterializedResult {
    pub(crate) data: Vec<Vec<Value>>,
    pub(crate) row_count: usize,
    pub(crate) rows_affected: usize,
}

#[derive(Default)]
pub(crate) struct CursorShared {
    pub(crate) plan: Option<PreparedPlan>,
    pub(crate) result: Option<MaterializedResult>,
    pub(crate) columns: Vec<ColumnDescriptor>,
    pub(crate) bound: BoundValues,
    pub(crate) row_cache: HashMap<usize, Rc<Vec<RowValues>>>,
    pub(crate) active: bool,
    pub(crate) last_error: Option<StructuredError>,
}

impl CursorShared {
    /// Release the result, then the statement state. Idempotent. Column
    /// descriptors survive until the next `prepare`.
    pub(crate) fn release(&mut self) {
        self.result = None;
        self.row_cache.clear();
        self.plan = None;
        self.active = false;
    }

    fn fail(&mut self, error: DuckdbDriverError) -> DuckdbDriverError {
        self.last_error = Some(error.structured().clone());
        error
    }
}

/// A cursor created by [`crate::driver::DuckdbDriver::create_cursor`].
///
/// Lifecycle: unprepared, then `prepare`, `bind_*`, `execute`, `fetch_row`.
/// `finalize` (or re-`prepare`, or drop) collapses it back to unprepared.
pub struct DuckdbCursor {
    shared: Rc<RefCell<CursorShared>>,
    driver: Rc<RefCell<DriverShared>>,
}

impl DuckdbCursor {
    pub(crate) fn new(driver: Rc<RefCell<DriverShared>>) -> Self {
        let shared = Rc::new(RefCell::new(CursorShared::default()));
        driver
            .borrow_mut()
            .cursors
            .push(Rc::downgrade(&shared));
        Self { shared, driver }
    }

    /// Validate the statement against the engine and remember its plan.
    /// Any prior statement or result is released first.
    pub fn prepare(&mut self, sql: &str) -> Result<(), DuckdbDriverError> {
        let mut shared = self.shared.borrow_mut();
        shared.release();
        shared.columns.clear();
        shared.bound.clear();
        shared.last_error = None;

        let driver = self.driver.borrow();
        let conn = driver.connection().map_err(|e| shared.fail(e))?;
        let (rewritten, plan) = scan(sql);
        if plan.is_mixed() {
            let err = DuckdbDriverError::statement(
                "Unable to execute statement",
                "mixing named and positional placeholders is not supported",
            );
            return Err(shared.fail(err));
        }
        // Engine-validate now so a bad statement fails at prepare time. The
        // statement handle borrows the connection and is dropped here; execute
        // re-prepares.
        if let Err(e) = conn.prepare(&rewritten) {
            let err = DuckdbDriverError::from_engine(
                "Unable to execute statement",
                ErrorCategory::Statement,
                &e,
            );
            return Err(shared.fail(err));
        }
        shared.plan = Some(PreparedPlan {
            sql: rewritten,
            plan,
        });
        Ok(())
    }

    /// Bind a value to the given 0-based placeholder slot.
    pub fn bind_value(&mut self, index: usize, value: RowValues) {
        self.shared.borrow_mut().bound.set(index, value);
    }

    /// Append a value to the next free slot.
    pub fn bind(&mut self, value: RowValues) {
        self.shared.borrow_mut().bound.push(value);
    }

    /// Bind a value under a placeholder name, filling every occurrence slot
    /// that carries the name. `name` is given without its `:`/`$` sigil.
    pub fn bind_named(&mut self, name: &str, value: RowValues) -> Result<(), DuckdbDriverError> {
        let mut shared = self.shared.borrow_mut();
        let slots = match &shared.plan {
            Some(prepared) => prepared.plan.positions_of(name),
            None => Vec::new(),
        };
        if slots.is_empty() {
            let err = DuckdbDriverError::statement(
                "Unable to bind parameters",
                &format!("no placeholder named {name}"),
            );
            return Err(shared.fail(err));
        }
        for slot in slots {
            shared.bound.set(slot, value.clone());
        }
        Ok(())
    }

    /// Execute the prepared statement with the current bound values and
    /// materialize its result.
    pub fn execute(&mut self) -> Result<(), DuckdbDriverError> {
        let mut shared = self.shared.borrow_mut();
        shared.result = None;
        shared.row_cache.clear();
        shared.columns.clear();
        shared.active = false;
        shared.last_error = None;

        let prepared = match shared.plan.clone() {
            Some(p) => p,
            None => {
                // No statement to run means the connection-level contract was
                // broken (closed driver or never prepared), not a statement
                // failure.
                let err = DuckdbDriverError::connection("Unable to fetch row", "No query");
                return Err(shared.fail(err));
            }
        };
        let driver = self.driver.borrow();
        let conn = driver.connection().map_err(|e| shared.fail(e))?;

        // Reconcile bound values against the plan before touching the engine.
        let arguments = match resolve_bindings(&prepared.plan, shared.bound.values()) {
            Ok(a) => a,
            Err(e) => {
                let err = shared.fail(e);
                shared.release();
                return Err(err);
            }
        };

        let outcome = run_statement(conn, &prepared.sql, arguments);
        match outcome {
            Ok((columns, result)) => {
                shared.columns = columns;
                shared.result = Some(result);
                shared.active = true;
                Ok(())
            }
            Err(e) => {
                let err = DuckdbDriverError::from_engine(
                    "Unable to execute statement",
                    ErrorCategory::Statement,
                    &e,
                );
                Err(shared.fail(err))
            }
        }
    }

    /// Fetch the row at `index` (0-based), translating each column's engine
    /// value per its recorded kind. `Ok(None)` past the last row is the
    /// expected end-of-data condition. Rows are cached once built.
    pub fn fetch_row(&self, index: usize) -> Result<Option<Rc<Vec<RowValues>>>, DuckdbDriverError> {
        let mut shared = self.shared.borrow_mut();
        if !shared.active || shared.result.is_none() {
            let err = DuckdbDriverError::connection("Unable to fetch row", "No query");
            return Err(shared.fail(err));
        }
        if let Some(row) = shared.row_cache.get(&index) {
            return Ok(Some(Rc::clone(row)));
        }
        let result = shared.result.as_ref().filter(|r| index < r.row_count);
        let Some(result) = result else {
            return Ok(None);
        };
        let row: Vec<RowValues> = shared
            .columns
            .iter()
            .enumerate()
            .map(|(col, descriptor)| {
                let cell = &result.data[col][index];
                translate_cell(descriptor.kind, cell, &descriptor.name)
            })
            .collect();
        let row = Rc::new(row);
        shared.row_cache.insert(index, Rc::clone(&row));
        Ok(Some(row))
    }

    /// Descriptors for the current result's columns.
    pub fn columns(&self) -> Vec<ColumnDescriptor> {
        self.shared.borrow().columns.clone()
    }

    pub fn column_count(&self) -> usize {
        self.shared.borrow().columns.len()
    }

    /// Rows in the current result, or `None` when no result is active. The
    /// result is fully materialized, so the count is exact.
    pub fn size(&self) -> Option<usize> {
        self.shared.borrow().result.as_ref().map(|r| r.row_count)
    }

    /// Count reported by the engine for a data-changing statement.
    pub fn rows_affected(&self) -> usize {
        self.shared
            .borrow()
            .result
            .as_ref()
            .map_or(0, |r| r.rows_affected)
    }

    /// The engine exposes no identity-column retrieval path.
    pub fn last_insert_id(&self) -> Option<i64> {
        None
    }

    pub fn is_active(&self) -> bool {
        self.shared.borrow().active
    }

    pub fn last_error(&self) -> Option<StructuredError> {
        self.shared.borrow().last_error.clone()
    }

    /// Release the result handle, then the statement state. Idempotent.
    pub fn finalize(&mut self) {
        self.shared.borrow_mut().release();
    }
}

impl Drop for DuckdbCursor {
    fn drop(&mut self) {
        self.shared.borrow_mut().release();
        let this = Rc::downgrade(&self.shared);
        self.driver
            .borrow_mut()
            .cursors
            .retain(|w| !w.ptr_eq(&this) && w.strong_count() > 0);
    }
}

/// Prepare, execute and drain one statement, producing column descriptors and
/// the column-major materialization.
fn run_statement(
    conn: &duckdb::Connection,
    sql: &str,
    arguments: Vec<Value>,
) -> Result<(Vec<ColumnDescriptor>, MaterializedResult), duckdb::Error> {
    let mut stmt = conn.prepare(sql)?;
    let mut data: Vec<Vec<Value>> = Vec::new();
    let mut row_count = 0usize;
    {
        let mut rows = stmt.query(params_from_iter(arguments))?;
        while let Some(row) = rows.next()? {
            if data.is_empty() {
                // Probe the first row for the result width.
                let mut probed = Vec::new();
                while let Ok(value) = row.get::<usize, Value>(probed.len()) {
                    probed.push(value);
                }
                data = probed.into_iter().map(|v| vec![v]).collect();
            } else {
                for (i, column) in data.iter_mut().enumerate() {
                    column.push(row.get::<usize, Value>(i)?);
                }
            }
            row_count += 1;
        }
    }
    // The statement's schema is available once it has executed.
    let names: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(|n| n.to_string())
        .collect();
    if data.is_empty() {
        data = vec![Vec::new(); names.len()];
    }
    let columns: Vec<ColumnDescriptor> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let kind = kind_from_column_type(&stmt.column_type(i), name);
            ColumnDescriptor {
                name: name.clone(),
                kind,
                table: "query".to_string(),
                required: false,
                auto_generated: false,
                default_value: None,
            }
        })
        .collect();
    let rows_affected = changed_count(&names, &data, row_count);
    Ok((
        columns,
        MaterializedResult {
            data,
            row_count,
            rows_affected,
        },
    ))
}

/// Data-changing statements surface their affected-row count as a single-row,
/// single-column `Count` result.
fn changed_count(names: &[String], data: &[Vec<Value>], row_count: usize) -> usize {
    if row_count == 1 && names.len() == 1 && names[0] == "Count" {
        if let Some(Value::BigInt(n)) = data[0].first() {
            return usize::try_from(*n).unwrap_or(0);
        }
        if let Some(Value::Int(n)) = data[0].first() {
            return usize::try_from(*n).unwrap_or(0);
        }
        warn!("unexpected value shape in change-count result");
    }
    0
}
