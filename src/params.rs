//! Parameter binding: reconciling the caller's ordered bound values with the
//! parameters the prepared statement actually declares.

use duckdb::types::Value;
use tracing::warn;

use crate::error::DuckdbDriverError;
#[cfg(feature = "named-placeholders")]
use crate::placeholders::Placeholder;
use crate::placeholders::PlaceholderPlan;
use crate::types::RowValues;

/// Ordered bound-value slots for one statement.
///
/// Named binding writes the value into every occurrence slot that carries the
/// name, so a placeholder repeated `N` times yields `N` identical slots here.
/// The binder collapses them back to one engine parameter.
#[derive(Debug, Clone, Default)]
pub(crate) struct BoundValues {
    slots: Vec<RowValues>,
}

impl BoundValues {
    pub(crate) fn set(&mut self, index: usize, value: RowValues) {
        if index >= self.slots.len() {
            self.slots.resize(index + 1, RowValues::Absent);
        }
        self.slots[index] = value;
    }

    pub(crate) fn push(&mut self, value: RowValues) {
        self.slots.push(value);
    }

    pub(crate) fn values(&self) -> &[RowValues] {
        &self.slots
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }
}

/// Resolve the bound slots against the statement's placeholder plan into the
/// engine argument list, in parameter order.
///
/// Exact match binds positionally. A statement declaring at least one but
/// fewer parameters than there are slots is the named-reuse case: each
/// distinct name consumes the value at its first occurrence slot, and the
/// reconciled count must land exactly on the declared count. Anything else is
/// a parameter count mismatch, reported before any engine call is made.
pub(crate) fn resolve_bindings(
    plan: &PlaceholderPlan,
    values: &[RowValues],
) -> Result<Vec<Value>, DuckdbDriverError> {
    let declared = plan.declared_count();
    if declared == values.len() {
        return values.iter().map(to_engine_value).collect();
    }
    if declared >= 1 && declared < values.len() && plan.has_named() {
        #[cfg(feature = "named-placeholders")]
        return resolve_named_reuse(plan, values);
        #[cfg(not(feature = "named-placeholders"))]
        {
            warn!("named placeholder reuse requires the named-placeholders feature");
            return Err(mismatch());
        }
    }
    Err(mismatch())
}

#[cfg(feature = "named-placeholders")]
fn resolve_named_reuse(
    plan: &PlaceholderPlan,
    values: &[RowValues],
) -> Result<Vec<Value>, DuckdbDriverError> {
    // Every occurrence must be named and must have a slot behind it, otherwise
    // the supplied values cannot be reconciled with the statement.
    if plan.occurrences.len() != values.len()
        || plan
            .occurrences
            .iter()
            .any(|p| matches!(p, Placeholder::Positional))
    {
        return Err(mismatch());
    }
    let mut resolved = Vec::with_capacity(plan.distinct_names.len());
    for position in 0..plan.distinct_names.len() {
        let name = plan.parameter_name(position).ok_or_else(mismatch)?;
        let first_slot = *plan.positions_of(name).first().ok_or_else(mismatch)?;
        let value = values.get(first_slot).ok_or_else(mismatch)?;
        resolved.push(to_engine_value(value)?);
    }
    Ok(resolved)
}

fn mismatch() -> DuckdbDriverError {
    DuckdbDriverError::statement("Parameter count mismatch", "")
}

/// Convert one client value into the engine value to bind.
///
/// Null-like values bind as engine NULL regardless of column type. Integers
/// and booleans bind as 32-bit integers, 64-bit integers as such, floats as
/// doubles, text as UTF-8 text. Byte sequences and timestamps are not
/// supported as parameters and fail with a statement error rather than
/// binding wrong bytes.
pub(crate) fn to_engine_value(value: &RowValues) -> Result<Value, DuckdbDriverError> {
    match value {
        RowValues::Null | RowValues::Absent => Ok(Value::Null),
        RowValues::Int(i) => Ok(Value::Int(*i)),
        RowValues::Bool(b) => Ok(Value::Int(i32::from(*b))),
        RowValues::BigInt(i) => Ok(Value::BigInt(*i)),
        RowValues::Float(f) => Ok(Value::Double(*f)),
        RowValues::Text(s) => Ok(Value::Text(s.clone())),
        RowValues::Blob(_) => {
            warn!("byte-sequence parameter binding is not implemented");
            Err(DuckdbDriverError::statement(
                "Unable to bind parameters",
                "binding byte sequences is not supported",
            ))
        }
        RowValues::Timestamp(_) => {
            warn!("timestamp parameter binding is not implemented");
            Err(DuckdbDriverError::statement(
                "Unable to bind parameters",
                "binding timestamps is not supported",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placeholders::scan;

    #[test]
    fn exact_positional_match_binds_in_order() {
        let (_, plan) = scan("SELECT ?, ?");
        let values = vec![RowValues::Int(1), RowValues::Text("a".into())];
        let resolved = resolve_bindings(&plan, &values).unwrap();
        assert_eq!(resolved, vec![Value::Int(1), Value::Text("a".into())]);
    }

    #[test]
    fn booleans_bind_as_32_bit_integers() {
        assert_eq!(to_engine_value(&RowValues::Bool(true)).unwrap(), Value::Int(1));
        assert_eq!(to_engine_value(&RowValues::Bool(false)).unwrap(), Value::Int(0));
    }

    #[test]
    fn null_and_absent_bind_as_engine_null() {
        assert_eq!(to_engine_value(&RowValues::Null).unwrap(), Value::Null);
        assert_eq!(to_engine_value(&RowValues::Absent).unwrap(), Value::Null);
    }

    #[test]
    fn blob_and_timestamp_binds_fail_loudly() {
        assert!(to_engine_value(&RowValues::Blob(vec![1])).is_err());
        let ts = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(to_engine_value(&RowValues::Timestamp(ts)).is_err());
    }

    #[test]
    fn oversupplied_positional_values_mismatch() {
        let (_, plan) = scan("SELECT ?, ?");
        let values = vec![RowValues::Int(1), RowValues::Int(2), RowValues::Int(3)];
        assert!(resolve_bindings(&plan, &values).is_err());
    }

    #[cfg(feature = "named-placeholders")]
    #[test]
    fn repeated_named_placeholder_consumes_one_value() {
        // One name bound at both of its occurrence slots plus a second name.
        let (_, plan) = scan("SELECT :x + :x + :y");
        let values = vec![RowValues::Int(5), RowValues::Int(5), RowValues::Int(7)];
        let resolved = resolve_bindings(&plan, &values).unwrap();
        assert_eq!(resolved, vec![Value::Int(5), Value::Int(7)]);
    }

    #[cfg(feature = "named-placeholders")]
    #[test]
    fn undersupplied_named_values_mismatch() {
        let (_, plan) = scan("SELECT :x + :x + :y");
        let values = vec![RowValues::Int(5), RowValues::Int(5)];
        assert!(resolve_bindings(&plan, &values).is_err());
    }
}
