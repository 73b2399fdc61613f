//! Placeholder recognition and rewriting.
//!
//! The engine crate exposes no way to look up a prepared parameter's name, so
//! the driver scans the statement text itself: a lightweight byte-level state
//! machine that skips string literals and comments, records every placeholder
//! occurrence in order, and rewrites named placeholders (`:name` / `$name`)
//! into the engine's numbered `$N` form, one number per distinct name. This is
//! what lets a placeholder repeated in the statement consume a single logical
//! value.

use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Placeholder {
    /// `?` or numbered `$N`, bound by argument order.
    Positional,
    /// `:name` or `$name`, possibly repeated within one statement.
    Named(String),
}

/// The scan result for one statement: every occurrence in statement order and
/// the distinct names in first-appearance order. After rewriting, distinct
/// name `k` (0-based) is the engine parameter `k + 1`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PlaceholderPlan {
    pub(crate) occurrences: Vec<Placeholder>,
    pub(crate) distinct_names: Vec<String>,
}

impl PlaceholderPlan {
    pub(crate) fn has_named(&self) -> bool {
        !self.distinct_names.is_empty()
    }

    /// Named and positional placeholders in one statement cannot be
    /// reconciled: the named rewrite numbers distinct names from `$1`, which
    /// would collide with explicit `?`/`$N` occurrences. Such statements are
    /// rejected at prepare time.
    pub(crate) fn is_mixed(&self) -> bool {
        self.has_named()
            && self
                .occurrences
                .iter()
                .any(|p| matches!(p, Placeholder::Positional))
    }

    /// Number of parameters the rewritten statement declares to the engine.
    pub(crate) fn declared_count(&self) -> usize {
        let positional = self
            .occurrences
            .iter()
            .filter(|p| matches!(p, Placeholder::Positional))
            .count();
        self.distinct_names.len() + positional
    }

    /// Name of the engine parameter at `position` (0-based), when named.
    pub(crate) fn parameter_name(&self, position: usize) -> Option<&str> {
        self.distinct_names.get(position).map(String::as_str)
    }

    /// Occurrence slots (statement order) that carry the given name.
    pub(crate) fn positions_of(&self, name: &str) -> Vec<usize> {
        self.occurrences
            .iter()
            .enumerate()
            .filter_map(|(i, p)| match p {
                Placeholder::Named(n) if n == name => Some(i),
                _ => None,
            })
            .collect()
    }

    fn intern(&mut self, name: &str) -> usize {
        if let Some(pos) = self.distinct_names.iter().position(|n| n == name) {
            pos
        } else {
            self.distinct_names.push(name.to_string());
            self.distinct_names.len() - 1
        }
    }
}

#[derive(Clone, Copy)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
}

/// Scan one statement, returning the (possibly rewritten) SQL and its plan.
pub(crate) fn scan(sql: &str) -> (String, PlaceholderPlan) {
    let bytes = sql.as_bytes();
    let mut plan = PlaceholderPlan::default();
    let mut out = String::with_capacity(sql.len());
    let mut flushed = 0;
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'-' if bytes.get(idx + 1) == Some(&b'-') => {
                    state = State::LineComment;
                    idx += 1;
                }
                b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'?' => plan.occurrences.push(Placeholder::Positional),
                b':' if bytes.get(idx + 1) == Some(&b':') => idx += 1, // cast operator
                b':' | b'$' => {
                    if let Some((name, end)) = scan_name(bytes, idx + 1) {
                        let distinct = plan.intern(&name);
                        plan.occurrences.push(Placeholder::Named(name));
                        out.push_str(&sql[flushed..idx]);
                        let _ = write!(out, "${}", distinct + 1);
                        flushed = end;
                        idx = end - 1;
                    } else if b == b'$' {
                        if let Some(end) = scan_digits(bytes, idx + 1) {
                            plan.occurrences.push(Placeholder::Positional);
                            idx = end - 1;
                        }
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if b == b'/' && bytes.get(idx + 1) == Some(&b'*') {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if b == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
        }
        idx += 1;
    }

    out.push_str(&sql[flushed..]);
    (out, plan)
}

fn scan_name(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let first = *bytes.get(start)?;
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    let mut idx = start + 1;
    while idx < bytes.len() && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_') {
        idx += 1;
    }
    std::str::from_utf8(&bytes[start..idx])
        .ok()
        .map(|name| (name.to_string(), idx))
}

fn scan_digits(bytes: &[u8], start: usize) -> Option<usize> {
    let mut idx = start;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if idx == start { None } else { Some(idx) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_sql_is_untouched() {
        let (sql, plan) = scan("SELECT * FROM t WHERE a = ? AND b = ?");
        assert_eq!(sql, "SELECT * FROM t WHERE a = ? AND b = ?");
        assert_eq!(plan.occurrences.len(), 2);
        assert!(!plan.has_named());
        assert_eq!(plan.declared_count(), 2);
    }

    #[test]
    fn named_placeholders_are_rewritten_and_deduplicated() {
        let (sql, plan) = scan("SELECT :x + :x + :y");
        assert_eq!(sql, "SELECT $1 + $1 + $2");
        assert_eq!(plan.occurrences.len(), 3);
        assert_eq!(plan.distinct_names, vec!["x", "y"]);
        assert_eq!(plan.declared_count(), 2);
        assert_eq!(plan.positions_of("x"), vec![0, 1]);
        assert_eq!(plan.parameter_name(1), Some("y"));
    }

    #[test]
    fn dollar_names_and_numbers() {
        let (sql, plan) = scan("SELECT $name, $other");
        assert_eq!(sql, "SELECT $1, $2");
        assert_eq!(plan.distinct_names, vec!["name", "other"]);
        assert!(!plan.is_mixed());

        let (_, plan) = scan("SELECT $1, $2");
        assert!(!plan.has_named());
        assert_eq!(plan.occurrences.len(), 2);
        assert_eq!(plan.declared_count(), 2);
    }

    #[test]
    fn mixed_named_and_positional_is_flagged() {
        let (_, plan) = scan("SELECT $name, $1");
        assert!(plan.is_mixed());
        let (_, plan) = scan("SELECT :x WHERE a = ?");
        assert!(plan.is_mixed());
        let (_, plan) = scan("SELECT ?, ?");
        assert!(!plan.is_mixed());
    }

    #[test]
    fn literals_and_comments_are_skipped() {
        let (sql, plan) = scan("SELECT ':x', \":y\" -- :z\n/* :w */ FROM t WHERE a = :x");
        assert_eq!(sql, "SELECT ':x', \":y\" -- :z\n/* :w */ FROM t WHERE a = $1");
        assert_eq!(plan.occurrences.len(), 1);
        assert_eq!(plan.distinct_names, vec!["x"]);
    }

    #[test]
    fn cast_operator_is_not_a_placeholder() {
        let (sql, plan) = scan("SELECT a::INTEGER FROM t");
        assert_eq!(sql, "SELECT a::INTEGER FROM t");
        assert!(plan.occurrences.is_empty());
    }

    #[test]
    fn doubled_quotes_stay_in_literals() {
        let (sql, plan) = scan("SELECT 'it''s :not' WHERE a = :x");
        assert_eq!(sql, "SELECT 'it''s :not' WHERE a = $1");
        assert_eq!(plan.distinct_names, vec!["x"]);
    }
}
