//! Identifier quoting for generated introspection SQL.

/// What the identifier names; table identifiers additionally get their
/// schema-separator dots quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Field,
    Table,
}

/// Quote an identifier for safe inclusion in generated SQL.
///
/// An identifier containing a `[` and a `]` is assumed to be escaped already
/// and is returned unchanged (heuristic, not validated). Already
/// double-quoted identifiers are also left alone. Otherwise embedded quotes
/// are doubled, the identifier is wrapped in quotes, and for table
/// identifiers `schema.table` becomes two independently quoted segments.
pub fn escape_identifier(identifier: &str, kind: IdentifierKind) -> String {
    if identifier.contains('[') && identifier.contains(']') {
        return identifier.to_string();
    }
    if identifier.is_empty() || identifier.starts_with('"') || identifier.ends_with('"') {
        return identifier.to_string();
    }
    let mut res = format!("\"{}\"", identifier.replace('"', "\"\""));
    if kind == IdentifierKind::Table {
        res = res.replace('.', "\".\"");
    }
    res
}

/// Whether the identifier is delimited with quotes or brackets.
pub fn is_identifier_escaped(identifier: &str) -> bool {
    (identifier.starts_with('"') && identifier.ends_with('"') && identifier.len() >= 2)
        || (identifier.starts_with('[') && identifier.ends_with(']') && identifier.len() >= 2)
}

/// Remove the outer delimiters from an escaped identifier. Returns the input
/// unchanged when it is not delimited.
pub fn strip_delimiters(identifier: &str) -> String {
    if is_identifier_escaped(identifier) {
        identifier[1..identifier.len() - 1].to_string()
    } else {
        identifier.to_string()
    }
}
