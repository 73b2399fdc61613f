//! Connect-option string parsing and engine configuration.

use duckdb::{AccessMode, Config, DefaultOrder};
use tracing::warn;

/// Options recognized in the semicolon-delimited connect string.
///
/// All tokens are parsed for compatibility; only the read-only flag changes
/// engine behavior. Busy timeout, URI filenames and shared cache have no
/// engine equivalent here, and regular-expression support is built in
/// (`regexp_matches`), so those flags are accepted and otherwise inert.
/// Unknown tokens are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    pub busy_timeout_ms: Option<u64>,
    pub read_only: bool,
    pub open_uri: bool,
    pub shared_cache: bool,
    pub regexp: bool,
    pub regexp_cache_size: Option<u64>,
}

impl ConnectOptions {
    pub fn parse(options: &str) -> Self {
        let mut parsed = Self::default();
        for token in options.split(';') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            if let Some(value) = token.strip_prefix("DUCKDB_BUSY_TIMEOUT=") {
                match value.trim().parse::<u64>() {
                    Ok(ms) => parsed.busy_timeout_ms = Some(ms),
                    Err(_) => warn!("invalid DUCKDB_BUSY_TIMEOUT value {value:?}, ignoring"),
                }
            } else if token == "DUCKDB_OPEN_READONLY" {
                parsed.read_only = true;
            } else if token == "DUCKDB_OPEN_URI" {
                parsed.open_uri = true;
            } else if token == "DUCKDB_ENABLE_SHARED_CACHE" {
                parsed.shared_cache = true;
            } else if token == "DUCKDB_ENABLE_REGEXP" {
                parsed.regexp = true;
            } else if let Some(value) = token.strip_prefix("DUCKDB_ENABLE_REGEXP=") {
                parsed.regexp = true;
                match value.trim().parse::<u64>() {
                    Ok(size) => parsed.regexp_cache_size = Some(size),
                    Err(_) => warn!("invalid DUCKDB_ENABLE_REGEXP cache size {value:?}, ignoring"),
                }
            }
        }
        parsed
    }

    /// Build the engine configuration: fixed defaults plus the access mode.
    pub(crate) fn engine_config(&self) -> duckdb::Result<Config> {
        let mut config = Config::default()
            .threads(8)?
            .max_memory("8GB")?
            .default_order(DefaultOrder::Desc)?;
        if self.read_only {
            config = config.access_mode(AccessMode::ReadOnly)?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_tokens() {
        let opts = ConnectOptions::parse(
            "DUCKDB_BUSY_TIMEOUT=500;DUCKDB_OPEN_READONLY;DUCKDB_ENABLE_REGEXP=64",
        );
        assert_eq!(opts.busy_timeout_ms, Some(500));
        assert!(opts.read_only);
        assert!(opts.regexp);
        assert_eq!(opts.regexp_cache_size, Some(64));
        assert!(!opts.open_uri);
    }

    #[test]
    fn ignores_unknown_and_malformed_tokens() {
        let opts = ConnectOptions::parse("QSQLITE_SOMETHING;DUCKDB_BUSY_TIMEOUT=abc; ;");
        assert_eq!(opts, ConnectOptions::default());
    }

    #[test]
    fn empty_string_is_all_defaults() {
        assert_eq!(ConnectOptions::parse(""), ConnectOptions::default());
    }
}
