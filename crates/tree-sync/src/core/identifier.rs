//! Identifier validation and quoting for generated statements.
//!
//! Table and column names cannot be bound as statement parameters, so every
//! identifier that ends up in SQL text passes through this module first.
//!
//! # Security
//!
//! Caller-supplied table names are untrusted input. They are accepted only if
//! they:
//! 1. Match `[A-Za-z_][A-Za-z0-9_]*` and fit PostgreSQL's 63-byte limit
//! 2. Appear in the configured allow-list of table names
//!
//! Validated identifiers are then always emitted double-quoted.

use crate::error::{Result, SyncError};
use std::collections::BTreeSet;
use std::fmt;

/// Maximum identifier length in bytes (PostgreSQL `NAMEDATALEN - 1`).
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Validate an identifier.
///
/// Rejects:
/// - Empty identifiers
/// - Identifiers exceeding 63 bytes
/// - Anything outside `[A-Za-z_][A-Za-z0-9_]*` (quotes, spaces, null bytes, dots)
///
/// # Errors
///
/// Returns `SyncError::Config` with a descriptive message.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(SyncError::Config("Identifier cannot be empty".to_string()));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(SyncError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    let mut chars = name.chars();
    let first_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !first_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SyncError::Config(format!(
            "SECURITY: Identifier must match [A-Za-z_][A-Za-z0-9_]*: {:?}",
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier after validating it.
///
/// ```ignore
/// assert_eq!(quote_pg("trees")?, "\"trees\"");
/// ```
pub fn quote_pg(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name))
}

/// Qualify a PostgreSQL table name with schema.
pub fn qualify_pg(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_pg(schema)?, quote_pg(table)?))
}

/// The set of table names a run is allowed to touch.
#[derive(Debug, Clone, Default)]
pub struct TableAllowList {
    tables: BTreeSet<String>,
}

impl TableAllowList {
    /// Build an allow-list, validating every entry.
    pub fn new<I, S>(tables: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for table in tables {
            let table = table.as_ref();
            validate_identifier(table)?;
            set.insert(table.to_string());
        }
        Ok(Self { tables: set })
    }

    /// Check whether a table name is allowed.
    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains(table)
    }

    /// Resolve a caller-supplied table name into a quoted, schema-qualified name.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Config` if the name is malformed or not allow-listed.
    pub fn resolve(&self, schema: &str, table: &str) -> Result<QualifiedTable> {
        validate_identifier(table)?;
        if !self.contains(table) {
            return Err(SyncError::Config(format!(
                "SECURITY: Table {:?} is not in the allowed table list ({})",
                table,
                self.tables.iter().cloned().collect::<Vec<_>>().join(", ")
            )));
        }
        QualifiedTable::new(schema, table)
    }
}

/// A validated `schema.table` pair, ready to be rendered into SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedTable {
    schema: String,
    name: String,
    quoted: String,
}

impl QualifiedTable {
    fn new(schema: &str, name: &str) -> Result<Self> {
        let quoted = qualify_pg(schema, name)?;
        Ok(Self {
            schema: schema.to_string(),
            name: name.to_string(),
            quoted,
        })
    }

    /// Unquoted schema name (for binding as a parameter).
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Unquoted table name (for binding as a parameter).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Quoted `"schema"."table"` form.
    pub fn quoted(&self) -> &str {
        &self.quoted
    }
}

impl fmt::Display for QualifiedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}
