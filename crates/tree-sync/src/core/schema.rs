//! Column mapping for the tree tables.
//!
//! Column additions are data: every statement is generated from a single
//! [`ColumnMap`], so adding a synchronized column means adding one entry.

use crate::core::identifier::{quote_pg, validate_identifier, QualifiedTable};
use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How synchronization treats a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    /// Natural primary key. Never rewritten.
    Key,
    /// Copied from staging on every update.
    Synced,
    /// Owned by another process (adoption, watering, rain). Never touched.
    Stewardship,
}

/// Conversion applied to a staging value before it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnCast {
    /// Blank text becomes NULL, anything else is cast with `::integer`.
    Integer,
}

/// One column of the original table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    /// PostgreSQL type used when the original table is created.
    pub pg_type: String,
    pub role: ColumnRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cast: Option<ColumnCast>,
}

impl ColumnSpec {
    fn new(name: &str, pg_type: &str, role: ColumnRole) -> Self {
        Self {
            name: name.to_string(),
            pg_type: pg_type.to_string(),
            role,
            cast: None,
        }
    }

    fn with_cast(mut self, cast: ColumnCast) -> Self {
        self.cast = Some(cast);
        self
    }

    /// Render the staging-side value expression for an UPDATE.
    pub fn value_expr(&self, alias: &str) -> Result<String> {
        let source = format!("{}.{}", alias, quote_pg(&self.name)?);
        Ok(match self.cast {
            None => source,
            Some(ColumnCast::Integer) => {
                format!("NULLIF(TRIM({}::text), '')::integer", source)
            }
        })
    }
}

/// Column layout of the tree tables plus the columns with special meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    /// Secondary location key used by the deletion anti-join.
    pub location_column: String,
    /// Column holding the planting year, used for partitioning.
    pub year_column: String,
    pub columns: Vec<ColumnSpec>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self::trees()
    }
}

impl ColumnMap {
    /// The street-tree inventory layout.
    pub fn trees() -> Self {
        use ColumnRole::*;
        let columns = vec![
            ColumnSpec::new("id", "text", Key),
            ColumnSpec::new("lat", "text", Synced),
            ColumnSpec::new("lng", "text", Synced),
            ColumnSpec::new("artdtsch", "text", Synced),
            ColumnSpec::new("artbot", "text", Synced),
            ColumnSpec::new("gattungdeutsch", "text", Synced),
            ColumnSpec::new("gattung", "text", Synced),
            ColumnSpec::new("standortnr", "text", Synced),
            ColumnSpec::new("strname", "text", Synced),
            ColumnSpec::new("pflanzjahr", "int4", Synced).with_cast(ColumnCast::Integer),
            ColumnSpec::new("stammumfg", "text", Synced),
            ColumnSpec::new("kronedurch", "text", Synced),
            ColumnSpec::new("baumhoehe", "text", Synced),
            ColumnSpec::new("bezirk", "text", Synced),
            ColumnSpec::new("geom", "geometry", Synced),
            ColumnSpec::new("aend_dat", "timestamp", Synced),
            ColumnSpec::new("adopted", "text", Stewardship),
            ColumnSpec::new("watered", "text", Stewardship),
            ColumnSpec::new("radolan_sum", "int4", Stewardship),
            ColumnSpec::new("radolan_days", "_int4", Stewardship),
        ];
        Self {
            location_column: "standortnr".to_string(),
            year_column: "pflanzjahr".to_string(),
            columns,
        }
    }

    /// Check the map is internally consistent.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for col in &self.columns {
            validate_identifier(&col.name)?;
            if !seen.insert(col.name.as_str()) {
                return Err(SyncError::Config(format!(
                    "sync.columns: duplicate column '{}'",
                    col.name
                )));
            }
            if col.pg_type.trim().is_empty()
                || !col
                    .pg_type
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "_ (),[]".contains(c))
            {
                return Err(SyncError::Config(format!(
                    "sync.columns: invalid type {:?} for column '{}'",
                    col.pg_type, col.name
                )));
            }
        }

        let keys = self
            .columns
            .iter()
            .filter(|c| c.role == ColumnRole::Key)
            .count();
        if keys != 1 {
            return Err(SyncError::Config(format!(
                "sync.columns: exactly one key column required, found {}",
                keys
            )));
        }

        for (what, name) in [
            ("location_column", &self.location_column),
            ("year_column", &self.year_column),
        ] {
            match self.column(name) {
                Some(c) if c.role == ColumnRole::Synced => {}
                Some(_) => {
                    return Err(SyncError::Config(format!(
                        "sync.columns.{}: '{}' must be a synced column",
                        what, name
                    )))
                }
                None => {
                    return Err(SyncError::Config(format!(
                        "sync.columns.{}: unknown column '{}'",
                        what, name
                    )))
                }
            }
        }
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The primary key column.
    pub fn key(&self) -> Result<&ColumnSpec> {
        self.columns
            .iter()
            .find(|c| c.role == ColumnRole::Key)
            .ok_or_else(|| SyncError::Config("sync.columns: no key column".into()))
    }

    /// Columns rewritten from staging on update.
    pub fn synced(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|c| c.role == ColumnRole::Synced)
    }

    /// `CREATE TABLE IF NOT EXISTS` for the original table.
    pub fn create_table_ddl(&self, table: &QualifiedTable) -> Result<String> {
        let key = self.key()?;
        let mut col_defs = Vec::with_capacity(self.columns.len() + 1);
        for col in &self.columns {
            let null_clause = if col.role == ColumnRole::Key {
                " NOT NULL"
            } else {
                ""
            };
            col_defs.push(format!("{} {}{}", quote_pg(&col.name)?, col.pg_type, null_clause));
        }
        col_defs.push(format!("PRIMARY KEY ({})", quote_pg(&key.name)?));

        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            table.quoted(),
            col_defs.join(",\n    ")
        ))
    }
}
