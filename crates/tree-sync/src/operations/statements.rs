//! SQL rendering for the sync operations.
//!
//! Aliases are fixed: `a` is always the original table and `b` the staging
//! table. Delete filters on the original row's planting year, Insert and
//! Update on the staging row's, so a record moves between partitions only
//! when its year actually changed.
//!
//! Insert and Update read staging reduced to one row per id. Duplicate ids
//! keep the row with the highest parseable year, ties broken by row text, so
//! each id falls in exactly one partition and the surviving values do not
//! depend on which partition finishes last.

use crate::config::{Config, PruneRule};
use crate::core::identifier::{quote_pg, QualifiedTable, TableAllowList};
use crate::core::partition::year_expression;
use crate::core::{ColumnMap, Partition, Statement, StatementBuilder};
use crate::error::{Result, SyncError};

use super::Operation;

/// Statement factory bound to one validated pair of tables.
#[derive(Debug, Clone)]
pub struct SyncStatements {
    original: QualifiedTable,
    staging: QualifiedTable,
    columns: ColumnMap,
    protected_prefix: String,
    prune: Option<PruneRule>,
}

impl SyncStatements {
    /// Resolve both tables against the allow-list and capture the column map.
    pub fn from_config(config: &Config) -> Result<Self> {
        let sync = &config.sync;
        let allow = TableAllowList::new(&sync.allowed_tables)?;
        let original = allow.resolve(&config.target.schema, &sync.original_table)?;
        let staging = allow.resolve(&config.target.schema, &sync.staging_table)?;
        if original == staging {
            return Err(SyncError::Config(format!(
                "original and staging table are both {}",
                original
            )));
        }
        sync.columns.validate()?;

        Ok(Self {
            original,
            staging,
            columns: sync.columns.clone(),
            protected_prefix: sync.protected_prefix.clone(),
            prune: sync.prune.clone(),
        })
    }

    pub fn original(&self) -> &QualifiedTable {
        &self.original
    }

    pub fn staging(&self) -> &QualifiedTable {
        &self.staging
    }

    pub fn prune_rule(&self) -> Option<&PruneRule> {
        self.prune.as_ref()
    }

    /// Render the statement for one operation over one partition.
    pub fn statement(&self, op: Operation, partition: &Partition) -> Result<Statement> {
        match op {
            Operation::Delete => self.delete(partition),
            Operation::Insert => self.insert(partition),
            Operation::Update => self.update(partition),
            Operation::Prune => self.prune(),
        }
    }

    /// Anti-join delete on the location number, skipping protected prefixes.
    pub fn delete(&self, partition: &Partition) -> Result<Statement> {
        let loc = quote_pg(&self.columns.location_column)?;
        let mut b = StatementBuilder::new();
        let prefix = b.bind_text(self.protected_prefix.as_str());
        let in_partition = partition.render_predicate(&self.year_expr("a")?, &mut b);

        let sql = format!(
            "DELETE FROM {orig} AS a \
             WHERE a.{loc} IS NOT NULL \
             AND NOT starts_with(a.{loc}, {prefix}) \
             AND {in_partition} \
             AND NOT EXISTS (SELECT 1 FROM {stg} AS b WHERE b.{loc} = a.{loc})",
            orig = self.original.quoted(),
            stg = self.staging.quoted(),
            loc = loc,
            prefix = prefix,
            in_partition = in_partition,
        );
        Ok(b.finish(sql))
    }

    /// Insert bare key rows for staging ids missing from the original table.
    pub fn insert(&self, partition: &Partition) -> Result<Statement> {
        let key = quote_pg(&self.columns.key()?.name)?;
        let mut b = StatementBuilder::new();
        let in_partition = partition.render_predicate(&self.year_expr("b")?, &mut b);

        let sql = format!(
            "INSERT INTO {orig} ({key}) \
             SELECT b.{key} FROM {stg} AS b \
             WHERE {in_partition} \
             AND NOT EXISTS (SELECT 1 FROM {orig} AS a WHERE a.{key} = b.{key}) \
             ON CONFLICT ({key}) DO NOTHING",
            orig = self.original.quoted(),
            stg = self.staging_per_key(&key)?,
            key = key,
            in_partition = in_partition,
        );
        Ok(b.finish(sql))
    }

    /// Overwrite every synchronized column from staging, matching by key.
    pub fn update(&self, partition: &Partition) -> Result<Statement> {
        let key = quote_pg(&self.columns.key()?.name)?;
        let assignments = self
            .columns
            .synced()
            .map(|c| Ok(format!("{} = {}", quote_pg(&c.name)?, c.value_expr("b")?)))
            .collect::<Result<Vec<_>>>()?;
        if assignments.is_empty() {
            return Err(SyncError::Config(
                "sync.columns: no synced columns to update".into(),
            ));
        }

        let mut b = StatementBuilder::new();
        let in_partition = partition.render_predicate(&self.year_expr("b")?, &mut b);

        let sql = format!(
            "UPDATE {orig} AS a SET {assignments} \
             FROM {stg} AS b \
             WHERE a.{key} = b.{key} \
             AND {in_partition}",
            orig = self.original.quoted(),
            stg = self.staging_per_key(&key)?,
            assignments = assignments.join(", "),
            key = key,
            in_partition = in_partition,
        );
        Ok(b.finish(sql))
    }

    /// Remove placeholder rows from the whole original table.
    pub fn prune(&self) -> Result<Statement> {
        let rule = self
            .prune
            .as_ref()
            .ok_or_else(|| SyncError::Config("prune is disabled (sync.prune is null)".into()))?;
        let mut b = StatementBuilder::new();
        let value = b.bind_text(rule.value.as_str());
        let sql = format!(
            "DELETE FROM {orig} AS a WHERE a.{col} = {value}",
            orig = self.original.quoted(),
            col = quote_pg(&rule.column)?,
            value = value,
        );
        Ok(b.finish(sql))
    }

    /// Idempotent DDL for the original table.
    pub fn create_original_table(&self) -> Result<Statement> {
        Ok(Statement::new(self.columns.create_table_ddl(&self.original)?))
    }

    /// Returns 1 if the staging table exists, else 0.
    pub fn staging_exists(&self) -> Statement {
        let mut b = StatementBuilder::new();
        let schema = b.bind_text(self.staging.schema());
        let table = b.bind_text(self.staging.name());
        b.finish(format!(
            "SELECT count(*) FROM information_schema.tables \
             WHERE table_schema = {}::text AND table_name = {}::text",
            schema, table
        ))
    }

    pub fn staging_row_count(&self) -> Statement {
        Statement::new(format!("SELECT count(*) FROM {}", self.staging.quoted()))
    }

    /// Staging rows with a non-null key, one per key.
    fn staging_per_key(&self, key: &str) -> Result<String> {
        Ok(format!(
            "(SELECT DISTINCT ON (s.{key}) * FROM {stg} AS s \
             WHERE s.{key} IS NOT NULL \
             ORDER BY s.{key}, {year} DESC NULLS LAST, s::text DESC)",
            key = key,
            stg = self.staging.quoted(),
            year = self.year_expr("s")?,
        ))
    }

    fn year_expr(&self, alias: &str) -> Result<String> {
        Ok(year_expression(&format!(
            "{}.{}",
            alias,
            quote_pg(&self.columns.year_column)?
        )))
    }
}
