//! Configuration type definitions with auto-tuning based on system resources.

use crate::core::ColumnMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use sysinfo::System;
use tracing::info;

/// System resource information for auto-tuning.
#[derive(Debug, Clone)]
pub struct SystemResources {
    /// Number of CPU cores.
    pub cpu_cores: usize,
    /// Total RAM in GB.
    pub total_memory_gb: f64,
}

impl SystemResources {
    /// Detect system resources.
    pub fn detect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        Self {
            cpu_cores: sys.cpus().len().max(1),
            total_memory_gb: sys.total_memory() as f64 / (1024.0 * 1024.0 * 1024.0),
        }
    }

    /// Worker count used when none is configured: cores - 1, at least 1.
    pub fn default_workers(&self) -> usize {
        self.cpu_cores.saturating_sub(1).max(1)
    }

    /// Log detected system resources.
    pub fn log(&self) {
        info!(
            "System resources: {:.1} GB RAM, {} CPU cores",
            self.total_memory_gb, self.cpu_cores
        );
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Target database configuration (PostgreSQL).
    pub target: TargetConfig,

    /// Synchronization behavior.
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    /// Apply auto-tuned defaults based on system resources.
    /// Only fills in values that weren't explicitly set in the config file.
    pub fn with_auto_tuning(mut self) -> Self {
        let resources = SystemResources::detect();
        resources.log();
        self.sync = self.sync.with_auto_tuning(&resources);
        self
    }
}

/// Target database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password. Never serialized.
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Schema holding both tables (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// SSL mode (default: "require").
    #[serde(default = "default_require")]
    pub ssl_mode: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Synchronization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Durable table being kept up to date (default: "trees").
    #[serde(default = "default_original_table")]
    pub original_table: String,

    /// Freshly loaded snapshot (default: "trees_tmp").
    #[serde(default = "default_staging_table")]
    pub staging_table: String,

    /// Table names a run may touch. Both tables must be listed.
    #[serde(default = "default_allowed_tables")]
    pub allowed_tables: Vec<String>,

    /// Parallel workers per stage. Auto-tuned to cores - 1 if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Planting-year partitioning.
    #[serde(default)]
    pub partitioning: PartitionConfig,

    /// Location numbers with this prefix are never deleted (default: "osm_").
    #[serde(default = "default_protected_prefix")]
    pub protected_prefix: String,

    /// Placeholder rows removed after every run. `null` disables pruning.
    #[serde(default = "default_prune")]
    pub prune: Option<PruneRule>,

    /// What to do when partitions of a stage fail.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Column layout of the tree tables.
    #[serde(default)]
    pub columns: ColumnMap,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            original_table: default_original_table(),
            staging_table: default_staging_table(),
            allowed_tables: default_allowed_tables(),
            workers: None,
            partitioning: PartitionConfig::default(),
            protected_prefix: default_protected_prefix(),
            prune: default_prune(),
            failure_policy: FailurePolicy::default(),
            columns: ColumnMap::default(),
        }
    }
}

impl SyncConfig {
    /// Fill in worker count from detected cores if not explicitly set.
    pub fn with_auto_tuning(mut self, resources: &SystemResources) -> Self {
        if self.workers.is_none() {
            self.workers = Some(resources.default_workers());
        }
        info!("Auto-tuned config: workers={}", self.get_workers());
        self
    }

    /// Effective worker count. Detects cores if auto-tuning was not applied.
    pub fn get_workers(&self) -> usize {
        self.workers
            .unwrap_or_else(|| SystemResources::detect().default_workers())
            .max(1)
    }

    /// Connection pool size: one per worker plus one for schema and preflight.
    pub fn get_max_connections(&self) -> usize {
        self.get_workers() + 1
    }
}

/// Planting-year partitioning settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Split stages by planting year (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// First bucket edge (default: 1900).
    #[serde(default = "default_start_year")]
    pub start_year: i32,

    /// Last bucket edge is the first edge >= this year (default: 2030).
    #[serde(default = "default_end_year")]
    pub end_year: i32,

    /// Years per bucket (default: 10).
    #[serde(default = "default_bucket_width")]
    pub bucket_width: i32,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start_year: default_start_year(),
            end_year: default_end_year(),
            bucket_width: default_bucket_width(),
        }
    }
}

/// Removes placeholder rows: `column = value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneRule {
    pub column: String,
    pub value: String,
}

impl Default for PruneRule {
    fn default() -> Self {
        Self {
            column: "artdtsch".to_string(),
            value: "Pflanzstelle".to_string(),
        }
    }
}

/// Behavior when some partitions of a stage fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Report failed partitions and run the remaining stages.
    #[default]
    Continue,

    /// Halt the run after the first stage with failed partitions.
    Abort,
}

// Default value functions for serde
fn default_pg_port() -> u16 {
    5432
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_require() -> String {
    "require".to_string()
}

fn default_original_table() -> String {
    "trees".to_string()
}

fn default_staging_table() -> String {
    "trees_tmp".to_string()
}

fn default_allowed_tables() -> Vec<String> {
    vec![default_original_table(), default_staging_table()]
}

fn default_protected_prefix() -> String {
    "osm_".to_string()
}

fn default_prune() -> Option<PruneRule> {
    Some(PruneRule::default())
}

fn default_true() -> bool {
    true
}

fn default_start_year() -> i32 {
    1900
}

fn default_end_year() -> i32 {
    2030
}

fn default_bucket_width() -> i32 {
    10
}
