//! # tree-sync
//!
//! Incremental synchronization of a street-tree inventory into PostgreSQL.
//!
//! Given the durable tree table and a freshly loaded staging table of the
//! same shape, a run applies the minimal set of changes:
//!
//! - **Delete** rows whose location number vanished from staging
//!   (externally sourced `osm_` locations are protected)
//! - **Insert** bare rows for ids only present in staging
//! - **Update** every synchronized column from staging, leaving
//!   stewardship fields (adoption, watering, rainfall) untouched
//! - **Prune** placeholder rows (`artdtsch = 'Pflanzstelle'`)
//!
//! Delete, Insert and Update are split into planting-year partitions and run
//! by a bounded worker pool, one pooled connection and one committed
//! transaction per partition.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tree_sync::{Config, Operation, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?.with_env_overrides()?.with_auto_tuning();
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let report = orchestrator.run().await?;
//!     println!("Inserted {} trees", report.rows(Operation::Insert));
//!
//!     // Retry whatever failed.
//!     if let Some(update) = report.summary(Operation::Update) {
//!         if !update.failed_partitions.is_empty() {
//!             orchestrator
//!                 .run_operation(Operation::Update, &update.failed_partitions)
//!                 .await?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod executor;
pub mod operations;
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenient access
pub use crate::config::{Config, FailurePolicy, PartitionConfig, PruneRule, SyncConfig, TargetConfig};
pub use crate::core::{ConnectionProvider, Partition, RangePartitioner, Statement, SyncConnection};
pub use crate::drivers::PgProvider;
pub use crate::error::{Result, SyncError};
pub use crate::executor::{OperationReport, ParallelExecutor, PartitionOutcome, ProgressCallback};
pub use crate::operations::{Operation, SyncStatements};
pub use crate::orchestrator::{HealthCheckResult, Orchestrator, SyncPlan, SyncReport, SyncStage};
