//! Sync orchestrator - sequences a run.
//!
//! `EnsureSchema -> Preflight -> Delete -> Insert -> Update -> Prune`, each
//! stage fully drained before the next starts. There is no run-level
//! transaction; every partition statement commits on its own, so a rerun
//! after any interruption converges to the same state.

mod plan;
mod report;

pub use plan::{PlannedStatement, SyncPlan};
pub use report::{HealthCheckResult, OperationSummary, PartitionRows, SyncReport, SyncStage};

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, info_span, warn, Instrument};

use crate::config::{Config, FailurePolicy};
use crate::core::{ConnectionProvider, Partition, RangePartitioner};
use crate::drivers::PgProvider;
use crate::error::{Result, SyncError};
use crate::executor::{OperationReport, ParallelExecutor, ProgressCallback};
use crate::operations::{Operation, SyncStatements};

/// Sync orchestrator.
pub struct Orchestrator {
    config: Config,
    statements: SyncStatements,
    partitioner: RangePartitioner,
    provider: Arc<dyn ConnectionProvider>,
    executor: ParallelExecutor,
    callback: Option<ProgressCallback>,
}

impl Orchestrator {
    /// Connect to the target database and create an orchestrator.
    pub async fn new(config: Config) -> Result<Self> {
        let config = auto_tuned(config);
        config.validate()?;
        let provider =
            PgProvider::new(&config.target, config.sync.get_max_connections()).await?;
        Self::with_provider(config, Arc::new(provider))
    }

    /// Create an orchestrator whose pool connects on first use.
    ///
    /// For callers that want to report an unreachable database rather than
    /// fail on it, like [`health_check`](Self::health_check).
    pub fn connect_lazy(config: Config) -> Result<Self> {
        let config = auto_tuned(config);
        config.validate()?;
        let provider = PgProvider::from_target(&config.target, config.sync.get_max_connections())?;
        Self::with_provider(config, Arc::new(provider))
    }

    /// Create an orchestrator over an existing connection provider.
    pub fn with_provider(config: Config, provider: Arc<dyn ConnectionProvider>) -> Result<Self> {
        let config = auto_tuned(config);
        config.validate()?;
        let statements = SyncStatements::from_config(&config)?;
        let partitioner = RangePartitioner::new(&config.sync.partitioning);
        partitioner.partitions()?;

        let workers = config.sync.get_workers();
        if provider.max_connections() < workers {
            warn!(
                "Provider allows {} connection(s) but {} worker(s) are configured; \
                 workers will wait for connections",
                provider.max_connections(),
                workers
            );
        }
        let executor = ParallelExecutor::new(provider.clone(), workers);

        Ok(Self {
            config,
            statements,
            partitioner,
            provider,
            executor,
            callback: None,
        })
    }

    /// Called once per operation with its aggregate row count.
    pub fn with_callback(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Partitions every partitioned operation of a run uses.
    pub fn partitions(&self) -> Result<Vec<Partition>> {
        self.partitioner.partitions()
    }

    /// Run a full sync.
    pub async fn run(&self) -> Result<SyncReport> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let partitions = self.partitions()?;

        info!(
            "Starting sync run {}: {} -> {} ({} partition(s), {} worker(s))",
            run_id,
            self.statements.staging(),
            self.statements.original(),
            partitions.len(),
            self.executor.workers()
        );

        self.ensure_schema()
            .instrument(info_span!("stage", stage = %SyncStage::EnsureSchema))
            .await?;
        let staging_rows = self
            .preflight()
            .instrument(info_span!("stage", stage = %SyncStage::Preflight))
            .await?;

        let mut operations = Vec::with_capacity(Operation::SEQUENCE.len());
        for op in Operation::SEQUENCE {
            if op == Operation::Prune && self.statements.prune_rule().is_none() {
                info!("Prune disabled, skipping");
                continue;
            }
            let report = self
                .run_operation(op, &partitions)
                .instrument(info_span!("stage", stage = %SyncStage::from(op)))
                .await?;
            operations.push(OperationSummary::from(&report));
        }

        let completed_at = Utc::now();
        let report = SyncReport {
            run_id,
            status: if operations.iter().all(|s| s.partitions_failed == 0) {
                "completed".to_string()
            } else {
                "completed_with_failures".to_string()
            },
            started_at,
            completed_at,
            duration_seconds: timer.elapsed().as_secs_f64(),
            original_table: self.statements.original().to_string(),
            staging_table: self.statements.staging().to_string(),
            staging_rows,
            operations,
        };

        info!(
            "Sync {}: deleted {}, inserted {}, updated {}, pruned {} in {:.1}s",
            report.status,
            report.rows(Operation::Delete),
            report.rows(Operation::Insert),
            report.rows(Operation::Update),
            report.rows(Operation::Prune),
            report.duration_seconds
        );

        Ok(report)
    }

    /// Run one operation over an explicit partition list.
    ///
    /// Used by [`run`](Self::run), and by callers retrying the partitions a
    /// report lists as failed. Prune ignores `partitions` and always makes
    /// one full-table pass.
    ///
    /// # Errors
    ///
    /// `NoPartitions` for an empty list; `PartitionsFailed` if any partition
    /// failed and the failure policy is `abort`.
    pub async fn run_operation(
        &self,
        op: Operation,
        partitions: &[Partition],
    ) -> Result<OperationReport> {
        let targets: Vec<Partition> = if op.is_partitioned() {
            partitions.to_vec()
        } else {
            vec![Partition::All]
        };
        if targets.is_empty() {
            return Err(SyncError::NoPartitions(format!(
                "no partitions given for {}",
                op
            )));
        }

        let jobs = targets
            .into_iter()
            .map(|p| Ok((p, self.statements.statement(op, &p)?)))
            .collect::<Result<Vec<_>>>()?;

        let report = self
            .executor
            .execute(op, jobs, self.callback.as_ref())
            .await;

        info!(
            "{}: {} records total ({}/{} partitions succeeded)",
            op.label(),
            report.total_rows(),
            report.succeeded(),
            report.partitions()
        );

        if !report.is_complete() {
            let failed: Vec<String> = report
                .failed_partitions()
                .iter()
                .map(|p| p.to_string())
                .collect();
            warn!("{}: failed partitions: {}", op, failed.join(", "));
            if self.config.sync.failure_policy == FailurePolicy::Abort {
                return Err(SyncError::PartitionsFailed {
                    operation: op.to_string(),
                    partitions: failed,
                });
            }
        }

        Ok(report)
    }

    /// Create the original table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        let statement = self.statements.create_original_table()?;
        let mut conn = self.provider.acquire().await?;
        conn.execute(&statement)
            .await
            .map_err(|e| SyncError::stage(SyncStage::EnsureSchema, e.chain_message()))?;
        info!("Original table {} is present", self.statements.original());
        Ok(())
    }

    /// Verify the staging table exists and holds rows. Returns its row count.
    pub async fn preflight(&self) -> Result<i64> {
        let staging = self.statements.staging();
        let mut conn = self.provider.acquire().await?;

        let exists = conn
            .query_count(&self.statements.staging_exists())
            .await
            .map_err(|e| SyncError::stage(SyncStage::Preflight, e.chain_message()))?;
        if exists == 0 {
            return Err(SyncError::StagingUnavailable {
                table: staging.to_string(),
                reason: "table does not exist".to_string(),
            });
        }

        let rows = conn
            .query_count(&self.statements.staging_row_count())
            .await
            .map_err(|e| SyncError::stage(SyncStage::Preflight, e.chain_message()))?;
        if rows == 0 {
            return Err(SyncError::StagingUnavailable {
                table: staging.to_string(),
                reason: "table is empty".to_string(),
            });
        }

        info!("Staging table {}: {} rows", staging, rows);
        Ok(rows)
    }

    /// Test the target connection and look at the staging table.
    pub async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let target = self.provider.describe();

        match self.provider.ping().await {
            Ok(()) => {
                let latency = start.elapsed().as_millis() as u64;
                let staging_rows = self.staging_rows().await;
                HealthCheckResult {
                    target,
                    target_connected: true,
                    target_latency_ms: latency,
                    target_error: None,
                    staging_rows,
                    healthy: true,
                }
            }
            Err(e) => HealthCheckResult {
                target,
                target_connected: false,
                target_latency_ms: start.elapsed().as_millis() as u64,
                target_error: Some(e.chain_message()),
                staging_rows: None,
                healthy: false,
            },
        }
    }

    /// Close the connection pool.
    pub fn close(&self) {
        self.provider.close();
    }

    async fn staging_rows(&self) -> Option<i64> {
        let mut conn = self.provider.acquire().await.ok()?;
        let exists = conn
            .query_count(&self.statements.staging_exists())
            .await
            .ok()?;
        if exists == 0 {
            return None;
        }
        conn.query_count(&self.statements.staging_row_count())
            .await
            .ok()
    }
}

/// Fill in the worker count from detected cores when it is not configured.
fn auto_tuned(config: Config) -> Config {
    if config.sync.workers.is_some() {
        config
    } else {
        config.with_auto_tuning()
    }
}
