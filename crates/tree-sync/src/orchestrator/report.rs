//! Run-level reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::Partition;
use crate::error::Result;
use crate::executor::OperationReport;
use crate::operations::Operation;

/// Stages of a sync run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    EnsureSchema,
    Preflight,
    Delete,
    Insert,
    Update,
    Prune,
}

impl From<Operation> for SyncStage {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Delete => SyncStage::Delete,
            Operation::Insert => SyncStage::Insert,
            Operation::Update => SyncStage::Update,
            Operation::Prune => SyncStage::Prune,
        }
    }
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStage::EnsureSchema => "ensure_schema",
            SyncStage::Preflight => "preflight",
            SyncStage::Delete => "delete",
            SyncStage::Insert => "insert",
            SyncStage::Update => "update",
            SyncStage::Prune => "prune",
        };
        f.write_str(name)
    }
}

/// Row count of one successful partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionRows {
    pub partition: String,
    pub rows: u64,
}

/// Summary of one operation within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationSummary {
    pub operation: Operation,

    /// Rows affected across successful partitions.
    pub rows: u64,

    pub partitions_total: usize,

    pub partitions_failed: usize,

    /// Failed partitions, suitable for `Orchestrator::run_operation`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_partitions: Vec<Partition>,

    /// Failure reason per failed partition, same order as `failed_partitions`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failure_reasons: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partition_rows: Vec<PartitionRows>,
}

impl From<&OperationReport> for OperationSummary {
    fn from(report: &OperationReport) -> Self {
        use crate::executor::PartitionOutcome;

        let mut failed_partitions = Vec::new();
        let mut failure_reasons = Vec::new();
        let mut partition_rows = Vec::new();
        for result in report.results() {
            match &result.outcome {
                PartitionOutcome::Applied { rows } => partition_rows.push(PartitionRows {
                    partition: result.partition.to_string(),
                    rows: *rows,
                }),
                PartitionOutcome::Failed { reason } => {
                    failed_partitions.push(result.partition);
                    failure_reasons.push(reason.clone());
                }
            }
        }

        Self {
            operation: report.operation(),
            rows: report.total_rows(),
            partitions_total: report.partitions(),
            partitions_failed: report.failed(),
            failed_partitions,
            failure_reasons,
            partition_rows,
        }
    }
}

/// Result of a sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    /// Unique run identifier.
    pub run_id: String,

    /// "completed", or "completed_with_failures" when any partition failed.
    pub status: String,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    pub original_table: String,

    pub staging_table: String,

    /// Rows in the staging table at preflight.
    pub staging_rows: i64,

    /// Per-operation summaries in execution order.
    pub operations: Vec<OperationSummary>,
}

impl SyncReport {
    pub fn summary(&self, op: Operation) -> Option<&OperationSummary> {
        self.operations.iter().find(|s| s.operation == op)
    }

    /// Rows affected by one operation; 0 if it did not run.
    pub fn rows(&self, op: Operation) -> u64 {
        self.summary(op).map_or(0, |s| s.rows)
    }

    pub fn is_complete(&self) -> bool {
        self.operations.iter().all(|s| s.partitions_failed == 0)
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Result of a connectivity check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub target: String,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_error: Option<String>,
    /// Rows in the staging table, if it exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_rows: Option<i64>,
    pub healthy: bool,
}
