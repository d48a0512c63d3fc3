//! Per-partition outcomes and their reduction.

use serde::{Deserialize, Serialize};

use crate::core::Partition;
use crate::operations::Operation;

/// What happened to one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PartitionOutcome {
    Applied { rows: u64 },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionResult {
    pub partition: Partition,
    pub outcome: PartitionOutcome,
    #[serde(skip)]
    seq: usize,
}

impl PartitionResult {
    pub fn rows(&self) -> Option<u64> {
        match self.outcome {
            PartitionOutcome::Applied { rows } => Some(rows),
            PartitionOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, PartitionOutcome::Failed { .. })
    }
}

/// Aggregate of one operation across all its partitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationReport {
    operation: Operation,
    results: Vec<PartitionResult>,
}

impl OperationReport {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            results: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, seq: usize, partition: Partition, outcome: PartitionOutcome) {
        self.results.push(PartitionResult {
            partition,
            outcome,
            seq,
        });
    }

    /// Restore submission order after out-of-order completion.
    pub(crate) fn sort(&mut self) {
        self.results.sort_by_key(|r| r.seq);
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn results(&self) -> &[PartitionResult] {
        &self.results
    }

    /// Sum of affected rows over successful partitions.
    pub fn total_rows(&self) -> u64 {
        self.results.iter().filter_map(PartitionResult::rows).sum()
    }

    pub fn partitions(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| !r.is_failed()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.is_failed()).count()
    }

    /// Partitions to hand back for a retry.
    pub fn failed_partitions(&self) -> Vec<Partition> {
        self.results
            .iter()
            .filter(|r| r.is_failed())
            .map(|r| r.partition)
            .collect()
    }

    /// Row count of one partition, or `None` if it failed or never ran.
    pub fn rows_for(&self, partition: &Partition) -> Option<u64> {
        self.results
            .iter()
            .find(|r| &r.partition == partition)
            .and_then(PartitionResult::rows)
    }

    pub fn is_complete(&self) -> bool {
        self.failed() == 0
    }
}
