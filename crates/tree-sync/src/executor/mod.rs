//! Parallel execution of one operation across partitions.
//!
//! Every partition runs as its own tokio task, gated by a semaphore sized to
//! the worker count. Each task acquires its own connection from the injected
//! [`ConnectionProvider`], runs exactly one statement and reports a typed
//! [`PartitionOutcome`]. Failures stay failures; they are never folded into a
//! zero count.

mod report;

pub use report::{OperationReport, PartitionOutcome, PartitionResult};

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::core::{ConnectionProvider, Partition, Statement};
use crate::operations::Operation;

/// Called once per operation with the aggregate row count.
pub type ProgressCallback = Arc<dyn Fn(Operation, u64) + Send + Sync>;

/// Runs one operation's statements with bounded parallelism.
pub struct ParallelExecutor {
    provider: Arc<dyn ConnectionProvider>,
    workers: usize,
}

impl ParallelExecutor {
    pub fn new(provider: Arc<dyn ConnectionProvider>, workers: usize) -> Self {
        Self {
            provider,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Execute `jobs` (one statement per partition) and reduce the outcomes.
    ///
    /// The worker pool lives for this call only; it is fully drained before
    /// returning. No retries happen here.
    pub async fn execute(
        &self,
        op: Operation,
        jobs: Vec<(Partition, Statement)>,
        callback: Option<&ProgressCallback>,
    ) -> OperationReport {
        let total_jobs = jobs.len();
        debug!(
            "{}: running {} partition(s) with {} worker(s)",
            op, total_jobs, self.workers
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut pending = FuturesUnordered::new();

        for (seq, (partition, statement)) in jobs.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let provider = self.provider.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| format!("worker pool closed: {}", e))?;
                run_partition(provider.as_ref(), &statement).await
            });
            pending.push(async move { (seq, partition, handle.await) });
        }

        let mut report = OperationReport::new(op);
        while let Some((seq, partition, joined)) = pending.next().await {
            let outcome = match joined {
                Ok(Ok(rows)) => {
                    info!("{}", partition_line(op, rows, &partition));
                    PartitionOutcome::Applied { rows }
                }
                Ok(Err(reason)) => {
                    error!("{} failed in {}: {}", op, partition, reason);
                    PartitionOutcome::Failed { reason }
                }
                Err(e) => {
                    error!("{} task panicked in {}: {}", op, partition, e);
                    PartitionOutcome::Failed {
                        reason: format!("task panicked: {}", e),
                    }
                }
            };
            report.record(seq, partition, outcome);
        }
        report.sort();

        if let Some(cb) = callback {
            cb(op, report.total_rows());
        }
        report
    }
}

/// Acquire a connection and run one statement.
///
/// Errors are flattened into one line of text; the connection is dropped
/// (and discarded by the provider if the statement failed) before returning.
async fn run_partition(
    provider: &dyn ConnectionProvider,
    statement: &Statement,
) -> std::result::Result<u64, String> {
    let mut conn = provider
        .acquire()
        .await
        .map_err(|e| e.chain_message())?;
    conn.execute(statement)
        .await
        .map_err(|e| e.chain_message())
}

/// `Deleted: 3 records in range (1990, 2000]`
fn partition_line(op: Operation, rows: u64, partition: &Partition) -> String {
    match partition {
        Partition::All => format!("{}: {} records", op.label(), rows),
        p => format!("{}: {} records in {}", op.label(), rows, p),
    }
}
