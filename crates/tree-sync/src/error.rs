//! Error types for the synchronization engine.

use thiserror::Error;

/// Main error type for synchronization operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration error (invalid YAML, missing fields, bad identifiers, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or statement error
    #[error("Database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Partitioner produced no partitions to work on
    #[error("No partitions to synchronize: {0}")]
    NoPartitions(String),

    /// Staging table is missing or holds no rows
    #[error("Staging table {table} is unavailable: {reason}")]
    StagingUnavailable { table: String, reason: String },

    /// A stage failed and halted the run
    #[error("Stage {stage} failed: {message}")]
    Stage { stage: String, message: String },

    /// Partitions failed while the failure policy is set to abort
    #[error("{operation} failed for {} partition(s): {}", .partitions.len(), .partitions.join(", "))]
    PartitionsFailed {
        operation: String,
        partitions: Vec<String>,
    },

    /// Health check found the target unreachable
    #[error("Health check failed: {0}")]
    Unhealthy(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        SyncError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Stage error
    pub fn stage(stage: impl ToString, message: impl ToString) -> Self {
        SyncError::Stage {
            stage: stage.to_string(),
            message: message.to_string(),
        }
    }

    /// Process exit code for this error class.
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::Config(_) | SyncError::Yaml(_) => 2,
            SyncError::Pool { .. } => 3,
            SyncError::Target(_) | SyncError::Stage { .. } => 4,
            SyncError::PartitionsFailed { .. } => 5,
            SyncError::NoPartitions(_) | SyncError::StagingUnavailable { .. } => 6,
            SyncError::Unhealthy(_) => 7,
            SyncError::Io(_) | SyncError::Json(_) => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }

    /// Single-line form of the error and its causes, for per-partition reports.
    pub fn chain_message(&self) -> String {
        let mut output = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            output.push_str(": ");
            output.push_str(&err.to_string());
            source = err.source();
        }
        output.replace('\n', " ")
    }
}

/// Result type alias for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;
