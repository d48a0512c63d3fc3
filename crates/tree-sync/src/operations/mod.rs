//! Diff-and-apply operations.
//!
//! Each operation is a single set-based statement over the original table,
//! the staging table and one partition predicate. Operations keep no state
//! between calls; everything they need is rendered from [`SyncStatements`].

mod statements;

pub use statements::SyncStatements;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The mutating operations of a sync run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Remove original rows whose location vanished from staging.
    Delete,
    /// Add bare rows for ids only present in staging.
    Insert,
    /// Copy synchronized columns from staging for matching ids.
    Update,
    /// Remove placeholder rows.
    Prune,
}

impl Operation {
    /// Order in which a run applies the operations.
    pub const SEQUENCE: [Operation; 4] = [
        Operation::Delete,
        Operation::Insert,
        Operation::Update,
        Operation::Prune,
    ];

    /// Past-tense label used in log lines ("Deleted: 3 records ...").
    pub fn label(&self) -> &'static str {
        match self {
            Operation::Delete => "Deleted",
            Operation::Insert => "Inserted",
            Operation::Update => "Updated",
            Operation::Prune => "Pruned",
        }
    }

    /// Prune is always one full-table pass.
    pub fn is_partitioned(&self) -> bool {
        !matches!(self, Operation::Prune)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Delete => "delete",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Prune => "prune",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_order() {
        assert_eq!(
            Operation::SEQUENCE,
            [
                Operation::Delete,
                Operation::Insert,
                Operation::Update,
                Operation::Prune
            ]
        );
    }

    #[test]
    fn test_only_prune_is_unpartitioned() {
        let unpartitioned: Vec<_> = Operation::SEQUENCE
            .iter()
            .filter(|op| !op.is_partitioned())
            .collect();
        assert_eq!(unpartitioned, vec![&Operation::Prune]);
    }

    #[test]
    fn test_labels() {
        assert_eq!(Operation::Delete.label(), "Deleted");
        assert_eq!(Operation::Prune.to_string(), "prune");
    }
}
