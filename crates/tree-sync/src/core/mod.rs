//! Core abstractions of the synchronization engine.
//!
//! - [`identifier`]: identifier validation, quoting and the table allow-list
//! - [`partition`]: planting-year range partitioning
//! - [`schema`]: the column mapping table
//! - [`statement`]: parameterized SQL statements
//! - [`traits`]: connection provider and connection traits
//!
//! Driver modules (`drivers/postgres`) implement the traits; the executor and
//! orchestrator depend only on what is defined here, which lets them be
//! tested with in-memory providers.

pub mod identifier;
pub mod partition;
pub mod schema;
pub mod statement;
pub mod traits;

pub use identifier::{qualify_pg, quote_pg, validate_identifier, QualifiedTable, TableAllowList};
pub use partition::{Partition, RangePartitioner};
pub use schema::{ColumnCast, ColumnMap, ColumnRole, ColumnSpec};
pub use statement::{SqlParam, Statement, StatementBuilder};
pub use traits::{ConnectionProvider, SyncConnection};
