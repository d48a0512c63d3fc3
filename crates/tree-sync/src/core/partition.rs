//! Planting-year range partitioning.
//!
//! A run splits the record universe into disjoint buckets so each parallel
//! task touches a bounded subset of rows:
//!
//! - `(-inf, start]`, `(start, start + w]`, ..., `(last, +inf)` over years
//! - one bucket for rows whose year is NULL or not parseable
//! - a single [`Partition::All`] sentinel when partitioning is disabled
//!
//! The buckets are jointly exhaustive over every integer, so the same row is
//! classified into exactly one bucket no matter which table it sits in.
//! Predicates are rendered as SQL filters and evaluated against the live
//! tables; nothing is cached in-process.

use crate::config::PartitionConfig;
use crate::core::statement::StatementBuilder;
use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest digit run accepted as a year; keeps `::integer` from overflowing.
const MAX_YEAR_DIGITS: usize = 9;

/// One disjoint slice of the planting-year domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Partition {
    /// Years in `(lower, upper]`; `None` leaves that side unbounded.
    Range {
        lower: Option<i32>,
        upper: Option<i32>,
    },
    /// Year is NULL or not parseable.
    UnknownYear,
    /// Every row; used only when partitioning is disabled.
    All,
}

impl Partition {
    /// Render this partition as a boolean SQL filter over `year_expr`.
    ///
    /// `year_expr` must evaluate to an integer or NULL (see [`year_expression`]).
    pub fn render_predicate(&self, year_expr: &str, builder: &mut StatementBuilder) -> String {
        match self {
            Partition::All => "TRUE".to_string(),
            Partition::UnknownYear => format!("{} IS NULL", year_expr),
            Partition::Range { lower, upper } => {
                let mut parts = Vec::with_capacity(2);
                if let Some(l) = lower {
                    parts.push(format!("{} > {}", year_expr, builder.bind_int(*l)));
                }
                if let Some(u) = upper {
                    parts.push(format!("{} <= {}", year_expr, builder.bind_int(*u)));
                }
                if parts.is_empty() {
                    format!("{} IS NOT NULL", year_expr)
                } else {
                    format!("({})", parts.join(" AND "))
                }
            }
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Range { lower, upper } => {
                let lo = lower.map_or_else(|| "-inf".to_string(), |l| l.to_string());
                match upper {
                    Some(u) => write!(f, "range ({}, {}]", lo, u),
                    None => write!(f, "range ({}, +inf)", lo),
                }
            }
            Partition::UnknownYear => write!(f, "unknown year"),
            Partition::All => write!(f, "all records"),
        }
    }
}

/// SQL expression yielding a column's planting year as integer, or NULL.
///
/// Works on both text and integer columns. Values that are not 1 to 9 ASCII
/// digits map to NULL and therefore to [`Partition::UnknownYear`].
pub fn year_expression(column: &str) -> String {
    format!(
        "(CASE WHEN {col}::text ~ '^[0-9]{{1,{max}}}$' THEN {col}::text::integer END)",
        col = column,
        max = MAX_YEAR_DIGITS
    )
}

/// Splits the planting-year domain into partitions.
#[derive(Debug, Clone)]
pub struct RangePartitioner {
    enabled: bool,
    start: i32,
    end: i32,
    width: i32,
}

impl RangePartitioner {
    pub fn new(config: &PartitionConfig) -> Self {
        Self {
            enabled: config.enabled,
            start: config.start_year,
            end: config.end_year,
            width: config.bucket_width,
        }
    }

    /// Produce the ordered partition list for one run.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NoPartitions` if partitioning is enabled but the
    /// configured domain yields no ranges.
    pub fn partitions(&self) -> Result<Vec<Partition>> {
        if !self.enabled {
            return Ok(vec![Partition::All]);
        }
        if self.width <= 0 {
            return Err(SyncError::NoPartitions(format!(
                "bucket width must be positive, got {}",
                self.width
            )));
        }
        if self.end < self.start {
            return Err(SyncError::NoPartitions(format!(
                "end year {} is before start year {}",
                self.end, self.start
            )));
        }

        let mut edges = vec![self.start];
        let mut edge = self.start;
        while edge < self.end {
            edge = edge.checked_add(self.width).ok_or_else(|| {
                SyncError::NoPartitions(format!("year range overflows at {}", edge))
            })?;
            edges.push(edge);
        }

        let mut partitions = Vec::with_capacity(edges.len() + 2);
        partitions.push(Partition::Range {
            lower: None,
            upper: Some(edges[0]),
        });
        for pair in edges.windows(2) {
            partitions.push(Partition::Range {
                lower: Some(pair[0]),
                upper: Some(pair[1]),
            });
        }
        partitions.push(Partition::Range {
            lower: edges.last().copied(),
            upper: None,
        });
        partitions.push(Partition::UnknownYear);
        Ok(partitions)
    }
}
