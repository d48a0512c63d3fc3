//! Dry-run planning: every statement a run would execute, without a database.

use serde::Serialize;
use std::fmt;

use crate::config::Config;
use crate::core::{Partition, RangePartitioner, Statement};
use crate::error::Result;
use crate::operations::{Operation, SyncStatements};

use super::SyncStage;

/// One statement of the plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedStatement {
    pub stage: SyncStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition: Option<Partition>,
    pub sql: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,
}

impl PlannedStatement {
    fn new(stage: SyncStage, partition: Option<Partition>, statement: Statement) -> Self {
        Self {
            stage,
            partition,
            sql: statement.sql().to_string(),
            params: statement.params().iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// The ordered statements of a run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncPlan {
    pub original_table: String,
    pub staging_table: String,
    pub workers: usize,
    pub partitions: Vec<Partition>,
    pub statements: Vec<PlannedStatement>,
}

impl SyncPlan {
    pub fn from_config(config: &Config) -> Result<Self> {
        let statements = SyncStatements::from_config(config)?;
        let partitions = RangePartitioner::new(&config.sync.partitioning).partitions()?;

        let mut planned = vec![
            PlannedStatement::new(
                SyncStage::EnsureSchema,
                None,
                statements.create_original_table()?,
            ),
            PlannedStatement::new(SyncStage::Preflight, None, statements.staging_exists()),
            PlannedStatement::new(SyncStage::Preflight, None, statements.staging_row_count()),
        ];

        for op in Operation::SEQUENCE {
            if op == Operation::Prune && statements.prune_rule().is_none() {
                continue;
            }
            let targets: &[Partition] = if op.is_partitioned() {
                &partitions
            } else {
                &[Partition::All]
            };
            for partition in targets {
                planned.push(PlannedStatement::new(
                    op.into(),
                    Some(*partition),
                    statements.statement(op, partition)?,
                ));
            }
        }

        Ok(Self {
            original_table: statements.original().to_string(),
            staging_table: statements.staging().to_string(),
            workers: config.sync.get_workers(),
            partitions,
            statements: planned,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for SyncPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "-- sync {} -> {} ({} partition(s), {} worker(s))",
            self.staging_table,
            self.original_table,
            self.partitions.len(),
            self.workers
        )?;
        for st in &self.statements {
            writeln!(f)?;
            match &st.partition {
                Some(p) => writeln!(f, "-- {}: {}", st.stage, p)?,
                None => writeln!(f, "-- {}", st.stage)?,
            }
            writeln!(f, "{};", st.sql)?;
            if !st.params.is_empty() {
                let params: Vec<String> = st
                    .params
                    .iter()
                    .enumerate()
                    .map(|(i, p)| format!("${} = {}", i + 1, p))
                    .collect();
                writeln!(f, "-- params: {}", params.join(", "))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SyncConfig, TargetConfig};

    fn config() -> Config {
        Config {
            target: TargetConfig {
                host: "localhost".into(),
                port: 5432,
                database: "trees".into(),
                user: "postgres".into(),
                password: String::new(),
                schema: "public".into(),
                ssl_mode: "disable".into(),
            },
            sync: SyncConfig {
                workers: Some(3),
                ..SyncConfig::default()
            },
        }
    }

    #[test]
    fn test_plan_orders_stages() {
        let mut cfg = config();
        cfg.sync.partitioning.start_year = 1990;
        cfg.sync.partitioning.end_year = 2010;
        let plan = SyncPlan::from_config(&cfg).unwrap();

        // (-inf,1990] (1990,2000] (2000,2010] (2010,+inf) unknown
        assert_eq!(plan.partitions.len(), 5);
        let stages: Vec<SyncStage> = plan.statements.iter().map(|s| s.stage).collect();
        assert_eq!(stages[0], SyncStage::EnsureSchema);
        assert_eq!(stages.iter().filter(|s| **s == SyncStage::Delete).count(), 5);
        assert_eq!(stages.iter().filter(|s| **s == SyncStage::Prune).count(), 1);
        assert_eq!(*stages.last().unwrap(), SyncStage::Prune);

        let first_insert = stages.iter().position(|s| *s == SyncStage::Insert).unwrap();
        let last_delete = stages.iter().rposition(|s| *s == SyncStage::Delete).unwrap();
        assert!(last_delete < first_insert);
    }

    #[test]
    fn test_plan_without_partitioning_or_prune() {
        let mut cfg = config();
        cfg.sync.partitioning.enabled = false;
        cfg.sync.prune = None;
        let plan = SyncPlan::from_config(&cfg).unwrap();
        assert_eq!(plan.partitions, vec![Partition::All]);
        // ensure_schema + 2 preflight + delete/insert/update
        assert_eq!(plan.statements.len(), 6);
        assert!(plan.statements.iter().all(|s| s.stage != SyncStage::Prune));
    }

    #[test]
    fn test_plan_renders_text_and_json() {
        let plan = SyncPlan::from_config(&config()).unwrap();
        let text = plan.to_string();
        assert!(text.starts_with("-- sync public.trees_tmp -> public.trees"));
        assert!(text.contains("-- delete: unknown year"));
        assert!(text.contains("-- params: $1 = 'osm_'"));

        let json: serde_json::Value = serde_json::from_str(&plan.to_json().unwrap()).unwrap();
        assert_eq!(json["workers"], 3);
        assert_eq!(json["statements"][0]["stage"], "ensure_schema");
    }
}
