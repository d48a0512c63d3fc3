//! Shared setup for database integration tests.
//!
//! Tests run only when `TREE_SYNC_TEST_DATABASE_URL` points at a PostgreSQL
//! instance (URL or key=value form). Each test gets its own schema, dropped
//! on cleanup. The `geom` column is created as `text` so PostGIS is not
//! required.

#![allow(dead_code)]

use std::sync::Arc;

use tokio_postgres::{Client, NoTls};
use tree_sync::config::{SyncConfig, TargetConfig};
use tree_sync::drivers::SslMode;
use tree_sync::{Config, Orchestrator, PgProvider};

pub const DATABASE_URL_ENV: &str = "TREE_SYNC_TEST_DATABASE_URL";

/// Connect or return from the test when no database is configured.
macro_rules! db_or_skip {
    () => {
        match common::TestDb::connect().await {
            Some(db) => db,
            None => {
                eprintln!("skipping: {} not set", common::DATABASE_URL_ENV);
                return;
            }
        }
    };
}

/// A tree row as the tests seed it.
pub struct Tree<'a> {
    pub id: &'a str,
    pub standortnr: &'a str,
    pub year: Option<&'a str>,
    pub species: &'a str,
}

pub const fn tree<'a>(
    id: &'a str,
    standortnr: &'a str,
    year: Option<&'a str>,
    species: &'a str,
) -> Tree<'a> {
    Tree {
        id,
        standortnr,
        year,
        species,
    }
}

pub struct TestDb {
    pub client: Client,
    pub schema: String,
    pg_config: tokio_postgres::Config,
}

impl TestDb {
    pub async fn connect() -> Option<Self> {
        let url = std::env::var(DATABASE_URL_ENV).ok()?;
        let pg_config: tokio_postgres::Config = url.parse().expect("invalid database url");
        let (client, connection) = pg_config.connect(NoTls).await.expect("connect");
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                eprintln!("test connection error: {}", e);
            }
        });

        let schema = format!("tree_sync_test_{}", uuid::Uuid::new_v4().simple());
        client
            .batch_execute(&format!("CREATE SCHEMA \"{}\"", schema))
            .await
            .expect("create schema");

        Some(Self {
            client,
            schema,
            pg_config,
        })
    }

    /// Config for this test's schema.
    pub fn config(&self) -> Config {
        let mut sync = SyncConfig {
            workers: Some(3),
            ..SyncConfig::default()
        };
        if let Some(geom) = sync.columns.columns.iter_mut().find(|c| c.name == "geom") {
            geom.pg_type = "text".to_string();
        }
        Config {
            target: TargetConfig {
                host: "localhost".to_string(),
                port: 5432,
                database: "test".to_string(),
                user: "test".to_string(),
                password: String::new(),
                schema: self.schema.clone(),
                ssl_mode: "disable".to_string(),
            },
            sync,
        }
    }

    pub fn orchestrator(&self, config: Config) -> Orchestrator {
        let provider = self.provider(config.sync.get_max_connections());
        Orchestrator::with_provider(config, Arc::new(provider)).expect("orchestrator")
    }

    /// Unconnected pool over the test database.
    pub fn provider(&self, max_conns: usize) -> PgProvider {
        PgProvider::from_pg_config(
            self.pg_config.clone(),
            SslMode::Disable,
            max_conns,
            "test database",
        )
        .expect("provider")
    }

    pub fn table(&self, name: &str) -> String {
        format!("\"{}\".\"{}\"", self.schema, name)
    }

    /// Staging table: synchronized columns only, planting year as text.
    pub async fn create_staging(&self) {
        let sql = format!(
            "CREATE TABLE {} (
                id text, lat text, lng text, artdtsch text, artbot text,
                gattungdeutsch text, gattung text, standortnr text, strname text,
                pflanzjahr text, stammumfg text, kronedurch text, baumhoehe text,
                bezirk text, geom text, aend_dat timestamp
            )",
            self.table("trees_tmp")
        );
        self.client.batch_execute(&sql).await.expect("create staging");
    }

    pub async fn seed_staging(&self, trees: &[Tree<'_>]) {
        let sql = format!(
            "INSERT INTO {} (id, standortnr, pflanzjahr, artdtsch, strname) \
             VALUES ($1, $2, $3, $4, $5)",
            self.table("trees_tmp")
        );
        for t in trees {
            let street = format!("Street {}", t.id);
            self.client
                .execute(sql.as_str(), &[&t.id, &t.standortnr, &t.year, &t.species, &street])
                .await
                .expect("seed staging");
        }
    }

    /// Requires the original table (run `ensure_schema` first).
    pub async fn seed_original(&self, trees: &[Tree<'_>]) {
        let sql = format!(
            "INSERT INTO {} (id, standortnr, pflanzjahr, artdtsch, strname) \
             VALUES ($1, $2, $3, $4, 'old street')",
            self.table("trees")
        );
        for t in trees {
            let year: Option<i32> = t.year.and_then(|y| y.parse().ok());
            self.client
                .execute(sql.as_str(), &[&t.id, &t.standortnr, &year, &t.species])
                .await
                .expect("seed original");
        }
    }

    pub async fn count(&self, sql: &str) -> i64 {
        let sql = sql
            .replace("{trees}", &self.table("trees"))
            .replace("{staging}", &self.table("trees_tmp"));
        self.client
            .query_one(sql.as_str(), &[])
            .await
            .expect("count")
            .get(0)
    }

    pub async fn text(&self, id: &str, column: &str) -> Option<String> {
        let sql = format!(
            "SELECT \"{}\"::text FROM {} WHERE id = $1",
            column,
            self.table("trees")
        );
        self.client
            .query_one(sql.as_str(), &[&id])
            .await
            .expect("select")
            .get(0)
    }

    pub async fn exists(&self, id: &str) -> bool {
        let sql = format!("SELECT count(*) FROM {} WHERE id = $1", self.table("trees"));
        let n: i64 = self
            .client
            .query_one(sql.as_str(), &[&id])
            .await
            .expect("exists")
            .get(0);
        n > 0
    }

    pub async fn cleanup(self) {
        self.client
            .batch_execute(&format!("DROP SCHEMA \"{}\" CASCADE", self.schema))
            .await
            .expect("drop schema");
    }
}
