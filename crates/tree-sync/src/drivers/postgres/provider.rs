//! PostgreSQL connection provider.
//!
//! Uses deadpool-postgres for pooling. Every worker gets its own pooled
//! connection and runs its statement in a dedicated transaction that is
//! committed immediately.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod, Status};
use tokio_postgres::{Config as PgConfig, NoTls};
use tracing::{debug, info, warn};

use crate::config::TargetConfig;
use crate::core::statement::Statement;
use crate::core::traits::{ConnectionProvider, SyncConnection};
use crate::drivers::common::{SslMode, TlsBuilder};
use crate::error::{Result, SyncError};

/// Connect timeout for new pool connections.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// deadpool-backed provider for the target database.
pub struct PgProvider {
    pool: Pool,
    max_conns: usize,
    description: String,
}

impl PgProvider {
    /// Create a provider from configuration and verify connectivity.
    pub async fn new(config: &TargetConfig, max_conns: usize) -> Result<Self> {
        let provider = Self::from_target(config, max_conns)?;
        provider.ping().await?;
        info!(
            "Connected to PostgreSQL: {} (pool size {})",
            provider.description, provider.max_conns
        );
        Ok(provider)
    }

    /// Create a provider from configuration without connecting.
    pub fn from_target(config: &TargetConfig, max_conns: usize) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.application_name("tree-sync");
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(POOL_CONNECTION_TIMEOUT);

        let description = format!("{}:{}/{}", config.host, config.port, config.database);
        Self::from_pg_config(
            pg_config,
            SslMode::parse(&config.ssl_mode)?,
            max_conns,
            description,
        )
    }

    /// Create a provider from an already-built `tokio_postgres::Config`.
    ///
    /// Does not open a connection; the first `acquire` does.
    pub fn from_pg_config(
        pg_config: PgConfig,
        ssl_mode: SslMode,
        max_conns: usize,
        description: impl Into<String>,
    ) -> Result<Self> {
        let max_conns = max_conns.max(1);
        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = match TlsBuilder::new(ssl_mode).build()? {
            Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                Manager::from_config(pg_config, NoTls, mgr_config)
            }
        };

        let pool = Pool::builder(mgr)
            .max_size(max_conns)
            .build()
            .map_err(|e| SyncError::pool(e, "creating PostgreSQL pool"))?;

        Ok(Self {
            pool,
            max_conns,
            description: description.into(),
        })
    }

    /// Current pool occupancy. Detached connections are not counted.
    pub fn status(&self) -> Status {
        self.pool.status()
    }
}

#[async_trait]
impl ConnectionProvider for PgProvider {
    async fn acquire(&self) -> Result<Box<dyn SyncConnection>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| SyncError::pool(e, format!("acquiring connection to {}", self.description)))?;
        Ok(Box::new(PgConnection {
            client: Some(client),
            discard: false,
        }))
    }

    fn max_connections(&self) -> usize {
        self.max_conns
    }

    fn describe(&self) -> String {
        self.description.clone()
    }

    /// Outstanding connections are closed when returned.
    fn close(&self) {
        let status = self.status();
        debug!(
            "Closing pool for {}: {} open, {} idle",
            self.description, status.size, status.available
        );
        self.pool.close();
    }
}

/// A pooled connection owned by exactly one worker.
///
/// If a statement fails the connection is detached from the pool on drop
/// and closed, so a connection in an unknown state is never handed to
/// another worker.
pub struct PgConnection {
    client: Option<Object>,
    discard: bool,
}

impl PgConnection {
    fn client(&mut self) -> Result<&mut tokio_postgres::Client> {
        match self.client.as_mut() {
            Some(obj) => {
                let client: &mut tokio_postgres::Client = obj;
                Ok(client)
            }
            None => Err(SyncError::pool(
                "connection already released",
                "using worker connection",
            )),
        }
    }

    async fn run_in_transaction(&mut self, statement: &Statement) -> Result<u64> {
        let client = self.client()?;
        let tx = client.transaction().await?;
        let params = statement.bind();
        let rows = tx.execute(statement.sql(), &params).await?;
        tx.commit().await?;
        Ok(rows)
    }

    async fn run_count(&mut self, statement: &Statement) -> Result<i64> {
        let client = self.client()?;
        let params = statement.bind();
        let row = client.query_one(statement.sql(), &params).await?;
        Ok(row.try_get::<_, i64>(0)?)
    }
}

#[async_trait]
impl SyncConnection for PgConnection {
    async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        let result = self.run_in_transaction(statement).await;
        if result.is_err() {
            self.discard = true;
        }
        result
    }

    async fn query_count(&mut self, statement: &Statement) -> Result<i64> {
        let result = self.run_count(statement).await;
        if result.is_err() {
            self.discard = true;
        }
        result
    }
}

impl Drop for PgConnection {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            if self.discard {
                debug!("Discarding connection after failed statement");
                drop(Object::take(client));
            }
        }
    }
}
