//! Connection abstractions used by the executor.
//!
//! - [`ConnectionProvider`]: hands out one exclusive connection per worker
//! - [`SyncConnection`]: runs one statement in its own committed transaction
//!
//! Workers never close over global connection state; the provider is injected
//! into the executor and every task acquires its own connection from it.

use async_trait::async_trait;

use crate::core::statement::Statement;
use crate::error::Result;

/// Supplies connections to the target store.
///
/// Implementations must be `Send + Sync` so the provider can be shared by all
/// workers of a stage. Connections themselves are never shared.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Acquire an exclusive connection for one worker.
    async fn acquire(&self) -> Result<Box<dyn SyncConnection>>;

    /// Upper bound on connections this provider will open at once.
    fn max_connections(&self) -> usize;

    /// Short description for logs (host/database).
    fn describe(&self) -> String;

    /// Check the store is reachable.
    async fn ping(&self) -> Result<()> {
        let mut conn = self.acquire().await?;
        conn.query_count(&Statement::new("SELECT 1::int8")).await?;
        Ok(())
    }

    /// Stop handing out connections.
    fn close(&self) {}
}

/// One exclusive connection.
#[async_trait]
pub trait SyncConnection: Send {
    /// Run a statement inside its own transaction, commit, and return the
    /// number of affected rows.
    ///
    /// A connection whose statement failed must not go back into a pool.
    async fn execute(&mut self, statement: &Statement) -> Result<u64>;

    /// Run a query returning a single `bigint` and return it.
    async fn query_count(&mut self, statement: &Statement) -> Result<i64>;
}
