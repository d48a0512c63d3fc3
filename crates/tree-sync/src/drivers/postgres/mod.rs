//! PostgreSQL driver.
//!
//! - [`PgProvider`]: deadpool-backed [`ConnectionProvider`](crate::core::ConnectionProvider)

mod provider;

pub use provider::{PgConnection, PgProvider};
