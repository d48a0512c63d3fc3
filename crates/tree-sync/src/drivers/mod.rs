//! Database driver implementations of the core traits.
//!
//! - [`postgres`]: PostgreSQL connection provider
//! - [`common`]: Shared utilities (TLS)

pub mod common;
pub mod postgres;

pub use common::{SslMode, TlsBuilder};
pub use postgres::{PgConnection, PgProvider};
