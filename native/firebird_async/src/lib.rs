//! `firebird_async`: async adapters over blocking DBAPI-style Firebird drivers
//!
//! This is the root module of the crate. It declares the submodules and
//! re-exports the types callers need:
//!
//! - [`bridge`]: runs blocking calls without stalling a cooperative scheduler
//! - [`cursor`] and [`connection`]: async adapters over driver handles
//! - [`dbapi`]: the driver facade that opens adapted connections
//! - [`dialect`]: per-driver behavioural compensation
//! - [`registry`]: parking for handles that cannot be closed safely
//! - [`embedded`]: a libsql-backed blocking driver
pub mod bridge;
pub mod config;
pub mod connection;
pub mod constants;
pub mod cursor;
pub mod dbapi;
pub mod dialect;
pub mod driver;
pub mod embedded;
pub mod error;
pub mod models;
pub mod registry;
pub mod utils;

// Re-export key types and functions
pub use bridge::{Bridge, ExecContext, SchedulerLoop, WorkerPool};
pub use config::{BridgeConfig, DdlFixup, DisconnectRules, DriverVariant};
pub use connection::AsyncConnection;
pub use cursor::{AsyncCursor, CursorOptions};
pub use dbapi::AsyncDriver;
pub use dialect::{Dialect, ExecutionInfo};
pub use driver::{BlockingConnection, BlockingCursor, BlockingDriver, DriverResult};
pub use embedded::{LibsqlConfig, LibsqlConnection, LibsqlCursor, LibsqlDriver};
pub use error::{DriverError, Error, ErrorKind, Result};
pub use models::*;
pub use registry::{Zombie, ZombieRegistry};
pub use utils::{
    detect_query_type, has_returning_clause, is_read_only_query, should_use_query, QueryType,
};

#[cfg(test)]
mod tests;
