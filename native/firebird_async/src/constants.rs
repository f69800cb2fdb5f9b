/// Global constants and process-wide services for firebird_async
///
/// This module holds all static configuration: disconnect classification
/// defaults, statement keywords, the runtime that drives the embedded libsql
/// driver, and the default zombie registry.
use once_cell::sync::Lazy;
use std::sync::Arc;
use tokio::runtime::Runtime;

use crate::registry::ZombieRegistry;

/// Row count reported when the number of affected rows is not known.
pub const ROWCOUNT_UNDEFINED: i64 = -1;

/// Default `fetchmany` batch size (DBAPI `arraysize`).
pub const DEFAULT_ARRAYSIZE: usize = 1;

/// Firebird GDS codes meaning the connection is gone:
/// `isc_net_read_err`, `isc_net_write_err` and `isc_net_connect_err`.
pub const DEFAULT_DISCONNECT_CODES: [i64; 3] = [335546001, 335546003, 335546005];

/// Message fragments that indicate a lost connection.
pub const DEFAULT_DISCONNECT_MESSAGES: [&str; 1] = ["Error writing data to the connection"];

/// Statement prefixes for which the backend's row count is not trusted.
pub const READ_ONLY_KEYWORDS: [&str; 2] = ["SELECT", "WITH"];

/// Words that, combined with "violation", mark an integrity error.
pub const INTEGRITY_MARKERS: [&str; 4] = ["primary", "unique", "foreign", "constraint"];

/// Thread name for dedicated connect pools.
pub const WORKER_THREAD_NAME: &str = "fb-async-worker";

/// Timeout for establishing an embedded libsql connection (in seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Global Tokio runtime that drives the embedded libsql driver's futures.
///
/// IMPORTANT: This panics if Tokio runtime creation fails, which can only happen in
/// extremely rare circumstances (e.g., system has no available threads).
///
/// If you see "Failed to initialize Tokio runtime" panics, check:
/// - System has available threads
/// - Ulimit settings (-u) are not too restrictive
/// - System memory is available
#[allow(clippy::expect_used)]
pub static TOKIO_RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    Runtime::new()
        .expect("Failed to initialize Tokio runtime - check system resources and thread limits")
});

/// Process-wide zombie registry used when no registry is injected.
pub static ZOMBIE_REGISTRY: Lazy<Arc<ZombieRegistry>> =
    Lazy::new(|| Arc::new(ZombieRegistry::new()));
