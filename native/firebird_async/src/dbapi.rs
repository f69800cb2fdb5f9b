/// Async driver facade
///
/// Wraps a blocking driver module and hands out [`AsyncConnection`]s. The
/// facade reports the blocking driver's DBAPI metadata unchanged and decides,
/// per configuration, whether a connection gets its own one-worker pool.
use std::sync::Arc;

use crate::bridge::{Bridge, ExecContext, WorkerPool};
use crate::config::BridgeConfig;
use crate::connection::AsyncConnection;
use crate::constants::WORKER_THREAD_NAME;
use crate::driver::{BlockingDriver, DriverResult};
use crate::error::Result;
use crate::registry::ZombieRegistry;

pub struct AsyncDriver<D: BlockingDriver> {
    driver: Arc<D>,
    registry: Arc<ZombieRegistry>,
    config: BridgeConfig,
}

impl<D: BlockingDriver> AsyncDriver<D> {
    /// Facade with the default configuration and the process-wide registry.
    pub fn new(driver: D) -> Self {
        Self {
            driver: Arc::new(driver),
            registry: ZombieRegistry::global(),
            config: BridgeConfig::default(),
        }
    }

    pub fn with_registry(mut self, registry: Arc<ZombieRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ZombieRegistry> {
        &self.registry
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn paramstyle(&self) -> &'static str {
        self.driver.paramstyle()
    }

    pub fn apilevel(&self) -> &'static str {
        self.driver.apilevel()
    }

    pub fn threadsafety(&self) -> u8 {
        self.driver.threadsafety()
    }

    /// Open a connection with the blocking driver's own `connect`.
    pub async fn connect(
        &self,
        cx: &ExecContext,
        params: D::Params,
    ) -> Result<AsyncConnection<D::Connection>> {
        let driver = Arc::clone(&self.driver);
        self.connect_with(cx, params, move |params| driver.connect(params))
            .await
    }

    /// Open a connection with `creator` in place of the driver's `connect`.
    ///
    /// In a cooperative context the call is bridged, through a dedicated
    /// one-worker pool when the configuration asks for one. That pool stays
    /// with the connection for all later calls and is shut down on close,
    /// or right away if the connect fails.
    pub async fn connect_with<F>(
        &self,
        cx: &ExecContext,
        params: D::Params,
        creator: F,
    ) -> Result<AsyncConnection<D::Connection>>
    where
        F: FnOnce(D::Params) -> DriverResult<D::Connection> + Send + 'static,
    {
        let pool = if cx.is_cooperative() && self.config.dedicated_connect_pool {
            Some(Arc::new(WorkerPool::new(1, WORKER_THREAD_NAME)?))
        } else {
            None
        };
        self.open(cx, params, creator, pool).await
    }

    /// Connect through `pool` (or the shared pool when `None`). The new
    /// connection takes ownership of the pool; a failed connect shuts it
    /// down before returning.
    pub(crate) async fn open<F>(
        &self,
        cx: &ExecContext,
        params: D::Params,
        creator: F,
        pool: Option<Arc<WorkerPool>>,
    ) -> Result<AsyncConnection<D::Connection>>
    where
        F: FnOnce(D::Params) -> DriverResult<D::Connection> + Send + 'static,
    {
        let bridge = pool.map_or_else(Bridge::shared, Bridge::with_executor);

        let connected = bridge
            .run(cx, move || creator(params).map_err(Into::into))
            .await;

        let conn = match connected {
            Ok(conn) => conn,
            Err(e) => {
                if let Some(pool) = bridge.executor() {
                    pool.shutdown();
                }
                tracing::debug!(error = %e, "connect failed");
                return Err(e);
            }
        };

        let conn = AsyncConnection::new(
            conn,
            bridge,
            cx.scheduler().cloned(),
            Arc::clone(&self.registry),
            self.config.cursor_options(),
        );
        tracing::debug!(
            conn_id = %conn.id(),
            dialect = self.config.variant.dialect_name(),
            dedicated = conn.bridge().executor().is_some(),
            "connection opened"
        );
        Ok(conn)
    }
}
