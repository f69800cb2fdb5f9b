/// Async connection over a blocking driver connection
///
/// This module handles the connection side of the adapter: opening cursors,
/// transaction control, and teardown. Every operation is routed through the
/// suspension bridge; close and terminate share one idempotent,
/// shutdown-safe teardown path.
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::bridge::{Bridge, ExecContext, SchedulerLoop};
use crate::cursor::{close_is_unsafe, executor_gone, AsyncCursor, CursorOptions};
use crate::driver::BlockingConnection;
use crate::error::{Error, Result};
use crate::models::{HandleKind, HandleState};
use crate::registry::ZombieRegistry;
use crate::utils::safe_lock_arc;

pub struct AsyncConnection<C: BlockingConnection> {
    id: Uuid,
    conn: Option<Arc<Mutex<C>>>,
    bridge: Bridge,
    scheduler: Option<SchedulerLoop>,
    registry: Arc<ZombieRegistry>,
    cursor_options: CursorOptions,
    state: HandleState,
}

impl<C: BlockingConnection> AsyncConnection<C> {
    /// Wrap an established blocking connection.
    ///
    /// `bridge` may carry a dedicated worker pool; the connection then owns it
    /// and shuts it down on close.
    pub fn new(
        conn: C,
        bridge: Bridge,
        scheduler: Option<SchedulerLoop>,
        registry: Arc<ZombieRegistry>,
        cursor_options: CursorOptions,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            conn: Some(Arc::new(Mutex::new(conn))),
            bridge,
            scheduler,
            registry,
            cursor_options,
            state: HandleState::Open,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    pub fn scheduler(&self) -> Option<&SchedulerLoop> {
        self.scheduler.as_ref()
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    async fn call<F, R>(&self, cx: &ExecContext, f: F) -> Result<R>
    where
        F: FnOnce(&mut C) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let handle = self.conn.clone().ok_or(Error::Closed("connection"))?;
        self.bridge
            .run(cx, move || {
                let mut conn = safe_lock_arc(&handle, "AsyncConnection call")?;
                f(&mut *conn)
            })
            .await
    }

    /// Open a cursor on the blocking connection and wrap it.
    pub async fn cursor(&self, cx: &ExecContext) -> Result<AsyncCursor<C::Cursor>> {
        let cursor = self.call(cx, |conn| Ok(conn.cursor()?)).await?;
        Ok(AsyncCursor::new(
            cursor,
            self.bridge.clone(),
            self.scheduler.clone(),
            Arc::clone(&self.registry),
            self.cursor_options,
        ))
    }

    pub async fn begin(&self, cx: &ExecContext) -> Result<()> {
        self.call(cx, |conn| Ok(conn.begin()?)).await
    }

    pub async fn commit(&self, cx: &ExecContext) -> Result<()> {
        self.call(cx, |conn| Ok(conn.commit()?)).await
    }

    pub async fn rollback(&self, cx: &ExecContext) -> Result<()> {
        self.call(cx, |conn| Ok(conn.rollback()?)).await
    }

    /// Close the connection. Idempotent.
    pub async fn close(&mut self, cx: &ExecContext) -> Result<()> {
        self.teardown(cx, false).await
    }

    /// Forced close, used by pools to discard a connection.
    pub async fn terminate(&mut self, cx: &ExecContext) -> Result<()> {
        self.teardown(cx, true).await
    }

    async fn teardown(&mut self, cx: &ExecContext, force: bool) -> Result<()> {
        let Some(handle) = self.conn.take() else {
            return Ok(());
        };
        self.state = HandleState::Closing;

        let result = if close_is_unsafe(&self.registry, self.scheduler.as_ref(), cx) {
            self.registry.park(HandleKind::Connection, self.id, handle);
            self.state = HandleState::Zombie;
            Ok(())
        } else {
            tracing::debug!(conn_id = %self.id, force, "closing connection");
            let retained = Arc::clone(&handle);
            let result = self
                .bridge
                .run(cx, move || {
                    let mut conn = safe_lock_arc(&handle, "AsyncConnection close")?;
                    if force {
                        Ok(conn.terminate()?)
                    } else {
                        Ok(conn.close()?)
                    }
                })
                .await;
            if executor_gone(&result, cx) {
                self.registry.park(HandleKind::Connection, self.id, retained);
                self.state = HandleState::Zombie;
                Ok(())
            } else {
                self.state = HandleState::Closed;
                result
            }
        };

        if let Some(pool) = self.bridge.executor() {
            pool.shutdown();
        }
        result
    }
}

impl<C: BlockingConnection> Drop for AsyncConnection<C> {
    // Same policy as an unsafe close: park the handle, release the pool.
    fn drop(&mut self) {
        if let Some(handle) = self.conn.take() {
            self.registry.park(HandleKind::Connection, self.id, handle);
        }
        if let Some(pool) = self.bridge.executor() {
            pool.shutdown();
        }
    }
}
