/// Async cursor over a blocking driver cursor.
///
/// This module handles cooperative execution of cursor operations, including:
/// - Executing statements through the suspension bridge
/// - Row-count normalization for read statements and batched writes
/// - Serving fetches from an installed result buffer
/// - Shutdown-safe, idempotent close
///
/// The buffer is installed only by the compensation dialect (see
/// [`crate::dialect`]) when it has to emulate a batched call the backend cannot
/// perform. Once installed, fetches read only from the buffer until the next
/// statement execution discards it.
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::bridge::{Bridge, ExecContext, SchedulerLoop};
use crate::constants::ROWCOUNT_UNDEFINED;
use crate::driver::BlockingCursor;
use crate::error::{Error, Result};
use crate::models::{ColumnDescription, HandleKind, HandleState, Params, Row};
use crate::registry::ZombieRegistry;
use crate::utils::{is_read_only_query, safe_lock_arc};

/// Per-cursor behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorOptions {
    /// Report -1 after read statements and after `executemany`.
    pub normalize_rowcount: bool,
    /// `fetchmany` batch size override; `None` keeps the driver's.
    pub arraysize: Option<usize>,
}

impl Default for CursorOptions {
    fn default() -> Self {
        Self {
            normalize_rowcount: true,
            arraysize: None,
        }
    }
}

/// Result rows held in memory in place of the live cursor.
#[derive(Debug, Clone, Default)]
struct RowBuffer {
    rows: Vec<Row>,
    position: usize,
    description: Option<Vec<ColumnDescription>>,
    rowcount: Option<i64>,
}

impl RowBuffer {
    fn next(&mut self) -> Option<Row> {
        let row = self.rows.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
        }
        row
    }

    fn take(&mut self, size: usize) -> Vec<Row> {
        let start = self.position.min(self.rows.len());
        let end = start.saturating_add(size).min(self.rows.len());
        self.position = end;
        self.rows[start..end].to_vec()
    }

    fn rest(&mut self) -> Vec<Row> {
        let start = self.position.min(self.rows.len());
        self.position = self.rows.len();
        self.rows[start..].to_vec()
    }
}

pub struct AsyncCursor<C: BlockingCursor> {
    id: Uuid,
    cursor: Option<Arc<Mutex<C>>>,
    bridge: Bridge,
    scheduler: Option<SchedulerLoop>,
    registry: Arc<ZombieRegistry>,
    options: CursorOptions,
    buffer: Option<RowBuffer>,
    rowcount: i64,
    arraysize: usize,
    state: HandleState,
}

impl<C: BlockingCursor> AsyncCursor<C> {
    pub(crate) fn new(
        cursor: C,
        bridge: Bridge,
        scheduler: Option<SchedulerLoop>,
        registry: Arc<ZombieRegistry>,
        mut options: CursorOptions,
    ) -> Self {
        options.arraysize = options.arraysize.map(|n| n.max(1));
        let arraysize = options.arraysize.unwrap_or_else(|| cursor.arraysize()).max(1);
        Self {
            id: Uuid::new_v4(),
            cursor: Some(Arc::new(Mutex::new(cursor))),
            bridge,
            scheduler,
            registry,
            options,
            buffer: None,
            rowcount: ROWCOUNT_UNDEFINED,
            arraysize,
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
        self.cursor.is_none()
    }

    fn handle(&self) -> Result<Arc<Mutex<C>>> {
        self.cursor.clone().ok_or(Error::Closed("cursor"))
    }

    /// Run `f` against the blocking cursor through the bridge.
    async fn call<F, R>(&self, cx: &ExecContext, f: F) -> Result<R>
    where
        F: FnOnce(&mut C) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let handle = self.handle()?;
        self.bridge
            .run(cx, move || {
                let mut cursor = safe_lock_arc(&handle, "AsyncCursor call")?;
                f(&mut *cursor)
            })
            .await
    }

    /// Execute one statement.
    ///
    /// With normalization on, read statements report a row count of -1 no
    /// matter what the driver says; writes adopt the driver's count.
    pub async fn execute(
        &mut self,
        cx: &ExecContext,
        statement: &str,
        params: Option<Params>,
    ) -> Result<()> {
        self.buffer = None;
        let sql = statement.to_string();
        let reported = self
            .call(cx, move |cursor| {
                cursor.execute(&sql, params)?;
                Ok(cursor.rowcount())
            })
            .await?;

        self.rowcount = if self.options.normalize_rowcount && is_read_only_query(statement) {
            ROWCOUNT_UNDEFINED
        } else {
            reported
        };
        Ok(())
    }

    /// Execute one statement once per parameter set.
    ///
    /// Backends report unreliable counts for batched execution, so with
    /// normalization on the row count is always -1 afterwards.
    pub async fn executemany(
        &mut self,
        cx: &ExecContext,
        statement: &str,
        seq_of_params: Vec<Params>,
    ) -> Result<()> {
        self.buffer = None;
        let sql = statement.to_string();
        let reported = self
            .call(cx, move |cursor| {
                cursor.executemany(&sql, seq_of_params)?;
                Ok(cursor.rowcount())
            })
            .await?;

        self.rowcount = if self.options.normalize_rowcount {
            ROWCOUNT_UNDEFINED
        } else {
            reported
        };
        Ok(())
    }

    pub async fn fetchone(&mut self, cx: &ExecContext) -> Result<Option<Row>> {
        if let Some(buffer) = self.buffer.as_mut() {
            return Ok(buffer.next());
        }
        self.call(cx, |cursor| Ok(cursor.fetchone()?)).await
    }

    /// Fetch up to `size` rows; `None` means [`AsyncCursor::arraysize`].
    pub async fn fetchmany(&mut self, cx: &ExecContext, size: Option<usize>) -> Result<Vec<Row>> {
        if let Some(buffer) = self.buffer.as_mut() {
            return Ok(buffer.take(size.unwrap_or(self.arraysize)));
        }
        let size = size.or(self.options.arraysize);
        self.call(cx, move |cursor| Ok(cursor.fetchmany(size)?))
            .await
    }

    pub async fn fetchall(&mut self, cx: &ExecContext) -> Result<Vec<Row>> {
        if let Some(buffer) = self.buffer.as_mut() {
            return Ok(buffer.rest());
        }
        self.call(cx, |cursor| Ok(cursor.fetchall()?)).await
    }

    pub async fn nextset(&mut self, cx: &ExecContext) -> Result<Option<bool>> {
        self.call(cx, |cursor| Ok(cursor.nextset()?)).await
    }

    /// Close the cursor. Idempotent.
    ///
    /// If the process is finalizing or the scheduler loop is already closed,
    /// the blocking cursor is parked in the zombie registry instead of being
    /// closed from a thread that may no longer be able to run it. The same
    /// applies when the close cannot be dispatched because the worker pool or
    /// the loop is gone.
    pub async fn close(&mut self, cx: &ExecContext) -> Result<()> {
        let Some(handle) = self.cursor.take() else {
            return Ok(());
        };
        self.state = HandleState::Closing;
        self.buffer = None;

        if close_is_unsafe(&self.registry, self.scheduler.as_ref(), cx) {
            self.registry.park(HandleKind::Cursor, self.id, handle);
            self.state = HandleState::Zombie;
            return Ok(());
        }

        let retained = Arc::clone(&handle);
        let result = self
            .bridge
            .run(cx, move || {
                let mut cursor = safe_lock_arc(&handle, "AsyncCursor close")?;
                Ok(cursor.close()?)
            })
            .await;

        if executor_gone(&result, cx) {
            self.registry.park(HandleKind::Cursor, self.id, retained);
            self.state = HandleState::Zombie;
            return Ok(());
        }
        self.state = HandleState::Closed;
        result
    }

    /// Column description of the current result: the buffered snapshot when
    /// a buffer carries one, otherwise the live cursor's.
    pub fn description(&self) -> Result<Option<Vec<ColumnDescription>>> {
        if let Some(description) = self.buffer.as_ref().and_then(|b| b.description.clone()) {
            return Ok(Some(description));
        }
        let handle = self.handle()?;
        let cursor = safe_lock_arc(&handle, "AsyncCursor description")?;
        Ok(cursor.description())
    }

    pub fn rowcount(&self) -> Result<i64> {
        if let Some(count) = self.buffer.as_ref().and_then(|b| b.rowcount) {
            return Ok(count);
        }
        if self.options.normalize_rowcount {
            return Ok(self.rowcount);
        }
        let handle = self.handle()?;
        let cursor = safe_lock_arc(&handle, "AsyncCursor rowcount")?;
        Ok(cursor.rowcount())
    }

    pub fn arraysize(&self) -> usize {
        self.arraysize
    }

    pub fn set_arraysize(&mut self, size: usize) {
        self.arraysize = size.max(1);
        self.options.arraysize = Some(self.arraysize);
    }

    pub fn is_buffered(&self) -> bool {
        self.buffer.is_some()
    }

    /// Install `rows` as the current result. Replaces any previous buffer and
    /// rewinds to the first row.
    pub(crate) fn set_buffered_rows(
        &mut self,
        rows: Vec<Row>,
        description: Option<Vec<ColumnDescription>>,
        rowcount: Option<i64>,
    ) {
        self.buffer = Some(RowBuffer {
            rows,
            position: 0,
            description,
            rowcount,
        });
    }
}

/// Closing synchronously is unsafe while the process finalizes or once the
/// scheduler loop that owns the handle has shut down.
pub(crate) fn close_is_unsafe(
    registry: &ZombieRegistry,
    owner_loop: Option<&SchedulerLoop>,
    cx: &ExecContext,
) -> bool {
    registry.is_finalizing()
        || owner_loop.is_some_and(SchedulerLoop::is_closed)
        || cx.scheduler().is_some_and(SchedulerLoop::is_closed)
}

/// A bridged close whose worker never ran: the dedicated pool was shut down,
/// or the scheduler loop stopped underneath the call. A stopped loop is
/// recorded so later closes park without trying.
pub(crate) fn executor_gone<T>(result: &Result<T>, cx: &ExecContext) -> bool {
    match result {
        Err(Error::ExecutorShutdown) => true,
        Err(Error::Cancelled) => {
            if let Some(scheduler) = cx.scheduler() {
                scheduler.mark_closed();
            }
            true
        }
        _ => false,
    }
}

impl<C: BlockingCursor> Drop for AsyncCursor<C> {
    // A dropped cursor may be released on a scheduler thread or during
    // finalization, so an unclosed handle is parked rather than closed.
    fn drop(&mut self) {
        if let Some(handle) = self.cursor.take() {
            self.registry.park(HandleKind::Cursor, self.id, handle);
        }
    }
}
