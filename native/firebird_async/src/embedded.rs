/// Blocking driver backed by libsql
///
/// A ready-made [`BlockingDriver`] over local SQLite database files. libsql is
/// async, so every call is driven to completion on the global
/// [`TOKIO_RUNTIME`], which turns it into the call-and-return client the
/// adapters expect.
///
/// Cursors read the whole result of row-returning statements up front and
/// serve fetches from memory.
use libsql::{Builder, Database, Rows};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use crate::constants::{
    DEFAULT_ARRAYSIZE, DEFAULT_CONNECT_TIMEOUT_SECS, ROWCOUNT_UNDEFINED, TOKIO_RUNTIME,
};
use crate::driver::{BlockingConnection, BlockingCursor, BlockingDriver, DriverResult};
use crate::error::{DriverError, ErrorKind};
use crate::models::{ColumnDescription, Params, Row, Value};
use crate::utils::should_use_query;

/// Connection arguments for [`LibsqlDriver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibsqlConfig {
    /// Path to the database file.
    pub database: Option<String>,
    pub connect_timeout_secs: u64,
}

impl Default for LibsqlConfig {
    fn default() -> Self {
        Self {
            database: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl LibsqlConfig {
    pub fn local(database: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            ..Default::default()
        }
    }
}

/// Map a libsql error onto the DBAPI taxonomy.
pub(crate) fn map_libsql_error(e: libsql::Error) -> DriverError {
    let message = e.to_string();
    let kind = if message.contains("constraint failed") {
        ErrorKind::Integrity
    } else if message.contains("syntax error") || message.contains("no such") {
        ErrorKind::Programming
    } else {
        ErrorKind::Operational
    };
    DriverError::new(kind, message)
}

fn lock_client<'a>(
    client: &'a Mutex<libsql::Connection>,
    context: &str,
) -> DriverResult<MutexGuard<'a, libsql::Connection>> {
    client.lock().map_err(|e| {
        DriverError::new(ErrorKind::Internal, format!("mutex poisoned in {context}: {e}"))
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LibsqlDriver;

impl LibsqlDriver {
    pub fn new() -> Self {
        Self
    }
}

impl BlockingDriver for LibsqlDriver {
    type Params = LibsqlConfig;
    type Connection = LibsqlConnection;

    /// Open the database file and connect, bounded by `connect_timeout_secs`.
    fn connect(&self, params: LibsqlConfig) -> DriverResult<LibsqlConnection> {
        let database = params
            .database
            .ok_or_else(|| DriverError::interface("missing connection argument: database"))?;
        let timeout = Duration::from_secs(params.connect_timeout_secs);

        TOKIO_RUNTIME.block_on(async {
            tokio::time::timeout(timeout, async {
                let db = Builder::new_local(database)
                    .build()
                    .await
                    .map_err(map_libsql_error)?;
                let conn = db.connect().map_err(map_libsql_error)?;

                tracing::debug!("libsql connection established");
                Ok::<_, DriverError>(LibsqlConnection {
                    db: Some(db),
                    client: Some(Arc::new(Mutex::new(conn))),
                })
            })
            .await
            .map_err(|_| {
                DriverError::operational(format!(
                    "connection timeout after {} seconds",
                    timeout.as_secs()
                ))
            })?
        })
    }
}

pub struct LibsqlConnection {
    db: Option<Database>,
    client: Option<Arc<Mutex<libsql::Connection>>>,
}

impl LibsqlConnection {
    fn client(&self) -> DriverResult<&Arc<Mutex<libsql::Connection>>> {
        self.client
            .as_ref()
            .ok_or_else(|| DriverError::interface("connection is closed"))
    }

    pub fn is_autocommit(&self) -> DriverResult<bool> {
        let conn = lock_client(self.client()?, "is_autocommit")?;
        Ok(conn.is_autocommit())
    }

    /// Run a transaction-control statement when the autocommit state says
    /// it applies.
    // block_on drives the future on this thread; no other task can contend
    // for the std mutex while it is held across the await.
    #[allow(clippy::await_holding_lock)]
    fn transaction_statement(&mut self, sql: &str, when_autocommit: bool) -> DriverResult<()> {
        let client = Arc::clone(self.client()?);

        TOKIO_RUNTIME.block_on(async {
            let conn = lock_client(&client, sql)?;
            if conn.is_autocommit() != when_autocommit {
                return Ok(());
            }
            conn.execute(sql, ()).await.map_err(map_libsql_error)?;
            Ok(())
        })
    }
}

impl BlockingConnection for LibsqlConnection {
    type Cursor = LibsqlCursor;

    fn cursor(&mut self) -> DriverResult<LibsqlCursor> {
        Ok(LibsqlCursor::new(Arc::downgrade(self.client()?)))
    }

    fn begin(&mut self) -> DriverResult<()> {
        self.transaction_statement("BEGIN", true)
    }

    fn commit(&mut self) -> DriverResult<()> {
        self.transaction_statement("COMMIT", false)
    }

    fn rollback(&mut self) -> DriverResult<()> {
        self.transaction_statement("ROLLBACK", false)
    }

    fn close(&mut self) -> DriverResult<()> {
        self.client = None;
        self.db = None;
        Ok(())
    }

    /// Interrupt whatever the connection is running, then close it.
    fn terminate(&mut self) -> DriverResult<()> {
        if let Some(client) = self.client.clone() {
            let conn = lock_client(&client, "terminate")?;
            if let Err(e) = conn.interrupt() {
                tracing::debug!(error = %e, "interrupt before terminate failed");
            }
        }
        self.close()
    }
}

enum Outcome {
    Rows(Vec<Row>, Vec<ColumnDescription>),
    Affected(u64),
}

/// Cursor over a [`LibsqlConnection`]. Becomes unusable once the connection
/// is closed.
pub struct LibsqlCursor {
    client: Option<Weak<Mutex<libsql::Connection>>>,
    rows: Vec<Row>,
    position: usize,
    description: Option<Vec<ColumnDescription>>,
    rowcount: i64,
    arraysize: usize,
}

impl LibsqlCursor {
    fn new(client: Weak<Mutex<libsql::Connection>>) -> Self {
        Self {
            client: Some(client),
            rows: Vec::new(),
            position: 0,
            description: None,
            rowcount: ROWCOUNT_UNDEFINED,
            arraysize: DEFAULT_ARRAYSIZE,
        }
    }

    fn client(&self) -> DriverResult<Arc<Mutex<libsql::Connection>>> {
        let weak = self
            .client
            .as_ref()
            .ok_or_else(|| DriverError::interface("cursor is closed"))?;
        weak.upgrade()
            .ok_or_else(|| DriverError::interface("connection is closed"))
    }

    fn reset(&mut self) {
        self.rows.clear();
        self.position = 0;
        self.description = None;
        self.rowcount = ROWCOUNT_UNDEFINED;
    }

    #[allow(clippy::await_holding_lock)]
    fn run(&self, statement: &str, params: Params) -> DriverResult<Outcome> {
        let client = self.client()?;
        let params: Vec<libsql::Value> = params.into_iter().map(Into::into).collect();

        TOKIO_RUNTIME.block_on(async {
            let conn = lock_client(&client, "cursor execute")?;
            if should_use_query(statement) {
                let rows = conn
                    .query(statement, params)
                    .await
                    .map_err(map_libsql_error)?;
                collect_rows(rows).await
            } else {
                let affected = conn
                    .execute(statement, params)
                    .await
                    .map_err(map_libsql_error)?;
                Ok(Outcome::Affected(affected))
            }
        })
    }

    fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Rows(rows, description) => {
                self.rowcount = i64::try_from(rows.len()).unwrap_or(i64::MAX);
                self.rows = rows;
                self.description = Some(description);
            }
            Outcome::Affected(n) => {
                self.rowcount = i64::try_from(n).unwrap_or(i64::MAX);
            }
        }
    }

    fn remaining(&self) -> usize {
        self.rows.len().saturating_sub(self.position)
    }
}

async fn collect_rows(mut rows: Rows) -> DriverResult<Outcome> {
    let column_count = rows.column_count().max(0);
    let mut description: Vec<ColumnDescription> = (0..column_count)
        .map(|i| {
            rows.column_name(i)
                .map_or_else(|| ColumnDescription::new(format!("col{i}")), ColumnDescription::new)
        })
        .collect();

    let mut collected = Vec::new();
    while let Some(row) = rows.next().await.map_err(map_libsql_error)? {
        let mut values = Vec::with_capacity(description.len());
        for i in 0..column_count {
            let value: libsql::Value = row.get(i).map_err(|e| {
                DriverError::new(
                    ErrorKind::Data,
                    format!("failed to read column (index {i}): {e}"),
                )
            })?;
            values.push(Value::from(value));
        }
        collected.push(values);
    }

    // Type codes come from the first row's values; libsql does not report
    // declared types for every statement.
    if let Some(first) = collected.first() {
        for (column, value) in description.iter_mut().zip(first) {
            if !value.is_null() {
                column.type_code = Some(value.type_name().to_string());
            }
        }
    }

    Ok(Outcome::Rows(collected, description))
}

impl BlockingCursor for LibsqlCursor {
    fn execute(&mut self, statement: &str, params: Option<Params>) -> DriverResult<()> {
        self.reset();
        let outcome = self.run(statement, params.unwrap_or_default())?;
        self.apply(outcome);
        Ok(())
    }

    /// Runs the statement once per parameter set. The row count is the sum
    /// of the affected rows; rows of the last execution stay fetchable.
    fn executemany(&mut self, statement: &str, seq_of_params: Vec<Params>) -> DriverResult<()> {
        self.reset();
        let mut total: i64 = 0;
        for params in seq_of_params {
            let outcome = self.run(statement, params)?;
            self.rows.clear();
            self.position = 0;
            self.apply(outcome);
            total = total.saturating_add(self.rowcount.max(0));
        }
        self.rowcount = total;
        Ok(())
    }

    fn fetchone(&mut self) -> DriverResult<Option<Row>> {
        self.client()?;
        let row = self.rows.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }

    fn fetchmany(&mut self, size: Option<usize>) -> DriverResult<Vec<Row>> {
        self.client()?;
        let size = size.unwrap_or(self.arraysize).min(self.remaining());
        let start = self.position;
        self.position += size;
        Ok(self.rows[start..self.position].to_vec())
    }

    fn fetchall(&mut self) -> DriverResult<Vec<Row>> {
        self.client()?;
        let start = self.position.min(self.rows.len());
        self.position = self.rows.len();
        Ok(self.rows[start..].to_vec())
    }

    fn close(&mut self) -> DriverResult<()> {
        self.client = None;
        self.reset();
        Ok(())
    }

    fn description(&self) -> Option<Vec<ColumnDescription>> {
        self.description.clone()
    }

    fn rowcount(&self) -> i64 {
        self.rowcount
    }

    fn arraysize(&self) -> usize {
        self.arraysize
    }
}
