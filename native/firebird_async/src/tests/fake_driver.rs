//! Scripted blocking driver for deterministic adapter tests
//!
//! Every call is recorded together with the name and id of the thread it ran
//! on. Errors, rows and row counts are injected through [`Script`].

// Allow unwrap() in tests for cleaner test code
#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use crate::driver::{BlockingConnection, BlockingCursor, BlockingDriver, DriverResult};
use crate::error::DriverError;
use crate::models::{ColumnDescription, Params, Row, Value};
use crate::utils::has_returning_clause;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Connect,
    Cursor,
    Begin,
    Commit,
    Rollback,
    Close,
    Terminate,
    Execute(String, Option<Params>),
    ExecuteMany(String, usize),
    FetchOne,
    FetchMany(Option<usize>),
    FetchAll,
    NextSet,
    CursorClose,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<(Call, ThreadId, Option<String>)>,
    execute_errors: VecDeque<DriverError>,
    connect_error: Option<DriverError>,
    commit_error: Option<DriverError>,
    cursor_close_error: Option<DriverError>,
    rows: Vec<Row>,
    rowcount: i64,
    next_id: i64,
    panic_on_execute: bool,
}

/// Shared script and call log.
#[derive(Debug, Default)]
pub struct Script {
    state: Mutex<State>,
}

impl Script {
    pub fn new() -> Arc<Self> {
        let script = Self::default();
        script.state.lock().unwrap().rowcount = -1;
        Arc::new(script)
    }

    fn record(&self, call: Call) {
        let current = std::thread::current();
        self.state.lock().unwrap().calls.push((
            call,
            current.id(),
            current.name().map(str::to_string),
        ));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|(c, _, _)| c.clone())
            .collect()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    /// Thread id of the last recorded call.
    pub fn last_thread(&self) -> ThreadId {
        self.state.lock().unwrap().calls.last().unwrap().1
    }

    /// Thread name of the last recorded call.
    pub fn last_thread_name(&self) -> Option<String> {
        self.state.lock().unwrap().calls.last().unwrap().2.clone()
    }

    pub fn fail_next_execute(&self, error: DriverError) {
        self.state.lock().unwrap().execute_errors.push_back(error);
    }

    pub fn fail_connect(&self, error: DriverError) {
        self.state.lock().unwrap().connect_error = Some(error);
    }

    pub fn fail_commit(&self, error: DriverError) {
        self.state.lock().unwrap().commit_error = Some(error);
    }

    pub fn fail_cursor_close(&self, error: DriverError) {
        self.state.lock().unwrap().cursor_close_error = Some(error);
    }

    pub fn panic_on_execute(&self) {
        self.state.lock().unwrap().panic_on_execute = true;
    }

    /// Rows returned by statements without a RETURNING clause.
    pub fn set_rows(&self, rows: Vec<Row>) {
        self.state.lock().unwrap().rows = rows;
    }

    /// Row count reported after every execution.
    pub fn set_rowcount(&self, rowcount: i64) {
        self.state.lock().unwrap().rowcount = rowcount;
    }
}

pub struct FakeDriver {
    pub script: Arc<Script>,
}

impl FakeDriver {
    pub fn new(script: &Arc<Script>) -> Self {
        Self {
            script: Arc::clone(script),
        }
    }
}

impl BlockingDriver for FakeDriver {
    type Params = ();
    type Connection = FakeConnection;

    fn connect(&self, _params: ()) -> DriverResult<FakeConnection> {
        self.script.record(Call::Connect);
        if let Some(e) = self.script.state.lock().unwrap().connect_error.take() {
            return Err(e);
        }
        Ok(FakeConnection::new(&self.script))
    }

    fn paramstyle(&self) -> &'static str {
        "qmark"
    }
}

pub struct FakeConnection {
    script: Arc<Script>,
}

impl FakeConnection {
    pub fn new(script: &Arc<Script>) -> Self {
        Self {
            script: Arc::clone(script),
        }
    }
}

impl BlockingConnection for FakeConnection {
    type Cursor = FakeCursor;

    fn cursor(&mut self) -> DriverResult<FakeCursor> {
        self.script.record(Call::Cursor);
        Ok(FakeCursor {
            script: Arc::clone(&self.script),
            rows: Vec::new(),
            position: 0,
            description: None,
            rowcount: -1,
        })
    }

    fn begin(&mut self) -> DriverResult<()> {
        self.script.record(Call::Begin);
        Ok(())
    }

    fn commit(&mut self) -> DriverResult<()> {
        self.script.record(Call::Commit);
        match self.script.state.lock().unwrap().commit_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn rollback(&mut self) -> DriverResult<()> {
        self.script.record(Call::Rollback);
        Ok(())
    }

    fn close(&mut self) -> DriverResult<()> {
        self.script.record(Call::Close);
        Ok(())
    }

    fn terminate(&mut self) -> DriverResult<()> {
        self.script.record(Call::Terminate);
        Ok(())
    }
}

pub struct FakeCursor {
    script: Arc<Script>,
    rows: Vec<Row>,
    position: usize,
    description: Option<Vec<ColumnDescription>>,
    rowcount: i64,
}

impl BlockingCursor for FakeCursor {
    /// Statements with RETURNING produce one row holding the next generated
    /// id; everything else returns the scripted rows.
    fn execute(&mut self, statement: &str, params: Option<Params>) -> DriverResult<()> {
        self.script
            .record(Call::Execute(statement.to_string(), params.clone()));
        let mut state = self.script.state.lock().unwrap();
        if state.panic_on_execute {
            drop(state);
            panic!("driver panicked");
        }
        if let Some(e) = state.execute_errors.pop_front() {
            return Err(e);
        }

        self.position = 0;
        if has_returning_clause(statement) {
            state.next_id += 1;
            self.rows = vec![vec![Value::Integer(state.next_id)]];
            self.description = Some(vec![ColumnDescription::new("id").with_type("INTEGER")]);
            self.rowcount = 1;
        } else {
            self.rows = state.rows.clone();
            self.description = if self.rows.is_empty() {
                None
            } else {
                Some(vec![ColumnDescription::new("value")])
            };
            self.rowcount = state.rowcount;
        }
        Ok(())
    }

    fn executemany(&mut self, statement: &str, seq_of_params: Vec<Params>) -> DriverResult<()> {
        self.script
            .record(Call::ExecuteMany(statement.to_string(), seq_of_params.len()));
        let state = self.script.state.lock().unwrap();
        self.rows.clear();
        self.position = 0;
        self.rowcount = state.rowcount;
        Ok(())
    }

    fn fetchone(&mut self) -> DriverResult<Option<Row>> {
        self.script.record(Call::FetchOne);
        let row = self.rows.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }

    fn fetchmany(&mut self, size: Option<usize>) -> DriverResult<Vec<Row>> {
        self.script.record(Call::FetchMany(size));
        let size = size.unwrap_or(1);
        let end = (self.position + size).min(self.rows.len());
        let rows = self.rows[self.position..end].to_vec();
        self.position = end;
        Ok(rows)
    }

    fn fetchall(&mut self) -> DriverResult<Vec<Row>> {
        self.script.record(Call::FetchAll);
        let rows = self.rows[self.position..].to_vec();
        self.position = self.rows.len();
        Ok(rows)
    }

    fn close(&mut self) -> DriverResult<()> {
        self.script.record(Call::CursorClose);
        match self.script.state.lock().unwrap().cursor_close_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn nextset(&mut self) -> DriverResult<Option<bool>> {
        self.script.record(Call::NextSet);
        Ok(Some(false))
    }

    fn description(&self) -> Option<Vec<ColumnDescription>> {
        self.description.clone()
    }

    fn rowcount(&self) -> i64 {
        self.rowcount
    }

    fn arraysize(&self) -> usize {
        2
    }
}
