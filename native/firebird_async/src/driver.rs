/// The blocking driver surface
///
/// These traits are the contract a synchronous, call-and-return database
/// client has to satisfy so the async adapters can drive it. They mirror the
/// DBAPI shape: a driver opens connections, a connection opens cursors, a
/// cursor executes statements and hands back rows.
///
/// Every method may block. The adapters guarantee that a handle is used by
/// one owner at a time, so implementations need no internal locking.
use crate::constants::{DEFAULT_ARRAYSIZE, ROWCOUNT_UNDEFINED};
use crate::error::DriverError;
use crate::models::{ColumnDescription, Params, Row};

pub type DriverResult<T> = std::result::Result<T, DriverError>;

pub trait BlockingDriver: Send + Sync + 'static {
    /// Connection arguments.
    type Params: Send + 'static;
    type Connection: BlockingConnection;

    fn connect(&self, params: Self::Params) -> DriverResult<Self::Connection>;

    fn paramstyle(&self) -> &'static str {
        "qmark"
    }

    fn apilevel(&self) -> &'static str {
        "2.0"
    }

    fn threadsafety(&self) -> u8 {
        1
    }
}

pub trait BlockingConnection: Send + 'static {
    type Cursor: BlockingCursor;

    fn cursor(&mut self) -> DriverResult<Self::Cursor>;

    /// Start a new transaction explicitly. Drivers with implicit
    /// transactions can leave this as a no-op.
    fn begin(&mut self) -> DriverResult<()> {
        Ok(())
    }

    fn commit(&mut self) -> DriverResult<()>;

    fn rollback(&mut self) -> DriverResult<()>;

    fn close(&mut self) -> DriverResult<()>;

    /// Forced, non-graceful close.
    fn terminate(&mut self) -> DriverResult<()> {
        self.close()
    }
}

pub trait BlockingCursor: Send + 'static {
    fn execute(&mut self, statement: &str, params: Option<Params>) -> DriverResult<()>;

    fn executemany(&mut self, statement: &str, seq_of_params: Vec<Params>) -> DriverResult<()>;

    fn fetchone(&mut self) -> DriverResult<Option<Row>>;

    /// `None` means the cursor's own `arraysize`.
    fn fetchmany(&mut self, size: Option<usize>) -> DriverResult<Vec<Row>>;

    fn fetchall(&mut self) -> DriverResult<Vec<Row>>;

    fn close(&mut self) -> DriverResult<()>;

    /// Advance to the next result set. `None` when the driver has no
    /// multiple result sets.
    fn nextset(&mut self) -> DriverResult<Option<bool>> {
        Ok(None)
    }

    fn description(&self) -> Option<Vec<ColumnDescription>>;

    fn rowcount(&self) -> i64 {
        ROWCOUNT_UNDEFINED
    }

    fn arraysize(&self) -> usize {
        DEFAULT_ARRAYSIZE
    }
}
