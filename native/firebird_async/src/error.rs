/// Error types for the async adapter layer
///
/// Blocking drivers report failures as [`DriverError`], tagged with the DBAPI
/// exception class they belong to. Everything the adapters return is an
/// [`Error`], which either carries a driver error through unchanged or
/// describes a failure of the bridging layer itself.
use std::fmt;

/// DBAPI exception classes a blocking driver can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Warning,
    Error,
    Interface,
    Database,
    Data,
    Operational,
    Integrity,
    Internal,
    Programming,
    NotSupported,
}

impl ErrorKind {
    /// Whether this class is `DatabaseError` or one of its subclasses.
    pub fn is_database_error(self) -> bool {
        matches!(
            self,
            ErrorKind::Database
                | ErrorKind::Data
                | ErrorKind::Operational
                | ErrorKind::Integrity
                | ErrorKind::Internal
                | ErrorKind::Programming
                | ErrorKind::NotSupported
        )
    }

    /// DBAPI class name, e.g. `OperationalError`.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Warning => "Warning",
            ErrorKind::Error => "Error",
            ErrorKind::Interface => "InterfaceError",
            ErrorKind::Database => "DatabaseError",
            ErrorKind::Data => "DataError",
            ErrorKind::Operational => "OperationalError",
            ErrorKind::Integrity => "IntegrityError",
            ErrorKind::Internal => "InternalError",
            ErrorKind::Programming => "ProgrammingError",
            ErrorKind::NotSupported => "NotSupportedError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An error raised by the blocking driver.
///
/// `code` is the backend-specific error-code slot (Firebird GDS codes such as
/// `335546001`); disconnect classification looks at it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct DriverError {
    pub kind: ErrorKind,
    pub message: String,
    pub code: Option<i64>,
    pub sqlstate: Option<String>,
}

impl DriverError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            sqlstate: None,
        }
    }

    pub fn interface(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Interface, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    pub fn operational(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Operational, message)
    }

    pub fn programming(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Programming, message)
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_sqlstate(mut self, sqlstate: impl Into<String>) -> Self {
        self.sqlstate = Some(sqlstate.into());
        self
    }
}

/// Errors returned by the async adapters.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A driver error, passed through unchanged.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// A driver error reclassified as an integrity-constraint violation.
    #[error("integrity constraint violated: {0}")]
    Integrity(DriverError),

    #[error("{0} is closed")]
    Closed(&'static str),

    /// The dedicated worker pool was shut down before the call was submitted.
    #[error("worker pool has been shut down")]
    ExecutorShutdown,

    #[error("failed to start worker pool: {0}")]
    Executor(#[source] std::io::Error),

    /// The worker task was dropped before it produced a result.
    #[error("blocking call was cancelled before completion")]
    Cancelled,

    #[error("no scheduler loop is running on this thread")]
    NoScheduler,

    #[error("mutex poisoned in {0}")]
    Poisoned(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The underlying driver error, if this error came from the driver.
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            Error::Driver(e) | Error::Integrity(e) => Some(e),
            _ => None,
        }
    }

    /// True for reclassified integrity errors and for driver errors the
    /// driver itself tagged as `IntegrityError`.
    pub fn is_integrity(&self) -> bool {
        match self {
            Error::Integrity(_) => true,
            Error::Driver(e) => e.kind == ErrorKind::Integrity,
            _ => false,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
