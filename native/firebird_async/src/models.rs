//! Data structures shared by the blocking driver surface and the async adapters
//!
//! This module defines the value and row model passed across the bridge, the
//! DBAPI column description, and the lifecycle state of adapter handles.

/// A single SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// SQL type name of the value, used as a fallback `type_code`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INTEGER",
            Value::Real(_) => "REAL",
            Value::Text(_) => "TEXT",
            Value::Blob(_) => "BLOB",
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<libsql::Value> for Value {
    fn from(v: libsql::Value) -> Self {
        match v {
            libsql::Value::Null => Value::Null,
            libsql::Value::Integer(i) => Value::Integer(i),
            libsql::Value::Real(f) => Value::Real(f),
            libsql::Value::Text(s) => Value::Text(s),
            libsql::Value::Blob(b) => Value::Blob(b),
        }
    }
}

impl From<Value> for libsql::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => libsql::Value::Null,
            Value::Integer(i) => libsql::Value::Integer(i),
            Value::Real(f) => libsql::Value::Real(f),
            Value::Text(s) => libsql::Value::Text(s),
            Value::Blob(b) => libsql::Value::Blob(b),
        }
    }
}

/// One result row.
pub type Row = Vec<Value>;

/// Positional statement parameters.
pub type Params = Vec<Value>;

/// DBAPI column description (the 7-item `cursor.description` entry).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDescription {
    pub name: String,
    pub type_code: Option<String>,
    pub display_size: Option<i64>,
    pub internal_size: Option<i64>,
    pub precision: Option<i64>,
    pub scale: Option<i64>,
    pub null_ok: Option<bool>,
}

impl ColumnDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, type_code: impl Into<String>) -> Self {
        self.type_code = Some(type_code.into());
        self
    }
}

/// Lifecycle of an adapter handle.
///
/// `Open` is re-entrant for all statement operations. `Closing` lasts for one
/// close call. `Zombie` is terminal like `Closed`, but the blocking handle was
/// parked in the zombie registry instead of being released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Open,
    Closing,
    Closed,
    Zombie,
}

impl HandleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, HandleState::Closed | HandleState::Zombie)
    }
}

/// Kind of handle held in the zombie registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Connection,
    Cursor,
}
