/// Utility functions and helpers for firebird_async
///
/// This module provides commonly used helper functions for locking and for
/// classifying SQL statements by their text.
use std::sync::{Arc, Mutex, MutexGuard};

use crate::constants::{INTEGRITY_MARKERS, READ_ONLY_KEYWORDS};
use crate::error::Error;

/// Safely lock a mutex with proper error handling
///
/// Returns a descriptive error if the mutex is poisoned.
pub fn safe_lock<'a, T>(mutex: &'a Mutex<T>, context: &str) -> Result<MutexGuard<'a, T>, Error> {
    mutex
        .lock()
        .map_err(|e| Error::Poisoned(format!("{context}: {e}")))
}

/// Safely lock an Arc<Mutex<T>> with proper error handling
///
/// Returns a descriptive error if the mutex is poisoned.
pub fn safe_lock_arc<'a, T>(
    arc_mutex: &'a Arc<Mutex<T>>,
    context: &str,
) -> Result<MutexGuard<'a, T>, Error> {
    arc_mutex
        .lock()
        .map_err(|e| Error::Poisoned(format!("{context}: {e}")))
}

/// Query type enumeration for dispatching statements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    With,
    Insert,
    Update,
    Delete,
    Create,
    Recreate,
    Drop,
    Alter,
    Begin,
    Commit,
    Rollback,
    Other,
}

impl QueryType {
    /// Schema-definition statements.
    pub fn is_ddl(self) -> bool {
        matches!(
            self,
            QueryType::Create | QueryType::Recreate | QueryType::Drop | QueryType::Alter
        )
    }
}

/// Detect the query type from a SQL statement
///
/// Examines the first keyword to categorize the statement.
pub fn detect_query_type(query: &str) -> QueryType {
    let trimmed = query.trim_start();
    let keyword = trimmed
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_uppercase();

    match keyword.as_str() {
        "SELECT" => QueryType::Select,
        "WITH" => QueryType::With,
        "INSERT" => QueryType::Insert,
        "UPDATE" => QueryType::Update,
        "DELETE" => QueryType::Delete,
        "CREATE" => QueryType::Create,
        "RECREATE" => QueryType::Recreate,
        "DROP" => QueryType::Drop,
        "ALTER" => QueryType::Alter,
        "BEGIN" => QueryType::Begin,
        "COMMIT" => QueryType::Commit,
        "ROLLBACK" => QueryType::Rollback,
        _ => QueryType::Other,
    }
}

/// Case-insensitive check that `sql`, after leading whitespace, starts with
/// `keyword` followed by whitespace, `(` or the end of the string.
///
/// Zero allocations; compares ASCII bytes directly.
#[inline]
pub fn starts_with_keyword(sql: &str, keyword: &str) -> bool {
    let bytes = sql.trim_start().as_bytes();
    let kw = keyword.as_bytes();

    if bytes.len() < kw.len() || !bytes[..kw.len()].eq_ignore_ascii_case(kw) {
        return false;
    }

    match bytes.get(kw.len()) {
        None => true,
        Some(b) => b.is_ascii_whitespace() || *b == b'(',
    }
}

/// True when the statement starts with a read-only query keyword
/// (`SELECT` or `WITH`, case-insensitive, leading whitespace ignored).
#[inline]
pub fn is_read_only_query(sql: &str) -> bool {
    READ_ONLY_KEYWORDS
        .iter()
        .any(|kw| starts_with_keyword(sql, kw))
}

/// True when the statement contains a `RETURNING` clause.
///
/// ## Limitation: String and Comment Handling
///
/// This performs simple keyword matching and does not parse SQL syntax.
/// It will match keywords appearing in string literals or comments.
#[inline]
pub fn has_returning_clause(sql: &str) -> bool {
    let bytes = sql.as_bytes();
    let target = b"RETURNING";
    let len = bytes.len();

    if len < target.len() {
        return false;
    }

    let mut i = 0;
    while i <= len - target.len() {
        // Only check if preceded by whitespace or it's at the start
        if (i == 0 || bytes[i - 1].is_ascii_whitespace())
            && bytes[i..i + target.len()].eq_ignore_ascii_case(target)
            && (i + target.len() >= len || bytes[i + target.len()].is_ascii_whitespace())
        {
            return true;
        }
        i += 1;
    }

    false
}

/// Determines if a statement produces rows
///
/// Returns true for row-returning statements (SELECT, WITH, PRAGMA, EXPLAIN,
/// VALUES) or when a RETURNING clause is present.
///
/// **Why false positives are acceptable**: reading rows from a statement that
/// has none is safe; treating a row-returning statement as a plain write would
/// lose its rows.
#[inline]
pub fn should_use_query(sql: &str) -> bool {
    if sql.trim().is_empty() {
        return false;
    }

    ["SELECT", "WITH", "PRAGMA", "EXPLAIN", "VALUES"]
        .iter()
        .any(|kw| starts_with_keyword(sql, kw))
        || has_returning_clause(sql)
}

/// True when an error message reads like a constraint violation:
/// "violation" together with primary/unique/foreign/constraint.
pub fn is_integrity_message(message: &str) -> bool {
    let msg = message.to_lowercase();
    msg.contains("violation") && INTEGRITY_MARKERS.iter().any(|m| msg.contains(m))
}
