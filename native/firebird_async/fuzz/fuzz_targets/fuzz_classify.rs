#![no_main]
//! Fuzz test for the statement classifiers
//!
//! Row-count normalization and the dialect's DDL and RETURNING handling all
//! branch on these functions, so they must accept any input without panicking.

use firebird_async::{
    detect_query_type, has_returning_clause, is_read_only_query, should_use_query, ExecutionInfo,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(sql) = std::str::from_utf8(data) {
        let _ = detect_query_type(sql);
        let _ = should_use_query(sql);
        let _ = has_returning_clause(sql);

        // A read-only statement is never DDL.
        let info = ExecutionInfo::analyze(sql);
        if is_read_only_query(sql) {
            assert!(!info.is_ddl);
        }
    }
});
