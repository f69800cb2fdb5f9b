/// Protocol-compensation dialect
///
/// The blocking Firebird drivers each have quirks the async adapters must
/// paper over before a higher-level toolkit can use them:
///
/// - Schema changes are only visible to later statements after a commit, and
///   for some drivers only inside a fresh transaction.
/// - Some backends cannot batch an INSERT ... RETURNING, so `executemany` is
///   emulated one parameter set at a time and the returned rows are buffered
///   on the cursor.
/// - Lost connections are reported with backend-specific error codes.
/// - Constraint violations may arrive as generic database errors.
///
/// Which of these apply is decided by [`BridgeConfig`].
use crate::bridge::ExecContext;
use crate::config::{BridgeConfig, DdlFixup, DriverVariant};
use crate::connection::AsyncConnection;
use crate::constants::ROWCOUNT_UNDEFINED;
use crate::cursor::AsyncCursor;
use crate::driver::BlockingConnection;
use crate::error::{Error, Result};
use crate::models::{Params, Row};
use crate::utils::{
    detect_query_type, has_returning_clause, is_integrity_message, is_read_only_query, QueryType,
};

/// Statement facts the dialect branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionInfo {
    pub query_type: QueryType,
    pub is_ddl: bool,
    pub is_insert: bool,
    pub has_returning: bool,
    pub is_read_only: bool,
}

impl ExecutionInfo {
    /// Derive the facts from the statement text.
    pub fn analyze(statement: &str) -> Self {
        let query_type = detect_query_type(statement);
        Self {
            query_type,
            is_ddl: query_type.is_ddl(),
            is_insert: query_type == QueryType::Insert,
            has_returning: has_returning_clause(statement),
            is_read_only: is_read_only_query(statement),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dialect {
    config: BridgeConfig,
}

impl Dialect {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    pub fn for_variant(variant: DriverVariant) -> Self {
        Self::new(BridgeConfig::for_variant(variant))
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn name(&self) -> &'static str {
        self.config.variant.dialect_name()
    }

    /// Whether `error` means the connection to the server is gone.
    ///
    /// Only driver errors of the `DatabaseError` family are considered.
    pub fn is_disconnect(&self, error: &Error) -> bool {
        let Some(e) = error.driver_error() else {
            return false;
        };
        if !e.kind.is_database_error() {
            return false;
        }
        let rules = &self.config.disconnect;
        e.code.is_some_and(|code| rules.codes.contains(&code))
            || rules.messages.iter().any(|m| e.message.contains(m.as_str()))
    }

    /// Reclassify driver errors whose message describes a constraint
    /// violation as [`Error::Integrity`]. Everything else passes through.
    pub fn translate_error(&self, error: Error) -> Error {
        match error {
            Error::Driver(e) if is_integrity_message(&e.message) => Error::Integrity(e),
            other => other,
        }
    }

    /// Execute one statement and apply the post-DDL fixup.
    pub async fn do_execute<C: BlockingConnection>(
        &self,
        cx: &ExecContext,
        conn: &AsyncConnection<C>,
        cursor: &mut AsyncCursor<C::Cursor>,
        statement: &str,
        params: Option<Params>,
        info: &ExecutionInfo,
    ) -> Result<()> {
        cursor
            .execute(cx, statement, params)
            .await
            .map_err(|e| self.translate_error(e))?;

        if info.is_ddl {
            self.fixup_ddl(cx, conn, cursor).await?;
        }
        Ok(())
    }

    async fn fixup_ddl<C: BlockingConnection>(
        &self,
        cx: &ExecContext,
        conn: &AsyncConnection<C>,
        cursor: &mut AsyncCursor<C::Cursor>,
    ) -> Result<()> {
        match self.config.ddl_fixup {
            DdlFixup::None => Ok(()),
            DdlFixup::Commit => {
                tracing::debug!(conn_id = %conn.id(), "committing after DDL");
                conn.commit(cx).await
            }
            DdlFixup::CloseCommitBegin => {
                tracing::debug!(conn_id = %conn.id(), "restarting transaction after DDL");
                if let Err(e) = cursor.close(cx).await {
                    tracing::debug!(
                        conn_id = %conn.id(),
                        error = %e,
                        "ignoring cursor close failure"
                    );
                }
                conn.commit(cx).await?;
                conn.begin(cx).await
            }
        }
    }

    /// Execute one statement for each parameter set.
    ///
    /// With emulation enabled, an INSERT with a RETURNING clause runs once per
    /// parameter set; the returned rows are collected and installed as the
    /// cursor's buffered result.
    pub async fn do_executemany<C: BlockingConnection>(
        &self,
        cx: &ExecContext,
        conn: &AsyncConnection<C>,
        cursor: &mut AsyncCursor<C::Cursor>,
        statement: &str,
        seq_of_params: Vec<Params>,
        info: &ExecutionInfo,
    ) -> Result<()> {
        if !(self.config.emulate_executemany_returning && info.is_insert && info.has_returning) {
            return cursor
                .executemany(cx, statement, seq_of_params)
                .await
                .map_err(|e| self.translate_error(e));
        }

        let mut rows: Vec<Row> = Vec::new();
        let mut description = None;
        let mut rowcount = ROWCOUNT_UNDEFINED;
        let batches = seq_of_params.len();

        for params in seq_of_params {
            cursor
                .execute(cx, statement, Some(params))
                .await
                .map_err(|e| self.translate_error(e))?;
            let affected = cursor.rowcount()?;
            rows.extend(cursor.fetchall(cx).await?);
            if description.is_none() {
                description = cursor.description()?;
            }
            if affected >= 0 {
                rowcount = rowcount.max(0) + affected;
            }
        }

        tracing::debug!(
            conn_id = %conn.id(),
            batches,
            rows = rows.len(),
            "emulated executemany with RETURNING"
        );
        cursor.set_buffered_rows(rows, description, Some(rowcount));
        Ok(())
    }
}
