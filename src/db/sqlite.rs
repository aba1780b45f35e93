//! SQLite driver (`sqlite3`) backed by rusqlite.
//!
//! A handle owns a single `rusqlite::Connection`. Placeholders may be `?`,
//! `?N` or `$N`; numbered placeholders bind the N-th script argument no matter
//! where they first appear in the statement.

use std::time::Duration;

use rusqlite::types::{Value, ValueRef};
use rusqlite::{Batch, Connection, ErrorCode, OpenFlags, Statement};
use tracing::{debug, trace};

use super::backend::{DriverConnection, DriverFactory};
use super::codec::{decode_cell, BindParameter, ColumnKind, ExecSummary, NativeCell, ResultSet};
use super::config::{ConnectOptions, SqliteTarget};
use super::value::{format_timestamp, ScriptValue};
use super::DbError;

pub const DRIVER_NAME: &str = "sqlite3";

/// Factory registered as `sqlite3`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl DriverFactory for SqliteDriver {
    fn connect(&self, dsn: &str, options: &ConnectOptions) -> Result<Box<dyn DriverConnection>, DbError> {
        let target = SqliteTarget::from_dsn(dsn)?;
        let conn = match &target {
            SqliteTarget::Memory => Connection::open_in_memory(),
            SqliteTarget::Uri(uri) => Connection::open_with_flags(uri, OpenFlags::default() | OpenFlags::SQLITE_OPEN_URI),
            SqliteTarget::Path(path) => Connection::open(path),
        }
        .map_err(open_error)?;

        if let Some(timeout) = options.timeout() {
            conn.busy_timeout(timeout).map_err(open_error)?;
        }
        if let Some(pool_size) = options.pool_size {
            debug!(pool_size, "sqlite3 uses a single connection per handle; poolSize ignored");
        }

        debug!(target = ?target, "opened sqlite3 connection");
        Ok(Box::new(SqliteConnection {
            conn,
            timeout: options.timeout(),
        }))
    }
}

fn open_error(e: rusqlite::Error) -> DbError {
    DbError::ConnectionOpen {
        driver: DRIVER_NAME.to_string(),
        message: e.to_string(),
    }
}

/// One open SQLite database.
pub struct SqliteConnection {
    conn: Connection,
    timeout: Option<Duration>,
}

impl SqliteConnection {
    fn prepare<'c>(&'c self, sql: &str, params: &[BindParameter]) -> Result<Statement<'c>, DbError> {
        let mut stmt = self.conn.prepare(sql).map_err(|e| self.statement_error(sql, e))?;
        bind_all(&mut stmt, params).map_err(|e| self.statement_error(sql, e))?;
        Ok(stmt)
    }

    /// Busy waits that ran out become timeouts; everything else is a statement failure.
    fn statement_error(&self, sql: &str, e: rusqlite::Error) -> DbError {
        if e.sqlite_error_code() == Some(ErrorCode::DatabaseBusy) {
            return DbError::ConnectionTimeout {
                message: match self.timeout {
                    Some(t) => format!("database is locked (waited {} ms)", t.as_millis()),
                    None => "database is locked".to_string(),
                },
            };
        }
        match e {
            // The Display form of this variant embeds the statement text.
            rusqlite::Error::SqlInputError { msg, offset, .. } => DbError::StatementExecution {
                sql_len: sql.len(),
                message: format!("{} at offset {}", msg, offset),
            },
            other => DbError::statement(sql, other),
        }
    }

    /// Whether `sql` holds more than one statement. A tail that fails to
    /// prepare still counts: it may need an earlier statement to run first.
    fn has_trailing_statement(&self, sql: &str) -> bool {
        let mut batch = Batch::new(&self.conn, sql);
        match batch.next() {
            Ok(Some(_)) => !matches!(batch.next(), Ok(None)),
            _ => false,
        }
    }

    fn total_changes(&self, sql: &str) -> Result<u64, DbError> {
        self.conn
            .query_row("SELECT total_changes()", [], |row| row.get::<_, i64>(0))
            .map(|n| n.max(0) as u64)
            .map_err(|e| self.statement_error(sql, e))
    }

    /// Run one prepared statement to completion, draining any rows it returns
    /// (`INSERT ... RETURNING` and friends).
    fn run_to_completion(&self, sql: &str, stmt: &mut Statement<'_>) -> Result<ExecSummary, DbError> {
        let before = self.total_changes(sql)?;
        if stmt.column_count() == 0 {
            stmt.raw_execute().map_err(|e| self.statement_error(sql, e))?;
        } else {
            let mut rows = stmt.raw_query();
            while rows.next().map_err(|e| self.statement_error(sql, e))?.is_some() {}
        }
        let rows_affected = self.total_changes(sql)?.saturating_sub(before);

        let inserted = stmt.expanded_sql().is_some_and(|text| is_insert(&text)) && self.conn.changes() > 0;
        Ok(ExecSummary {
            rows_affected,
            last_insert_id: inserted.then(|| self.conn.last_insert_rowid()),
        })
    }

    /// Several `;`-separated statements without parameters. Each statement is
    /// prepared only after the previous one ran, so later statements may use
    /// tables created by earlier ones.
    fn execute_batch(&self, sql: &str) -> Result<ExecSummary, DbError> {
        let mut summary = ExecSummary {
            rows_affected: 0,
            last_insert_id: None,
        };
        let mut batch = Batch::new(&self.conn, sql);
        while let Some(mut stmt) = batch.next().map_err(|e| self.statement_error(sql, e))? {
            let step = self.run_to_completion(sql, &mut stmt)?;
            summary.rows_affected += step.rows_affected;
            summary.last_insert_id = step.last_insert_id.or(summary.last_insert_id);
        }
        Ok(summary)
    }
}

impl DriverConnection for SqliteConnection {
    fn driver_name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn execute(&mut self, sql: &str, params: &[BindParameter]) -> Result<ExecSummary, DbError> {
        trace!(sql, "sqlite3 exec");
        if self.has_trailing_statement(sql) {
            if !params.is_empty() {
                return Err(DbError::StatementExecution {
                    sql_len: sql.len(),
                    message: "parameters cannot be bound to several statements at once".to_string(),
                });
            }
            return self.execute_batch(sql);
        }

        let mut stmt = self.prepare(sql, params)?;
        self.run_to_completion(sql, &mut stmt)
    }

    fn query(&mut self, sql: &str, params: &[BindParameter]) -> Result<ResultSet, DbError> {
        trace!(sql, "sqlite3 query");
        if self.has_trailing_statement(sql) {
            return Err(DbError::StatementExecution {
                sql_len: sql.len(),
                message: "query accepts a single statement".to_string(),
            });
        }
        let mut stmt = self.prepare(sql, params)?;

        let columns: Vec<(String, ColumnKind)> = stmt
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), ColumnKind::from_declared(c.decl_type())))
            .collect();
        let mut result = ResultSet::new(columns.iter().map(|(name, _)| name.clone()).collect());

        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next().map_err(|e| self.statement_error(sql, e))? {
            let mut values = Vec::with_capacity(columns.len());
            for (idx, (name, kind)) in columns.iter().enumerate() {
                let value = row.get_ref(idx).map_err(|e| DbError::ResultDecoding {
                    column: name.clone(),
                    message: e.to_string(),
                })?;
                values.push(decode_cell(name, *kind, native_cell(name, value)?)?);
            }
            result.push_row(values);
        }

        Ok(result)
    }

    fn close(self: Box<Self>) -> Result<(), DbError> {
        self.conn.close().map_err(|(_, e)| DbError::StatementExecution {
            sql_len: 0,
            message: format!("failed to close sqlite3 connection: {}", e),
        })
    }
}

/// Bind every placeholder of `stmt` from `params`.
///
/// The statement's placeholder count must equal the number of arguments.
fn bind_all(stmt: &mut Statement<'_>, params: &[BindParameter]) -> rusqlite::Result<()> {
    let expected = stmt.parameter_count();
    if expected != params.len() {
        return Err(rusqlite::Error::InvalidParameterCount(params.len(), expected));
    }

    for slot in 1..=expected {
        let source = stmt
            .parameter_name(slot)
            .and_then(numbered_placeholder)
            .unwrap_or(slot);
        let param = params
            .get(source.wrapping_sub(1))
            .ok_or(rusqlite::Error::InvalidParameterCount(params.len(), source))?;
        stmt.raw_bind_parameter(slot, to_sqlite(&param.value))?;
    }
    Ok(())
}

/// `$3` or `?3` → 3. Named placeholders (`:name`, `@name`) have no number.
fn numbered_placeholder(name: &str) -> Option<usize> {
    name.strip_prefix('$')
        .or_else(|| name.strip_prefix('?'))
        .and_then(|n| n.parse().ok())
        .filter(|n| *n > 0)
}

/// First keyword of a statement, skipping leading whitespace and comments.
fn leading_keyword(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        rest = rest.trim_start();
        if let Some(line) = rest.strip_prefix("--") {
            rest = line.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(block) = rest.strip_prefix("/*") {
            rest = block.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            break;
        }
    }
    let end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    &rest[..end]
}

/// INSERT and REPLACE are the statements that assign a new rowid.
fn is_insert(sql: &str) -> bool {
    let keyword = leading_keyword(sql);
    keyword.eq_ignore_ascii_case("insert") || keyword.eq_ignore_ascii_case("replace")
}

fn to_sqlite(value: &ScriptValue) -> Value {
    match value {
        ScriptValue::Null => Value::Null,
        ScriptValue::Bool(b) => Value::Integer(i64::from(*b)),
        ScriptValue::Int(i) => Value::Integer(*i),
        ScriptValue::Float(f) => Value::Real(*f),
        ScriptValue::String(s) => Value::Text(s.clone()),
        ScriptValue::Bytes(b) => Value::Blob(b.clone()),
        ScriptValue::DateTime(dt) => Value::Text(format_timestamp(dt)),
    }
}

fn native_cell(column: &str, value: ValueRef<'_>) -> Result<NativeCell, DbError> {
    Ok(match value {
        ValueRef::Null => NativeCell::Null,
        ValueRef::Integer(i) => NativeCell::Integer(i),
        ValueRef::Real(f) => NativeCell::Real(f),
        ValueRef::Text(t) => {
            let text = std::str::from_utf8(t).map_err(|e| DbError::ResultDecoding {
                column: column.to_string(),
                message: format!("text is not valid UTF-8: {}", e),
            })?;
            NativeCell::Text(text.to_string())
        }
        ValueRef::Blob(b) => NativeCell::Blob(b.to_vec()),
    })
}
