//! PostgreSQL driver (`postgres`).
//!
//! A handle owns one client. `open` parses the DSN (URL or key/value form)
//! and connects immediately so bad credentials or an unreachable server fail
//! at open time. A handle never runs two statements at once, so `poolSize`
//! is accepted and ignored.
//!
//! Placeholders are PostgreSQL's native `$1`, `$2`, ... The server infers each
//! parameter's type and `PgParam` serializes the script value for it.

mod conversion;
mod session;

use postgres::types::ToSql;
use postgres::{Config, NoTls};
use tracing::{debug, trace};

use super::backend::{DriverConnection, DriverFactory};
use super::codec::{decode_cell, BindParameter, ExecSummary, ResultSet};
use super::config::{redact_dsn, ConnectOptions};
use super::DbError;

pub use conversion::PgParam;
use conversion::{column_kind, native_cell, unsupported_column};
use session::PgSession;

pub const DRIVER_NAME: &str = "postgres";

/// Factory registered as `postgres`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDriver;

impl DriverFactory for PostgresDriver {
    fn connect(&self, dsn: &str, options: &ConnectOptions) -> Result<Box<dyn DriverConnection>, DbError> {
        let open_error = |message: String| DbError::ConnectionOpen {
            driver: DRIVER_NAME.to_string(),
            message,
        };

        let mut config: Config = dsn
            .parse()
            .map_err(|e: postgres::Error| open_error(format!("invalid data source name: {}", e)))?;
        if config.get_application_name().is_none() {
            config.application_name("sqlbind");
        }
        if let Some(timeout) = options.timeout() {
            config.connect_timeout(timeout);
        }

        if let Some(pool_size) = options.pool_size {
            debug!(pool_size, "postgres uses a single connection per handle; poolSize ignored");
        }

        let first = config.connect(NoTls).map_err(|e| open_error(e.to_string()))?;
        let session = PgSession::new(config, first, options.timeout())?;

        debug!(dsn = %redact_dsn(dsn), "opened postgres connection");
        Ok(Box::new(PostgresConnection { session }))
    }
}

/// An open PostgreSQL connection.
pub struct PostgresConnection {
    session: PgSession,
}

fn bind_values(params: &[BindParameter]) -> Vec<PgParam<'_>> {
    params.iter().map(|p| PgParam(&p.value)).collect()
}

/// Parameterless scripts with several statements go through the simple query protocol.
fn is_multiple_commands(e: &postgres::Error) -> bool {
    e.as_db_error()
        .is_some_and(|db| db.message().contains("multiple commands"))
}

fn check_arity(sql: &str, expected: usize, given: usize) -> Result<(), DbError> {
    if expected != given {
        return Err(DbError::StatementExecution {
            sql_len: sql.len(),
            message: format!("statement expects {} parameters, {} given", expected, given),
        });
    }
    Ok(())
}

impl DriverConnection for PostgresConnection {
    fn driver_name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn execute(&mut self, sql: &str, params: &[BindParameter]) -> Result<ExecSummary, DbError> {
        trace!(sql, "postgres exec");
        let stmt = match self.session.prepare(sql)? {
            Ok(stmt) => stmt,
            Err(e) if params.is_empty() && is_multiple_commands(&e) => {
                self.session
                    .client()?
                    .batch_execute(sql)
                    .map_err(|e| DbError::statement(sql, e))?;
                return Ok(ExecSummary::default());
            }
            Err(e) => return Err(DbError::statement(sql, e)),
        };
        check_arity(sql, stmt.params().len(), params.len())?;

        let values = bind_values(params);
        let refs: Vec<&(dyn ToSql + Sync)> = values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        let rows_affected = self
            .session
            .client()?
            .execute(&stmt, &refs)
            .map_err(|e| DbError::statement(sql, e))?;

        Ok(ExecSummary {
            rows_affected,
            last_insert_id: None,
        })
    }

    fn query(&mut self, sql: &str, params: &[BindParameter]) -> Result<ResultSet, DbError> {
        trace!(sql, "postgres query");
        let stmt = self.session.prepare(sql)?.map_err(|e| DbError::statement(sql, e))?;
        check_arity(sql, stmt.params().len(), params.len())?;

        let mut kinds = Vec::with_capacity(stmt.columns().len());
        for column in stmt.columns() {
            let kind = column_kind(column.type_()).ok_or_else(|| unsupported_column(column.name(), column.type_()))?;
            kinds.push((column.name().to_string(), kind));
        }

        let values = bind_values(params);
        let refs: Vec<&(dyn ToSql + Sync)> = values.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        let rows = self
            .session
            .client()?
            .query(&stmt, &refs)
            .map_err(|e| DbError::statement(sql, e))?;

        let mut result = ResultSet::new(kinds.iter().map(|(name, _)| name.clone()).collect());
        for row in &rows {
            let mut decoded = Vec::with_capacity(kinds.len());
            for (idx, (name, kind)) in kinds.iter().enumerate() {
                decoded.push(decode_cell(name, *kind, native_cell(row, idx)?)?);
            }
            result.push_row(decoded);
        }

        Ok(result)
    }

    fn close(self: Box<Self>) -> Result<(), DbError> {
        debug!("closing postgres connection");
        self.session.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_invalid_dsn_fails_to_open() {
        let err = PostgresDriver
            .connect("postgres://user@host:notaport/db", &ConnectOptions::default())
            .err()
            .unwrap();
        match err {
            DbError::ConnectionOpen { driver, message } => {
                assert_eq!(driver, "postgres");
                assert!(message.contains("invalid data source name"));
            }
            other => panic!("Expected ConnectionOpen, got {:?}", other),
        }
    }

    #[rstest]
    fn test_arity_mismatch_is_statement_error() {
        let err = check_arity("SELECT $1", 1, 0).unwrap_err();
        assert!(matches!(err, DbError::StatementExecution { sql_len: 9, .. }));
        assert!(check_arity("SELECT $1", 1, 1).is_ok());
    }
}
