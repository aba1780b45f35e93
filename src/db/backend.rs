//! Driver traits shared by every database engine.
//!
//! A driver is registered as a `DriverFactory` and produces one
//! `DriverConnection` per `open`. Connections receive parameters that the
//! codec has already converted, so implementations only deal with the
//! closed `ScriptValue` set.

use super::codec::{BindParameter, ExecSummary, ResultSet};
use super::config::ConnectOptions;
use super::DbError;

/// Opens connections for one engine.
///
/// Factories are shared across every execution context, so they must be
/// `Send + Sync`. Any `Fn(&str, &ConnectOptions) -> Result<Box<dyn DriverConnection>, DbError>`
/// closure is a factory, which keeps test drivers short.
pub trait DriverFactory: Send + Sync {
    /// Open a connection for `dsn`.
    ///
    /// # Errors
    /// `ConnectionOpen` when the DSN is malformed or the engine rejects it,
    /// `ConnectionTimeout` when the engine did not answer within the timeout.
    fn connect(&self, dsn: &str, options: &ConnectOptions) -> Result<Box<dyn DriverConnection>, DbError>;
}

impl<F> DriverFactory for F
where
    F: Fn(&str, &ConnectOptions) -> Result<Box<dyn DriverConnection>, DbError> + Send + Sync,
{
    fn connect(&self, dsn: &str, options: &ConnectOptions) -> Result<Box<dyn DriverConnection>, DbError> {
        self(dsn, options)
    }
}

/// A live connection owned by exactly one handle.
pub trait DriverConnection: Send {
    /// Registered name of the driver that opened this connection, for logs.
    fn driver_name(&self) -> &'static str;

    /// Run a statement that returns no rows.
    fn execute(&mut self, sql: &str, params: &[BindParameter]) -> Result<ExecSummary, DbError>;

    /// Run a statement and materialize every row it returns.
    fn query(&mut self, sql: &str, params: &[BindParameter]) -> Result<ResultSet, DbError>;

    /// Release the underlying resources. Called at most once.
    fn close(self: Box<Self>) -> Result<(), DbError>;
}
