//! One CLI invocation's view of the module: a context plus, at most, one
//! handle opened on first use.

use tracing::debug;

use crate::config::ConnectionConfig;
use crate::db::{DbError, ExecSummary, ResultSet};
use crate::module::{Handle, HostValue, ModuleInstance};

pub struct Session {
    instance: ModuleInstance,
    connection: Option<ConnectionConfig>,
    handle: Option<Handle>,
}

impl Session {
    pub fn new(instance: ModuleInstance, connection: Option<ConnectionConfig>) -> Self {
        Self {
            instance,
            connection,
            handle: None,
        }
    }

    pub fn instance(&self) -> &ModuleInstance {
        &self.instance
    }

    /// The open handle, opening it from the configured connection if needed.
    pub fn handle(&mut self) -> Result<Handle, DbError> {
        if let Some(handle) = self.handle {
            return Ok(handle);
        }
        let Some(connection) = &self.connection else {
            return Err(DbError::invalid_argument("open", "no database connection configured"));
        };
        let handle = self
            .instance
            .open(&connection.driver, &connection.dsn, connection.options())?;
        debug!(%handle, driver = %connection.driver, "session connected");
        self.handle = Some(handle);
        Ok(handle)
    }

    pub fn exec(&mut self, sql: &str, args: &[HostValue]) -> Result<ExecSummary, DbError> {
        let handle = self.handle()?;
        self.instance.exec(handle, sql, args)
    }

    pub fn query(&mut self, sql: &str, args: &[HostValue]) -> Result<ResultSet, DbError> {
        let handle = self.handle()?;
        self.instance.query(handle, sql, args)
    }

    /// Close the handle if one was opened. Safe to call more than once.
    pub fn close(&mut self) -> Result<(), DbError> {
        match self.handle.take() {
            Some(handle) => self.instance.close(handle),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{memory_session, session_for};
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    fn test_handle_opened_lazily() {
        let mut session = memory_session();
        assert_eq!(session.instance().open_handles(), 0);
        let first = session.handle().unwrap();
        let second = session.handle().unwrap();
        assert_eq!(first, second);
        assert_eq!(session.instance().open_handles(), 1);
    }

    #[rstest]
    fn test_close_is_idempotent() {
        let mut session = memory_session();
        session.query("SELECT 1", &[]).unwrap();
        session.close().unwrap();
        session.close().unwrap();
        assert_eq!(session.instance().open_handles(), 0);
    }

    #[rstest]
    fn test_without_connection() {
        let mut session = session_for(None);
        let err = session.query("SELECT 1", &[]).unwrap_err();
        assert!(err.to_string().contains("no database connection configured"));
    }

    #[rstest]
    fn test_file_database_persists_between_sessions() {
        let dir = TempDir::new().unwrap();
        let config = ConnectionConfig {
            driver: "sqlite3".to_string(),
            dsn: dir.path().join("k6.db").display().to_string(),
            pool_size: None,
            timeout_ms: None,
        };

        let mut writer = session_for(Some(config.clone()));
        writer.exec("CREATE TABLE t (k TEXT)", &[]).unwrap();
        writer.exec("INSERT INTO t VALUES ($1)", &["kept".into()]).unwrap();
        writer.close().unwrap();

        let mut reader = session_for(Some(config));
        let rows = reader.query("SELECT k FROM t", &[]).unwrap();
        assert_eq!(rows.len(), 1);
    }
}
