//! The PostgreSQL connection behind one handle.
//!
//! A handle is used by a single script context at a time, so it holds one
//! client. When the server drops that client (restart, idle kill,
//! `pg_terminate_backend`) the next call opens a fresh one with the same
//! configuration.

use std::time::Duration;

use postgres::{Client, Config, NoTls, Statement};
use tracing::{debug, warn};

use crate::db::DbError;

use super::DRIVER_NAME;

pub struct PgSession {
    config: Config,
    statement_timeout: Option<Duration>,
    client: Option<Client>,
}

impl PgSession {
    /// Wrap an already established connection.
    pub fn new(config: Config, first: Client, statement_timeout: Option<Duration>) -> Result<Self, DbError> {
        let mut first = first;
        prepare_session(&mut first, statement_timeout)?;
        Ok(Self {
            config,
            statement_timeout,
            client: Some(first),
        })
    }

    fn connect(&self) -> Result<Client, DbError> {
        let mut client = self.config.connect(NoTls).map_err(|e| open_error(e.to_string()))?;
        prepare_session(&mut client, self.statement_timeout)?;
        Ok(client)
    }

    /// The live client, reconnecting if the server closed the previous one.
    pub fn client(&mut self) -> Result<&mut Client, DbError> {
        let client = match self.client.take() {
            Some(client) if !client.is_closed() => client,
            stale => {
                if stale.is_some() {
                    debug!("postgres connection closed by the server; reconnecting");
                }
                self.connect()?
            }
        };
        Ok(self.client.insert(client))
    }

    /// Prepare `sql` on a live client.
    ///
    /// The outer error is a failed reconnect; the inner one is the server's
    /// answer to the statement. A statement that was never sent because the
    /// connection had already dropped is retried once on a new connection.
    pub fn prepare(&mut self, sql: &str) -> Result<Result<Statement, postgres::Error>, DbError> {
        match self.client()?.prepare(sql) {
            Err(e) if e.is_closed() => {
                self.client = None;
                Ok(self.client()?.prepare(sql))
            }
            other => Ok(other),
        }
    }

    pub fn close(self) -> Result<(), DbError> {
        let Some(client) = self.client else {
            return Ok(());
        };
        client.close().map_err(|e| {
            warn!(error = %e, "failed to close postgres connection");
            open_error(format!("failed to close connection: {}", e))
        })
    }
}

fn open_error(message: String) -> DbError {
    DbError::ConnectionOpen {
        driver: DRIVER_NAME.to_string(),
        message,
    }
}

fn prepare_session(client: &mut Client, statement_timeout: Option<Duration>) -> Result<(), DbError> {
    if let Some(timeout) = statement_timeout {
        client
            .batch_execute(&format!("SET statement_timeout = {}", timeout.as_millis()))
            .map_err(|e| open_error(e.to_string()))?;
    }
    Ok(())
}
