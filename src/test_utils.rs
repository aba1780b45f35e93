//! Shared helpers for command tests.

use std::sync::Arc;

use crate::commands::Session;
use crate::config::ConnectionConfig;
use crate::db::DriverRegistry;
use crate::module::{ContextId, RootModule};

/// Session over the built-in drivers that is not tied to the global registry.
pub fn session_for(connection: Option<ConnectionConfig>) -> Session {
    let root = RootModule::new(Arc::new(DriverRegistry::builtin()));
    Session::new(root.new_instance(ContextId(1)), connection)
}

/// Session configured for a private in-memory SQLite database.
pub fn memory_session() -> Session {
    session_for(Some(ConnectionConfig {
        driver: "sqlite3".to_string(),
        dsn: ":memory:".to_string(),
        pool_size: None,
        timeout_ms: None,
    }))
}

/// In-memory session with table `t (id, k, v)` holding `key-0 .. key-4`.
pub fn seeded_session() -> Session {
    let mut session = memory_session();
    session
        .exec(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, k TEXT NOT NULL, v TEXT)",
            &[],
        )
        .expect("create table");
    for i in 0..5 {
        session
            .exec(
                "INSERT INTO t (k, v) VALUES ($1, $2)",
                &[format!("key-{}", i).into(), format!("value-{}", i).into()],
            )
            .expect("insert row");
    }
    session
}
