//! Database drivers, value conversion, and the driver registry.
//!
//! This module provides the database side of the script binding:
//! - Driver registration and lookup by name (`sqlite3`, `postgres`)
//! - Conversion of script values into bind parameters and of result cells
//!   back into script values
//! - Driver connections that execute statements and materialize result sets
//!
//! # Architecture
//!
//! Every driver implements `DriverFactory` (connect from a DSN) and
//! `DriverConnection` (exec, query, close). Drivers receive parameters that
//! were already validated and converted into `ScriptValue`s by the codec, and
//! hand back `NativeCell`s that the codec decodes using the column's declared
//! type.
//!
//! # Type Decisions
//!
//! **Why a closed `ScriptValue` enum instead of passing host values through?**
//! Host values include arrays, objects and functions that have no SQL
//! representation. Converting once at the boundary means drivers only ever
//! see the seven kinds they can bind, and unsupported kinds fail with the
//! parameter index instead of being stringified.
//!
//! **Why `i64` plus a bigint escape hatch for integers?**
//! Script numbers are `f64` and lose precision above 2^53. Integers are kept
//! as `i64` internally and only converted to script numbers when the value
//! fits in the safe range; anything larger surfaces as a bigint.
//!
//! **Why materialize the whole result set?**
//! Rows borrow the driver statement, and the script receives a plain array.
//! Materializing keeps handle state simple at the cost of memory for very
//! large results.

pub mod backend;
pub mod codec;
pub mod config;
pub mod postgres;
pub mod registry;
pub mod sqlite;
pub mod value;

pub use backend::{DriverConnection, DriverFactory};
pub use codec::{BindParameter, ColumnKind, ExecSummary, NativeCell, ResultRow, ResultSet};
pub use config::ConnectOptions;
pub use registry::{DriverRegistry, RegistryBuilder};
pub use value::ScriptValue;

use thiserror::Error;

/// Database error types
#[derive(Error, Debug)]
pub enum DbError {
    #[error("unknown driver '{name}' (registered drivers: {})", .available.join(", "))]
    UnknownDriver { name: String, available: Vec<String> },

    #[error("driver '{name}' is already registered")]
    DuplicateDriver { name: String },

    #[error("the process-wide driver registry is already installed")]
    RegistryAlreadyInstalled,

    #[error("failed to open '{driver}' connection: {message}")]
    ConnectionOpen { driver: String, message: String },

    #[error("handle {handle} is already closed")]
    HandleClosed { handle: String },

    #[error("parameter {index} has unsupported type '{kind}'")]
    UnsupportedParameterType { index: usize, kind: &'static str },

    #[error("statement failed (sql length {sql_len}): {message}")]
    StatementExecution { sql_len: usize, message: String },

    #[error("cannot decode column '{column}': {message}")]
    ResultDecoding { column: String, message: String },

    #[error("timed out waiting for connection: {message}")]
    ConnectionTimeout { message: String },

    #[error("{function}: {message}")]
    InvalidArgument { function: String, message: String },

    #[error("handle {handle} belongs to another execution context than {context}")]
    ForeignHandle { handle: String, context: String },
}

impl DbError {
    /// Exception name the host raises in the script for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            DbError::UnknownDriver { .. } => "UnknownDriverError",
            DbError::DuplicateDriver { .. } | DbError::RegistryAlreadyInstalled => {
                "DuplicateDriverError"
            }
            DbError::ConnectionOpen { .. } => "ConnectionOpenError",
            DbError::HandleClosed { .. } => "HandleClosedError",
            DbError::UnsupportedParameterType { .. } => "UnsupportedParameterTypeError",
            DbError::StatementExecution { .. } => "StatementExecutionError",
            DbError::ResultDecoding { .. } => "ResultDecodingError",
            DbError::ConnectionTimeout { .. } => "ConnectionTimeoutError",
            DbError::InvalidArgument { .. } | DbError::ForeignHandle { .. } => "TypeError",
        }
    }

    /// Wrap a driver failure for `sql`, keeping the driver message but not the SQL text.
    pub fn statement(sql: &str, err: impl std::fmt::Display) -> Self {
        DbError::StatementExecution {
            sql_len: sql.len(),
            message: err.to_string(),
        }
    }

    pub fn invalid_argument(function: &str, message: impl Into<String>) -> Self {
        DbError::InvalidArgument {
            function: function.to_string(),
            message: message.into(),
        }
    }
}
