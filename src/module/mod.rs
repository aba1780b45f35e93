//! Script-facing module: `open`, `exec`, `query`, `close`.
//!
//! The host creates one `RootModule` per process and asks it for a
//! `ModuleInstance` whenever an execution context starts. Each instance owns
//! the handles opened by its context and closes whatever is left when the
//! context ends (`close_all`) or when the instance is dropped.
//!
//! # Calling conventions
//!
//! `ModuleInstance::call` takes the function name and the marshaled script
//! arguments and returns a marshaled result:
//!
//! | function | arguments | result |
//! |---|---|---|
//! | `open` | driver, dsn, options? | handle |
//! | `exec` | handle, sql, ...params | `{rowsAffected, lastInsertId?}` |
//! | `query` | handle, sql, ...params | array of records |
//! | `close` | handle | `undefined` |
//!
//! Errors carry a stable exception name (`DbError::kind`) for the host to raise.

mod handles;
mod host;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::db::codec::{encode_params, exec_summary_to_host, result_set_to_host};
use crate::db::registry;
use crate::db::{ConnectOptions, DbError, DriverRegistry, ExecSummary, ResultSet};

pub use handles::{Handle, HandleState};
pub use host::HostValue;
use handles::HandleArena;

/// Identity of one execution context (one script run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx{}", self.0)
    }
}

/// Process-level module, shared by all execution contexts.
#[derive(Debug, Clone)]
pub struct RootModule {
    registry: Arc<DriverRegistry>,
}

impl RootModule {
    pub fn new(registry: Arc<DriverRegistry>) -> Self {
        Self { registry }
    }

    /// Module backed by the process-wide registry.
    pub fn global() -> Self {
        Self::new(registry::global())
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Called by the host when an execution context starts.
    pub fn new_instance(&self, context: ContextId) -> ModuleInstance {
        debug!(%context, "new sql module instance");
        ModuleInstance {
            context,
            registry: Arc::clone(&self.registry),
            handles: HandleArena::new(context),
        }
    }
}

/// Per-context module state.
pub struct ModuleInstance {
    context: ContextId,
    registry: Arc<DriverRegistry>,
    handles: HandleArena,
}

impl ModuleInstance {
    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Open a connection with a registered driver.
    pub fn open(&mut self, driver: &str, dsn: &str, options: ConnectOptions) -> Result<Handle, DbError> {
        if driver.is_empty() {
            return Err(DbError::invalid_argument("open", "driver name must not be empty"));
        }

        let connection = self.registry.connect(driver, dsn, &options)?;
        let handle = self.handles.insert(connection);
        debug!(%handle, driver, "opened handle");
        Ok(handle)
    }

    /// Run a statement that returns no rows.
    pub fn exec(&mut self, handle: Handle, sql: &str, args: &[HostValue]) -> Result<ExecSummary, DbError> {
        require_sql("exec", sql)?;
        let params = encode_params(args)?;
        let summary = self
            .handles
            .with_connection(handle, "exec", |conn| conn.execute(sql, &params))?;
        debug!(
            %handle,
            sql_len = sql.len(),
            params = params.len(),
            rows_affected = summary.rows_affected,
            "exec"
        );
        Ok(summary)
    }

    /// Run a query and materialize its rows.
    pub fn query(&mut self, handle: Handle, sql: &str, args: &[HostValue]) -> Result<ResultSet, DbError> {
        require_sql("query", sql)?;
        let params = encode_params(args)?;
        let rows = self
            .handles
            .with_connection(handle, "query", |conn| conn.query(sql, &params))?;
        debug!(%handle, sql_len = sql.len(), params = params.len(), rows = rows.len(), "query");
        Ok(rows)
    }

    /// Close a handle. A second close fails with `HandleClosed`.
    pub fn close(&mut self, handle: Handle) -> Result<(), DbError> {
        let driver = self.handles.driver(handle).unwrap_or("unknown");
        self.handles.close(handle)?;
        debug!(%handle, driver, "closed handle");
        Ok(())
    }

    /// Force-close every handle still open in this context. Returns how many
    /// were closed. Close failures are logged, never raised.
    pub fn close_all(&mut self) -> usize {
        let outcomes = self.handles.close_all();
        for (handle, driver, result) in &outcomes {
            match result {
                Ok(()) => warn!(%handle, driver, "closed handle left open at end of context"),
                Err(e) => warn!(%handle, driver, error = %e, "failed to close handle left open at end of context"),
            }
        }
        outcomes.len()
    }

    pub fn handle_state(&self, handle: Handle) -> Option<HandleState> {
        self.handles.state(handle)
    }

    pub fn open_handles(&self) -> usize {
        self.handles.open_count()
    }

    /// Dispatch a script call by function name.
    pub fn call(&mut self, function: &str, args: &[HostValue]) -> Result<HostValue, DbError> {
        match function {
            "open" => {
                check_arity(function, args, 2, Some(3))?;
                let driver = string_arg(function, args, 0, "driver name")?;
                let dsn = string_arg(function, args, 1, "data source name")?;
                let options = ConnectOptions::from_host(args.get(2).unwrap_or(&HostValue::Undefined))?;
                self.open(driver, dsn, options).map(HostValue::Handle)
            }
            "exec" => {
                check_arity(function, args, 2, None)?;
                let handle = handle_arg(function, args)?;
                let sql = string_arg(function, args, 1, "sql")?;
                self.exec(handle, sql, &args[2..]).map(exec_summary_to_host)
            }
            "query" => {
                check_arity(function, args, 2, None)?;
                let handle = handle_arg(function, args)?;
                let sql = string_arg(function, args, 1, "sql")?;
                self.query(handle, sql, &args[2..]).map(result_set_to_host)
            }
            "close" => {
                check_arity(function, args, 1, Some(1))?;
                let handle = handle_arg(function, args)?;
                self.close(handle).map(|()| HostValue::Undefined)
            }
            other => Err(DbError::invalid_argument(
                other,
                "not a function of this module (expected open, exec, query or close)",
            )),
        }
    }
}

impl Drop for ModuleInstance {
    fn drop(&mut self) {
        if self.handles.open_count() > 0 {
            self.close_all();
        }
    }
}

fn require_sql(function: &str, sql: &str) -> Result<(), DbError> {
    if sql.trim().is_empty() {
        return Err(DbError::invalid_argument(function, "sql must be a non-empty string"));
    }
    Ok(())
}

fn check_arity(function: &str, args: &[HostValue], min: usize, max: Option<usize>) -> Result<(), DbError> {
    let expected = match max {
        Some(max) if max == min => format!("{}", min),
        Some(max) => format!("{} to {}", min, max),
        None => format!("at least {}", min),
    };
    if args.len() < min || max.is_some_and(|max| args.len() > max) {
        return Err(DbError::invalid_argument(
            function,
            format!("expected {} arguments, got {}", expected, args.len()),
        ));
    }
    Ok(())
}

fn string_arg<'a>(function: &str, args: &'a [HostValue], idx: usize, what: &str) -> Result<&'a str, DbError> {
    match &args[idx] {
        HostValue::String(s) => Ok(s),
        other => Err(DbError::invalid_argument(
            function,
            format!("{} must be a string, got {}", what, other.kind()),
        )),
    }
}

fn handle_arg(function: &str, args: &[HostValue]) -> Result<Handle, DbError> {
    args[0].as_handle().ok_or_else(|| {
        DbError::invalid_argument(
            function,
            format!("first argument must be a handle returned by open, got {}", args[0].kind()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn instance() -> ModuleInstance {
        RootModule::new(Arc::new(DriverRegistry::builtin())).new_instance(ContextId(7))
    }

    fn open_memory(instance: &mut ModuleInstance) -> HostValue {
        instance
            .call("open", &["sqlite3".into(), ":memory:".into()])
            .unwrap()
    }

    #[rstest]
    fn test_open_returns_handle(mut instance: ModuleInstance) {
        let handle = open_memory(&mut instance);
        let handle = handle.as_handle().unwrap();
        assert_eq!(handle.context(), ContextId(7));
        assert_eq!(instance.handle_state(handle), Some(HandleState::Idle));
    }

    #[rstest]
    fn test_open_unknown_driver(mut instance: ModuleInstance) {
        let err = instance.call("open", &["mysql".into(), "dsn".into()]).unwrap_err();
        assert_eq!(err.kind(), "UnknownDriverError");
        assert!(err.to_string().contains("postgres, sqlite3"));
    }

    #[rstest]
    #[case("open", vec![])]
    #[case("open", vec!["".into(), ":memory:".into()])]
    #[case("open", vec![HostValue::Number(1.0), ":memory:".into()])]
    #[case("open", vec!["sqlite3".into(), ":memory:".into(), HostValue::Null, HostValue::Null])]
    #[case("query", vec![HostValue::String("not a handle".into()), "SELECT 1".into()])]
    #[case("close", vec![])]
    #[case("drop", vec![])]
    fn test_contract_violations_are_type_errors(
        mut instance: ModuleInstance,
        #[case] function: &str,
        #[case] args: Vec<HostValue>,
    ) {
        let err = instance.call(function, &args).unwrap_err();
        assert_eq!(err.kind(), "TypeError", "{}: {}", function, err);
    }

    #[rstest]
    fn test_empty_sql_rejected(mut instance: ModuleInstance) {
        let handle = open_memory(&mut instance);
        let err = instance.call("exec", &[handle, "  ".into()]).unwrap_err();
        assert!(matches!(err, DbError::InvalidArgument { .. }));
    }

    #[rstest]
    fn test_exec_returns_summary(mut instance: ModuleInstance) {
        let handle = open_memory(&mut instance);
        instance
            .call("exec", &[handle.clone(), "CREATE TABLE t (id INTEGER PRIMARY KEY, k TEXT)".into()])
            .unwrap();
        let summary = instance
            .call("exec", &[handle, "INSERT INTO t (k) VALUES ($1)".into(), "a".into()])
            .unwrap();
        assert_eq!(summary.get("rowsAffected"), Some(&HostValue::Number(1.0)));
        assert_eq!(summary.get("lastInsertId"), Some(&HostValue::Number(1.0)));
    }

    #[rstest]
    fn test_unsupported_parameter_reports_index(mut instance: ModuleInstance) {
        let handle = open_memory(&mut instance);
        let err = instance
            .call("query", &[handle, "SELECT $1, $2".into(), HostValue::Number(1.0), HostValue::Array(vec![])])
            .unwrap_err();
        assert!(matches!(err, DbError::UnsupportedParameterType { index: 2, kind: "array" }));
    }

    #[rstest]
    fn test_close_returns_undefined(mut instance: ModuleInstance) {
        let handle = open_memory(&mut instance);
        assert_eq!(instance.call("close", &[handle.clone()]).unwrap(), HostValue::Undefined);
        let err = instance.call("close", &[handle]).unwrap_err();
        assert_eq!(err.kind(), "HandleClosedError");
    }

    #[rstest]
    fn test_handle_from_other_context(mut instance: ModuleInstance) {
        let root = RootModule::new(Arc::new(DriverRegistry::builtin()));
        let mut other = root.new_instance(ContextId(8));
        let handle = open_memory(&mut other);

        let err = instance.call("query", &[handle, "SELECT 1".into()]).unwrap_err();
        assert!(matches!(err, DbError::ForeignHandle { .. }));
    }

    #[rstest]
    fn test_close_all_counts_open_handles(mut instance: ModuleInstance) {
        let a = open_memory(&mut instance);
        open_memory(&mut instance);
        open_memory(&mut instance);
        instance.call("close", &[a]).unwrap();

        assert_eq!(instance.open_handles(), 2);
        assert_eq!(instance.close_all(), 2);
        assert_eq!(instance.open_handles(), 0);
        assert_eq!(instance.close_all(), 0);
    }
}
