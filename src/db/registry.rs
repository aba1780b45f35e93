//! Name → driver factory table.
//!
//! Drivers are registered on a `RegistryBuilder` and frozen into an immutable
//! `DriverRegistry`. The process-wide registry is installed at most once and
//! shared by every execution context without locking.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use super::backend::{DriverConnection, DriverFactory};
use super::config::ConnectOptions;
use super::{postgres, sqlite, DbError};

static GLOBAL: OnceLock<Arc<DriverRegistry>> = OnceLock::new();

/// Mutable registration phase.
#[derive(Default)]
pub struct RegistryBuilder {
    drivers: BTreeMap<String, Arc<dyn DriverFactory>>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder preloaded with `sqlite3` and `postgres`.
    pub fn with_builtin_drivers() -> Self {
        let mut builder = Self::new();
        builder.drivers.insert(sqlite::DRIVER_NAME.to_string(), Arc::new(sqlite::SqliteDriver));
        builder.drivers.insert(postgres::DRIVER_NAME.to_string(), Arc::new(postgres::PostgresDriver));
        builder
    }

    /// Register `factory` under `name`.
    ///
    /// # Errors
    /// `DuplicateDriver` if the name is taken; `InvalidArgument` if it is empty.
    pub fn register(&mut self, name: &str, factory: impl DriverFactory + 'static) -> Result<&mut Self, DbError> {
        if name.is_empty() {
            return Err(DbError::invalid_argument("register", "driver name must not be empty"));
        }
        if self.drivers.contains_key(name) {
            return Err(DbError::DuplicateDriver { name: name.to_string() });
        }
        debug!(driver = name, "registered driver");
        self.drivers.insert(name.to_string(), Arc::new(factory));
        Ok(self)
    }

    pub fn build(self) -> DriverRegistry {
        DriverRegistry { drivers: self.drivers }
    }
}

/// Frozen driver table. There is no way to add or remove drivers once built.
pub struct DriverRegistry {
    drivers: BTreeMap<String, Arc<dyn DriverFactory>>,
}

impl DriverRegistry {
    pub fn builtin() -> Self {
        RegistryBuilder::with_builtin_drivers().build()
    }

    /// Find the factory for `name`.
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn DriverFactory>, DbError> {
        self.drivers.get(name).cloned().ok_or_else(|| DbError::UnknownDriver {
            name: name.to_string(),
            available: self.names().iter().map(|n| n.to_string()).collect(),
        })
    }

    /// Look up `driver` and open a connection to `dsn`.
    pub fn connect(
        &self,
        driver: &str,
        dsn: &str,
        options: &ConnectOptions,
    ) -> Result<Box<dyn DriverConnection>, DbError> {
        self.lookup(driver)?.connect(dsn, options)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.drivers.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry").field("drivers", &self.names()).finish()
    }
}

/// Install the process-wide registry. Must run before the first `global()`.
///
/// # Errors
/// `RegistryAlreadyInstalled` if a registry was installed (or lazily created) before.
pub fn install(registry: DriverRegistry) -> Result<Arc<DriverRegistry>, DbError> {
    let registry = Arc::new(registry);
    GLOBAL
        .set(Arc::clone(&registry))
        .map_err(|_| DbError::RegistryAlreadyInstalled)?;
    Ok(registry)
}

/// The process-wide registry, falling back to the built-in drivers when
/// nothing was installed.
pub fn global() -> Arc<DriverRegistry> {
    Arc::clone(GLOBAL.get_or_init(|| Arc::new(DriverRegistry::builtin())))
}
