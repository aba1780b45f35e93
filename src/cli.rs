//! CLI argument definitions.
//!
//! This module contains the top-level CLI structure and shared types.
//! Individual command definitions are in the `commands` module.

use clap::Parser;

use crate::commands::Command;
use crate::config::ConnectionOverrides;
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Registered driver name (sqlite3, postgres)
    #[arg(long, global = true)]
    pub driver: Option<String>,

    /// Data source name passed to the driver
    #[arg(long, global = true)]
    pub dsn: Option<String>,

    /// Connection pool size (accepted for compatibility; each handle uses one connection)
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(1..))]
    pub pool_size: Option<u32>,

    /// Connect and statement timeout in milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    /// Connection settings given as flags.
    pub fn overrides(&self) -> ConnectionOverrides {
        ConnectionOverrides {
            driver: self.driver.clone(),
            dsn: self.dsn.clone(),
            pool_size: self.pool_size,
            timeout_ms: self.timeout_ms,
        }
    }
}
