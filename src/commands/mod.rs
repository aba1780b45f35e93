//! Command definitions and implementations.
//!
//! Each command is defined in its own module with:
//! - The command struct with clap attributes for CLI parsing
//! - `execute.rs` running it against a `Session`
//! - `output.rs` rendering its result

mod drivers;
mod exec;
mod query;
mod session;

pub use drivers::DriversCmd;
pub use exec::ExecCmd;
pub use query::QueryCmd;
pub use session::Session;

use clap::Subcommand;
use std::error::Error;

use crate::module::HostValue;
use crate::output::{OutputFormat, Outputable};

/// Trait for executing commands with command-specific result types.
pub trait Execute {
    type Output: Outputable;

    fn execute(self, session: &mut Session) -> Result<Self::Output, Box<dyn Error>>;
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a statement that returns no rows
    Exec(ExecCmd),

    /// Run a query and print its rows
    Query(QueryCmd),

    /// List the registered driver names
    Drivers(DriversCmd),

    /// Catch-all for unknown commands
    #[command(external_subcommand)]
    Unknown(Vec<String>),
}

impl Command {
    /// Whether the command talks to a database.
    pub fn needs_connection(&self) -> bool {
        matches!(self, Command::Exec(_) | Command::Query(_))
    }

    /// Execute the command and return formatted output
    pub fn run(self, session: &mut Session, format: OutputFormat) -> Result<String, Box<dyn Error>> {
        match self {
            Command::Exec(cmd) => {
                let result = cmd.execute(session)?;
                Ok(result.format(format))
            }
            Command::Query(cmd) => {
                let result = cmd.execute(session)?;
                Ok(result.format(format))
            }
            Command::Drivers(cmd) => {
                let result = cmd.execute(session)?;
                Ok(result.format(format))
            }
            Command::Unknown(args) => {
                Err(format!("Unknown command: {}", args.first().unwrap_or(&String::new())).into())
            }
        }
    }
}

/// Turn `--param` values into script arguments. Each value is read as a JSON
/// literal; anything that does not parse is bound as a plain string.
pub fn parse_params(raw: &[String]) -> Vec<HostValue> {
    raw.iter()
        .map(|p| match serde_json::from_str::<serde_json::Value>(p) {
            Ok(value) => HostValue::from_json(value),
            Err(_) => HostValue::String(p.clone()),
        })
        .collect()
}
