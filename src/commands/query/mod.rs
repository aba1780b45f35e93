mod execute;
mod output;

pub use execute::QueryResult;

use clap::Args;

/// Run a query and print its rows
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  sqlbind --driver sqlite3 --dsn ./test.db query 'SELECT * FROM t'
  sqlbind query 'SELECT * FROM t WHERE k = $1' -p key-2
  sqlbind -f json query 'SELECT now() AS at'")]
pub struct QueryCmd {
    /// SQL query to run
    pub sql: String,

    /// Positional parameter as a JSON literal (repeatable, binds $1, $2, ...)
    #[arg(short, long = "param")]
    pub params: Vec<String>,
}
