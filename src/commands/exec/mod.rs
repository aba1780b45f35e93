mod execute;
mod execute_tests;
mod output;

pub use execute::ExecResult;

use clap::Args;

/// Run a statement that returns no rows
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  sqlbind --driver sqlite3 --dsn ./test.db exec 'CREATE TABLE t (k TEXT, v TEXT)'
  sqlbind exec 'INSERT INTO t VALUES ($1, $2)' -p '\"key-0\"' -p '\"value-0\"'
  sqlbind exec 'DELETE FROM t WHERE id > $1' -p 10")]
pub struct ExecCmd {
    /// SQL statement to run
    pub sql: String,

    /// Positional parameter as a JSON literal (repeatable, binds $1, $2, ...)
    #[arg(short, long = "param")]
    pub params: Vec<String>,
}
