use clap::Parser;
use tracing_subscriber::EnvFilter;

use sqlbind::cli::Args;
use sqlbind::commands::Session;
use sqlbind::config::{resolve, ConfigFile};
use sqlbind::module::{ContextId, RootModule};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let connection = if args.command.needs_connection() {
        Some(resolve(args.overrides(), ConfigFile::load()?, |key| std::env::var(key).ok())?)
    } else {
        None
    };

    let mut session = Session::new(RootModule::global().new_instance(ContextId(1)), connection);
    let output = args.command.run(&mut session, args.format)?;
    session.close()?;
    println!("{}", output);
    Ok(())
}
