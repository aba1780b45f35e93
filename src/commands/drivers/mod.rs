mod execute;
mod output;

pub use execute::DriversResult;

use clap::Args;

/// List the registered driver names
#[derive(Args, Debug)]
pub struct DriversCmd {}
