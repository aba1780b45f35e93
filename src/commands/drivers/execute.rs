use std::error::Error;

use serde::Serialize;

use super::DriversCmd;
use crate::commands::{Execute, Session};

/// Result of the drivers command execution
#[derive(Debug, Default, Serialize)]
pub struct DriversResult {
    pub drivers: Vec<String>,
}

impl Execute for DriversCmd {
    type Output = DriversResult;

    fn execute(self, session: &mut Session) -> Result<Self::Output, Box<dyn Error>> {
        let drivers = session
            .instance()
            .registry()
            .names()
            .into_iter()
            .map(str::to_string)
            .collect();
        Ok(DriversResult { drivers })
    }
}
