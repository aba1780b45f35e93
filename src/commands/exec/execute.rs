use std::error::Error;

use serde::Serialize;

use super::ExecCmd;
use crate::commands::{parse_params, Execute, Session};
use crate::db::ExecSummary;

/// Result of the exec command execution
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecResult {
    pub rows_affected: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_insert_id: Option<i64>,
}

impl From<ExecSummary> for ExecResult {
    fn from(summary: ExecSummary) -> Self {
        ExecResult {
            rows_affected: summary.rows_affected,
            last_insert_id: summary.last_insert_id,
        }
    }
}

impl Execute for ExecCmd {
    type Output = ExecResult;

    fn execute(self, session: &mut Session) -> Result<Self::Output, Box<dyn Error>> {
        let args = parse_params(&self.params);
        let summary = session.exec(&self.sql, &args)?;
        Ok(summary.into())
    }
}
