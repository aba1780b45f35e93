use std::error::Error;

use serde::Serialize;

use super::QueryCmd;
use crate::commands::{parse_params, Execute, Session};
use crate::db::codec::row_to_host;
use crate::db::ResultSet;
use crate::module::HostValue;

/// Result of the query command execution
#[derive(Debug, Default, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    /// One record per row, as the script would see it.
    pub rows: Vec<HostValue>,
}

impl From<ResultSet> for QueryResult {
    fn from(set: ResultSet) -> Self {
        let columns = set.columns().to_vec();
        let rows = set.into_rows().into_iter().map(row_to_host).collect();
        QueryResult { columns, rows }
    }
}

impl Execute for QueryCmd {
    type Output = QueryResult;

    fn execute(self, session: &mut Session) -> Result<Self::Output, Box<dyn Error>> {
        let args = parse_params(&self.params);
        let rows = session.query(&self.sql, &args)?;
        Ok(rows.into())
    }
}
