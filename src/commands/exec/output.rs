//! Output formatting for exec command results.

use super::execute::ExecResult;
use crate::output::Outputable;

impl Outputable for ExecResult {
    fn to_table(&self) -> String {
        let noun = if self.rows_affected == 1 { "row" } else { "rows" };
        match self.last_insert_id {
            Some(id) => format!("{} {} affected (last insert id: {})", self.rows_affected, noun, id),
            None => format!("{} {} affected", self.rows_affected, noun),
        }
    }
}
