//! Output formatting for query command results.

use super::execute::QueryResult;
use crate::module::HostValue;
use crate::output::{cell_text, render_table, Outputable};

impl Outputable for QueryResult {
    fn to_table(&self) -> String {
        if self.columns.is_empty() {
            return "(0 rows)".to_string();
        }

        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| cell_text(row.get(c).unwrap_or(&HostValue::Null)))
                    .collect()
            })
            .collect();

        let count = match self.rows.len() {
            1 => "(1 row)".to_string(),
            n => format!("({} rows)", n),
        };
        format!("{}\n{}", render_table(&self.columns, &cells), count)
    }
}
