//! Execute tests for exec command.

#[cfg(test)]
mod tests {
    use super::super::ExecCmd;
    use rstest::rstest;

    // Seeded table t holds key-0 .. key-4
    crate::execute_test! {
        test_name: test_exec_insert_reports_last_id,
        cmd: ExecCmd {
            sql: "INSERT INTO t (k, v) VALUES ($1, $2)".to_string(),
            params: vec!["\"key-5\"".to_string(), "\"value-5\"".to_string()],
        },
        assertions: |result| {
            assert_eq!(result.rows_affected, 1);
            assert_eq!(result.last_insert_id, Some(6));
        },
    }

    crate::execute_test! {
        test_name: test_exec_update_counts_rows,
        cmd: ExecCmd {
            sql: "UPDATE t SET v = $1 WHERE id <= $2".to_string(),
            params: vec!["\"changed\"".to_string(), "3".to_string()],
        },
        assertions: |result| {
            assert_eq!(result.rows_affected, 3);
            assert_eq!(result.last_insert_id, None);
        },
    }

    crate::execute_test! {
        test_name: test_exec_delete_nothing,
        cmd: ExecCmd {
            sql: "DELETE FROM t WHERE k = $1".to_string(),
            params: vec!["bogus-key".to_string()],
        },
        assertions: |result| {
            assert_eq!(result.rows_affected, 0);
        },
    }

    crate::execute_error_test! {
        test_name: test_exec_syntax_error,
        cmd: ExecCmd {
            sql: "INSERT INTO".to_string(),
            params: vec![],
        },
        contains: "statement failed",
    }

    crate::execute_error_test! {
        test_name: test_exec_object_param_rejected,
        cmd: ExecCmd {
            sql: "INSERT INTO t (k) VALUES ($1)".to_string(),
            params: vec!["{\"a\": 1}".to_string()],
        },
        contains: "object",
    }
}
