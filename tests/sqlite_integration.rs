//! End-to-end tests of the script module over file-backed SQLite databases.
//!
//! Every call goes through `ModuleInstance::call`, the same entry point the
//! scripting host uses.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use indexmap::IndexMap;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use sqlbind::db::DriverRegistry;
use sqlbind::module::{ContextId, HandleState, HostValue, ModuleInstance, RootModule};

struct Fixture {
    // Keeps the database directory alive for the test.
    _dir: TempDir,
    dsn: String,
    instance: ModuleInstance,
}

#[fixture]
fn sqlite() -> Fixture {
    let dir = TempDir::new().expect("temp dir");
    let dsn = dir.path().join("test.db").display().to_string();
    let root = RootModule::new(Arc::new(DriverRegistry::builtin()));
    Fixture {
        _dir: dir,
        dsn,
        instance: root.new_instance(ContextId(1)),
    }
}

fn open(fx: &mut Fixture) -> HostValue {
    let dsn = fx.dsn.clone();
    fx.instance
        .call("open", &["sqlite3".into(), dsn.into()])
        .expect("open should succeed")
}

fn exec(fx: &mut Fixture, db: &HostValue, sql: &str, params: Vec<HostValue>) -> HostValue {
    let mut args = vec![db.clone(), sql.into()];
    args.extend(params);
    fx.instance.call("exec", &args).expect("exec should succeed")
}

fn query(fx: &mut Fixture, db: &HostValue, sql: &str, params: Vec<HostValue>) -> Vec<HostValue> {
    let mut args = vec![db.clone(), sql.into()];
    args.extend(params);
    let rows = fx.instance.call("query", &args).expect("query should succeed");
    rows.as_array().expect("query returns an array").to_vec()
}

fn seed(fx: &mut Fixture, db: &HostValue) {
    exec(
        fx,
        db,
        "CREATE TABLE IF NOT EXISTS t (id INTEGER PRIMARY KEY, k TEXT, v TEXT);",
        vec![],
    );
    for i in 0..5 {
        exec(
            fx,
            db,
            "INSERT INTO t (k, v) VALUES ($1, $2);",
            vec![format!("key-{}", i).into(), format!("value-{}", i).into()],
        );
    }
}

#[rstest]
fn test_key_value_scenario(mut sqlite: Fixture) {
    let db = open(&mut sqlite);
    seed(&mut sqlite, &db);

    let all = query(&mut sqlite, &db, "SELECT * FROM t;", vec![]);
    assert_eq!(all.len(), 5);

    let hit = query(&mut sqlite, &db, "SELECT * FROM t WHERE k = $1;", vec!["key-2".into()]);
    assert_eq!(hit.len(), 1);
    assert_eq!(hit[0].get("v"), Some(&HostValue::from("value-2")));

    let miss = query(&mut sqlite, &db, "SELECT * FROM t WHERE k = $1;", vec!["bogus-key".into()]);
    assert!(miss.is_empty());

    assert_eq!(sqlite.instance.call("close", &[db.clone()]).unwrap(), HostValue::Undefined);
    let err = sqlite.instance.call("close", &[db]).unwrap_err();
    assert_eq!(err.kind(), "HandleClosedError");
}

#[rstest]
fn test_columns_in_select_order(mut sqlite: Fixture) {
    let db = open(&mut sqlite);
    seed(&mut sqlite, &db);

    let rows = query(&mut sqlite, &db, "SELECT v, id, k FROM t WHERE id = $1", vec![HostValue::Number(4.0)]);
    let keys: Vec<&str> = rows[0].as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["v", "id", "k"]);
    assert_eq!(rows[0].get("k"), Some(&HostValue::from("key-3")));
}

#[rstest]
fn test_reopen_after_close(mut sqlite: Fixture) {
    let first = open(&mut sqlite);
    seed(&mut sqlite, &first);
    sqlite.instance.call("close", &[first]).unwrap();

    let second = open(&mut sqlite);
    let rows = query(&mut sqlite, &second, "SELECT count(*) AS n FROM t", vec![]);
    assert_eq!(rows[0].get("n"), Some(&HostValue::Number(5.0)));
    assert_eq!(sqlite.instance.open_handles(), 1);
}

#[rstest]
#[case("exec")]
#[case("query")]
fn test_use_after_close(mut sqlite: Fixture, #[case] function: &str) {
    let db = open(&mut sqlite);
    sqlite.instance.call("close", &[db.clone()]).unwrap();

    let err = sqlite
        .instance
        .call(function, &[db.clone(), "SELECT 1".into()])
        .unwrap_err();
    assert_eq!(err.kind(), "HandleClosedError");
    assert_eq!(sqlite.instance.handle_state(db.as_handle().unwrap()), Some(HandleState::Closed));
}

#[rstest]
fn test_value_round_trip(mut sqlite: Fixture) {
    let db = open(&mut sqlite);
    exec(
        &mut sqlite,
        &db,
        "CREATE TABLE vals (
            id INTEGER PRIMARY KEY,
            empty TEXT,
            flag BOOLEAN,
            n INTEGER,
            ratio REAL,
            label TEXT,
            raw BLOB,
            at DATETIME
        )",
        vec![],
    );

    let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
    exec(
        &mut sqlite,
        &db,
        "INSERT INTO vals (empty, flag, n, ratio, label, raw, at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        vec![
            HostValue::Null,
            HostValue::Bool(true),
            HostValue::Number(-42.0),
            HostValue::Number(0.25),
            HostValue::from("héllo"),
            HostValue::Bytes(vec![0, 1, 0xfe, 0xff]),
            HostValue::Date(at),
        ],
    );

    let rows = query(&mut sqlite, &db, "SELECT empty, flag, n, ratio, label, raw, at FROM vals", vec![]);
    let expected = HostValue::Object(IndexMap::from([
        ("empty".to_string(), HostValue::Null),
        ("flag".to_string(), HostValue::Bool(true)),
        ("n".to_string(), HostValue::Number(-42.0)),
        ("ratio".to_string(), HostValue::Number(0.25)),
        ("label".to_string(), HostValue::from("héllo")),
        ("raw".to_string(), HostValue::Bytes(vec![0, 1, 0xfe, 0xff])),
        ("at".to_string(), HostValue::Date(at)),
    ]));
    assert_eq!(rows, vec![expected]);
}

#[rstest]
fn test_safe_integer_boundary(mut sqlite: Fixture) {
    let db = open(&mut sqlite);
    exec(&mut sqlite, &db, "CREATE TABLE big (n INTEGER)", vec![]);

    let max_safe = 9_007_199_254_740_991i64;
    exec(
        &mut sqlite,
        &db,
        "INSERT INTO big (n) VALUES ($1), ($2), ($3)",
        vec![
            HostValue::Number(max_safe as f64),
            HostValue::BigInt(max_safe + 1),
            HostValue::BigInt(i64::MIN),
        ],
    );

    let rows = query(&mut sqlite, &db, "SELECT n FROM big ORDER BY rowid", vec![]);
    let values: Vec<&HostValue> = rows.iter().filter_map(|r| r.get("n")).collect();
    assert_eq!(
        values,
        vec![
            &HostValue::Number(max_safe as f64),
            &HostValue::BigInt(max_safe + 1),
            &HostValue::BigInt(i64::MIN),
        ]
    );
}

#[rstest]
fn test_unsupported_parameter_is_not_stringified(mut sqlite: Fixture) {
    let db = open(&mut sqlite);
    seed(&mut sqlite, &db);

    let err = sqlite
        .instance
        .call(
            "exec",
            &[
                db.clone(),
                "INSERT INTO t (k, v) VALUES ($1, $2)".into(),
                "key-9".into(),
                HostValue::Object(IndexMap::new()),
            ],
        )
        .unwrap_err();
    assert_eq!(err.kind(), "UnsupportedParameterTypeError");
    assert!(err.to_string().contains("parameter 2"));

    let rows = query(&mut sqlite, &db, "SELECT * FROM t WHERE k = $1", vec!["key-9".into()]);
    assert!(rows.is_empty());
}

#[rstest]
fn test_statement_error_keeps_handle_usable(mut sqlite: Fixture) {
    let db = open(&mut sqlite);
    let err = sqlite
        .instance
        .call("query", &[db.clone(), "SELECT * FROM nowhere".into()])
        .unwrap_err();
    assert_eq!(err.kind(), "StatementExecutionError");
    assert!(err.to_string().contains("no such table"));

    assert_eq!(sqlite.instance.handle_state(db.as_handle().unwrap()), Some(HandleState::Idle));
    let rows = query(&mut sqlite, &db, "SELECT 1 AS one", vec![]);
    assert_eq!(rows[0].get("one"), Some(&HostValue::Number(1.0)));
}

#[rstest]
fn test_batch_then_parameterized_insert(mut sqlite: Fixture) {
    let db = open(&mut sqlite);
    exec(&mut sqlite, &db, "CREATE TABLE a (k TEXT); CREATE TABLE b (k TEXT);", vec![]);
    let summary = exec(&mut sqlite, &db, "INSERT INTO b (k) VALUES ($1)", vec!["kept".into()]);
    assert_eq!(summary.get("rowsAffected"), Some(&HostValue::Number(1.0)));
    assert_eq!(summary.get("lastInsertId"), Some(&HostValue::Number(1.0)));
}

#[rstest]
fn test_locked_database_times_out(mut sqlite: Fixture) {
    let holder = open(&mut sqlite);
    seed(&mut sqlite, &holder);
    exec(&mut sqlite, &holder, "BEGIN EXCLUSIVE", vec![]);
    exec(&mut sqlite, &holder, "DELETE FROM t WHERE id = 1", vec![]);

    let dsn = sqlite.dsn.clone();
    let options = HostValue::Object(IndexMap::from([("timeoutMs".to_string(), HostValue::Number(50.0))]));
    let waiter = sqlite
        .instance
        .call("open", &["sqlite3".into(), dsn.into(), options])
        .unwrap();

    let insert = || vec![waiter.clone(), "INSERT INTO t (k, v) VALUES ($1, $2)".into(), "key-9".into(), "value-9".into()];
    let err = sqlite.instance.call("exec", &insert()).unwrap_err();
    assert_eq!(err.kind(), "ConnectionTimeoutError");
    assert!(err.to_string().contains("waited 50 ms"));
    assert_eq!(sqlite.instance.handle_state(waiter.as_handle().unwrap()), Some(HandleState::Idle));

    exec(&mut sqlite, &holder, "COMMIT", vec![]);
    let summary = sqlite.instance.call("exec", &insert()).unwrap();
    assert_eq!(summary.get("rowsAffected"), Some(&HostValue::Number(1.0)));
}

#[rstest]
fn test_context_end_closes_leftovers(mut sqlite: Fixture) {
    open(&mut sqlite);
    open(&mut sqlite);
    assert_eq!(sqlite.instance.close_all(), 2);
    assert_eq!(sqlite.instance.open_handles(), 0);
}

#[rstest]
fn test_open_with_options(mut sqlite: Fixture) {
    let dsn = sqlite.dsn.clone();
    let options = HostValue::Object(IndexMap::from([
        ("poolSize".to_string(), HostValue::Number(4.0)),
        ("timeoutMs".to_string(), HostValue::Number(250.0)),
    ]));
    let db = sqlite
        .instance
        .call("open", &["sqlite3".into(), dsn.into(), options])
        .unwrap();
    assert!(db.as_handle().is_some());
}

#[rstest]
fn test_open_bad_path(mut sqlite: Fixture) {
    let err = sqlite
        .instance
        .call("open", &["sqlite3".into(), "/nonexistent/dir/test.db".into()])
        .unwrap_err();
    assert_eq!(err.kind(), "ConnectionOpenError");
}
