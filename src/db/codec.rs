//! Conversion between host values, bind parameters and result cells.
//!
//! Encoding turns the variadic script arguments of `exec`/`query` into
//! 1-based `BindParameter`s, rejecting kinds that have no SQL form.
//! Decoding combines the column kind reported by the driver with the native
//! cell value to produce a `ScriptValue`, then into a `HostValue` for the
//! script.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use indexmap::IndexMap;
use tracing::warn;

use super::value::{MAX_SAFE_INTEGER, MIN_SAFE_INTEGER, ScriptValue};
use super::DbError;
use crate::module::HostValue;

/// A positional parameter. `index` starts at 1, matching `$1`-style placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct BindParameter {
    pub index: usize,
    pub value: ScriptValue,
}

/// Type family of a result column, derived from driver metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
    Blob,
    Boolean,
    Timestamp,
    /// No usable metadata (expressions, untyped columns); the native value decides.
    Unknown,
}

impl ColumnKind {
    /// Classify a declared SQL column type.
    ///
    /// Boolean and temporal names are checked first since engines without
    /// those types (SQLite) only know them by declaration. The rest follows
    /// SQLite's affinity rules.
    pub fn from_declared(decl: Option<&str>) -> Self {
        let Some(decl) = decl else {
            return ColumnKind::Unknown;
        };
        let decl = decl.to_ascii_uppercase();

        if decl.contains("BOOL") {
            ColumnKind::Boolean
        } else if decl.contains("DATE") || decl.contains("TIME") {
            ColumnKind::Timestamp
        } else if decl.contains("INT") {
            ColumnKind::Integer
        } else if decl.contains("CHAR") || decl.contains("CLOB") || decl.contains("TEXT") {
            ColumnKind::Text
        } else if decl.contains("BLOB") {
            ColumnKind::Blob
        } else if decl.contains("REAL") || decl.contains("FLOA") || decl.contains("DOUB") {
            ColumnKind::Float
        } else {
            ColumnKind::Unknown
        }
    }
}

/// A cell as the driver produced it, before script coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeCell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

/// One decoded row. Column order matches the driver-reported order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    columns: Arc<[String]>,
    values: Vec<ScriptValue>,
}

impl ResultRow {
    pub fn get(&self, column: &str) -> Option<&ScriptValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.values.get(idx))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[ScriptValue] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScriptValue)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A fully materialized query result. All rows share one column list.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    columns: Arc<[String]>,
    rows: Vec<ResultRow>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns: columns.into(),
            rows: Vec::new(),
        }
    }

    /// Append a row. `values` must line up with the column list.
    pub fn push_row(&mut self, values: Vec<ScriptValue>) {
        debug_assert_eq!(values.len(), self.columns.len());
        self.rows.push(ResultRow {
            columns: Arc::clone(&self.columns),
            values,
        });
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<ResultRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecSummary {
    pub rows_affected: u64,
    pub last_insert_id: Option<i64>,
}

// Encoding: host -> driver

/// Convert the variadic script arguments into positional bind parameters.
pub fn encode_params(args: &[HostValue]) -> Result<Vec<BindParameter>, DbError> {
    args.iter()
        .enumerate()
        .map(|(i, arg)| {
            let index = i + 1;
            encode_value(index, arg).map(|value| BindParameter { index, value })
        })
        .collect()
}

fn encode_value(index: usize, arg: &HostValue) -> Result<ScriptValue, DbError> {
    match arg {
        HostValue::Undefined | HostValue::Null => Ok(ScriptValue::Null),
        HostValue::Bool(b) => Ok(ScriptValue::Bool(*b)),
        HostValue::Number(n) => Ok(encode_number(index, *n)),
        HostValue::BigInt(i) => Ok(ScriptValue::Int(*i)),
        HostValue::String(s) => Ok(ScriptValue::String(s.clone())),
        HostValue::Bytes(b) => Ok(ScriptValue::Bytes(b.clone())),
        HostValue::Date(dt) => Ok(ScriptValue::DateTime(*dt)),
        HostValue::Array(_) | HostValue::Object(_) | HostValue::Function | HostValue::Handle(_) => {
            Err(DbError::UnsupportedParameterType {
                index,
                kind: arg.kind(),
            })
        }
    }
}

fn encode_number(index: usize, n: f64) -> ScriptValue {
    // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound.
    let integral = n.is_finite() && n.fract() == 0.0 && n >= i64::MIN as f64 && n < i64::MAX as f64;
    if !integral {
        return ScriptValue::Float(n);
    }
    if n.abs() > MAX_SAFE_INTEGER as f64 {
        warn!(
            parameter = index,
            value = n,
            "integer parameter exceeds 2^53 and may already have lost precision; pass a bigint to bind it exactly"
        );
    }
    ScriptValue::Int(n as i64)
}

// Decoding: driver -> script

/// Decode one cell of `column` using its kind.
pub fn decode_cell(column: &str, kind: ColumnKind, cell: NativeCell) -> Result<ScriptValue, DbError> {
    match (kind, cell) {
        (_, NativeCell::Null) => Ok(ScriptValue::Null),
        (ColumnKind::Boolean, cell) => decode_boolean(column, cell),
        (ColumnKind::Timestamp, cell) => decode_timestamp(column, cell),
        (ColumnKind::Float, NativeCell::Integer(i)) => Ok(ScriptValue::Float(i as f64)),
        (_, cell) => Ok(native_value(cell)),
    }
}

fn native_value(cell: NativeCell) -> ScriptValue {
    match cell {
        NativeCell::Null => ScriptValue::Null,
        NativeCell::Integer(i) => ScriptValue::Int(i),
        NativeCell::Real(f) => ScriptValue::Float(f),
        NativeCell::Text(s) => ScriptValue::String(s),
        NativeCell::Blob(b) => ScriptValue::Bytes(b),
        NativeCell::Bool(b) => ScriptValue::Bool(b),
        NativeCell::Timestamp(dt) => ScriptValue::DateTime(dt),
    }
}

/// Integer 0 is false and any other integer is true. Text accepts
/// `true`/`false`/`1`/`0` in any case.
fn decode_boolean(column: &str, cell: NativeCell) -> Result<ScriptValue, DbError> {
    match cell {
        NativeCell::Bool(b) => Ok(ScriptValue::Bool(b)),
        NativeCell::Integer(i) => Ok(ScriptValue::Bool(i != 0)),
        NativeCell::Real(f) => Ok(ScriptValue::Bool(f != 0.0)),
        NativeCell::Text(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(ScriptValue::Bool(true)),
            "false" | "0" => Ok(ScriptValue::Bool(false)),
            _ => Err(DbError::ResultDecoding {
                column: column.to_string(),
                message: format!("'{}' is not a boolean", s),
            }),
        },
        other => Err(DbError::ResultDecoding {
            column: column.to_string(),
            message: format!("{} value in a boolean column", native_value(other).kind()),
        }),
    }
}

fn decode_timestamp(column: &str, cell: NativeCell) -> Result<ScriptValue, DbError> {
    match cell {
        NativeCell::Timestamp(dt) => Ok(ScriptValue::DateTime(dt)),
        NativeCell::Text(s) => match parse_timestamp(&s) {
            Some(dt) => Ok(ScriptValue::DateTime(dt)),
            None => {
                warn!(column, "temporal column holds unparseable text; returning it as a string");
                Ok(ScriptValue::String(s))
            }
        },
        NativeCell::Integer(secs) => DateTime::from_timestamp(secs, 0)
            .map(ScriptValue::DateTime)
            .ok_or_else(|| DbError::ResultDecoding {
                column: column.to_string(),
                message: format!("unix time {} is out of range", secs),
            }),
        NativeCell::Real(secs) => {
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round() as u32;
            DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
                .map(ScriptValue::DateTime)
                .ok_or_else(|| DbError::ResultDecoding {
                    column: column.to_string(),
                    message: format!("unix time {} is out of range", secs),
                })
        }
        other => Ok(native_value(other)),
    }
}

/// Parse the text forms engines commonly store timestamps in. Values
/// without an offset are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%#z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// Script-facing shapes

/// Convert a decoded value into the host's representation. Integers outside
/// the safe range become bigints so they keep every digit.
pub fn to_host(value: ScriptValue) -> HostValue {
    match value {
        ScriptValue::Null => HostValue::Null,
        ScriptValue::Bool(b) => HostValue::Bool(b),
        ScriptValue::Int(i) if (MIN_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&i) => {
            HostValue::Number(i as f64)
        }
        ScriptValue::Int(i) => HostValue::BigInt(i),
        ScriptValue::Float(f) => HostValue::Number(f),
        ScriptValue::String(s) => HostValue::String(s),
        ScriptValue::Bytes(b) => HostValue::Bytes(b),
        ScriptValue::DateTime(dt) => HostValue::Date(dt),
    }
}

/// A row as a script record. With duplicate column names the last one wins.
pub fn row_to_host(row: ResultRow) -> HostValue {
    let ResultRow { columns, values } = row;
    let record: IndexMap<String, HostValue> = columns
        .iter()
        .cloned()
        .zip(values.into_iter().map(to_host))
        .collect();
    HostValue::Object(record)
}

/// A result set as an array of records; empty results give an empty array.
pub fn result_set_to_host(set: ResultSet) -> HostValue {
    HostValue::Array(set.into_rows().into_iter().map(row_to_host).collect())
}

/// `{rowsAffected, lastInsertId?}`
pub fn exec_summary_to_host(summary: ExecSummary) -> HostValue {
    let mut record = IndexMap::new();
    record.insert(
        "rowsAffected".to_string(),
        to_host(ScriptValue::Int(summary.rows_affected as i64)),
    );
    if let Some(id) = summary.last_insert_id {
        record.insert("lastInsertId".to_string(), to_host(ScriptValue::Int(id)));
    }
    HostValue::Object(record)
}
