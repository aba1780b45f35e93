//! Type conversion for the PostgreSQL driver.
//!
//! Handles conversion between:
//! - `ScriptValue` → PostgreSQL parameters (via `ToSql`, chosen by the
//!   parameter type the server inferred)
//! - PostgreSQL result columns → `NativeCell` (via `FromSql`)

use std::error::Error;

use bytes::{BufMut, BytesMut};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use postgres::types::{IsNull, Kind, ToSql, Type, to_sql_checked};
use postgres::Row;

use crate::db::codec::{ColumnKind, NativeCell};
use crate::db::value::{format_timestamp, ScriptValue};
use crate::db::DbError;

type BoxError = Box<dyn Error + Sync + Send>;

/// A script value bound to a PostgreSQL parameter.
///
/// The server decides each parameter's type while preparing the statement,
/// so the value is serialized for that type rather than for its own kind.
#[derive(Debug)]
pub struct PgParam<'a>(pub &'a ScriptValue);

impl ToSql for PgParam<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self.0 {
            ScriptValue::Null => Ok(IsNull::Yes),
            ScriptValue::Bool(b) => match *ty {
                Type::BOOL => b.to_sql(ty, out),
                Type::INT2 => i16::from(*b).to_sql(ty, out),
                Type::INT4 => i32::from(*b).to_sql(ty, out),
                Type::INT8 => i64::from(*b).to_sql(ty, out),
                Type::JSON | Type::JSONB => serde_json::Value::from(*b).to_sql(ty, out),
                _ if is_text(ty) => b.to_string().to_sql(ty, out),
                _ => Err(mismatch(self.0, ty)),
            },
            ScriptValue::Int(i) => int_to_sql(*i, ty, out),
            ScriptValue::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                Type::FLOAT8 => f.to_sql(ty, out),
                Type::INT2 | Type::INT4 | Type::INT8 if f.fract() == 0.0 => int_to_sql(*f as i64, ty, out),
                Type::NUMERIC if f.is_finite() => numeric_to_sql(&f.to_string(), out),
                Type::JSON | Type::JSONB => serde_json::Value::from(*f).to_sql(ty, out),
                _ if is_text(ty) => f.to_string().to_sql(ty, out),
                _ => Err(mismatch(self.0, ty)),
            },
            ScriptValue::String(s) => match *ty {
                Type::JSON | Type::JSONB => {
                    let json: serde_json::Value = serde_json::from_str(s)?;
                    json.to_sql(ty, out)
                }
                Type::NUMERIC => numeric_to_sql(s, out),
                // Enum values travel as their label.
                _ if is_text(ty) || matches!(ty.kind(), Kind::Enum(_)) => s.as_str().to_sql(ty, out),
                _ => Err(mismatch(self.0, ty)),
            },
            ScriptValue::Bytes(b) => match *ty {
                Type::BYTEA => b.as_slice().to_sql(ty, out),
                _ => Err(mismatch(self.0, ty)),
            },
            ScriptValue::DateTime(dt) => match *ty {
                Type::TIMESTAMPTZ => dt.to_sql(ty, out),
                Type::TIMESTAMP => dt.naive_utc().to_sql(ty, out),
                Type::DATE => dt.date_naive().to_sql(ty, out),
                _ if is_text(ty) => format_timestamp(dt).to_sql(ty, out),
                _ => Err(mismatch(self.0, ty)),
            },
        }
    }

    /// Every value is offered to the server; `to_sql` rejects the
    /// combinations it cannot encode.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn int_to_sql(i: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => i16::try_from(i)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(i)?.to_sql(ty, out),
        Type::INT8 => i.to_sql(ty, out),
        Type::OID => u32::try_from(i)?.to_sql(ty, out),
        Type::FLOAT4 => (i as f32).to_sql(ty, out),
        Type::FLOAT8 => (i as f64).to_sql(ty, out),
        Type::NUMERIC => numeric_to_sql(&i.to_string(), out),
        Type::BOOL => (i != 0).to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::Value::from(i).to_sql(ty, out),
        _ if is_text(ty) => i.to_string().to_sql(ty, out),
        _ => Err(mismatch(&ScriptValue::Int(i), ty)),
    }
}

fn is_text(ty: &Type) -> bool {
    <&str as ToSql>::accepts(ty)
}

fn mismatch(value: &ScriptValue, ty: &Type) -> BoxError {
    let cast = match value {
        ScriptValue::Bool(_) => "bool",
        ScriptValue::Int(_) => "int8",
        ScriptValue::Float(_) => "float8",
        ScriptValue::Bytes(_) => "bytea",
        ScriptValue::DateTime(_) => "timestamptz",
        ScriptValue::Null | ScriptValue::String(_) => "text",
    };
    format!(
        "cannot bind {} to {}; cast the placeholder, e.g. $1::{}",
        value.kind(),
        ty.name(),
        cast
    )
    .into()
}

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;

/// Write a plain decimal literal (`-12.50`) in the NUMERIC binary format:
/// a header of digit count, weight, sign and display scale followed by
/// base-10000 digits.
fn numeric_to_sql(text: &str, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    let invalid = || -> BoxError { format!("'{}' is not a decimal number", text).into() };

    let trimmed = text.trim();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part) {
        return Err(invalid());
    }

    let scale = u16::try_from(frac_part.len()).map_err(|_| invalid())?;
    let int_part = int_part.trim_start_matches('0');
    let frac_part = frac_part.trim_end_matches('0');

    // Align both halves on the decimal point in groups of four digits.
    let mut padded = "0".repeat((4 - int_part.len() % 4) % 4);
    padded.push_str(int_part);
    let int_groups = padded.len() / 4;
    padded.push_str(frac_part);
    padded.push_str(&"0".repeat((4 - frac_part.len() % 4) % 4));

    let mut digits = padded
        .as_bytes()
        .chunks(4)
        .map(|chunk| chunk.iter().fold(0i16, |acc, b| acc * 10 + i16::from(b - b'0')))
        .collect::<Vec<_>>();
    let mut weight = i16::try_from(int_groups).map_err(|_| invalid())? - 1;

    let leading = digits.iter().take_while(|d| **d == 0).count();
    digits.drain(..leading);
    weight -= i16::try_from(leading).map_err(|_| invalid())?;
    while digits.last() == Some(&0) {
        digits.pop();
    }

    let sign = if negative && !digits.is_empty() { NUMERIC_NEG } else { NUMERIC_POS };
    if digits.is_empty() {
        weight = 0;
    }

    out.put_i16(i16::try_from(digits.len()).map_err(|_| invalid())?);
    out.put_i16(weight);
    out.put_u16(sign);
    out.put_u16(scale);
    for digit in digits {
        out.put_i16(digit);
    }
    Ok(IsNull::No)
}

/// Column kind for a PostgreSQL type, or `None` when it cannot be represented.
pub fn column_kind(ty: &Type) -> Option<ColumnKind> {
    let kind = match *ty {
        Type::BOOL => ColumnKind::Boolean,
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => ColumnKind::Integer,
        Type::FLOAT4 | Type::FLOAT8 => ColumnKind::Float,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN | Type::JSON | Type::JSONB => {
            ColumnKind::Text
        }
        Type::BYTEA => ColumnKind::Blob,
        Type::TIMESTAMPTZ | Type::TIMESTAMP | Type::DATE => ColumnKind::Timestamp,
        _ => return None,
    };
    Some(kind)
}

/// Read column `idx` of `row` as a native cell.
pub fn native_cell(row: &Row, idx: usize) -> Result<NativeCell, DbError> {
    let column = &row.columns()[idx];
    let ty = column.type_();
    let name = column.name();

    let decode_err = |e: postgres::Error| DbError::ResultDecoding {
        column: name.to_string(),
        message: e.to_string(),
    };

    let cell = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx).map_err(decode_err)?.map(NativeCell::Bool),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)
            .map_err(decode_err)?
            .map(|v| NativeCell::Integer(v.into())),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)
            .map_err(decode_err)?
            .map(|v| NativeCell::Integer(v.into())),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx).map_err(decode_err)?.map(NativeCell::Integer),
        Type::OID => row
            .try_get::<_, Option<u32>>(idx)
            .map_err(decode_err)?
            .map(|v| NativeCell::Integer(v.into())),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)
            .map_err(decode_err)?
            .map(|v| NativeCell::Real(v.into())),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx).map_err(decode_err)?.map(NativeCell::Real),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => row
            .try_get::<_, Option<String>>(idx)
            .map_err(decode_err)?
            .map(NativeCell::Text),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .map_err(decode_err)?
            .map(|v| NativeCell::Text(v.to_string())),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx).map_err(decode_err)?.map(NativeCell::Blob),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)
            .map_err(decode_err)?
            .map(NativeCell::Timestamp),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)
            .map_err(decode_err)?
            .map(|v| NativeCell::Timestamp(v.and_utc())),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)
            .map_err(decode_err)?
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|v| NativeCell::Timestamp(v.and_utc())),
        _ => return Err(unsupported_column(name, ty)),
    };

    Ok(cell.unwrap_or(NativeCell::Null))
}

pub fn unsupported_column(name: &str, ty: &Type) -> DbError {
    DbError::ResultDecoding {
        column: name.to_string(),
        message: format!(
            "unsupported column type '{}'; cast it in SQL, e.g. {}::text",
            ty.name(),
            name
        ),
    }
}
