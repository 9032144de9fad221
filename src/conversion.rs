//! Value conversion between native rows and declared types.
//!
//! Native cursors hand values back mostly as text (dates and numbers are
//! rendered with the session NLS settings applied at connect time), so the
//! result side parses, while the parameter side coerces caller values into
//! the representation the declared type binds as.

use chrono::NaiveDateTime;

use crate::error::SqlMiddlewareDbError;
use crate::types::{DataType, RowValues};

/// `chrono` pattern matching the session `NLS_DATE_FORMAT`.
pub const SESSION_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Convert one fetched row according to the declared result types.
///
/// Columns beyond `types.len()` pass through untouched, as do NULLs.
///
/// # Errors
///
/// Returns `SqlMiddlewareDbError::ConversionError` if a value cannot be
/// represented as its declared type.
pub fn convert_result_row(
    types: &[DataType],
    row: Vec<RowValues>,
) -> Result<Vec<RowValues>, SqlMiddlewareDbError> {
    row.into_iter()
        .enumerate()
        .map(|(idx, value)| match types.get(idx) {
            Some(ty) => convert_result_value(*ty, value),
            None => Ok(value),
        })
        .collect()
}

fn convert_result_value(ty: DataType, value: RowValues) -> Result<RowValues, SqlMiddlewareDbError> {
    if value.is_null() {
        return Ok(value);
    }
    let converted = match (ty, value) {
        (DataType::Integer, RowValues::Text(s)) => RowValues::Int(parse_int(&s)?),
        #[allow(clippy::cast_possible_truncation)]
        (DataType::Integer, RowValues::Float(f)) if f.fract() == 0.0 => RowValues::Int(f as i64),
        (DataType::Float, RowValues::Text(s)) => RowValues::Float(parse_float(&s)?),
        #[allow(clippy::cast_precision_loss)]
        (DataType::Float, RowValues::Int(i)) => RowValues::Float(i as f64),
        (DataType::Boolean, RowValues::Text(s)) => RowValues::Bool(parse_bool(&s)?),
        (DataType::Boolean, RowValues::Int(i)) => RowValues::Bool(i != 0),
        (DataType::Timestamp, RowValues::Text(s)) => RowValues::Timestamp(
            NaiveDateTime::parse_from_str(s.trim(), SESSION_DATE_FORMAT).map_err(|e| {
                SqlMiddlewareDbError::ConversionError(format!("'{s}' is not a timestamp: {e}"))
            })?,
        ),
        (DataType::Text | DataType::Clob, RowValues::Blob(bytes)) => {
            RowValues::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
        (DataType::Text | DataType::Clob, RowValues::Int(i)) => RowValues::Text(i.to_string()),
        (DataType::Text | DataType::Clob, RowValues::Float(f)) => RowValues::Text(f.to_string()),
        (DataType::Blob, RowValues::Text(s)) => RowValues::Blob(s.into_bytes()),
        (_, other) => other,
    };
    Ok(converted)
}

/// Coerce a caller value into the form its declared parameter type binds as.
///
/// # Errors
///
/// Returns `SqlMiddlewareDbError::ParameterError` if the value cannot be
/// represented as `ty`.
pub fn coerce_param(
    value: &RowValues,
    ty: Option<DataType>,
) -> Result<RowValues, SqlMiddlewareDbError> {
    let Some(ty) = ty else {
        return Ok(value.clone());
    };
    let coerced = match (ty, value) {
        (_, RowValues::Null) => RowValues::Null,
        (DataType::Integer, RowValues::Text(s)) => {
            RowValues::Int(parse_int(s).map_err(|_| not_a(s, "an integer"))?)
        }
        (DataType::Integer, RowValues::Bool(b)) => RowValues::Int(i64::from(*b)),
        (DataType::Float, RowValues::Text(s)) => {
            RowValues::Float(parse_float(s).map_err(|_| not_a(s, "a number"))?)
        }
        #[allow(clippy::cast_precision_loss)]
        (DataType::Float, RowValues::Int(i)) => RowValues::Float(*i as f64),
        // booleans are stored as NUMBER(1)
        (DataType::Boolean, RowValues::Bool(b)) => RowValues::Int(i64::from(*b)),
        (DataType::Boolean, RowValues::Int(i)) => RowValues::Int(i64::from(*i != 0)),
        (DataType::Boolean, RowValues::Text(s)) => {
            RowValues::Int(i64::from(parse_bool(s).map_err(|_| not_a(s, "a boolean"))?))
        }
        (DataType::Timestamp, RowValues::Timestamp(dt)) => {
            RowValues::Text(dt.format(SESSION_DATE_FORMAT).to_string())
        }
        (DataType::Timestamp, RowValues::Text(s)) => {
            NaiveDateTime::parse_from_str(s, SESSION_DATE_FORMAT).map_err(|e| {
                SqlMiddlewareDbError::ParameterError(format!("'{s}' is not a timestamp: {e}"))
            })?;
            RowValues::Text(s.clone())
        }
        (DataType::Text, RowValues::Int(i)) => RowValues::Text(i.to_string()),
        (DataType::Text, RowValues::Float(f)) => RowValues::Text(f.to_string()),
        (DataType::Text, RowValues::JSON(v)) => RowValues::Text(v.to_string()),
        (DataType::Text, RowValues::Bool(b)) => RowValues::Text(i64::from(*b).to_string()),
        (ty, other @ (RowValues::Blob(_) | RowValues::JSON(_))) if !ty.is_lob() => {
            return Err(SqlMiddlewareDbError::ParameterError(format!(
                "{other:?} cannot be bound as {ty:?}"
            )));
        }
        (_, other) => other.clone(),
    };
    Ok(coerced)
}

fn not_a(value: &str, what: &str) -> SqlMiddlewareDbError {
    SqlMiddlewareDbError::ParameterError(format!("'{value}' is not {what}"))
}

fn parse_int(s: &str) -> Result<i64, SqlMiddlewareDbError> {
    s.trim()
        .parse::<i64>()
        .map_err(|e| SqlMiddlewareDbError::ConversionError(format!("'{s}' is not an integer: {e}")))
}

fn parse_float(s: &str) -> Result<f64, SqlMiddlewareDbError> {
    s.trim()
        .parse::<f64>()
        .map_err(|e| SqlMiddlewareDbError::ConversionError(format!("'{s}' is not a number: {e}")))
}

fn parse_bool(s: &str) -> Result<bool, SqlMiddlewareDbError> {
    match s.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "Y" | "y" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "N" | "n" => Ok(false),
        other => Err(SqlMiddlewareDbError::ConversionError(format!(
            "'{other}' is not a boolean"
        ))),
    }
}
