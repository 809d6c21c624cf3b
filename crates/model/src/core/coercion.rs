use crate::core::value::Value;
use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// A stored value has no conversion path to the requested shape.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("cannot convert {value} to {target}")]
pub struct CoercionError {
    pub target: &'static str,
    pub value: String,
}

impl CoercionError {
    fn new(target: &'static str, value: &Value) -> Self {
        Self {
            target,
            value: value.to_string(),
        }
    }
}

/// Conversion from a non-null stored value to a requested Rust shape.
///
/// Callers handle `Value::Null` themselves; implementations treat it as
/// having no conversion path.
pub trait FromValue: Sized {
    const TARGET: &'static str;

    fn from_value(value: &Value) -> Result<Self, CoercionError>;
}

impl FromValue for Value {
    const TARGET: &'static str = "object";

    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    const TARGET: &'static str = "boolean";

    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        value
            .as_bool()
            .ok_or_else(|| CoercionError::new(Self::TARGET, value))
    }
}

impl FromValue for i64 {
    const TARGET: &'static str = "long";

    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        let err = || CoercionError::new(Self::TARGET, value);
        match value {
            Value::Int(v) => Ok(*v),
            Value::Uint(v) => i64::try_from(*v).map_err(|_| err()),
            Value::Float(v) => float_to_i64(*v).ok_or_else(err),
            Value::Decimal(v) => v.with_scale(0).to_i64().ok_or_else(err),
            Value::Boolean(v) => Ok(i64::from(*v)),
            Value::String(s) => {
                let trimmed = s.trim();
                if let Ok(v) = trimmed.parse::<i64>() {
                    return Ok(v);
                }
                BigDecimal::from_str(trimmed)
                    .ok()
                    .and_then(|d| d.with_scale(0).to_i64())
                    .ok_or_else(err)
            }
            Value::Json(v) => v.as_i64().ok_or_else(err),
            _ => Err(err()),
        }
    }
}

impl FromValue for i32 {
    const TARGET: &'static str = "int";

    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        narrow::<i32>(value, Self::TARGET)
    }
}

impl FromValue for i16 {
    const TARGET: &'static str = "short";

    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        narrow::<i16>(value, Self::TARGET)
    }
}

impl FromValue for f64 {
    const TARGET: &'static str = "double";

    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        value
            .as_f64()
            .ok_or_else(|| CoercionError::new(Self::TARGET, value))
    }
}

impl FromValue for f32 {
    const TARGET: &'static str = "float";

    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        let v = value
            .as_f64()
            .ok_or_else(|| CoercionError::new(Self::TARGET, value))?;
        if v.is_finite() && v.abs() > f32::MAX as f64 {
            return Err(CoercionError::new(Self::TARGET, value));
        }
        Ok(v as f32)
    }
}

impl FromValue for String {
    const TARGET: &'static str = "string";

    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        value
            .as_string()
            .ok_or_else(|| CoercionError::new(Self::TARGET, value))
    }
}

impl FromValue for BigDecimal {
    const TARGET: &'static str = "decimal";

    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        let err = || CoercionError::new(Self::TARGET, value);
        match value {
            Value::Decimal(v) => Ok(v.clone()),
            Value::Int(v) => Ok(BigDecimal::from(*v)),
            Value::Uint(v) => Ok(BigDecimal::from(*v)),
            Value::Float(v) => BigDecimal::from_f64(*v).ok_or_else(err),
            Value::Boolean(v) => Ok(BigDecimal::from(i64::from(*v))),
            Value::String(s) => BigDecimal::from_str(s.trim()).map_err(|_| err()),
            Value::Json(v) => v
                .as_f64()
                .and_then(BigDecimal::from_f64)
                .ok_or_else(err),
            _ => Err(err()),
        }
    }
}

impl FromValue for Vec<u8> {
    const TARGET: &'static str = "bytes";

    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::String(s) => Ok(s.as_bytes().to_vec()),
            Value::Uuid(u) => Ok(u.as_bytes().to_vec()),
            other => Err(CoercionError::new(Self::TARGET, other)),
        }
    }
}

impl FromValue for NaiveDate {
    const TARGET: &'static str = "date";

    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::Timestamp(ts) => Ok(ts.date()),
            Value::TimestampTz(ts) => Ok(ts.date_naive()),
            Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .ok()
                .or_else(|| parse_datetime(s).map(|ts| ts.date()))
                .ok_or_else(|| CoercionError::new(Self::TARGET, value)),
            other => Err(CoercionError::new(Self::TARGET, other)),
        }
    }
}

impl FromValue for NaiveTime {
    const TARGET: &'static str = "time";

    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Time(t) => Ok(*t),
            Value::Timestamp(ts) => Ok(ts.time()),
            Value::TimestampTz(ts) => Ok(ts.naive_utc().time()),
            Value::String(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
                .ok()
                .or_else(|| NaiveTime::parse_from_str(s.trim(), "%H:%M").ok())
                .ok_or_else(|| CoercionError::new(Self::TARGET, value)),
            other => Err(CoercionError::new(Self::TARGET, other)),
        }
    }
}

impl FromValue for NaiveDateTime {
    const TARGET: &'static str = "timestamp";

    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Timestamp(ts) => Ok(*ts),
            Value::TimestampTz(ts) => Ok(ts.naive_utc()),
            Value::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
            Value::String(s) => {
                parse_datetime(s).ok_or_else(|| CoercionError::new(Self::TARGET, value))
            }
            other => Err(CoercionError::new(Self::TARGET, other)),
        }
    }
}

impl FromValue for Uuid {
    const TARGET: &'static str = "uuid";

    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Uuid(u) => Ok(*u),
            Value::String(s) => {
                Uuid::parse_str(s.trim()).map_err(|_| CoercionError::new(Self::TARGET, value))
            }
            Value::Bytes(b) => {
                Uuid::from_slice(b).map_err(|_| CoercionError::new(Self::TARGET, value))
            }
            other => Err(CoercionError::new(Self::TARGET, other)),
        }
    }
}

impl FromValue for serde_json::Value {
    const TARGET: &'static str = "json";

    fn from_value(value: &Value) -> Result<Self, CoercionError> {
        match value {
            Value::Json(v) => Ok(v.clone()),
            Value::String(s) => Ok(serde_json::from_str(s)
                .unwrap_or_else(|_| serde_json::Value::String(s.clone()))),
            Value::Int(v) => Ok(serde_json::json!(v)),
            Value::Uint(v) => Ok(serde_json::json!(v)),
            Value::Float(v) => Ok(serde_json::json!(v)),
            Value::Boolean(v) => Ok(serde_json::Value::Bool(*v)),
            Value::Null => Err(CoercionError::new(Self::TARGET, value)),
            other => Ok(serde_json::Value::String(
                other.as_string().unwrap_or_default(),
            )),
        }
    }
}

fn narrow<T>(value: &Value, target: &'static str) -> Result<T, CoercionError>
where
    T: TryFrom<i64>,
{
    let wide = i64::from_value(value).map_err(|_| CoercionError::new(target, value))?;
    T::try_from(wide).map_err(|_| CoercionError::new(target, value))
}

fn float_to_i64(v: f64) -> Option<i64> {
    if !v.is_finite() {
        return None;
    }
    let truncated = v.trunc();
    if truncated < i64::MIN as f64 || truncated > i64::MAX as f64 {
        return None;
    }
    Some(truncated as i64)
}

/// Parses the timestamp spellings servers commonly send as text.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.naive_utc())
}
