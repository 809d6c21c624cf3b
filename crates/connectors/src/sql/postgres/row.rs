use bigdecimal::BigDecimal;
use model::{
    core::{data_type::DataType, value::Value},
    records::{column::ColumnMeta, row::Row},
};
use std::str::FromStr;
use tokio_postgres::{Column as PgColumn, Row as PgRow, types::FromSql};
use tracing::warn;

/// Declared type of a Postgres result column; unmapped types read as text.
pub fn column_type(column: &PgColumn) -> DataType {
    DataType::from_postgres_type(column.type_().name()).unwrap_or_else(|_| {
        warn!(
            column = column.name(),
            pg_type = column.type_().name(),
            "Unknown column type, reading as text"
        );
        DataType::Custom(column.type_().name().to_string())
    })
}

pub fn column_meta(columns: &[PgColumn]) -> Vec<ColumnMeta> {
    columns
        .iter()
        .map(|c| ColumnMeta::new(c.name(), column_type(c)))
        .collect()
}

pub fn decode_rows(rows: &[PgRow]) -> Vec<Row> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    let types: Vec<DataType> = first.columns().iter().map(column_type).collect();
    rows.iter().map(|row| decode_row(row, &types)).collect()
}

pub fn decode_row(row: &PgRow, types: &[DataType]) -> Row {
    types
        .iter()
        .enumerate()
        .map(|(idx, data_type)| decode_value(row, idx, data_type))
        .collect()
}

fn decode_value(row: &PgRow, idx: usize, data_type: &DataType) -> Value {
    match data_type {
        DataType::Boolean => get(row, idx, Value::Boolean),
        DataType::Short => get(row, idx, |v: i16| Value::Int(v.into())),
        DataType::Int => get(row, idx, |v: i32| Value::Int(v.into())),
        DataType::Long => get(row, idx, Value::Int),
        DataType::Float => get(row, idx, |v: f32| Value::Float(v.into())),
        DataType::Double => get(row, idx, Value::Float),
        DataType::Decimal => get(row, idx, |v: rust_decimal::Decimal| {
            BigDecimal::from_str(&v.to_string())
                .map(Value::Decimal)
                .unwrap_or(Value::String(v.to_string()))
        }),
        DataType::Char | DataType::VarChar | DataType::String => get(row, idx, Value::String),
        DataType::Bytea => get(row, idx, Value::Bytes),
        DataType::Date => get(row, idx, Value::Date),
        DataType::Time => get(row, idx, Value::Time),
        DataType::Timestamp => get(row, idx, Value::Timestamp),
        DataType::TimestampTz => get(row, idx, Value::TimestampTz),
        DataType::Json => get(row, idx, Value::Json),
        DataType::Uuid => get(row, idx, Value::Uuid),
        DataType::Null | DataType::Custom(_) => get(row, idx, Value::String),
    }
}

fn get<'a, T, F>(row: &'a PgRow, idx: usize, wrap: F) -> Value
where
    T: FromSql<'a>,
    F: FnOnce(T) -> Value,
{
    match row.try_get::<_, Option<T>>(idx) {
        Ok(Some(v)) => wrap(v),
        Ok(None) => Value::Null,
        Err(err) => {
            warn!(column = idx, %err, "Failed to decode Postgres value");
            Value::Null
        }
    }
}
