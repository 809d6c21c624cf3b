use crate::error::CliError;
use cursor_client::{Cursor, CursorError};
use model::{
    core::value::Value,
    records::{column::ColumnMeta, row::Row},
};
use serde_json::{Map, json};

/// Row as a JSON object keyed by column name.
pub fn row_json(columns: &[ColumnMeta], row: &Row) -> serde_json::Value {
    let object: Map<String, serde_json::Value> = columns
        .iter()
        .zip(row.values())
        .map(|(column, value)| (column.name.clone(), value_json(value)))
        .collect();
    serde_json::Value::Object(object)
}

fn value_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Int(v) => json!(v),
        Value::Uint(v) => json!(v),
        Value::Float(v) => json!(v),
        Value::Boolean(v) => json!(v),
        Value::Json(v) => v.clone(),
        other => json!(other.as_string()),
    }
}

pub fn print_step(
    step: &str,
    cursor: &Cursor,
    outcome: Result<bool, CursorError>,
) -> Result<(), CliError> {
    let line = match outcome {
        Ok(moved) => json!({
            "step": step,
            "moved": moved,
            "row": cursor.row(),
            "values": cursor.current_row().map(|r| row_json(cursor.columns(), r)),
        }),
        Err(err) => json!({
            "step": step,
            "error": err.to_string(),
            "row": cursor.row(),
        }),
    };
    println!("{}", serde_json::to_string(&line)?);
    Ok(())
}

pub fn print_row(columns: &[ColumnMeta], row_number: i64, row: &Row) -> Result<(), CliError> {
    let line = json!({ "row": row_number, "values": row_json(columns, row) });
    println!("{}", serde_json::to_string(&line)?);
    Ok(())
}
