//! Typed column access for [`Cursor`].
//!
//! Every getter checks, in order, that the cursor is open, that it is on a
//! row and that the column index is in range. A null cell sets
//! [`Cursor::was_null`] and yields the getter's zero value.

use crate::cursor::{Cursor, CursorState};
use crate::zone::instant_in;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use cursor_core::error::CursorError;
use model::core::{coercion::FromValue, value::Value};
use uuid::Uuid;

impl Cursor {
    fn cell(&self, column: usize) -> Result<&Value, CursorError> {
        self.ensure_open()?;
        if self.state() != CursorState::OnRow {
            return Err(CursorError::InvalidCursorPosition);
        }
        let row = self
            .window
            .current_row()
            .ok_or(CursorError::InvalidCursorPosition)?;
        let unknown = || {
            CursorError::UnknownColumn(format!(
                "index {column} (column count {})",
                self.column_count()
            ))
        };
        if column == 0 || column > self.column_count() {
            return Err(unknown());
        }
        row.get(column - 1).ok_or_else(unknown)
    }

    /// Value of `column` converted to `T`; `None` for SQL NULL.
    pub fn get<T: FromValue>(&mut self, column: usize) -> Result<Option<T>, CursorError> {
        let converted = match self.cell(column)? {
            Value::Null => None,
            value => Some(T::from_value(value).map_err(|e| CursorError::coercion(column, e))),
        };
        self.was_null = converted.is_none();
        converted.transpose()
    }

    pub fn get_by_name<T: FromValue>(&mut self, name: &str) -> Result<Option<T>, CursorError> {
        let column = self.find_column(name)?;
        self.get(column)
    }

    pub fn get_object(&mut self, column: usize) -> Result<Option<Value>, CursorError> {
        self.get::<Value>(column)
    }

    pub fn get_boolean(&mut self, column: usize) -> Result<bool, CursorError> {
        Ok(self.get::<bool>(column)?.unwrap_or(false))
    }

    pub fn get_short(&mut self, column: usize) -> Result<i16, CursorError> {
        Ok(self.get::<i16>(column)?.unwrap_or(0))
    }

    pub fn get_int(&mut self, column: usize) -> Result<i32, CursorError> {
        Ok(self.get::<i32>(column)?.unwrap_or(0))
    }

    pub fn get_long(&mut self, column: usize) -> Result<i64, CursorError> {
        Ok(self.get::<i64>(column)?.unwrap_or(0))
    }

    pub fn get_float(&mut self, column: usize) -> Result<f32, CursorError> {
        Ok(self.get::<f32>(column)?.unwrap_or(0.0))
    }

    pub fn get_double(&mut self, column: usize) -> Result<f64, CursorError> {
        Ok(self.get::<f64>(column)?.unwrap_or(0.0))
    }

    pub fn get_string(&mut self, column: usize) -> Result<Option<String>, CursorError> {
        self.get::<String>(column)
    }

    pub fn get_big_decimal(&mut self, column: usize) -> Result<Option<BigDecimal>, CursorError> {
        self.get::<BigDecimal>(column)
    }

    pub fn get_bytes(&mut self, column: usize) -> Result<Option<Vec<u8>>, CursorError> {
        self.get::<Vec<u8>>(column)
    }

    pub fn get_uuid(&mut self, column: usize) -> Result<Option<Uuid>, CursorError> {
        self.get::<Uuid>(column)
    }

    pub fn get_json(&mut self, column: usize) -> Result<Option<serde_json::Value>, CursorError> {
        self.get::<serde_json::Value>(column)
    }

    pub fn get_int_by_name(&mut self, name: &str) -> Result<i32, CursorError> {
        Ok(self.get_by_name::<i32>(name)?.unwrap_or(0))
    }

    pub fn get_long_by_name(&mut self, name: &str) -> Result<i64, CursorError> {
        Ok(self.get_by_name::<i64>(name)?.unwrap_or(0))
    }

    pub fn get_string_by_name(&mut self, name: &str) -> Result<Option<String>, CursorError> {
        self.get_by_name::<String>(name)
    }

    /// Timestamp as seen from the client zone.
    pub fn get_timestamp(&mut self, column: usize) -> Result<Option<NaiveDateTime>, CursorError> {
        let zone = self.zones.client();
        self.get_timestamp_in(column, zone)
    }

    /// Timestamp as seen from `zone`, overriding the client zone.
    pub fn get_timestamp_in(
        &mut self,
        column: usize,
        zone: Tz,
    ) -> Result<Option<NaiveDateTime>, CursorError> {
        let shifted = match self.get::<Value>(column)? {
            None => None,
            Some(Value::TimestampTz(instant)) => Some(instant_in(instant, zone)),
            Some(value) => {
                let wall = NaiveDateTime::from_value(&value)
                    .map_err(|e| CursorError::coercion(column, e))?;
                Some(self.zones.to_zone(wall, zone))
            }
        };
        Ok(shifted)
    }

    /// Calendar date in the client zone. Date-only values are not shifted.
    pub fn get_date(&mut self, column: usize) -> Result<Option<NaiveDate>, CursorError> {
        match self.get::<Value>(column)? {
            None => Ok(None),
            Some(Value::Date(date)) => Ok(Some(date)),
            Some(Value::Timestamp(_) | Value::TimestampTz(_)) => {
                Ok(self.get_timestamp(column)?.map(|ts| ts.date()))
            }
            Some(value) => NaiveDate::from_value(&value)
                .map(Some)
                .map_err(|e| CursorError::coercion(column, e)),
        }
    }

    /// Time of day in the client zone. Time-only values are not shifted.
    pub fn get_time(&mut self, column: usize) -> Result<Option<NaiveTime>, CursorError> {
        match self.get::<Value>(column)? {
            None => Ok(None),
            Some(Value::Time(time)) => Ok(Some(time)),
            Some(Value::Timestamp(_) | Value::TimestampTz(_)) => {
                Ok(self.get_timestamp(column)?.map(|ts| ts.time()))
            }
            Some(value) => NaiveTime::from_value(&value)
                .map(Some)
                .map_err(|e| CursorError::coercion(column, e)),
        }
    }

    /// Output parameter `index` of a callable statement, converted to `T`.
    pub fn get_out<T: FromValue>(&mut self, index: usize) -> Result<Option<T>, CursorError> {
        self.ensure_open()?;
        let column = match &self.out_params {
            Some(params) => params.column_for(index)?,
            None => return Err(CursorError::UnknownOutputParameter { index }),
        };
        self.get(column)
    }
}
