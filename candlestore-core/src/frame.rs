//! Row-set to DataFrame conversion.
//!
//! SQLite values are gathered column by column, then each column is typed
//! from the storage classes it actually holds. The `date-time` column is
//! parsed into a millisecond `Datetime` column.

use polars::prelude::*;
use rusqlite::types::Value;
use rusqlite::{Params, Statement};

use crate::error::{Result, StoreError};
use crate::schema::{parse_stored, DATE_TIME_COLUMN};

/// Run `stmt` with `params` and collect every row into a DataFrame.
pub fn query_frame<P: Params>(stmt: &mut Statement<'_>, params: P) -> Result<DataFrame> {
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut values: Vec<Vec<Value>> = vec![Vec::new(); names.len()];

    let mut rows = stmt.query(params)?;
    while let Some(row) = rows.next()? {
        for (i, column) in values.iter_mut().enumerate() {
            column.push(row.get::<_, Value>(i)?);
        }
    }

    let columns = names
        .iter()
        .zip(values)
        .map(|(name, vals)| {
            if name == DATE_TIME_COLUMN {
                date_time_column(name, &vals)
            } else {
                Ok(value_column(name, vals))
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DataFrame::new(columns)?)
}

fn date_time_column(name: &str, vals: &[Value]) -> Result<Column> {
    let millis = vals
        .iter()
        .map(|v| match v {
            Value::Null => Ok(None),
            Value::Text(text) => Ok(Some(parse_stored(text)?.and_utc().timestamp_millis())),
            other => Err(StoreError::Parse(format!(
                "{DATE_TIME_COLUMN} value {other:?} is not text"
            ))),
        })
        .collect::<Result<Vec<Option<i64>>>>()?;

    Ok(Column::new(name.into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?)
}

/// Storage classes seen in one column, ignoring NULLs.
#[derive(Default)]
struct Classes {
    integer: bool,
    real: bool,
    text: bool,
}

fn classify(vals: &[Value]) -> Classes {
    let mut c = Classes::default();
    for v in vals {
        match v {
            Value::Null => {}
            Value::Integer(_) => c.integer = true,
            Value::Real(_) => c.real = true,
            Value::Text(_) | Value::Blob(_) => c.text = true,
        }
    }
    c
}

fn value_column(name: &str, vals: Vec<Value>) -> Column {
    let c = classify(&vals);
    let name: PlSmallStr = name.into();

    if c.text {
        let texts: Vec<Option<String>> = vals.into_iter().map(value_to_text).collect();
        return Column::new(name, texts);
    }
    if c.real {
        let reals: Vec<Option<f64>> = vals
            .into_iter()
            .map(|v| match v {
                Value::Integer(i) => Some(i as f64),
                Value::Real(r) => Some(r),
                _ => None,
            })
            .collect();
        return Column::new(name, reals);
    }
    if c.integer {
        let ints: Vec<Option<i64>> = vals
            .into_iter()
            .map(|v| match v {
                Value::Integer(i) => Some(i),
                _ => None,
            })
            .collect();
        return Column::new(name, ints);
    }

    // Empty or all-NULL column
    let nulls: Vec<Option<String>> = vec![None; vals.len()];
    Column::new(name, nulls)
}

fn value_to_text(v: Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(r) => Some(r.to_string()),
        Value::Text(t) => Some(t),
        Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
    }
}
