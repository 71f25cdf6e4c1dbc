use std::borrow::Cow;
use std::error::Error;

use chrono::{NaiveDate, NaiveDateTime};
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use tokio_util::bytes;

use crate::error::DataApiError;
use crate::params::Params;
use crate::translation::to_positional;
use crate::types::{RowValues, TIMESTAMP_FORMAT};

type BoxedError = Box<dyn Error + Sync + Send>;

/// Rewrite `:name` placeholders to `$N` and line the values up with the new positions.
///
/// # Errors
/// Returns `DataApiError::ParameterError` if a placeholder has no bound parameter.
pub fn bind_named<'a>(
    sql: &'a str,
    params: &'a Params,
) -> Result<(Cow<'a, str>, Vec<&'a RowValues>), DataApiError> {
    let (rewritten, order) = to_positional(sql);
    let values = order
        .iter()
        .map(|name| {
            params.get(name).ok_or_else(|| {
                DataApiError::ParameterError(format!(
                    "placeholder `:{name}` has no bound parameter"
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((rewritten, values))
}

/// Coerces loosely, the way the Data API casts `stringValue`/`longValue` parameters: text binds
/// to numeric, boolean, timestamp, and JSON columns, and numbers bind to text.
impl ToSql for RowValues {
    fn to_sql(&self, ty: &Type, out: &mut bytes::BytesMut) -> Result<IsNull, BoxedError> {
        match self {
            RowValues::Null => Ok(IsNull::Yes),
            RowValues::Int(i) => int_to_sql(*i, ty, out),
            RowValues::Float(f) => match *ty {
                Type::FLOAT4 => {
                    #[allow(clippy::cast_possible_truncation)]
                    let narrowed = *f as f32;
                    narrowed.to_sql(ty, out)
                }
                Type::FLOAT8 => f.to_sql(ty, out),
                _ => f.to_string().to_sql(ty, out),
            },
            RowValues::Text(s) => text_to_sql(s, ty, out),
            RowValues::Bool(b) => match *ty {
                Type::BOOL => b.to_sql(ty, out),
                _ => b.to_string().to_sql(ty, out),
            },
            RowValues::Timestamp(dt) => timestamp_to_sql(dt, ty, out),
            RowValues::JSON(json) => match *ty {
                Type::JSON | Type::JSONB => json.to_sql(ty, out),
                _ => json.to_string().to_sql(ty, out),
            },
            RowValues::Blob(bytes) => bytes.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::TEXT
                | Type::VARCHAR
                | Type::BPCHAR
                | Type::NAME
                | Type::UNKNOWN
                | Type::BOOL
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::DATE
                | Type::JSON
                | Type::JSONB
                | Type::BYTEA
        )
    }

    to_sql_checked!();
}

fn int_to_sql(i: i64, ty: &Type, out: &mut bytes::BytesMut) -> Result<IsNull, BoxedError> {
    match *ty {
        Type::INT2 => i16::try_from(i)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(i)?.to_sql(ty, out),
        Type::INT8 => i.to_sql(ty, out),
        #[allow(clippy::cast_precision_loss)]
        Type::FLOAT8 => (i as f64).to_sql(ty, out),
        #[allow(clippy::cast_precision_loss)]
        Type::FLOAT4 => (i as f32).to_sql(ty, out),
        Type::BOOL => (i != 0).to_sql(ty, out),
        _ => i.to_string().to_sql(ty, out),
    }
}

fn timestamp_to_sql(
    dt: &NaiveDateTime,
    ty: &Type,
    out: &mut bytes::BytesMut,
) -> Result<IsNull, BoxedError> {
    match *ty {
        Type::TIMESTAMP => dt.to_sql(ty, out),
        // naive values are taken as UTC
        Type::TIMESTAMPTZ => dt.and_utc().to_sql(ty, out),
        Type::DATE => dt.date().to_sql(ty, out),
        _ => dt.format(TIMESTAMP_FORMAT).to_string().to_sql(ty, out),
    }
}

fn text_to_sql(s: &str, ty: &Type, out: &mut bytes::BytesMut) -> Result<IsNull, BoxedError> {
    match *ty {
        Type::INT2 | Type::INT4 | Type::INT8 => int_to_sql(s.trim().parse::<i64>()?, ty, out),
        Type::FLOAT4 | Type::FLOAT8 => RowValues::Float(s.trim().parse::<f64>()?).to_sql(ty, out),
        Type::BOOL => s.trim().parse::<bool>()?.to_sql(ty, out),
        Type::DATE => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")?.to_sql(ty, out),
        Type::TIMESTAMP | Type::TIMESTAMPTZ => {
            timestamp_to_sql(&NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT)?, ty, out)
        }
        Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out),
        Type::BYTEA => s.as_bytes().to_sql(ty, out),
        _ => s.to_sql(ty, out),
    }
}
