use std::sync::Arc;

use aws_sdk_rdsdata::operation::execute_statement::ExecuteStatementOutput;
use aws_sdk_rdsdata::types::{ColumnMetadata, Field};
use chrono::NaiveDateTime;

use crate::error::DataApiError;
use crate::results::ResultSet;
use crate::types::{RowValues, TIMESTAMP_FORMAT};

/// Build a result set from an `ExecuteStatement` response.
///
/// Statements without records report the server's updated-record count as `rows_affected`.
///
/// # Errors
/// Returns `ExecutionError` if a field has a shape this crate does not model (arrays).
pub fn build_result_set(output: &ExecuteStatementOutput) -> Result<ResultSet, DataApiError> {
    let records = output.records();
    let metadata = output.column_metadata();

    if records.is_empty() && metadata.is_empty() {
        let updated = usize::try_from(output.number_of_records_updated()).unwrap_or(0);
        return Ok(ResultSet::from_rows_affected(updated));
    }

    let width = metadata
        .len()
        .max(records.first().map_or(0, Vec::len));
    let column_names: Vec<String> = (0..width)
        .map(|i| {
            metadata
                .get(i)
                .and_then(|col| col.name().or(col.label()))
                .map_or_else(|| format!("column{i}"), str::to_string)
        })
        .collect();

    let mut result_set = ResultSet::with_capacity(records.len());
    result_set.set_column_names(Arc::new(column_names));

    for record in records {
        let row_values = record
            .iter()
            .enumerate()
            .map(|(i, field)| extract_value(field, metadata.get(i)))
            .collect::<Result<Vec<_>, _>>()?;
        result_set.add_row_values(row_values);
    }

    Ok(result_set)
}

/// Extract a `RowValues` from a Data API field, using the column type to recover timestamps
/// and JSON that the service returns as text.
///
/// # Errors
/// Returns `ExecutionError` for array and unknown field kinds.
pub fn extract_value(
    field: &Field,
    column: Option<&ColumnMetadata>,
) -> Result<RowValues, DataApiError> {
    let type_name = column.and_then(ColumnMetadata::type_name).unwrap_or("");
    let value = match field {
        Field::IsNull(_) => RowValues::Null,
        Field::BooleanValue(b) => RowValues::Bool(*b),
        Field::LongValue(v) => RowValues::Int(*v),
        Field::DoubleValue(v) => RowValues::Float(*v),
        Field::BlobValue(blob) => RowValues::Blob(blob.as_ref().to_vec()),
        Field::StringValue(s) => match type_name {
            "timestamp" | "timestamptz" => NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
                .map_or_else(|_| RowValues::Text(s.clone()), RowValues::Timestamp),
            "json" | "jsonb" => serde_json::from_str(s)
                .map_or_else(|_| RowValues::Text(s.clone()), RowValues::JSON),
            _ => RowValues::Text(s.clone()),
        },
        Field::ArrayValue(_) => {
            return Err(DataApiError::ExecutionError(
                "array column values are not supported".to_string(),
            ));
        }
        _ => {
            return Err(DataApiError::ExecutionError(
                "unknown field kind in Data API response".to_string(),
            ));
        }
    };
    Ok(value)
}
