//! Helper utilities for testing and development.

use std::sync::Arc;

use crate::error::DataApiError;
use crate::results::{CustomDbRow, ResultSet};
use crate::target::ConnectionTarget;
use crate::types::RowValues;

use super::mock::MockStatement;

/// Rows of the `tenant` table used by the row-level-security fixtures.
pub const TENANT_ROWS: [(i64, &str, i64); 3] =
    [(1, "Tenant1", 50000), (2, "Tenant2", 60000), (3, "Tenant3", 40000)];

/// Schema, seed data, and policy for the `tenant` table.
pub const TENANT_SCHEMA_SQL: &str = "
CREATE TABLE tenant ( tenant_id integer PRIMARY KEY, tenant_name text, account_balance numeric );
INSERT INTO tenant VALUES (1, 'Tenant1', 50000), (2, 'Tenant2', 60000), (3, 'Tenant3', 40000);
CREATE POLICY tenant_policy ON tenant USING (tenant_id = current_setting('tenant.id')::integer);
ALTER TABLE tenant ENABLE ROW LEVEL SECURITY;
CREATE FUNCTION get_tenant_data(id integer)
RETURNS TABLE (tenant_id integer, tenant_name text, account_balance numeric) AS $$
BEGIN
    PERFORM set_config('tenant.id', id::text, true);
    RETURN QUERY SELECT t.tenant_id, t.tenant_name, t.account_balance FROM tenant t;
END
$$ LANGUAGE plpgsql;
";

/// Create a test row with the given column names and values.
#[must_use]
pub fn create_test_row(column_names: Vec<String>, values: Vec<RowValues>) -> CustomDbRow {
    CustomDbRow::new(Arc::new(column_names), values)
}

/// A well-formed target that never leaves the process.
///
/// # Panics
/// Never; the literal ARNs are valid.
#[must_use]
pub fn test_target() -> ConnectionTarget {
    ConnectionTarget::new(
        "arn:aws:rds:us-east-1:123456789012:cluster:tenant-cluster",
        "arn:aws:secretsmanager:us-east-1:123456789012:secret:tenant-secret",
        "postgres",
    )
    .expect("fixture target is valid")
}

/// Responder for [`MockDataApi`](super::MockDataApi) that behaves like the `tenant` table under
/// its row-level-security policy.
///
/// Reads filter on the `tenant.id` session setting and fail like Postgres when it is unset.
/// `get_tenant_data(:id)` filters on its parameter instead.
///
/// # Errors
/// Returns `StatementError` for unset settings or statements it does not model.
pub fn tenant_table_responder(statement: &MockStatement<'_>) -> Result<ResultSet, DataApiError> {
    let sql = statement.sql.to_ascii_lowercase();

    let tenant = if sql.contains("get_tenant_data(") {
        let id = statement
            .params
            .iter()
            .next()
            .map(|p| &p.value)
            .ok_or_else(|| {
                DataApiError::StatementError("function get_tenant_data() does not exist".into())
            })?;
        match id {
            RowValues::Int(i) => *i,
            RowValues::Text(s) => parse_tenant(s)?,
            other => {
                return Err(DataApiError::StatementError(format!(
                    "invalid input for get_tenant_data: {other:?}"
                )));
            }
        }
    } else if sql.contains("from tenant") {
        let setting = statement.settings.get("tenant.id").ok_or_else(|| {
            DataApiError::StatementError(
                "42704: unrecognized configuration parameter \"tenant.id\"".into(),
            )
        })?;
        parse_tenant(setting)?
    } else {
        return Err(DataApiError::StatementError(format!(
            "42601: unsupported statement: {}",
            statement.sql
        )));
    };

    let full_row = sql.contains("get_tenant_data(") || sql.contains("select *");
    let columns: Vec<String> = if full_row {
        vec!["tenant_id".into(), "tenant_name".into(), "account_balance".into()]
    } else {
        vec!["tenant_name".into()]
    };

    let mut rs = ResultSet::with_capacity(1);
    rs.set_column_names(Arc::new(columns));
    for (id, name, balance) in TENANT_ROWS.iter().filter(|(id, ..)| *id == tenant) {
        if full_row {
            rs.add_row_values(vec![
                RowValues::Int(*id),
                RowValues::Text((*name).to_string()),
                RowValues::Text(balance.to_string()),
            ]);
        } else {
            rs.add_row_values(vec![RowValues::Text((*name).to_string())]);
        }
    }
    Ok(rs)
}

fn parse_tenant(value: &str) -> Result<i64, DataApiError> {
    value.trim().parse().map_err(|_| {
        DataApiError::StatementError(format!(
            "22P02: invalid input syntax for type integer: \"{value}\""
        ))
    })
}
