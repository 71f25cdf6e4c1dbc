use aws_sdk_rdsdata::primitives::Blob;
use aws_sdk_rdsdata::types::{Field, SqlParameter, TypeHint};

use crate::params::Params;
use crate::types::{RowValues, TIMESTAMP_FORMAT};

/// Convert one value into a Data API field plus the type hint the service needs to cast it.
#[must_use]
pub fn to_field(value: &RowValues) -> (Field, Option<TypeHint>) {
    match value {
        RowValues::Int(i) => (Field::LongValue(*i), None),
        RowValues::Float(f) => (Field::DoubleValue(*f), None),
        RowValues::Text(s) => (Field::StringValue(s.clone()), None),
        RowValues::Bool(b) => (Field::BooleanValue(*b), None),
        RowValues::Timestamp(dt) => (
            Field::StringValue(dt.format(TIMESTAMP_FORMAT).to_string()),
            Some(TypeHint::Timestamp),
        ),
        RowValues::Null => (Field::IsNull(true), None),
        RowValues::JSON(json) => (Field::StringValue(json.to_string()), Some(TypeHint::Json)),
        RowValues::Blob(bytes) => (Field::BlobValue(Blob::new(bytes.clone())), None),
    }
}

/// Convert a validated parameter list into `SqlParameter`s, keeping order.
#[must_use]
pub fn convert_params(params: &Params) -> Vec<SqlParameter> {
    params
        .iter()
        .map(|param| {
            let (field, hint) = to_field(&param.value);
            SqlParameter::builder()
                .name(param.name.clone())
                .value(field)
                .set_type_hint(hint)
                .build()
        })
        .collect()
}
