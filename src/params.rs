use std::collections::HashSet;

use crate::error::DataApiError;
use crate::translation::placeholder_names;
use crate::types::RowValues;

/// A named value bound to a `:name` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: RowValues,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<RowValues>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Ordered parameters for one statement, with unique, well-formed names.
///
/// Validation happens here so a bad parameter list never reaches the network:
/// ```rust
/// use rds_data_middleware::prelude::*;
///
/// let dup = Params::new(vec![Parameter::new("id", 1), Parameter::new("id", 2)]);
/// assert!(matches!(dup, Err(DataApiError::ParameterError(_))));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    items: Vec<Parameter>,
}

impl Params {
    /// Build a validated parameter list.
    ///
    /// # Errors
    /// Returns `DataApiError::ParameterError` if a name is not an identifier or appears twice.
    pub fn new(items: Vec<Parameter>) -> Result<Self, DataApiError> {
        let mut seen = HashSet::with_capacity(items.len());
        for param in &items {
            validate_name(&param.name)?;
            if !seen.insert(param.name.as_str()) {
                return Err(DataApiError::ParameterError(format!(
                    "duplicate parameter name `{}`",
                    param.name
                )));
            }
        }
        Ok(Self { items })
    }

    /// Check that every parameter is referenced by `sql` and every placeholder is bound.
    ///
    /// # Errors
    /// Returns `DataApiError::ParameterError` naming the first mismatch.
    pub fn check_against(&self, sql: &str) -> Result<(), DataApiError> {
        let placeholders = placeholder_names(sql);
        if let Some(missing) = placeholders.iter().find(|name| self.get(name).is_none()) {
            return Err(DataApiError::ParameterError(format!(
                "placeholder `:{missing}` has no bound parameter"
            )));
        }
        if let Some(unused) = self
            .items
            .iter()
            .find(|param| !placeholders.contains(&param.name.as_str()))
        {
            return Err(DataApiError::ParameterError(format!(
                "parameter `{}` is not referenced by the statement",
                unused.name
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RowValues> {
        self.items
            .iter()
            .find(|param| param.name == name)
            .map(|param| &param.value)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Parameter] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.items.iter()
    }
}

impl TryFrom<Vec<Parameter>> for Params {
    type Error = DataApiError;

    fn try_from(items: Vec<Parameter>) -> Result<Self, Self::Error> {
        Params::new(items)
    }
}

impl TryFrom<&[Parameter]> for Params {
    type Error = DataApiError;

    fn try_from(items: &[Parameter]) -> Result<Self, Self::Error> {
        Params::new(items.to_vec())
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

fn validate_name(name: &str) -> Result<(), DataApiError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(DataApiError::ParameterError(format!(
            "invalid parameter name `{name}`"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicates_and_bad_names() {
        let dup = Params::new(vec![Parameter::new("id", 1), Parameter::new("id", 2)]);
        assert!(matches!(dup, Err(DataApiError::ParameterError(_))));

        for bad in ["", "1id", "tenant-id", ":id"] {
            let res = Params::new(vec![Parameter::new(bad, 1)]);
            assert!(res.is_err(), "`{bad}` should be rejected");
        }
    }

    #[test]
    fn matches_placeholders_both_ways() {
        let params = Params::new(vec![Parameter::new("id", 2)]).unwrap();
        assert!(params.check_against("select get_tenant_data(:id::integer)").is_ok());

        let err = params.check_against("select 1").unwrap_err();
        assert!(err.to_string().contains("not referenced"));

        let err = params
            .check_against("select :id, :other")
            .unwrap_err();
        assert!(err.to_string().contains(":other"));
    }

    #[test]
    fn empty_params_with_no_placeholders() {
        let params = Params::default();
        assert!(params.check_against("select tenant_name from tenant").is_ok());
    }
}
