//! Tenant context for row-level-security scoped statements.
//!
//! The tenant id is never a literal inside the executor; it comes from an injected
//! [`TenantContextResolver`] so tests and callers can substitute their own source.

use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::error::DataApiError;

pub const DEFAULT_SETTING_NAME: &str = "tenant.id";
pub const DEFAULT_PARAMETER_NAME: &str = "tenant_id";
pub const DEFAULT_TENANT_CLAIM: &str = "custom:tenantId";
const PRINCIPAL_TAGS_CLAIM: &str = "https://aws.amazon.com/tags";

/// Tenant identifier as seen by the database session setting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantId(String);

impl TenantId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for TenantId {
    fn from(value: i64) -> Self {
        TenantId(value.to_string())
    }
}

impl From<&str> for TenantId {
    fn from(value: &str) -> Self {
        TenantId(value.to_string())
    }
}

impl From<String> for TenantId {
    fn from(value: String) -> Self {
        TenantId(value)
    }
}

/// Strategy that yields the tenant for the current unit of work.
pub trait TenantContextResolver: Send + Sync {
    /// # Errors
    /// Returns `DataApiError::TenantError` when no tenant can be determined.
    fn resolve(&self) -> Result<TenantId, DataApiError>;
}

impl<F> TenantContextResolver for F
where
    F: Fn() -> TenantId + Send + Sync,
{
    fn resolve(&self) -> Result<TenantId, DataApiError> {
        Ok(self())
    }
}

/// Always resolves to the same tenant.
#[derive(Debug, Clone)]
pub struct StaticTenant(pub TenantId);

impl TenantContextResolver for StaticTenant {
    fn resolve(&self) -> Result<TenantId, DataApiError> {
        Ok(self.0.clone())
    }
}

/// Reads the tenant from identity-token claims.
///
/// Accepts either a flat attribute (`custom:tenantId` by default) or the principal-tags shape
/// `{"https://aws.amazon.com/tags": {"principal_tags": {"tenantId": ["..."]}}}`.
#[derive(Debug, Clone)]
pub struct ClaimsTenantResolver {
    claims: JsonValue,
    attribute: String,
}

impl ClaimsTenantResolver {
    #[must_use]
    pub fn new(claims: JsonValue) -> Self {
        Self {
            claims,
            attribute: DEFAULT_TENANT_CLAIM.to_string(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = attribute.into();
        self
    }

    fn principal_tag(&self) -> Option<&JsonValue> {
        self.claims
            .get(PRINCIPAL_TAGS_CLAIM)?
            .get("principal_tags")?
            .get("tenantId")?
            .as_array()?
            .first()
    }
}

impl TenantContextResolver for ClaimsTenantResolver {
    fn resolve(&self) -> Result<TenantId, DataApiError> {
        let value = self
            .claims
            .get(&self.attribute)
            .or_else(|| self.principal_tag());

        let tenant = match value {
            Some(JsonValue::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(JsonValue::Number(n)) => n.to_string(),
            _ => {
                return Err(DataApiError::TenantError(format!(
                    "claims carry no usable `{}` attribute",
                    self.attribute
                )));
            }
        };
        Ok(TenantId(tenant))
    }
}

/// How a tenant is applied to statements: the session setting read by the row-level-security
/// policy, and the parameter name used by the single-statement pattern.
#[derive(Clone)]
pub struct TenantScope {
    resolver: Arc<dyn TenantContextResolver>,
    setting_name: String,
    parameter_name: String,
}

impl fmt::Debug for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantScope")
            .field("setting_name", &self.setting_name)
            .field("parameter_name", &self.parameter_name)
            .finish_non_exhaustive()
    }
}

impl TenantScope {
    pub fn new(resolver: impl TenantContextResolver + 'static) -> Self {
        Self {
            resolver: Arc::new(resolver),
            setting_name: DEFAULT_SETTING_NAME.to_string(),
            parameter_name: DEFAULT_PARAMETER_NAME.to_string(),
        }
    }

    /// Override the session setting, e.g. `app.current_tenant`.
    ///
    /// # Errors
    /// Returns `DataApiError::ConfigError` unless the name is dot-separated identifiers.
    pub fn with_setting_name(mut self, name: impl Into<String>) -> Result<Self, DataApiError> {
        let name = name.into();
        if name.is_empty() || !name.split('.').all(is_identifier) {
            return Err(DataApiError::ConfigError(format!(
                "invalid session setting name `{name}`"
            )));
        }
        self.setting_name = name;
        Ok(self)
    }

    /// Override the placeholder the single-statement pattern binds the tenant to.
    ///
    /// # Errors
    /// Returns `DataApiError::ConfigError` unless the name is an identifier.
    pub fn with_parameter_name(mut self, name: impl Into<String>) -> Result<Self, DataApiError> {
        let name = name.into();
        if !is_identifier(&name) {
            return Err(DataApiError::ConfigError(format!(
                "invalid tenant parameter name `{name}`"
            )));
        }
        self.parameter_name = name;
        Ok(self)
    }

    #[must_use]
    pub fn setting_name(&self) -> &str {
        &self.setting_name
    }

    #[must_use]
    pub fn parameter_name(&self) -> &str {
        &self.parameter_name
    }

    /// # Errors
    /// Propagates the resolver's error.
    pub fn resolve(&self) -> Result<TenantId, DataApiError> {
        self.resolver.resolve()
    }
}

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
