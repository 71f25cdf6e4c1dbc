use thiserror::Error;

/// Errors surfaced by the executor and its backends.
///
/// Remote failures are classified into connection, statement, and transaction kinds so calling
/// code can decide between retrying and aborting without inspecting message text.
#[derive(Debug, Error)]
pub enum DataApiError {
    /// Endpoint unreachable, credentials rejected, or the database is unavailable.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Malformed SQL or a server-side policy rejected the statement.
    #[error("Statement error: {0}")]
    StatementError(String),

    /// A transaction handle was used outside of its `Active` state or is unknown to the server.
    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Tenant context error: {0}")]
    TenantError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),
}

impl DataApiError {
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::ConnectionError(_))
    }

    #[must_use]
    pub fn is_statement(&self) -> bool {
        matches!(self, Self::StatementError(_))
    }

    #[must_use]
    pub fn is_transaction(&self) -> bool {
        matches!(self, Self::TransactionError(_))
    }

    /// Whether a caller may reasonably retry the same call.
    ///
    /// Nothing is retried internally; only connection failures are worth a second attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.is_connection()
    }
}
