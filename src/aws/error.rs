use aws_sdk_rdsdata::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use crate::error::DataApiError;

const CONNECTION_CODES: &[&str] = &[
    "AccessDeniedException",
    "ForbiddenException",
    "DatabaseNotFoundException",
    "DatabaseUnavailableException",
    "DatabaseResumingException",
    "HttpEndpointNotEnabledException",
    "InvalidSecretException",
    "SecretsErrorException",
    "ServiceUnavailableError",
    "InternalServerErrorException",
    "InvalidResourceStateException",
    "UnrecognizedClientException",
    "ExpiredTokenException",
];

const STATEMENT_CODES: &[&str] = &[
    "BadRequestException",
    "DatabaseErrorException",
    "StatementTimeoutException",
    "UnsupportedResultException",
];

/// Map a Data API error code (and message) onto the crate's error kinds.
///
/// Older service versions report an expired or unknown transaction as a `BadRequestException`
/// whose message mentions the transaction, so that case is checked first.
#[must_use]
pub fn classify_error_code(code: Option<&str>, message: &str) -> DataApiError {
    let code = code.unwrap_or("");
    let lowered = message.to_ascii_lowercase();

    if code == "TransactionNotFoundException"
        || (code == "BadRequestException"
            && lowered.contains("transaction")
            && lowered.contains("not found"))
    {
        return DataApiError::TransactionError(format!("{code}: {message}"));
    }
    if STATEMENT_CODES.contains(&code) {
        return DataApiError::StatementError(format!("{code}: {message}"));
    }
    if CONNECTION_CODES.contains(&code) {
        return DataApiError::ConnectionError(format!("{code}: {message}"));
    }
    DataApiError::ExecutionError(format!("{code}: {message}"))
}

pub(crate) fn classify_sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> DataApiError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let detail = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::ServiceError(_) => {
            let message = err.message().unwrap_or(detail.as_str());
            classify_error_code(err.code(), &format!("{operation}: {message}"))
        }
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_) => {
            DataApiError::ConnectionError(format!("{operation}: {detail}"))
        }
        _ => DataApiError::ExecutionError(format!("{operation}: {detail}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rls_rejection_is_a_statement_error() {
        let err = classify_error_code(
            Some("BadRequestException"),
            "ERROR: new row violates row-level security policy for table \"tenant\"",
        );
        assert!(err.is_statement());
    }

    #[test]
    fn missing_transactions_are_transaction_errors() {
        assert!(classify_error_code(Some("TransactionNotFoundException"), "gone").is_transaction());
        assert!(
            classify_error_code(Some("BadRequestException"), "Transaction abc is not found")
                .is_transaction()
        );
    }

    #[test]
    fn access_problems_are_connection_errors() {
        for code in ["ForbiddenException", "InvalidSecretException", "DatabaseResumingException"] {
            assert!(classify_error_code(Some(code), "nope").is_connection(), "{code}");
        }
        assert!(matches!(
            classify_error_code(None, "mystery"),
            DataApiError::ExecutionError(_)
        ));
    }
}
