//! Error taxonomy shared by the table access layer and the credential broker.

use std::time::Duration;

use thiserror::Error;

/// Result type for keytable operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the access layer and the broker.
///
/// Every variant names the resource involved so a failure can be diagnosed
/// without re-running the operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed or incompatible schema, index or request shape.
    #[error("Schema error on '{resource}': {message}")]
    Schema { resource: String, message: String },

    /// An item or key does not satisfy the table schema.
    #[error("Validation error on '{resource}': {message}")]
    Validation { resource: String, message: String },

    /// The caller's identity (or credential) may not perform the operation.
    #[error("{operation} on '{resource}' is not authorized: {message}")]
    Authorization {
        operation: &'static str,
        resource: String,
        message: String,
    },

    /// A bounded wait did not reach its terminal condition in time.
    #[error("{operation} on '{resource}' timed out after {waited:?}")]
    Timeout {
        operation: &'static str,
        resource: String,
        waited: Duration,
    },

    /// The table was deleted (or never existed) when the operation ran.
    #[error("{operation} on '{table}' failed: table no longer exists")]
    TableGone {
        operation: &'static str,
        table: String,
    },

    /// Transport or service fault reported by the remote side.
    #[error("{operation} on '{resource}' failed: {source}")]
    Remote {
        operation: &'static str,
        resource: String,
        source: ServiceError,
    },
}

impl Error {
    /// Builds a [`Error::Schema`].
    pub fn schema(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Builds a [`Error::Validation`].
    pub fn validation(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Maps a data-service failure for `table` into the caller-facing taxonomy.
    pub fn from_table_service(
        operation: &'static str,
        table: impl Into<String>,
        err: ServiceError,
    ) -> Self {
        let table = table.into();
        match err {
            ServiceError::AccessDenied(message) => Self::Authorization {
                operation,
                resource: table,
                message,
            },
            ServiceError::NotFound(_) => Self::TableGone { operation, table },
            source => Self::Remote {
                operation,
                resource: table,
                source,
            },
        }
    }

    /// Maps an identity-service failure for `role_arn`.
    pub fn from_identity_service(
        operation: &'static str,
        role_arn: impl Into<String>,
        err: ServiceError,
    ) -> Self {
        let resource = role_arn.into();
        match err {
            ServiceError::AccessDenied(message) => Self::Authorization {
                operation,
                resource,
                message,
            },
            source => Self::Remote {
                operation,
                resource,
                source,
            },
        }
    }

    /// Returns `true` when the caller may reasonably retry the same call.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Remote { source, .. } => matches!(
                source,
                ServiceError::Throttled(_) | ServiceError::Transport(_) | ServiceError::InUse(_)
            ),
            _ => false,
        }
    }
}

/// Failure reported by a remote seam ([`crate::table::DataService`] or
/// [`crate::credentials::IdentityService`]).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("resource in use: {0}")]
    InUse(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("throttled: {0}")]
    Throttled(String),

    #[error("request rejected: {0}")]
    Invalid(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

impl ServiceError {
    /// Classifies a service error by the error code the remote returned.
    pub fn from_code(code: Option<&str>, message: Option<&str>) -> Self {
        let message = message.unwrap_or("no message").to_string();
        match code {
            Some("ResourceNotFoundException") | Some("TableNotFoundException") => {
                Self::NotFound(message)
            }
            Some("ResourceInUseException") | Some("TableAlreadyExistsException") => {
                Self::InUse(message)
            }
            Some("AccessDenied")
            | Some("AccessDeniedException")
            | Some("UnrecognizedClientException")
            | Some("InvalidClientTokenId")
            | Some("ExpiredToken")
            | Some("ExpiredTokenException")
            | Some("SignatureDoesNotMatch") => Self::AccessDenied(message),
            Some("ProvisionedThroughputExceededException")
            | Some("ThrottlingException")
            | Some("Throttling")
            | Some("RequestLimitExceeded") => Self::Throttled(message),
            Some("ValidationException")
            | Some("ValidationError")
            | Some("MalformedPolicyDocument")
            | Some("PackedPolicyTooLarge")
            | Some("LimitExceededException") => Self::Invalid(message),
            Some(other) => Self::Transport(format!("{other}: {message}")),
            None => Self::Transport(message),
        }
    }
}
