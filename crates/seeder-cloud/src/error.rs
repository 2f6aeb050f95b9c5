//! Error taxonomy shared by every crate in the workspace

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of error kinds surfaced in reports and exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    SpecMalformed,
    SpecUnknownField,
    SpecValidation,
    AuthFailed,
    Network,
    ServerError,
    Conflict,
    NotFound,
    Forbidden,
    BadRequest,
    Ambiguous,
    UnresolvedReference,
    Timeout,
    SkippedDependencyFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SpecMalformed => "spec-malformed",
            ErrorKind::SpecUnknownField => "spec-unknown-field",
            ErrorKind::SpecValidation => "spec-validation",
            ErrorKind::AuthFailed => "auth-failed",
            ErrorKind::Network => "network",
            ErrorKind::ServerError => "server-error",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::Ambiguous => "ambiguous",
            ErrorKind::UnresolvedReference => "unresolved-reference",
            ErrorKind::Timeout => "timeout",
            ErrorKind::SkippedDependencyFailed => "skipped-dependency-failed",
        }
    }

    /// Whether the kind is worth another attempt under the backoff policy.
    /// Conflicts are retried only for race-prone kinds; the guard decides.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorKind::Network | ErrorKind::ServerError | ErrorKind::Timeout
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by cloud capability implementations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloudError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Ambiguous: {0}")]
    Ambiguous(String),

    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl CloudError {
    /// Map an HTTP status and the first structured error message of the
    /// response body onto the closed kind set.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => CloudError::AuthenticationFailed(message),
            403 => CloudError::Forbidden(message),
            404 => CloudError::NotFound(message),
            409 => CloudError::Conflict(message),
            504 => CloudError::Timeout(message),
            500..=599 => CloudError::ServerError { status, message },
            _ => CloudError::BadRequest(message),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CloudError::AuthenticationFailed(_) => ErrorKind::AuthFailed,
            CloudError::Network(_) => ErrorKind::Network,
            CloudError::ServerError { .. } => ErrorKind::ServerError,
            CloudError::Conflict(_) => ErrorKind::Conflict,
            CloudError::NotFound(_) => ErrorKind::NotFound,
            CloudError::Forbidden(_) => ErrorKind::Forbidden,
            CloudError::BadRequest(_) => ErrorKind::BadRequest,
            CloudError::Ambiguous(_) => ErrorKind::Ambiguous,
            CloudError::UnresolvedReference(_) => ErrorKind::UnresolvedReference,
            CloudError::Timeout(_) => ErrorKind::Timeout,
        }
    }

    /// Message without the kind prefix, as stored in the report
    pub fn message(&self) -> String {
        match self {
            CloudError::ServerError { message, .. } => message.clone(),
            CloudError::AuthenticationFailed(m)
            | CloudError::Network(m)
            | CloudError::Conflict(m)
            | CloudError::NotFound(m)
            | CloudError::Forbidden(m)
            | CloudError::BadRequest(m)
            | CloudError::Ambiguous(m)
            | CloudError::UnresolvedReference(m)
            | CloudError::Timeout(m) => m.clone(),
        }
    }
}

impl From<serde_json::Error> for CloudError {
    fn from(e: serde_json::Error) -> Self {
        CloudError::ServerError {
            status: 0,
            message: format!("malformed response body: {}", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
