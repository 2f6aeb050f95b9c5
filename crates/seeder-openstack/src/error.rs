//! OpenStack client error types

use seeder_cloud::{CloudError, ResourceKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} {url} returned {status}: {message}")]
    Status {
        method: String,
        url: String,
        status: u16,
        message: String,
    },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("service catalog has no {interface} endpoint for '{service}' in region {region}")]
    NoEndpoint {
        service: String,
        region: String,
        interface: String,
    },

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("{operation} is not supported for {kind}")]
    Unsupported {
        kind: ResourceKind,
        operation: &'static str,
    },

    #[error("invalid payload for {kind}: missing '{field}'")]
    MissingField {
        kind: ResourceKind,
        field: &'static str,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    pub fn missing(kind: ResourceKind, field: &'static str) -> Self {
        ClientError::MissingField { kind, field }
    }
}

impl From<ClientError> for CloudError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Http(err) => {
                if err.is_timeout() {
                    CloudError::Timeout(err.to_string())
                } else if let Some(status) = err.status() {
                    CloudError::from_status(status.as_u16(), err.to_string())
                } else {
                    CloudError::Network(err.to_string())
                }
            }
            ClientError::Status {
                status, message, ..
            } => CloudError::from_status(status, message),
            ClientError::Auth(message) => CloudError::AuthenticationFailed(message),
            ClientError::NoEndpoint { .. } => CloudError::NotFound(e.to_string()),
            ClientError::Decode(_) | ClientError::Json(_) => CloudError::ServerError {
                status: 0,
                message: e.to_string(),
            },
            ClientError::Unsupported { .. } | ClientError::MissingField { .. } => {
                CloudError::BadRequest(e.to_string())
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
