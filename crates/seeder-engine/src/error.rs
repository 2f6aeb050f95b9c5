//! Engine error types
//!
//! Per-object failures never surface here: they become report outcomes.
//! These are the conditions that stop a run before or instead of a report.

use seeder_cloud::{CloudError, EXIT_AUTH_FAILED, EXIT_FAILURES, EXIT_SPEC_INVALID};
use seeder_spec::SpecError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Dependency cycle between: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error("Spec error: {0}")]
    Spec(#[from] SpecError),

    #[error("Cloud error: {0}")]
    Cloud(#[from] CloudError),
}

impl EngineError {
    /// Process exit status for a run that ended with this error
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::AuthFailed(_) => EXIT_AUTH_FAILED,
            EngineError::Cycle(_) | EngineError::Spec(_) => EXIT_SPEC_INVALID,
            EngineError::Cloud(CloudError::AuthenticationFailed(_)) => EXIT_AUTH_FAILED,
            EngineError::Cloud(_) => EXIT_FAILURES,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
