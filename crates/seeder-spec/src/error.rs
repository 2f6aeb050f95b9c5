use seeder_cloud::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpecError {
    #[error("malformed spec: {0}")]
    Malformed(String),

    #[error("unknown field in spec: {0}")]
    UnknownField(String),

    #[error("spec validation failed with {} problem(s):\n  {}", .0.len(), .0.join("\n  "))]
    Validation(Vec<String>),

    #[error("failed to read spec: {path}\nreason: {message}")]
    Io { path: PathBuf, message: String },
}

impl SpecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SpecError::Malformed(_) | SpecError::Io { .. } => ErrorKind::SpecMalformed,
            SpecError::UnknownField(_) => ErrorKind::SpecUnknownField,
            SpecError::Validation(_) => ErrorKind::SpecValidation,
        }
    }

    /// Individual problems carried by the error
    pub fn problems(&self) -> Vec<String> {
        match self {
            SpecError::Validation(problems) => problems.clone(),
            other => vec![other.to_string()],
        }
    }
}

pub type Result<T> = std::result::Result<T, SpecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_problems() {
        let err = SpecError::Validation(vec!["a".into(), "b".into()]);
        let msg = err.to_string();
        assert!(msg.contains("2 problem(s)"));
        assert!(msg.contains("\n  a\n  b"));
        assert_eq!(err.kind(), ErrorKind::SpecValidation);
    }
}
