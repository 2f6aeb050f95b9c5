use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "clouds.yaml not found. Looked in:\n\
        - $OS_CLIENT_CONFIG_FILE\n\
        - ./clouds.yaml\n\
        - ~/.config/openstack/clouds.yaml\n\
        - /etc/openstack/clouds.yaml"
    )]
    CloudsFileNotFound,

    #[error("cloud '{name}' is not defined in {path} (available: {})", .available.join(", "))]
    CloudNotFound {
        name: String,
        path: PathBuf,
        available: Vec<String>,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("{source_name} is missing '{field}'")]
    MissingField { source_name: String, field: String },

    #[error(
        "no credentials: pass --cloud, set OS_CLOUD, or export OS_AUTH_URL with a password \
        or application credential"
    )]
    NoCredentials,

    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
