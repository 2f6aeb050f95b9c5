//! Credentials and run settings for openstack-seeder
//!
//! Credentials come from a named cloud in `clouds.yaml` or, when no cloud
//! is named, from the `OS_*` environment variables. The core never reads
//! either; the binary resolves them here and passes the result in.

pub mod clouds;
pub mod error;

pub use clouds::{CloudEntry, CloudsFile};
pub use error::*;

use seeder_engine::EngineOptions;
use seeder_openstack::{AuthMethod, Credentials};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Locate `clouds.yaml`
///
/// Search order:
/// 1. `OS_CLIENT_CONFIG_FILE` (direct path)
/// 2. `./clouds.yaml`
/// 3. `~/.config/openstack/clouds.yaml`
/// 4. `/etc/openstack/clouds.yaml`
pub fn find_clouds_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var("OS_CLIENT_CONFIG_FILE") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current = std::env::current_dir()?.join("clouds.yaml");
    if current.exists() {
        return Ok(current);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let user = config_dir.join("openstack").join("clouds.yaml");
        if user.exists() {
            return Ok(user);
        }
    }

    let system = PathBuf::from("/etc/openstack/clouds.yaml");
    if system.exists() {
        return Ok(system);
    }

    Err(ConfigError::CloudsFileNotFound)
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Credentials from `OS_*` variables, `None` when `OS_AUTH_URL` is unset
pub fn credentials_from_env() -> Result<Option<Credentials>> {
    let Some(auth_url) = env("OS_AUTH_URL") else {
        return Ok(None);
    };
    let missing = |field: &str| ConfigError::MissingField {
        source_name: "environment".into(),
        field: field.into(),
    };

    let method = match env("OS_APPLICATION_CREDENTIAL_ID") {
        Some(id) => AuthMethod::ApplicationCredential {
            id,
            secret: env("OS_APPLICATION_CREDENTIAL_SECRET")
                .ok_or_else(|| missing("OS_APPLICATION_CREDENTIAL_SECRET"))?,
        },
        None => AuthMethod::Password {
            username: env("OS_USERNAME").ok_or_else(|| missing("OS_USERNAME"))?,
            password: env("OS_PASSWORD").ok_or_else(|| missing("OS_PASSWORD"))?,
            user_domain_name: env("OS_USER_DOMAIN_NAME").unwrap_or_else(|| "Default".into()),
            project_name: env("OS_PROJECT_NAME"),
            project_domain_name: env("OS_PROJECT_DOMAIN_NAME")
                .unwrap_or_else(|| "Default".into()),
            system_scope: env("OS_SYSTEM_SCOPE"),
        },
    };

    Ok(Some(Credentials {
        auth_url,
        method,
        region_name: env("OS_REGION_NAME"),
        interface: env("OS_INTERFACE").unwrap_or_else(|| "public".into()),
    }))
}

/// Resolve the credentials to run with
///
/// An explicit `cloud` wins over `OS_CLOUD`; with neither, the `OS_*`
/// variables are used.
pub fn load_credentials(cloud: Option<&str>) -> Result<Credentials> {
    let name = cloud.map(str::to_string).or_else(|| env("OS_CLOUD"));
    if let Some(name) = name {
        let path = find_clouds_file()?;
        let file = CloudsFile::load(&path)?;
        let credentials = file.credentials(&name, &path)?;
        info!(cloud = %name, path = %path.display(), "Using cloud from clouds.yaml");
        return Ok(credentials);
    }

    match credentials_from_env()? {
        Some(credentials) => {
            debug!(auth_url = %credentials.auth_url, "Using OS_* environment credentials");
            Ok(credentials)
        }
        None => Err(ConfigError::NoCredentials),
    }
}

/// Command-line overrides of the engine defaults
#[derive(Debug, Clone, Default)]
pub struct RunSettings {
    pub concurrency: Option<usize>,
    pub run_timeout: Option<Duration>,
    pub dry_run: bool,
}

impl RunSettings {
    pub fn engine_options(&self) -> Result<EngineOptions> {
        let defaults = EngineOptions::default();
        let concurrency = self.concurrency.unwrap_or(defaults.concurrency);
        if concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                name: "concurrency".into(),
                message: "must be at least 1".into(),
            });
        }
        let run_timeout = self.run_timeout.unwrap_or(defaults.run_timeout);
        if run_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "timeout".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(EngineOptions {
            concurrency,
            run_timeout,
            dry_run: self.dry_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    const CLOUDS: &str = "clouds:\n  lab:\n    auth:\n      auth_url: https://lab:5000/v3\n      username: seeder\n      password: pw\n";

    const OS_VARS: [&str; 13] = [
        "OS_CLOUD",
        "OS_CLIENT_CONFIG_FILE",
        "OS_AUTH_URL",
        "OS_USERNAME",
        "OS_PASSWORD",
        "OS_PROJECT_NAME",
        "OS_USER_DOMAIN_NAME",
        "OS_PROJECT_DOMAIN_NAME",
        "OS_REGION_NAME",
        "OS_INTERFACE",
        "OS_APPLICATION_CREDENTIAL_ID",
        "OS_APPLICATION_CREDENTIAL_SECRET",
        "OS_SYSTEM_SCOPE",
    ];

    /// Run `f` with every OS_* variable cleared except `vars`
    fn with_env<F: FnOnce()>(vars: &[(&str, Option<&str>)], f: F) {
        let mut all: Vec<(&str, Option<&str>)> = OS_VARS
            .iter()
            .filter(|name| !vars.iter().any(|(set, _)| set == *name))
            .map(|name| (*name, None))
            .collect();
        all.extend_from_slice(vars);
        temp_env::with_vars(all, f);
    }

    #[test]
    #[serial]
    fn test_find_clouds_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("custom.yaml");
        fs::write(&path, CLOUDS).unwrap();

        with_env(&[("OS_CLIENT_CONFIG_FILE", path.to_str())], || {
            assert_eq!(find_clouds_file().unwrap(), path);
        });
    }

    #[test]
    #[serial]
    fn test_find_clouds_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        fs::write(temp_dir.path().join("clouds.yaml"), CLOUDS).unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        with_env(&[], || {
            assert!(find_clouds_file().unwrap().ends_with("clouds.yaml"));
        });

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    #[serial]
    fn test_named_cloud_from_os_cloud() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("clouds.yaml");
        fs::write(&path, CLOUDS).unwrap();

        with_env(
            &[
                ("OS_CLIENT_CONFIG_FILE", path.to_str()),
                ("OS_CLOUD", Some("lab")),
                // a named cloud wins over loose variables
                ("OS_AUTH_URL", Some("https://ignored:5000")),
            ],
            || {
                let creds = load_credentials(None).unwrap();
                assert_eq!(creds.auth_url, "https://lab:5000/v3");
            },
        );
    }

    #[test]
    #[serial]
    fn test_explicit_cloud_overrides_os_cloud() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("clouds.yaml");
        fs::write(&path, CLOUDS).unwrap();

        with_env(
            &[
                ("OS_CLIENT_CONFIG_FILE", path.to_str()),
                ("OS_CLOUD", Some("lab")),
            ],
            || {
                let err = load_credentials(Some("prod")).unwrap_err();
                assert!(matches!(err, ConfigError::CloudNotFound { .. }));
            },
        );
    }

    #[test]
    #[serial]
    fn test_password_from_env() {
        with_env(
            &[
                ("OS_AUTH_URL", Some("https://env:5000/v3")),
                ("OS_USERNAME", Some("admin")),
                ("OS_PASSWORD", Some("pw")),
                ("OS_PROJECT_NAME", Some("admin")),
                ("OS_REGION_NAME", Some("RegionOne")),
            ],
            || {
                let creds = load_credentials(None).unwrap();
                assert_eq!(creds.auth_url, "https://env:5000/v3");
                assert_eq!(creds.region_name.as_deref(), Some("RegionOne"));
                assert!(matches!(creds.method, AuthMethod::Password { .. }));
            },
        );
    }

    #[test]
    #[serial]
    fn test_application_credential_from_env() {
        with_env(
            &[
                ("OS_AUTH_URL", Some("https://env:5000")),
                ("OS_APPLICATION_CREDENTIAL_ID", Some("id")),
            ],
            || {
                let err = credentials_from_env().unwrap_err();
                assert!(err.to_string().contains("OS_APPLICATION_CREDENTIAL_SECRET"));
            },
        );
    }

    #[test]
    #[serial]
    fn test_no_credentials() {
        with_env(&[], || {
            assert!(matches!(
                load_credentials(None),
                Err(ConfigError::NoCredentials)
            ));
        });
    }

    #[test]
    fn test_run_settings_defaults_and_overrides() {
        let options = RunSettings::default().engine_options().unwrap();
        assert_eq!(options, EngineOptions::default());

        let options = RunSettings {
            concurrency: Some(2),
            run_timeout: Some(Duration::from_secs(60)),
            dry_run: true,
        }
        .engine_options()
        .unwrap();
        assert_eq!(options.concurrency, 2);
        assert_eq!(options.run_timeout, Duration::from_secs(60));
        assert!(options.dry_run);
    }

    #[test]
    fn test_run_settings_reject_zero() {
        let err = RunSettings {
            concurrency: Some(0),
            ..RunSettings::default()
        }
        .engine_options()
        .unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }
}
