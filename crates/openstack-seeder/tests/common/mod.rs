use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const OS_VARS: &[&str] = &[
    "OS_CLOUD",
    "OS_CLIENT_CONFIG_FILE",
    "OS_AUTH_URL",
    "OS_USERNAME",
    "OS_PASSWORD",
    "OS_PROJECT_NAME",
    "OS_APPLICATION_CREDENTIAL_ID",
    "OS_APPLICATION_CREDENTIAL_SECRET",
    "SEEDER_SPEC",
    "SEEDER_CONCURRENCY",
    "SEEDER_TIMEOUT",
];

/// Scratch directory holding a spec and, optionally, a clouds.yaml
pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn write_spec(&self, content: &str) -> PathBuf {
        let path = self.root.path().join("seed.yaml");
        fs::write(&path, content).unwrap();
        path
    }

    #[allow(dead_code)]
    pub fn write_clouds(&self, content: &str) -> PathBuf {
        let path = self.root.path().join("clouds.yaml");
        fs::write(&path, content).unwrap();
        path
    }

    /// `seeder` running in the project with no ambient OpenStack settings
    #[allow(deprecated)]
    pub fn seeder(&self) -> Command {
        let mut cmd = Command::cargo_bin("seeder").unwrap();
        cmd.current_dir(self.root.path());
        for var in OS_VARS {
            cmd.env_remove(var);
        }
        // keep ~/.config/openstack out of reach
        cmd.env("HOME", self.root.path());
        cmd.env("XDG_CONFIG_HOME", self.root.path().join("config"));
        cmd
    }
}
