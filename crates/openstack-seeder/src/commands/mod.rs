pub mod reconcile;
pub mod validate;
pub mod watch;

use crate::RunArgs;
use colored::Colorize;
use seeder_cloud::{
    CloudApi, EXIT_AUTH_FAILED, EXIT_FAILURES, EXIT_SPEC_INVALID, GuardConfig, Guarded,
};
use seeder_config::RunSettings;
use seeder_engine::Engine;
use seeder_openstack::OpenStackClient;
use seeder_spec::SpecError;
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Exit status of a step that failed after telling the user why
pub type Step<T> = std::result::Result<T, i32>;

pub fn report_error(headline: &str, error: &dyn Display, code: i32) -> i32 {
    eprintln!();
    eprintln!("{}", format!("✗ {}", headline).red().bold());
    eprintln!("  {}", error);
    code
}

pub fn spec_error(path: &Path, error: &SpecError) -> i32 {
    eprintln!();
    eprintln!(
        "{} {}",
        "✗ Invalid spec:".red().bold(),
        path.display().to_string().cyan()
    );
    for problem in error.problems() {
        eprintln!("  - {}", problem);
    }
    EXIT_SPEC_INVALID
}

/// Engine wired to the cloud selected by `run`
pub fn engine(run: &RunArgs) -> Step<Engine> {
    let options = RunSettings {
        concurrency: run.concurrency,
        run_timeout: run.timeout,
        dry_run: run.dry_run,
    }
    .engine_options()
    .map_err(|e| report_error("Invalid option", &e, EXIT_SPEC_INVALID))?;

    let credentials = seeder_config::load_credentials(run.cloud.as_deref())
        .map_err(|e| report_error("Credentials unavailable", &e, EXIT_AUTH_FAILED))?;
    let client = OpenStackClient::new(credentials)
        .map_err(|e| report_error("Failed to build API client", &e, EXIT_FAILURES))?;

    let mut guard = GuardConfig::default();
    if let Some(call_timeout) = run.call_timeout {
        guard.call_timeout = call_timeout;
    }
    let cloud: Arc<dyn CloudApi> = Arc::new(Guarded::new(client, guard));
    Ok(Engine::new(cloud, options))
}

/// Token cancelled on the first Ctrl-C
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Interrupted, waiting for in-flight calls...".yellow());
            token.cancel();
        }
    });
    cancel
}
