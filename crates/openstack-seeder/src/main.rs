mod commands;
mod output;

use clap::{Args, Parser, Subcommand};
use output::OutputFormat;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "seeder")]
#[command(about = "Declarative seeding and reconciliation of OpenStack tenancy", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Converge the cloud towards a spec document
    Reconcile {
        #[command(flatten)]
        run: RunArgs,

        /// Report format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
    /// Check a spec document without contacting the cloud
    Validate {
        /// Spec document to check
        #[arg(short, long, env = "SEEDER_SPEC")]
        spec: PathBuf,

        /// Print the normalised document
        #[arg(long)]
        canonical: bool,
    },
    /// Reconcile every time the spec file changes, until interrupted
    Watch {
        #[command(flatten)]
        run: RunArgs,

        /// How often the spec file is polled
        #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
        interval: Duration,
    },
    /// Show version information
    Version,
}

/// Arguments shared by commands that talk to the cloud
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Spec document to apply
    #[arg(short, long, env = "SEEDER_SPEC")]
    pub spec: PathBuf,

    /// Compute the plan and report drift without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Reconcilers running at once
    #[arg(long, env = "SEEDER_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Deadline for the whole run (e.g. 15m)
    #[arg(long, env = "SEEDER_TIMEOUT", value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Deadline for a single API call (e.g. 30s)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub call_timeout: Option<Duration>,

    /// Cloud from clouds.yaml; defaults to OS_CLOUD, then OS_* variables
    #[arg(long)]
    pub cloud: Option<String>,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries reports, so logs go to stderr
    init_logging(cli.verbose);

    let code = match cli.command {
        Commands::Reconcile { run, output } => commands::reconcile::handle(&run, output).await?,
        Commands::Validate { spec, canonical } => commands::validate::handle(&spec, canonical)?,
        Commands::Watch { run, interval } => commands::watch::handle(&run, interval).await?,
        Commands::Version => {
            println!("openstack-seeder {}", env!("CARGO_PKG_VERSION"));
            0
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
