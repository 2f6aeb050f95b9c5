//! Report rendering

use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use seeder_cloud::{Outcome, Report, ReportEntry, ReportSummary};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: ReportSummary,
    exit_code: i32,
    #[serde(flatten)]
    report: &'a Report,
}

pub fn print_report(report: &Report, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => print_text(report),
        OutputFormat::Json => {
            let json = JsonReport {
                summary: report.summary(),
                exit_code: report.exit_code(),
                report,
            };
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(())
}

fn marker(outcome: Outcome) -> ColoredString {
    match outcome {
        Outcome::Created => "+".green().bold(),
        Outcome::Updated => "~".yellow().bold(),
        Outcome::Unchanged => "=".dimmed(),
        Outcome::Failed => "✗".red().bold(),
        Outcome::SkippedDependencyFailed => "-".red(),
    }
}

fn print_entry(entry: &ReportEntry) {
    let key = match entry.outcome {
        Outcome::Unchanged => entry.key.dimmed(),
        Outcome::Failed | Outcome::SkippedDependencyFailed => entry.key.red(),
        _ => entry.key.normal(),
    };
    println!("  {} {}", marker(entry.outcome), key);
    if let Some(detail) = &entry.detail {
        println!("      {}", detail.dimmed());
    }
    if let Some(message) = &entry.message {
        let kind = entry
            .error_kind
            .map(|k| format!("[{}] ", k))
            .unwrap_or_default();
        println!("      {}{}", kind.red(), message);
    }
}

pub fn print_text(report: &Report) {
    if report.dry_run {
        println!("{}", "Dry run: nothing was written".yellow().bold());
    }
    for entry in &report.entries {
        print_entry(entry);
    }

    println!();
    let summary = report.summary();
    let line = format!("{} ({} ms)", summary, report.duration_ms);
    if report.is_success() {
        println!("{} {}", "✓".green().bold(), line);
    } else {
        println!("{} {}", "✗".red().bold(), line);
    }

    if report.auth_failed {
        println!("  {}", "credentials were rejected during the run".red());
    }
    if report.timed_out {
        println!("  {}", "run deadline expired".red());
    }
    if report.cancelled {
        println!("  {}", "run was cancelled".yellow());
    }
    if report.pending > 0 {
        println!("  {} objects were not attempted", report.pending);
    }
}
