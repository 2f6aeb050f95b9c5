use super::{cancel_on_ctrl_c, engine, reconcile, report_error};
use crate::RunArgs;
use crate::output;
use colored::Colorize;
use seeder_engine::{Controller, FileSpecSource};
use std::time::Duration;

pub async fn handle(run: &RunArgs, interval: Duration) -> anyhow::Result<i32> {
    // later versions may be broken and are skipped; the first one must load
    if let Err(code) = reconcile::load(run) {
        return Ok(code);
    }
    let engine = match engine(run) {
        Ok(engine) => engine,
        Err(code) => return Ok(code),
    };

    println!(
        "Watching {} every {} (Ctrl-C to stop)",
        run.spec.display().to_string().cyan(),
        humantime::format_duration(interval)
    );

    let cancel = cancel_on_ctrl_c();
    let source = FileSpecSource::new(&run.spec, interval);
    let result = Controller::new(engine, source)
        .run(cancel, |version, report| {
            println!();
            println!("{} {}", "Spec version".bold(), version.cyan());
            output::print_text(report);
        })
        .await;

    match result {
        Ok(()) => Ok(0),
        Err(e) => Ok(report_error("Watch stopped", &e, e.exit_code())),
    }
}
