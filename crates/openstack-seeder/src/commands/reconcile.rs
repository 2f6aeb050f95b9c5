use super::{Step, cancel_on_ctrl_c, engine, report_error, spec_error};
use crate::RunArgs;
use crate::output::{self, OutputFormat};
use seeder_spec::{SpecDocument, load_spec_file};

pub async fn handle(run: &RunArgs, format: OutputFormat) -> anyhow::Result<i32> {
    let spec = match load(run) {
        Ok(spec) => spec,
        Err(code) => return Ok(code),
    };
    let engine = match engine(run) {
        Ok(engine) => engine,
        Err(code) => return Ok(code),
    };

    let cancel = cancel_on_ctrl_c();
    match engine.reconcile(&cancel, &spec).await {
        Ok(report) => {
            output::print_report(&report, format)?;
            Ok(report.exit_code())
        }
        Err(e) => Ok(report_error("Reconciliation did not start", &e, e.exit_code())),
    }
}

/// Spec loads before credentials so a bad document never needs a cloud
pub(super) fn load(run: &RunArgs) -> Step<SpecDocument> {
    load_spec_file(&run.spec).map_err(|e| spec_error(&run.spec, &e))
}
