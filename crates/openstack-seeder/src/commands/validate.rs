use super::{report_error, spec_error};
use colored::Colorize;
use seeder_engine::Plan;
use seeder_spec::{dump_canonical, load_spec_file};
use std::collections::BTreeMap;
use std::path::Path;

pub fn handle(path: &Path, canonical: bool) -> anyhow::Result<i32> {
    let doc = match load_spec_file(path) {
        Ok(doc) => doc,
        Err(e) => return Ok(spec_error(path, &e)),
    };
    let plan = match Plan::build(&doc) {
        Ok(plan) => plan,
        Err(e) => return Ok(report_error("Invalid spec", &e, e.exit_code())),
    };

    if canonical {
        print!("{}", dump_canonical(&doc)?);
        return Ok(0);
    }

    let mut by_kind: BTreeMap<&str, usize> = BTreeMap::new();
    for task in &plan.tasks {
        *by_kind.entry(task.kind.as_str()).or_default() += 1;
    }

    println!("{}", "✓ Spec is valid".green().bold());
    println!("  file: {}", path.display().to_string().cyan());
    println!("  {} objects to reconcile", plan.len());
    for (kind, count) in by_kind {
        println!("    {:<24} {}", kind, count);
    }
    Ok(0)
}
