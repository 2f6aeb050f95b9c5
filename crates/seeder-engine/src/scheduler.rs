//! Dependency-ordered dispatch of reconcile tasks
//!
//! The scheduler owns the outcome map. Ready tasks are spawned in plan order
//! onto a bounded pool; a finished task releases its dependents, a failed
//! one settles its transitive dependents as skipped. Cancellation, the run
//! deadline and an authentication failure all stop dispatch; work already in
//! flight finishes and is reported.

use crate::plan::Plan;
use crate::reconcile::{Context, dispatch};
use futures_util::FutureExt;
use seeder_cloud::{CloudError, ErrorKind, Report, ReportEntry};
use std::collections::{BTreeSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why dispatch stopped before the plan was exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Cancelled,
    TimedOut,
    AuthFailed,
}

pub struct Scheduler {
    concurrency: usize,
    run_timeout: Duration,
}

impl Scheduler {
    pub fn new(concurrency: usize, run_timeout: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            run_timeout,
        }
    }

    /// Drive `plan` to completion, appending one entry per settled task
    pub async fn run(
        &self,
        plan: &Plan,
        ctx: &Context,
        cancel: &CancellationToken,
        report: &mut Report,
    ) {
        let tasks = Arc::new(plan.tasks.clone());
        let dependents = plan.dependents();
        let mut waiting: Vec<usize> = tasks.iter().map(|t| t.deps.len()).collect();
        let mut settled = vec![false; tasks.len()];
        let mut ready: BTreeSet<usize> = (0..tasks.len()).filter(|i| waiting[*i] == 0).collect();

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut running: JoinSet<(usize, ReportEntry)> = JoinSet::new();
        let deadline = tokio::time::sleep(self.run_timeout);
        tokio::pin!(deadline);
        let mut stop: Option<Stop> = cancel.is_cancelled().then_some(Stop::Cancelled);

        loop {
            while stop.is_none() {
                let Some(&index) = ready.first() else {
                    break;
                };
                let Ok(permit) = permits.clone().try_acquire_owned() else {
                    break;
                };
                ready.remove(&index);
                let tasks = tasks.clone();
                let ctx = ctx.clone();
                debug!(object = %tasks[index].label(), "Dispatching");
                running.spawn(async move {
                    let task = &tasks[index];
                    let entry = AssertUnwindSafe(dispatch(task, &ctx))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            ReportEntry::failed(
                                task.kind,
                                task.label(),
                                &CloudError::BadRequest("reconciler panicked".into()),
                            )
                        });
                    drop(permit);
                    (index, entry)
                });
            }

            if running.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled(), if stop.is_none() => {
                    info!(in_flight = running.len(), "Cancelled, draining in-flight work");
                    stop = Some(Stop::Cancelled);
                }
                _ = &mut deadline, if stop.is_none() => {
                    warn!(in_flight = running.len(), "Run deadline expired, draining in-flight work");
                    stop = Some(Stop::TimedOut);
                }
                joined = running.join_next() => {
                    let Some(joined) = joined else { continue };
                    let (index, entry) = match joined {
                        Ok(done) => done,
                        Err(e) => {
                            warn!(error = %e, "Reconcile task aborted");
                            continue;
                        }
                    };
                    settled[index] = true;

                    if entry.outcome.is_success() {
                        for next in &dependents[index] {
                            waiting[*next] -= 1;
                            if waiting[*next] == 0 && !settled[*next] {
                                ready.insert(*next);
                            }
                        }
                    } else {
                        if entry.error_kind == Some(ErrorKind::AuthFailed) && stop.is_none() {
                            warn!(object = %entry.key, "Credentials rejected, stopping dispatch");
                            stop = Some(Stop::AuthFailed);
                        }
                        let skipped = skip_dependents(&dependents, index, &mut settled);
                        for dependent in skipped {
                            ready.remove(&dependent);
                            let task = &tasks[dependent];
                            report.push(ReportEntry::skipped(task.kind, task.label(), &entry.key));
                        }
                    }
                    report.push(entry);
                }
            }
        }

        match stop {
            Some(Stop::Cancelled) => report.cancelled = true,
            Some(Stop::TimedOut) => report.timed_out = true,
            Some(Stop::AuthFailed) => report.auth_failed = true,
            None => {}
        }
        report.pending = settled.iter().filter(|s| !**s).count();
    }
}

/// Settle every transitive dependent of `failed` not settled yet
fn skip_dependents(dependents: &[Vec<usize>], failed: usize, settled: &mut [bool]) -> Vec<usize> {
    let mut skipped = Vec::new();
    let mut queue: VecDeque<usize> = dependents[failed].iter().copied().collect();
    while let Some(index) = queue.pop_front() {
        if settled[index] {
            continue;
        }
        settled[index] = true;
        skipped.push(index);
        queue.extend(dependents[index].iter().copied());
    }
    skipped.sort_unstable();
    skipped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_is_transitive_and_once() {
        // 0 -> 1 -> 3, 0 -> 2 -> 3
        let dependents = vec![vec![1, 2], vec![3], vec![3], vec![]];
        let mut settled = vec![true, false, false, false];
        assert_eq!(skip_dependents(&dependents, 0, &mut settled), vec![1, 2, 3]);
        assert!(settled.iter().all(|s| *s));
        assert!(skip_dependents(&dependents, 0, &mut settled).is_empty());
    }
}
