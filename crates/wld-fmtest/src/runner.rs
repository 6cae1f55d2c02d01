//! Runs iterations on a pool of blocking workers sharing one router.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info};
use wld_hsm::{SlotId, TokenApi};
use wld_router::WldRouter;

use crate::error::IterationError;
use crate::iteration::perform_fm_function;

/// Totals of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations: u64,
    /// Completed iterations per slot.
    pub per_slot: BTreeMap<SlotId, u64>,
}

impl RunSummary {
    fn merge(&mut self, other: RunSummary) {
        self.iterations += other.iterations;
        for (slot, count) in other.per_slot {
            *self.per_slot.entry(slot).or_default() += count;
        }
    }
}

/// Runs `iterations` key checks split across `workers` blocking tasks.
///
/// A worker stops at its first failed iteration; the run reports the first
/// failure once all workers have finished.
pub async fn run_iterations(
    router: Arc<WldRouter>,
    token: Arc<dyn TokenApi>,
    pin: String,
    iterations: u64,
    workers: usize,
) -> Result<RunSummary, IterationError> {
    let workers = workers.clamp(1, iterations.max(1) as usize);
    let mut tasks = JoinSet::new();

    for worker in 0..workers {
        let share = share_of(iterations, workers, worker);
        let router = Arc::clone(&router);
        let token = Arc::clone(&token);
        let pin = pin.clone();

        tasks.spawn_blocking(move || run_worker(worker, share, &router, token.as_ref(), &pin));
    }

    let mut summary = RunSummary::default();
    let mut first_error = None;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(partial)) => summary.merge(partial),
            Ok(Err(e)) => {
                first_error.get_or_insert(e);
            }
            Err(e) => {
                first_error.get_or_insert(IterationError::Worker(e.to_string()));
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(summary),
    }
}

fn run_worker(
    worker: usize,
    iterations: u64,
    router: &WldRouter,
    token: &dyn TokenApi,
    pin: &str,
) -> Result<RunSummary, IterationError> {
    let mut summary = RunSummary::default();

    for i in 0..iterations {
        match perform_fm_function(router, token, pin) {
            Ok(outcome) => {
                summary.iterations += 1;
                *summary.per_slot.entry(outcome.slot).or_default() += 1;
            }
            Err(e) => {
                error!(worker, iteration = i, error = %e, "Iteration failed");
                return Err(e);
            }
        }
    }

    info!(worker, iterations, "Worker finished");
    Ok(summary)
}

/// Iterations assigned to `worker` so the shares add up to `total`.
fn share_of(total: u64, workers: usize, worker: usize) -> u64 {
    let workers = workers as u64;
    let worker = worker as u64;
    total / workers + u64::from(worker < total % workers)
}
