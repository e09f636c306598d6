//! Relaxation: iterative reassignment of stored memories
//!
//! Each iteration sweeps every stored memory, re-scores its vector over the
//! home cell's neighborhood (with the memory itself taken out of the home
//! store) and moves it to the best local cell if that is not home.
//!
//! Sweep structure:
//! 1. Plan (read-only, parallel): every memory is scored against the
//!    pre-iteration stores
//! 2. Apply (sequential): ties are drawn with the caller's RNG in row-major
//!    cell / insertion order, then all memories are recomposed into fresh
//!    per-cell lists that replace the old ones in one swap
//!
//! The loop stops when an iteration moves fewer memories than the
//! small-change threshold, when no new minimum has been seen for longer than
//! the plateau patience, or when the iteration budget runs out. None of
//! these is an error; the caller gets the final change count back and may
//! run again.

use core::future::Future;
use core::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::Rng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{FloorPolicy, RelaxConfig};
use crate::grid::Grid;
use crate::map::TopoMap;
use crate::memory::{Memory, MemoryStore};
use crate::scoring::{LocalScores, ScoreParams};

/// Why the relaxation loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// An iteration moved fewer memories than the small-change threshold
    Converged,
    /// No new minimum change count within the plateau patience
    Plateau,
    /// The iteration budget ran out
    BudgetExhausted,
    /// The cancel flag was raised or the progress callback asked to stop
    Cancelled,
}

/// Summary of one completed iteration, handed to progress callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationReport {
    /// 1-based iteration number
    pub iteration: u32,
    /// Memories that moved during this iteration
    pub changed: usize,
    /// Smallest change count seen so far
    pub min_changed: usize,
    /// Iterations since the minimum last improved
    pub plateau: u32,
    /// Memories held across the grid after this iteration
    pub total_memories: usize,
}

/// Final state of a relaxation run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaxOutcome {
    pub iterations: u32,
    /// Change count of the last completed iteration (0 if none ran)
    pub final_changed: usize,
    pub min_changed: Option<usize>,
    pub stop: StopReason,
}

/// Where one memory goes at the end of the sweep.
#[derive(Clone, Debug, PartialEq)]
enum Plan {
    Stay,
    Move(usize),
    /// Several non-home cells tie for the local maximum.
    Draw(Vec<usize>),
}

/// Convergence bookkeeping across iterations.
#[derive(Clone, Debug)]
struct Tracker {
    config: RelaxConfig,
    iteration: u32,
    last_changed: usize,
    min_changed: Option<usize>,
    plateau: u32,
}

impl Tracker {
    fn new(config: RelaxConfig) -> Self {
        Self {
            config,
            iteration: 0,
            last_changed: 0,
            min_changed: None,
            plateau: 0,
        }
    }

    fn budget_left(&self) -> bool {
        self.iteration < self.config.max_iterations
    }

    fn record(&mut self, changed: usize, total_memories: usize) -> IterationReport {
        self.iteration += 1;
        self.last_changed = changed;
        match self.min_changed {
            Some(min) if changed >= min => self.plateau += 1,
            _ => {
                self.min_changed = Some(changed);
                self.plateau = 0;
            }
        }
        IterationReport {
            iteration: self.iteration,
            changed,
            min_changed: self.min_changed.unwrap_or(changed),
            plateau: self.plateau,
            total_memories,
        }
    }

    fn verdict(&self) -> Option<StopReason> {
        if self.last_changed < self.config.small_change_threshold {
            Some(StopReason::Converged)
        } else if self.plateau > self.config.plateau_patience {
            Some(StopReason::Plateau)
        } else if !self.budget_left() {
            Some(StopReason::BudgetExhausted)
        } else {
            None
        }
    }

    fn finish(&self, stop: StopReason) -> RelaxOutcome {
        log::info!(
            "relaxation stopped after {} iteration(s): {:?}, last change count {}",
            self.iteration,
            stop,
            self.last_changed
        );
        RelaxOutcome {
            iterations: self.iteration,
            final_changed: self.last_changed,
            min_changed: self.min_changed,
            stop,
        }
    }
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

impl TopoMap {
    /// Relax until one of the stop conditions in `config` holds.
    pub fn relax<R>(&mut self, config: RelaxConfig, rng: &mut R) -> RelaxOutcome
    where
        R: Rng + ?Sized,
    {
        self.relax_with(config, rng, None, |_| ControlFlow::Continue(()))
    }

    /// Relax with a cooperative cancel flag and a progress callback invoked
    /// once after every completed iteration. Both are consulted only
    /// between iterations, never mid-sweep.
    pub fn relax_with<R, F>(
        &mut self,
        config: RelaxConfig,
        rng: &mut R,
        cancel: Option<&AtomicBool>,
        mut progress: F,
    ) -> RelaxOutcome
    where
        R: Rng + ?Sized,
        F: FnMut(&IterationReport) -> ControlFlow<()>,
    {
        let mut tracker = Tracker::new(config);
        loop {
            if is_cancelled(cancel) {
                return tracker.finish(StopReason::Cancelled);
            }
            if !tracker.budget_left() {
                return tracker.finish(StopReason::BudgetExhausted);
            }

            let report = self.relax_iteration(&mut tracker, rng);
            let flow = progress(&report);
            if let Some(stop) = tracker.verdict() {
                return tracker.finish(stop);
            }
            if flow.is_break() {
                return tracker.finish(StopReason::Cancelled);
            }
        }
    }

    /// Async form of [`TopoMap::relax_with`]: the progress future is awaited
    /// between iterations, so the caller may take arbitrarily long there.
    pub async fn relax_async<R, F, Fut>(
        &mut self,
        config: RelaxConfig,
        rng: &mut R,
        cancel: Option<&AtomicBool>,
        mut progress: F,
    ) -> RelaxOutcome
    where
        R: Rng + ?Sized,
        F: FnMut(IterationReport) -> Fut,
        Fut: Future<Output = ControlFlow<()>>,
    {
        let mut tracker = Tracker::new(config);
        loop {
            if is_cancelled(cancel) {
                return tracker.finish(StopReason::Cancelled);
            }
            if !tracker.budget_left() {
                return tracker.finish(StopReason::BudgetExhausted);
            }

            let report = self.relax_iteration(&mut tracker, rng);
            let flow = progress(report).await;
            if let Some(stop) = tracker.verdict() {
                return tracker.finish(stop);
            }
            if flow.is_break() {
                return tracker.finish(StopReason::Cancelled);
            }
        }
    }

    fn relax_iteration<R>(&mut self, tracker: &mut Tracker, rng: &mut R) -> IterationReport
    where
        R: Rng + ?Sized,
    {
        let params = self.score_params();
        let floor = self.config.floor();
        let changed = sweep(&self.grid, &mut self.stores, params, floor, rng);
        let report = tracker.record(changed, self.total_memories());
        log::info!(
            "relaxation iteration {}: {} moved (min {}, plateau {})",
            report.iteration,
            report.changed,
            report.min_changed,
            report.plateau
        );
        report
    }
}

/// One full relaxation sweep. Returns the number of memories that moved.
pub(crate) fn sweep<R>(
    grid: &Grid,
    stores: &mut Vec<MemoryStore>,
    params: ScoreParams,
    floor: FloorPolicy,
    rng: &mut R,
) -> usize
where
    R: Rng + ?Sized,
{
    let jobs: Vec<(usize, usize)> = grid
        .active_cells()
        .iter()
        .flat_map(|&cell| (0..stores[cell].len()).map(move |j| (cell, j)))
        .collect();

    let snapshot: &[MemoryStore] = stores;
    #[cfg(feature = "parallel")]
    let plans: Vec<Plan> = jobs
        .par_iter()
        .map_init(LocalScores::default, |local, &(home, j)| {
            plan_move(local, grid, snapshot, home, j, params, floor)
        })
        .collect();
    #[cfg(not(feature = "parallel"))]
    let plans: Vec<Plan> = {
        let mut local = LocalScores::default();
        jobs.iter()
            .map(|&(home, j)| plan_move(&mut local, grid, snapshot, home, j, params, floor))
            .collect()
    };

    let mut next: Vec<Vec<Memory>> = vec![Vec::new(); stores.len()];
    let mut changed = 0;
    let mut plans = plans.into_iter();
    for &home in grid.active_cells() {
        for memory in stores[home].drain() {
            let dest = match plans.next().unwrap_or(Plan::Stay) {
                Plan::Stay => home,
                Plan::Move(cell) => cell,
                Plan::Draw(ties) => ties[rng.gen_range(0..ties.len())],
            };
            if dest != home {
                changed += 1;
            }
            next[dest].push(memory);
        }
    }

    *stores = next.into_iter().map(MemoryStore::from).collect();
    changed
}

fn plan_move(
    local: &mut LocalScores,
    grid: &Grid,
    stores: &[MemoryStore],
    home: usize,
    index: usize,
    params: ScoreParams,
    floor: FloorPolicy,
) -> Plan {
    let Some(memory) = stores[home].get(index) else {
        return Plan::Stay;
    };
    let scores = local.score(grid, stores, home, Some(index), memory.vector(), params);

    let mut best = f32::NEG_INFINITY;
    let mut ties: Vec<usize> = Vec::new();
    for &(cell, score) in scores {
        if !floor.admits(score) {
            continue;
        }
        if score > best {
            best = score;
            ties.clear();
            ties.push(cell);
        } else if score == best {
            ties.push(cell);
        }
    }

    // Home among the best keeps the memory in place
    if ties.is_empty() || ties.contains(&home) {
        Plan::Stay
    } else if ties.len() == 1 {
        Plan::Move(ties[0])
    } else {
        Plan::Draw(ties)
    }
}
