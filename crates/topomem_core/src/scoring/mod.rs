//! Two-phase scoring of an input vector across the grid
//!
//! Phase 1 computes every cell's activity; phase 2 computes every cell's
//! superactivity from the phase-1 results. Phase 2 never starts before
//! phase 1 has finished for the whole grid, and there is no incremental
//! mode. Both phases are read-only against the memory stores and fan out
//! across cells.
//!
//! Scratch values live in a [`ScoringContext`] owned by the caller, reset at
//! the start of every pass and never persisted.
pub mod activity;
pub mod super_activity;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::bits::BitVector;
use crate::grid::Grid;
use crate::memory::MemoryStore;

/// Similarity-derived score of one cell against one input.
///
/// `pos` and `neg` are the means of the non-negative and negative
/// contributions respectively; `count` is the number of memories scored.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Activity {
    pub pos: f32,
    pub neg: f32,
    pub count: u32,
}

/// Scoring constants shared by the global and local passes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreParams {
    pub k0: f32,
    pub k2: f32,
}

/// Per-pass scratch: activity and superactivity for every cell.
#[derive(Clone, Debug, Default)]
pub struct ScoringContext {
    activity: Vec<Activity>,
    super_activity: Vec<Option<f32>>,
}

impl ScoringContext {
    pub fn new(cells: usize) -> Self {
        Self {
            activity: vec![Activity::default(); cells],
            super_activity: vec![None; cells],
        }
    }

    /// Run both phases for `input`. `stores` is indexed by cell.
    pub fn score(
        &mut self,
        grid: &Grid,
        stores: &[MemoryStore],
        input: &BitVector,
        params: ScoreParams,
    ) {
        self.reset(grid.len());
        self.score_activity(grid, stores, input, params.k0);
        self.score_super_activity(grid, params);
    }

    fn reset(&mut self, cells: usize) {
        self.activity.clear();
        self.activity.resize(cells, Activity::default());
        self.super_activity.clear();
        self.super_activity.resize(cells, None);
    }

    fn score_activity(&mut self, grid: &Grid, stores: &[MemoryStore], input: &BitVector, k0: f32) {
        let phase = |(cell, slot): (usize, &mut Activity)| {
            if grid.is_active(cell) {
                *slot = activity::compute(&stores[cell], input, k0);
            }
        };

        #[cfg(feature = "parallel")]
        self.activity.par_iter_mut().enumerate().for_each(phase);
        #[cfg(not(feature = "parallel"))]
        self.activity.iter_mut().enumerate().for_each(phase);
    }

    fn score_super_activity(&mut self, grid: &Grid, params: ScoreParams) {
        let activity = &self.activity;
        let phase = |(cell, slot): (usize, &mut Option<f32>)| {
            *slot = super_activity::compute(
                grid.neighbors(cell),
                |n| activity[n],
                params.k0,
                params.k2,
            );
        };

        #[cfg(feature = "parallel")]
        self.super_activity.par_iter_mut().enumerate().for_each(phase);
        #[cfg(not(feature = "parallel"))]
        self.super_activity.iter_mut().enumerate().for_each(phase);
    }

    pub fn activity(&self, cell: usize) -> Activity {
        self.activity.get(cell).copied().unwrap_or_default()
    }

    /// Superactivity from the last pass; `None` for cells outside the
    /// working region or before any pass ran.
    pub fn super_activity(&self, cell: usize) -> Option<f32> {
        self.super_activity.get(cell).copied().flatten()
    }

    pub fn super_activities(&self) -> &[Option<f32>] {
        &self.super_activity
    }
}

/// Scores one vector over a single neighborhood `{home} ∪ neighbors(home)`.
///
/// Cells outside that set are treated as empty. Used by relaxation to bound
/// the cost of re-placing a memory.
#[derive(Clone, Debug, Default)]
pub struct LocalScores {
    activity: Vec<(usize, Activity)>,
    scores: Vec<(usize, f32)>,
}

impl LocalScores {
    /// Score `input` around `home`, leaving out memory `skip` of the home
    /// store (the memory being re-placed). Returns `(cell, superactivity)`
    /// in neighbor-list order, home first.
    pub fn score(
        &mut self,
        grid: &Grid,
        stores: &[MemoryStore],
        home: usize,
        skip: Option<usize>,
        input: &BitVector,
        params: ScoreParams,
    ) -> &[(usize, f32)] {
        self.activity.clear();
        self.scores.clear();

        let local = grid.neighbors(home);
        for cell in local.cells() {
            let skip_here = if cell == home { skip } else { None };
            let a = activity::compute_excluding(&stores[cell], input, params.k0, skip_here);
            self.activity.push((cell, a));
        }
        self.activity.sort_unstable_by_key(|&(cell, _)| cell);

        let known = &self.activity;
        let lookup = |cell: usize| match known.binary_search_by_key(&cell, |&(c, _)| c) {
            Ok(i) => known[i].1,
            Err(_) => Activity::default(),
        };

        for cell in local.cells() {
            if let Some(score) =
                super_activity::compute(grid.neighbors(cell), lookup, params.k0, params.k2)
            {
                self.scores.push((cell, score));
            }
        }
        &self.scores
    }
}
