//! The map: topology, memory stores, and the caller-facing operations.
//!
//! Every mutation (store, force-store, flood, reset, relaxation) runs on the
//! calling thread. Scoring inside those operations fans out across cells but
//! only ever reads the stores.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::bits::BitVector;
use crate::config::MapConfig;
use crate::grid::{CellCoord, Grid};
use crate::kernel::KernelTable;
use crate::memory::{Memory, MemoryStore, Provenance};
use crate::scoring::{Activity, ScoreParams, ScoringContext};
use crate::selection::{self, Eligibility};
use crate::{Result, TopoError};

/// Result of presenting one input to [`TopoMap::select_and_store`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StoreOutcome {
    /// Degenerate input (too few set bits); never scored.
    Rejected { active_bits: u32 },
    /// Cells that received a copy, in selection order. May be empty when
    /// nothing cleared the floor.
    Stored { winners: Vec<CellCoord> },
}

impl StoreOutcome {
    pub fn winners(&self) -> &[CellCoord] {
        match self {
            StoreOutcome::Rejected { .. } => &[],
            StoreOutcome::Stored { winners } => winners,
        }
    }
}

/// Best-matching cell for a query, found without mutating the map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecallHit {
    pub coord: CellCoord,
    pub super_activity: f32,
    pub activity: Activity,
}

/// Topology-preserving associative memory.
#[derive(Clone, Debug)]
pub struct TopoMap {
    pub(crate) config: MapConfig,
    pub(crate) kernel: KernelTable,
    pub(crate) grid: Grid,
    pub(crate) stores: Vec<MemoryStore>,
    ctx: ScoringContext,
    last_winners: Vec<CellCoord>,
}

impl TopoMap {
    /// Validate `config` and build the topology. All stores start empty.
    pub fn new(config: MapConfig) -> Result<Self> {
        config.validate()?;
        let kernel = config.kernel()?;
        let grid = Grid::build(&config, &kernel);
        let cells = grid.len();

        log::info!(
            "map ready: {}x{} grid, {} active cells, radius {}, hash_len {}",
            config.width,
            config.height,
            grid.active_cells().len(),
            config.neighbor_radius,
            config.hash_len
        );

        Ok(Self {
            config,
            kernel,
            grid,
            stores: vec![MemoryStore::new(); cells],
            ctx: ScoringContext::new(cells),
            last_winners: Vec::new(),
        })
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn kernel(&self) -> &KernelTable {
        &self.kernel
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub(crate) fn score_params(&self) -> ScoreParams {
        ScoreParams {
            k0: self.config.k0,
            k2: self.config.k2,
        }
    }

    /// Reject vectors whose length differs from the configured hash length.
    pub fn check_length(&self, vector: &BitVector) -> Result<()> {
        if vector.len() != self.config.hash_len {
            return Err(TopoError::LengthMismatch {
                expected: self.config.hash_len,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// True when `input` is too sparse to be scored or stored.
    pub fn is_degenerate(&self, input: &BitVector) -> bool {
        input.count_ones() == 0 || input.count_ones() < self.config.min_active_bits
    }

    /// Length and sparsity gate for the paths that store without selection.
    fn check_storable(&self, vector: &BitVector) -> Result<()> {
        self.check_length(vector)?;
        if self.is_degenerate(vector) {
            return Err(TopoError::Degenerate {
                active_bits: vector.count_ones(),
                minimum: self.config.min_active_bits.max(1),
            });
        }
        Ok(())
    }

    /// Score `input` over the whole grid, then store it in every winner the
    /// greedy suppression loop finds.
    pub fn select_and_store<E, R>(
        &mut self,
        input: &BitVector,
        provenance: Provenance,
        eligibility: &E,
        rng: &mut R,
    ) -> Result<StoreOutcome>
    where
        E: Eligibility + ?Sized,
        R: Rng + ?Sized,
    {
        self.check_length(input)?;
        if self.is_degenerate(input) {
            log::warn!(
                "input {:?} rejected: {} active bits (minimum {})",
                provenance,
                input.count_ones(),
                self.config.min_active_bits
            );
            return Ok(StoreOutcome::Rejected {
                active_bits: input.count_ones(),
            });
        }

        let params = self.score_params();
        self.ctx.score(&self.grid, &self.stores, input, params);
        let winners = selection::select_and_store(
            &self.grid,
            &mut self.stores,
            &self.ctx,
            input,
            provenance,
            eligibility,
            self.config.floor(),
            rng,
        );

        self.last_winners = winners.iter().map(|&c| self.grid.coord(c)).collect();
        log::debug!(
            "input {:?} stored in {} cell(s): {:?}",
            provenance,
            self.last_winners.len(),
            self.last_winners
        );

        Ok(StoreOutcome::Stored {
            winners: self.last_winners.clone(),
        })
    }

    /// Present several inputs one after another. Stops at the first
    /// length mismatch.
    pub fn store_batch<'a, I, E, R>(
        &mut self,
        inputs: I,
        eligibility: &E,
        rng: &mut R,
    ) -> Result<Vec<StoreOutcome>>
    where
        I: IntoIterator<Item = (&'a BitVector, Provenance)>,
        E: Eligibility + ?Sized,
        R: Rng + ?Sized,
    {
        inputs
            .into_iter()
            .map(|(input, provenance)| self.select_and_store(input, provenance, eligibility, rng))
            .collect()
    }

    /// Place `memory` directly at `coord`, bypassing selection. Degenerate
    /// vectors are refused like everywhere else.
    pub fn force_store(&mut self, coord: CellCoord, memory: Memory) -> Result<()> {
        self.check_storable(memory.vector())?;
        let cell = self.grid.active_index(coord)?;
        self.stores[cell].push(memory);
        Ok(())
    }

    /// Store a copy of `input` in every cell of the working region.
    /// Returns the number of cells written.
    pub fn flood(&mut self, input: &BitVector, provenance: Provenance) -> Result<usize> {
        self.check_storable(input)?;
        for &cell in self.grid.active_cells() {
            self.stores[cell].push(Memory::new(input.clone(), provenance));
        }
        Ok(self.grid.active_cells().len())
    }

    /// Drop every stored memory.
    pub fn reset(&mut self) {
        for store in &mut self.stores {
            store.clear();
        }
        self.last_winners.clear();
    }

    /// Drop the memories of one cell, returning how many were removed.
    pub fn clear_cell(&mut self, coord: CellCoord) -> Result<usize> {
        let cell = self.grid.index(coord)?;
        let removed = self.stores[cell].len();
        self.stores[cell].clear();
        Ok(removed)
    }

    /// Full two-phase scoring of `input` without storing it. Degenerate
    /// inputs are never scored and yield `None`.
    pub fn score(&self, input: &BitVector) -> Result<Option<ScoringContext>> {
        self.check_length(input)?;
        if self.is_degenerate(input) {
            return Ok(None);
        }
        let mut ctx = ScoringContext::new(self.grid.len());
        ctx.score(&self.grid, &self.stores, input, self.score_params());
        Ok(Some(ctx))
    }

    /// Superactivity of `coord` for `input` after a full scoring pass.
    /// `None` for cells outside the working region and degenerate inputs.
    pub fn super_activity_at(&self, input: &BitVector, coord: CellCoord) -> Result<Option<f32>> {
        let cell = self.grid.index(coord)?;
        Ok(self.score(input)?.and_then(|ctx| ctx.super_activity(cell)))
    }

    /// Best cell for `input`; ties go to the first cell in row-major order.
    /// Degenerate inputs recall nothing.
    pub fn recall(&self, input: &BitVector) -> Result<Option<RecallHit>> {
        let Some(ctx) = self.score(input)? else {
            return Ok(None);
        };
        let floor = self.config.floor();

        let mut best: Option<(usize, f32)> = None;
        for &cell in self.grid.active_cells() {
            let Some(s) = ctx.super_activity(cell) else {
                continue;
            };
            if floor.admits(s) && best.map_or(true, |(_, b)| s > b) {
                best = Some((cell, s));
            }
        }

        Ok(best.map(|(cell, super_activity)| RecallHit {
            coord: self.grid.coord(cell),
            super_activity,
            activity: ctx.activity(cell),
        }))
    }

    /// Cells chosen by the most recent store step.
    pub fn last_winners(&self) -> &[CellCoord] {
        &self.last_winners
    }

    /// Memory count per cell, row-major.
    pub fn memory_counts(&self) -> Vec<usize> {
        self.stores.iter().map(MemoryStore::len).collect()
    }

    pub fn total_memories(&self) -> usize {
        self.stores.iter().map(MemoryStore::len).sum()
    }

    /// Read-only view of the memories held at `coord`.
    pub fn memories_at(&self, coord: CellCoord) -> Result<&MemoryStore> {
        let cell = self.grid.index(coord)?;
        Ok(&self.stores[cell])
    }

    /// Every store, row-major.
    pub fn stores(&self) -> &[MemoryStore] {
        &self.stores
    }

    /// Replace every store at once (used when restoring a dump).
    pub fn restore_stores(&mut self, stores: Vec<MemoryStore>) -> Result<()> {
        if stores.len() != self.grid.len() {
            return Err(TopoError::InvalidDump(format!(
                "expected {} cell stores, got {}",
                self.grid.len(),
                stores.len()
            )));
        }
        for (cell, store) in stores.iter().enumerate() {
            if !store.is_empty() && !self.grid.is_active(cell) {
                let c = self.grid.coord(cell);
                return Err(TopoError::InactiveCell { x: c.x, y: c.y });
            }
            for memory in store {
                self.check_length(memory.vector())?;
            }
        }
        self.stores = stores;
        self.last_winners.clear();
        Ok(())
    }
}
