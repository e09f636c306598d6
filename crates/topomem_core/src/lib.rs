//! TopoMem Core: spatial, topology-preserving associative memory
//!
//! A 2D lattice of cells accumulates sparse binary feature vectors under a
//! winner-take-all placement rule whose score is smoothed across a radial
//! neighborhood. Stored memories can later be relaxed toward better-matching
//! cells until the map settles.
//!
//! Pipeline (leaf-first):
//! 1. `kernel`: radial weight profile, interpolated by distance
//! 2. `grid`: immutable lattice topology with precomputed neighbor weights
//! 3. `scoring`: per-cell activity, then neighbor-weighted superactivity
//! 4. `selection`: greedy multi-winner selection with suppression
//! 5. `relaxation`: iterative reassignment of stored memories
//!
//! Concurrency model:
//! - Scoring phases fan out across cells (rayon, `parallel` feature)
//! - Every mutation of a memory store runs on the calling thread

pub mod bits;
pub mod config;
pub mod dump;
pub mod grid;
pub mod kernel;
pub mod map;
pub mod memory;
pub mod relaxation;
pub mod scoring;
pub mod selection;
pub mod stats;

pub use bits::{cosine_similarity, BitVector};
pub use config::{FloorPolicy, MapConfig, RelaxConfig, WorkingRegion};
pub use grid::{CellCoord, Grid, NeighborList, NeighborWeight};
pub use kernel::KernelTable;
pub use map::{RecallHit, StoreOutcome, TopoMap};
pub use memory::{Memory, MemoryStore, Provenance};
pub use relaxation::{IterationReport, RelaxOutcome, StopReason};
pub use scoring::{Activity, ScoringContext};
pub use selection::{AnyCell, CellView, Eligibility, MinActiveBits, WithinRegion};
pub use stats::{CellSnapshot, MapStats, MemorySummary};

use thiserror::Error;

/// Errors surfaced at the boundary of the engine.
///
/// Outcomes that are part of normal operation (a degenerate input that is
/// skipped, a pass with no winner, a relaxation that runs out of iterations)
/// are return values, not errors.
#[derive(Debug, Error)]
pub enum TopoError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("vector length {actual} does not match configured hash length {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("cell ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("cell ({x}, {y}) is outside the working region")]
    InactiveCell { x: u32, y: u32 },

    #[error("vector has {active_bits} active bits, at least {minimum} required")]
    Degenerate { active_bits: u32, minimum: u32 },

    #[error("invalid bit string: {0}")]
    InvalidBits(String),

    #[error("invalid dump: {0}")]
    InvalidDump(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = core::result::Result<T, TopoError>;
