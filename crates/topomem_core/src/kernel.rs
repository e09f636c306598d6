//! Radial Kernel Tables
//!
//! Two same-length profiles (`positive`, `negative`) give the weight a
//! neighbor contributes at a given Euclidean distance. Entry `i` is the
//! weight at distance `i`; distances in between are linearly interpolated
//! and anything past the last entry weighs 0.

use serde::{Deserialize, Serialize};

use crate::{Result, TopoError};

/// A (positive, negative) weight pair taken from the kernel at one distance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KernelWeight {
    pub pos: f32,
    pub neg: f32,
}

/// Radial weight profile used to smooth activity across a neighborhood.
///
/// Invariants (checked by [`KernelTable::new`]):
/// - Both tables have the same non-zero length
/// - Entries are finite, non-negative and non-increasing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KernelTable {
    positive: Vec<f32>,
    negative: Vec<f32>,
}

impl KernelTable {
    pub fn new(positive: Vec<f32>, negative: Vec<f32>) -> Result<Self> {
        if positive.is_empty() {
            return Err(TopoError::InvalidConfig("kernel tables are empty".into()));
        }
        if positive.len() != negative.len() {
            return Err(TopoError::InvalidConfig(format!(
                "kernel tables differ in length (positive={}, negative={})",
                positive.len(),
                negative.len()
            )));
        }
        check_profile("positive", &positive)?;
        check_profile("negative", &negative)?;

        Ok(Self { positive, negative })
    }

    pub fn positive(&self) -> &[f32] {
        &self.positive
    }

    pub fn negative(&self) -> &[f32] {
        &self.negative
    }

    /// Weight pair at distance 0 (the cell itself).
    pub fn center(&self) -> KernelWeight {
        KernelWeight {
            pos: self.positive[0],
            neg: self.negative[0],
        }
    }

    /// Distance from which both profiles are identically 0.
    pub fn max_radius(&self) -> f32 {
        self.positive.len() as f32
    }

    /// Interpolated weight pair at distance `r`.
    pub fn weight_at(&self, r: f32) -> KernelWeight {
        KernelWeight {
            pos: interpolate(&self.positive, r),
            neg: interpolate(&self.negative, r),
        }
    }
}

fn check_profile(name: &str, table: &[f32]) -> Result<()> {
    for (i, &w) in table.iter().enumerate() {
        if !w.is_finite() || w < 0.0 {
            return Err(TopoError::InvalidConfig(format!(
                "{name} kernel entry {i} is {w}, expected a finite value >= 0"
            )));
        }
        if i > 0 && w > table[i - 1] {
            return Err(TopoError::InvalidConfig(format!(
                "{name} kernel is not monotonically non-increasing at entry {i}"
            )));
        }
    }
    Ok(())
}

/// Linear interpolation between `table[floor(r)]` and `table[ceil(r)]`.
///
/// Returns exactly `table[0]` at `r == 0`, and 0 whenever the upper index
/// falls outside the table (or `r` is negative / NaN).
pub fn interpolate(table: &[f32], r: f32) -> f32 {
    if r.is_nan() || r < 0.0 {
        return 0.0;
    }
    let lo = r.floor() as usize;
    let hi = r.ceil() as usize;
    if hi >= table.len() {
        return 0.0;
    }
    if lo == hi {
        return table[lo];
    }
    let t = r - lo as f32;
    table[lo] + (table[hi] - table[lo]) * t
}
