use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
use clap::Args;

use crate::kernel::KernelTable;
use crate::{Result, TopoError};

/// Circular sub-area of the grid that takes part in scoring and storage.
/// Cells outside it keep no neighbor list and never win.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkingRegion {
    pub center_x: u32,
    pub center_y: u32,
    pub radius: f32,
}

impl WorkingRegion {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        let dx = x as f32 - self.center_x as f32;
        let dy = y as f32 - self.center_y as f32;
        (dx * dx + dy * dy).sqrt() <= self.radius + crate::grid::RADIUS_EPSILON
    }
}

/// Lower bound a superactivity must exceed to win.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FloorPolicy {
    /// Any finite superactivity can win.
    Unbounded,
    /// Cells at or below the threshold never win.
    Threshold(f32),
}

impl FloorPolicy {
    #[inline]
    pub fn admits(self, value: f32) -> bool {
        match self {
            FloorPolicy::Unbounded => value > f32::NEG_INFINITY,
            FloorPolicy::Threshold(k4) => value > k4,
        }
    }
}

/// Map configuration, fixed for the lifetime of a [`crate::TopoMap`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    /// Grid width in cells
    pub width: u32,
    /// Grid height in cells
    pub height: u32,
    /// Optional circular working sub-area (bounds grid construction cost)
    #[serde(default)]
    pub region: Option<WorkingRegion>,
    /// Radius of the neighborhood aggregated into superactivity
    pub neighbor_radius: f32,
    /// Similarity zero-point: activity is `similarity - k0`
    pub k0: f32,
    /// Similarity an empty cell is assumed to show to any pattern
    pub k2: f32,
    /// Superactivity floor, used only when `use_k4_floor` is set
    pub k4: f32,
    #[serde(default)]
    pub use_k4_floor: bool,
    /// Radial weights applied to positive activity, indexed by distance
    pub positive_k: Vec<f32>,
    /// Radial weights applied to negative activity, indexed by distance
    pub negative_k: Vec<f32>,
    /// Length of every feature vector
    pub hash_len: usize,
    /// Inputs with fewer set bits are never scored or stored
    pub min_active_bits: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 32,
            height: 32,
            region: None,
            neighbor_radius: 3.0,
            k0: 0.2,
            k2: 0.45,
            k4: 0.0,
            use_k4_floor: false,
            positive_k: vec![1.0, 0.6, 0.3, 0.1],
            negative_k: vec![1.0, 0.5, 0.2, 0.05],
            hash_len: 256,
            min_active_bits: 4,
        }
    }
}

impl MapConfig {
    pub fn floor(&self) -> FloorPolicy {
        if self.use_k4_floor {
            FloorPolicy::Threshold(self.k4)
        } else {
            FloorPolicy::Unbounded
        }
    }

    pub fn kernel(&self) -> Result<KernelTable> {
        KernelTable::new(self.positive_k.clone(), self.negative_k.clone())
    }

    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(TopoError::InvalidConfig(format!(
                "grid must be non-empty (got {}x{})",
                self.width, self.height
            )));
        }
        if self.hash_len == 0 {
            return Err(TopoError::InvalidConfig("hash_len must be > 0".into()));
        }
        if !self.neighbor_radius.is_finite() || self.neighbor_radius < 0.0 {
            return Err(TopoError::InvalidConfig(format!(
                "neighbor_radius must be finite and >= 0 (got {})",
                self.neighbor_radius
            )));
        }
        for (name, k) in [("k0", self.k0), ("k2", self.k2), ("k4", self.k4)] {
            if !k.is_finite() {
                return Err(TopoError::InvalidConfig(format!("{name} must be finite")));
            }
        }

        let kernel = self.kernel()?;
        if kernel.positive()[0] <= 0.0 {
            return Err(TopoError::InvalidConfig(
                "positive_k[0] must be > 0".into(),
            ));
        }

        if let Some(region) = self.region {
            if region.center_x >= self.width || region.center_y >= self.height {
                return Err(TopoError::InvalidConfig(format!(
                    "working region center ({}, {}) lies outside the grid",
                    region.center_x, region.center_y
                )));
            }
            if !region.radius.is_finite() || region.radius < 0.0 {
                return Err(TopoError::InvalidConfig(
                    "working region radius must be finite and >= 0".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Stop parameters for the relaxation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(Args))]
#[serde(default)]
pub struct RelaxConfig {
    /// Stop once an iteration moves fewer memories than this
    #[cfg_attr(feature = "cli", arg(long, default_value_t = 1))]
    pub small_change_threshold: usize,

    /// Stop after this many iterations without a new minimum change count
    #[cfg_attr(feature = "cli", arg(long, default_value_t = 5))]
    pub plateau_patience: u32,

    /// Hard iteration budget
    #[cfg_attr(feature = "cli", arg(long, default_value_t = 50))]
    pub max_iterations: u32,
}

impl Default for RelaxConfig {
    fn default() -> Self {
        Self {
            small_change_threshold: 1,
            plateau_patience: 5,
            max_iterations: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(MapConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_grid() {
        let config = MapConfig {
            width: 0,
            ..MapConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_region_outside_grid() {
        let config = MapConfig {
            region: Some(WorkingRegion {
                center_x: 40,
                center_y: 2,
                radius: 3.0,
            }),
            ..MapConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_floor_policy() {
        let mut config = MapConfig::default();
        assert_eq!(config.floor(), FloorPolicy::Unbounded);
        assert!(config.floor().admits(-1e30));

        config.use_k4_floor = true;
        config.k4 = 0.5;
        assert!(!config.floor().admits(0.5));
        assert!(config.floor().admits(0.51));
    }

    #[test]
    fn test_region_contains_boundary() {
        let region = WorkingRegion {
            center_x: 5,
            center_y: 5,
            radius: 2.0,
        };
        assert!(region.contains(5, 5));
        assert!(region.contains(7, 5));
        assert!(!region.contains(7, 7));
    }
}
