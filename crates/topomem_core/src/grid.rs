//! Lattice topology
//!
//! The grid is a pure function of the configuration: built once, never
//! mutated, rebuildable deterministically. Every cell of the working region
//! carries a precomputed neighbor-weight list whose entry 0 is the cell
//! itself with the kernel's center weight.

use std::f32::consts::PI;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::MapConfig;
use crate::kernel::KernelTable;
use crate::{Result, TopoError};

/// Tolerance applied on radius boundaries (neighborhood and working region)
pub const RADIUS_EPSILON: f32 = 1e-3;

/// Integer lattice coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    pub x: u32,
    pub y: u32,
}

impl CellCoord {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: CellCoord) -> f32 {
        let dx = self.x as f32 - other.x as f32;
        let dy = self.y as f32 - other.y as f32;
        (dx * dx + dy * dy).sqrt()
    }
}

impl core::fmt::Display for CellCoord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One entry of a neighbor list: kernel weights at the neighbor's distance
/// and the neighbor's cell index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NeighborWeight {
    pub pos: f32,
    pub neg: f32,
    pub cell: usize,
}

/// Fixed-size neighbor list, allocated once at grid construction.
///
/// Entry 0 is always the owning cell. Empty for cells outside the working
/// region.
#[derive(Clone, Debug, Default)]
pub struct NeighborList {
    entries: Box<[NeighborWeight]>,
}

impl NeighborList {
    pub fn as_slice(&self) -> &[NeighborWeight] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The cell's own entry, `None` for inactive cells.
    pub fn own(&self) -> Option<&NeighborWeight> {
        self.entries.first()
    }

    /// Every entry except the cell itself.
    pub fn others(&self) -> &[NeighborWeight] {
        self.entries.get(1..).unwrap_or(&[])
    }

    /// Cell indices covered by this list, self included.
    pub fn cells(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|n| n.cell)
    }

    pub fn contains(&self, cell: usize) -> bool {
        self.entries.iter().any(|n| n.cell == cell)
    }
}

/// Upper bound on lattice points within distance `r` of a lattice point.
///
/// Every such point owns a unit square lying inside the disc of radius
/// `r + 1`, so `pi * (r + 1)^2` bounds the count for any `r`.
pub fn neighbor_capacity(r: f32) -> usize {
    (PI * (r + 1.0) * (r + 1.0)).ceil() as usize
}

/// Immutable lattice with per-cell neighbor lists.
#[derive(Clone, Debug)]
pub struct Grid {
    width: u32,
    height: u32,
    active: Vec<bool>,
    active_cells: Vec<usize>,
    neighbors: Vec<NeighborList>,
    capacity: usize,
}

impl Grid {
    /// Build the topology for `config` using `kernel` for the weights.
    ///
    /// Neighbor lists are computed in parallel; each worker only produces
    /// the list of the cell it was handed.
    pub fn build(config: &MapConfig, kernel: &KernelTable) -> Self {
        let (width, height) = (config.width, config.height);
        let active: Vec<bool> = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| config.region.map_or(true, |r| r.contains(x, y)))
            .collect();
        let active_cells: Vec<usize> = active
            .iter()
            .enumerate()
            .filter_map(|(i, &a)| a.then_some(i))
            .collect();

        let radius = config.neighbor_radius;
        // A list never holds more than the active cells, whatever the radius.
        let capacity = neighbor_capacity(radius).min(active_cells.len().max(1));
        let shape = Shape {
            width,
            height,
            radius,
            capacity,
        };

        #[cfg(feature = "parallel")]
        let lists: Vec<(usize, NeighborList)> = active_cells
            .par_iter()
            .map(|&cell| (cell, shape.neighbor_list(cell, &active, kernel)))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let lists: Vec<(usize, NeighborList)> = active_cells
            .iter()
            .map(|&cell| (cell, shape.neighbor_list(cell, &active, kernel)))
            .collect();

        let mut neighbors = vec![NeighborList::default(); active.len()];
        for (cell, list) in lists {
            neighbors[cell] = list;
        }

        log::debug!(
            "grid built: {}x{}, {} active cells, neighbor capacity {}",
            width,
            height,
            active_cells.len(),
            capacity
        );

        Self {
            width,
            height,
            active,
            active_cells,
            neighbors,
            capacity,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Total number of cells (active or not).
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Maximum neighbor-list length: the disc bound for the configured
    /// radius, capped at the number of active cells.
    pub fn neighbor_capacity(&self) -> usize {
        self.capacity
    }

    /// Row-major indices of the cells inside the working region.
    pub fn active_cells(&self) -> &[usize] {
        &self.active_cells
    }

    pub fn is_active(&self, cell: usize) -> bool {
        self.active.get(cell).copied().unwrap_or(false)
    }

    pub fn neighbors(&self, cell: usize) -> &NeighborList {
        &self.neighbors[cell]
    }

    pub fn coord(&self, cell: usize) -> CellCoord {
        let w = self.width as usize;
        CellCoord::new((cell % w) as u32, (cell / w) as u32)
    }

    /// Row-major index of `coord`, or an error if it lies outside the grid.
    pub fn index(&self, coord: CellCoord) -> Result<usize> {
        if coord.x >= self.width || coord.y >= self.height {
            return Err(TopoError::OutOfBounds {
                x: coord.x,
                y: coord.y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(coord.y as usize * self.width as usize + coord.x as usize)
    }

    /// Like [`Grid::index`], but also rejects cells outside the working region.
    pub fn active_index(&self, coord: CellCoord) -> Result<usize> {
        let cell = self.index(coord)?;
        if !self.active[cell] {
            return Err(TopoError::InactiveCell {
                x: coord.x,
                y: coord.y,
            });
        }
        Ok(cell)
    }
}

struct Shape {
    width: u32,
    height: u32,
    radius: f32,
    capacity: usize,
}

impl Shape {
    fn neighbor_list(&self, cell: usize, active: &[bool], kernel: &KernelTable) -> NeighborList {
        let (w, h) = (self.width as i64, self.height as i64);
        let (cx, cy) = ((cell as i64) % w, (cell as i64) / w);
        let span = self.width.max(self.height) as f32;
        let reach = (self.radius + RADIUS_EPSILON).min(span).floor() as i64;

        let center = kernel.center();
        let mut entries = Vec::with_capacity(self.capacity);
        entries.push(NeighborWeight {
            pos: center.pos,
            neg: center.neg,
            cell,
        });

        for y in (cy - reach).max(0)..=(cy + reach).min(h - 1) {
            let dy = y - cy;
            for x in (cx - reach).max(0)..=(cx + reach).min(w - 1) {
                let dx = x - cx;
                if dx == 0 && dy == 0 {
                    continue;
                }
                let other = (y * w + x) as usize;
                if !active[other] {
                    continue;
                }
                let r = ((dx * dx + dy * dy) as f32).sqrt();
                if r > self.radius + RADIUS_EPSILON {
                    continue;
                }
                let weight = kernel.weight_at(r);
                entries.push(NeighborWeight {
                    pos: weight.pos,
                    neg: weight.neg,
                    cell: other,
                });
            }
        }

        debug_assert!(entries.len() <= self.capacity);
        NeighborList {
            entries: entries.into_boxed_slice(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkingRegion;

    fn grid(width: u32, height: u32, radius: f32) -> Grid {
        let config = MapConfig {
            width,
            height,
            neighbor_radius: radius,
            positive_k: vec![1.0, 0.5, 0.25],
            negative_k: vec![0.9, 0.4, 0.1],
            ..MapConfig::default()
        };
        Grid::build(&config, &config.kernel().unwrap())
    }

    #[test]
    fn test_entry_zero_is_self_with_center_weight() {
        let g = grid(6, 4, 2.0);
        for &cell in g.active_cells() {
            let own = g.neighbors(cell).own().unwrap();
            assert_eq!(own.cell, cell);
            assert_eq!((own.pos, own.neg), (1.0, 0.9));
        }
    }

    #[test]
    fn test_radius_one_interior_has_four_neighbors() {
        let g = grid(5, 5, 1.0);
        let center = g.index(CellCoord::new(2, 2)).unwrap();
        let list = g.neighbors(center);
        assert_eq!(list.len(), 5);
        for n in list.others() {
            assert_eq!((n.pos, n.neg), (0.5, 0.4));
        }
        // Corner cell: self + 2
        let corner = g.index(CellCoord::new(0, 0)).unwrap();
        assert_eq!(g.neighbors(corner).len(), 3);
    }

    #[test]
    fn test_diagonal_weight_is_interpolated() {
        let g = grid(5, 5, 1.5);
        let center = g.index(CellCoord::new(2, 2)).unwrap();
        let diag = g.index(CellCoord::new(3, 3)).unwrap();
        let entry = g
            .neighbors(center)
            .as_slice()
            .iter()
            .find(|n| n.cell == diag)
            .copied()
            .unwrap();
        // r = sqrt(2): 0.5 + (0.25 - 0.5) * 0.4142
        assert!((entry.pos - 0.3964).abs() < 1e-3);
    }

    #[test]
    fn test_neighbor_lists_within_capacity() {
        for radius in [0.0, 1.0, 2.5, 4.0] {
            let g = grid(12, 12, radius);
            for &cell in g.active_cells() {
                assert!(g.neighbors(cell).len() <= g.neighbor_capacity());
            }
        }
    }

    #[test]
    fn test_huge_radius_is_bounded_by_the_grid() {
        let config = MapConfig {
            width: 4,
            height: 4,
            neighbor_radius: 20_000.0,
            ..MapConfig::default()
        };
        let g = Grid::build(&config, &config.kernel().unwrap());
        assert_eq!(g.neighbor_capacity(), 16);
        for &cell in g.active_cells() {
            let list = g.neighbors(cell);
            assert_eq!(list.len(), 16);
            assert_eq!(list.own().unwrap().cell, cell);
        }
    }

    #[test]
    fn test_neighbors_are_symmetric() {
        let g = grid(7, 5, 2.0);
        for &a in g.active_cells() {
            for b in g.neighbors(a).cells() {
                assert!(g.neighbors(b).contains(a));
            }
        }
    }

    #[test]
    fn test_working_region_limits_cells_and_neighbors() {
        let config = MapConfig {
            width: 11,
            height: 11,
            neighbor_radius: 2.0,
            region: Some(WorkingRegion {
                center_x: 5,
                center_y: 5,
                radius: 2.0,
            }),
            positive_k: vec![1.0, 0.5, 0.25],
            negative_k: vec![1.0, 0.5, 0.25],
            ..MapConfig::default()
        };
        let g = Grid::build(&config, &config.kernel().unwrap());
        assert_eq!(g.active_cells().len(), 13);

        let outside = g.index(CellCoord::new(0, 0)).unwrap();
        assert!(!g.is_active(outside));
        assert!(g.neighbors(outside).is_empty());
        assert!(g.active_index(CellCoord::new(0, 0)).is_err());

        for &cell in g.active_cells() {
            assert!(g.neighbors(cell).cells().all(|n| g.is_active(n)));
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let a = grid(9, 9, 2.5);
        let b = grid(9, 9, 2.5);
        for cell in 0..a.len() {
            assert_eq!(a.neighbors(cell).as_slice(), b.neighbors(cell).as_slice());
        }
    }

    #[test]
    fn test_index_out_of_bounds() {
        let g = grid(4, 3, 1.0);
        assert!(g.index(CellCoord::new(4, 0)).is_err());
        assert_eq!(g.coord(g.index(CellCoord::new(3, 2)).unwrap()), CellCoord::new(3, 2));
    }
}
