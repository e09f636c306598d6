//! Read-only summaries of a map for export and diagnostics.

use serde::{Deserialize, Serialize};

use crate::grid::CellCoord;
use crate::map::TopoMap;
use crate::memory::Provenance;
use crate::Result;

/// One stored memory as seen from outside the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySummary {
    pub provenance: Provenance,
    pub active_bits: u32,
    /// The vector rendered as a `0`/`1` string
    pub bits: String,
}

/// Contents of one cell at the time of the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub coord: CellCoord,
    pub active: bool,
    pub memories: Vec<MemorySummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapStats {
    pub width: u32,
    pub height: u32,
    pub active_cells: usize,
    pub total_memories: usize,
    /// Index `n` counts the cells holding exactly `n` memories.
    pub occupancy_histogram: Vec<usize>,
    /// Index `n` counts the stored vectors with exactly `n` set bits.
    pub active_bit_histogram: Vec<usize>,
    pub last_winners: Vec<CellCoord>,
}

impl TopoMap {
    /// Number of stored vectors per popcount, `hash_len + 1` buckets.
    pub fn active_bit_histogram(&self) -> Vec<usize> {
        let mut hist = vec![0usize; self.config.hash_len + 1];
        for memory in self.stores.iter().flat_map(|s| s.iter()) {
            // Length was checked on the way in
            if let Some(slot) = hist.get_mut(memory.vector().count_ones() as usize) {
                *slot += 1;
            }
        }
        hist
    }

    /// Number of active cells per memory count. The last bucket is the
    /// fullest cell; an empty map yields `[active_cells]`.
    pub fn occupancy_histogram(&self) -> Vec<usize> {
        let counts: Vec<usize> = self
            .grid
            .active_cells()
            .iter()
            .map(|&cell| self.stores[cell].len())
            .collect();
        let max = counts.iter().copied().max().unwrap_or(0);
        let mut hist = vec![0usize; max + 1];
        for n in counts {
            hist[n] += 1;
        }
        hist
    }

    pub fn cell_snapshot(&self, coord: CellCoord) -> Result<CellSnapshot> {
        let cell = self.grid.index(coord)?;
        let memories = self.stores[cell]
            .iter()
            .map(|m| MemorySummary {
                provenance: m.provenance(),
                active_bits: m.vector().count_ones(),
                bits: m.vector().to_string(),
            })
            .collect();
        Ok(CellSnapshot {
            coord,
            active: self.grid.is_active(cell),
            memories,
        })
    }

    pub fn stats(&self) -> MapStats {
        MapStats {
            width: self.grid.width(),
            height: self.grid.height(),
            active_cells: self.grid.active_cells().len(),
            total_memories: self.total_memories(),
            occupancy_histogram: self.occupancy_histogram(),
            active_bit_histogram: self.active_bit_histogram(),
            last_winners: self.last_winners().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::BitVector;
    use crate::config::{MapConfig, WorkingRegion};
    use crate::memory::Memory;

    fn map() -> TopoMap {
        TopoMap::new(MapConfig {
            width: 4,
            height: 3,
            neighbor_radius: 1.0,
            positive_k: vec![1.0, 0.2],
            negative_k: vec![1.0, 0.2],
            hash_len: 6,
            min_active_bits: 1,
            ..MapConfig::default()
        })
        .unwrap()
    }

    fn mem(bits: &str, id: u64) -> Memory {
        Memory::new(BitVector::parse(bits).unwrap(), Provenance(id))
    }

    #[test]
    fn test_empty_map_histograms() {
        let m = map();
        assert_eq!(m.occupancy_histogram(), vec![12]);
        assert_eq!(m.active_bit_histogram(), vec![0; 7]);
    }

    #[test]
    fn test_histograms_track_stored_memories() {
        let mut m = map();
        m.force_store(CellCoord::new(0, 0), mem("110000", 1)).unwrap();
        m.force_store(CellCoord::new(0, 0), mem("111000", 2)).unwrap();
        m.force_store(CellCoord::new(3, 2), mem("110000", 3)).unwrap();

        assert_eq!(m.occupancy_histogram(), vec![10, 1, 1]);
        let bits = m.active_bit_histogram();
        assert_eq!(bits[2], 2);
        assert_eq!(bits[3], 1);
        assert_eq!(bits.iter().sum::<usize>(), m.total_memories());
    }

    #[test]
    fn test_occupancy_ignores_cells_outside_region() {
        let m = TopoMap::new(MapConfig {
            width: 5,
            height: 5,
            region: Some(WorkingRegion {
                center_x: 2,
                center_y: 2,
                radius: 1.0,
            }),
            neighbor_radius: 1.0,
            positive_k: vec![1.0, 0.2],
            negative_k: vec![1.0, 0.2],
            hash_len: 6,
            ..MapConfig::default()
        })
        .unwrap();
        assert_eq!(m.occupancy_histogram(), vec![5]);
    }

    #[test]
    fn test_cell_snapshot_lists_memories_in_order() {
        let mut m = map();
        let at = CellCoord::new(1, 1);
        m.force_store(at, mem("100001", 7)).unwrap();
        m.force_store(at, mem("011000", 8)).unwrap();

        let snap = m.cell_snapshot(at).unwrap();
        assert!(snap.active);
        assert_eq!(snap.memories.len(), 2);
        assert_eq!(snap.memories[0].provenance, Provenance(7));
        assert_eq!(snap.memories[0].bits, "100001");
        assert_eq!(snap.memories[1].active_bits, 2);

        assert!(m.cell_snapshot(CellCoord::new(9, 0)).is_err());
    }

    #[test]
    fn test_stats_export_as_json() {
        let mut m = map();
        m.force_store(CellCoord::new(2, 1), mem("101010", 1)).unwrap();
        let json = serde_json::to_value(m.stats()).unwrap();
        assert_eq!(json["total_memories"], 1);
        assert_eq!(json["active_cells"], 12);
        assert_eq!(json["occupancy_histogram"][1], 1);
        assert_eq!(json["active_bit_histogram"][3], 1);
    }
}
