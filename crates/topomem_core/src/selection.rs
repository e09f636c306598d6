//! Winner-take-all selection with neighborhood suppression
//!
//! One input may produce several winners: after each win the winner and
//! every cell in its neighbor list are suppressed for the rest of the pass,
//! and the search repeats over what is left. Ties at the maximum are broken
//! uniformly at random with the caller's RNG.

use rand::Rng;

use crate::bits::BitVector;
use crate::config::FloorPolicy;
use crate::grid::{CellCoord, Grid};
use crate::memory::{Memory, MemoryStore, Provenance};
use crate::scoring::ScoringContext;

/// Read-only view of a cell handed to an [`Eligibility`] predicate.
#[derive(Clone, Copy, Debug)]
pub struct CellView<'a> {
    pub cell: usize,
    pub coord: CellCoord,
    pub store: &'a MemoryStore,
}

/// Caller-supplied gate deciding which cells may win for a given input.
pub trait Eligibility {
    fn is_eligible(&self, cell: CellView<'_>, input: &BitVector) -> bool;
}

impl<F> Eligibility for F
where
    F: Fn(CellView<'_>, &BitVector) -> bool,
{
    fn is_eligible(&self, cell: CellView<'_>, input: &BitVector) -> bool {
        self(cell, input)
    }
}

/// Every active cell is eligible.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnyCell;

impl Eligibility for AnyCell {
    fn is_eligible(&self, _cell: CellView<'_>, _input: &BitVector) -> bool {
        true
    }
}

/// Sparsity gate: cells are eligible only for inputs with at least this
/// many set bits.
#[derive(Clone, Copy, Debug)]
pub struct MinActiveBits(pub u32);

impl Eligibility for MinActiveBits {
    fn is_eligible(&self, _cell: CellView<'_>, input: &BitVector) -> bool {
        input.count_ones() >= self.0
    }
}

/// Only cells within `radius` of `center` are eligible.
#[derive(Clone, Copy, Debug)]
pub struct WithinRegion {
    pub center: CellCoord,
    pub radius: f32,
}

impl Eligibility for WithinRegion {
    fn is_eligible(&self, cell: CellView<'_>, _input: &BitVector) -> bool {
        cell.coord.distance(self.center) <= self.radius + crate::grid::RADIUS_EPSILON
    }
}

/// Pick the best-scoring candidate above `floor`.
///
/// Every candidate exactly equal to the maximum is collected into `ties`
/// (cleared first) and one is drawn uniformly with `rng`. Returns `None`
/// when no candidate clears the floor.
pub fn pick_winner<I, R>(
    candidates: I,
    floor: FloorPolicy,
    rng: &mut R,
    ties: &mut Vec<usize>,
) -> Option<usize>
where
    I: IntoIterator<Item = (usize, f32)>,
    R: Rng + ?Sized,
{
    ties.clear();
    let mut best = f32::NEG_INFINITY;
    for (cell, score) in candidates {
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
    match ties.len() {
        0 => None,
        1 => Some(ties[0]),
        n => Some(ties[rng.gen_range(0..n)]),
    }
}

/// Greedy multi-winner selection for one scored input.
///
/// `ctx` must hold a completed scoring pass for `input` over `stores`.
/// Each winner receives its own copy of the input; returns the winners in
/// the order they were chosen.
#[allow(clippy::too_many_arguments)]
pub fn select_and_store<E, R>(
    grid: &Grid,
    stores: &mut [MemoryStore],
    ctx: &ScoringContext,
    input: &BitVector,
    provenance: Provenance,
    eligibility: &E,
    floor: FloorPolicy,
    rng: &mut R,
) -> Vec<usize>
where
    E: Eligibility + ?Sized,
    R: Rng + ?Sized,
{
    let mut suppressed = vec![false; grid.len()];
    let mut ties = Vec::new();
    let mut winners = Vec::new();

    loop {
        let candidates = grid.active_cells().iter().filter_map(|&cell| {
            if suppressed[cell] {
                return None;
            }
            let score = ctx.super_activity(cell)?;
            let view = CellView {
                cell,
                coord: grid.coord(cell),
                store: &stores[cell],
            };
            eligibility.is_eligible(view, input).then_some((cell, score))
        });

        let Some(winner) = pick_winner(candidates, floor, rng, &mut ties) else {
            break;
        };

        stores[winner].push(Memory::new(input.clone(), provenance));
        for cell in grid.neighbors(winner).cells() {
            suppressed[cell] = true;
        }
        winners.push(winner);
    }

    winners
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_pick_winner_prefers_max() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let mut ties = Vec::new();
        let w = pick_winner(
            [(0, 0.1), (1, 0.9), (2, 0.5)],
            FloorPolicy::Unbounded,
            &mut rng,
            &mut ties,
        );
        assert_eq!(w, Some(1));
    }

    #[test]
    fn test_pick_winner_respects_floor() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let mut ties = Vec::new();
        let floor = FloorPolicy::Threshold(0.5);
        assert_eq!(pick_winner([(0, 0.5), (1, 0.2)], floor, &mut rng, &mut ties), None);
        assert_eq!(pick_winner([(0, 0.5), (1, 0.6)], floor, &mut rng, &mut ties), Some(1));
    }

    #[test]
    fn test_pick_winner_breaks_ties_uniformly() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let mut ties = Vec::new();
        let mut hits = [0u32; 3];
        for _ in 0..3000 {
            let w = pick_winner(
                [(0, 0.7), (1, 0.7), (2, 0.7), (3, 0.1)],
                FloorPolicy::Unbounded,
                &mut rng,
                &mut ties,
            )
            .unwrap();
            hits[w] += 1;
        }
        for h in hits {
            assert!((800..1200).contains(&h), "tie-break skewed: {hits:?}");
        }
    }

    #[test]
    fn test_pick_winner_is_reproducible_with_seed() {
        let run = |seed| {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let mut ties = Vec::new();
            (0..32)
                .map(|_| {
                    pick_winner((0..8).map(|c| (c, 1.0)), FloorPolicy::Unbounded, &mut rng, &mut ties)
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(run(9), run(9));
    }

    #[test]
    fn test_eligibility_impls() {
        let store = MemoryStore::new();
        let view = CellView {
            cell: 0,
            coord: CellCoord::new(3, 3),
            store: &store,
        };
        let sparse = BitVector::parse("1000").unwrap();
        let dense = BitVector::parse("1110").unwrap();

        assert!(AnyCell.is_eligible(view, &sparse));
        assert!(!MinActiveBits(2).is_eligible(view, &sparse));
        assert!(MinActiveBits(2).is_eligible(view, &dense));

        let region = WithinRegion {
            center: CellCoord::new(0, 0),
            radius: 2.0,
        };
        assert!(!region.is_eligible(view, &dense));

        let only_empty = |cell: CellView<'_>, _: &BitVector| cell.store.is_empty();
        assert!(only_empty.is_eligible(view, &dense));
    }
}
