//! Per-cell activity against one input vector.

use crate::bits::{cosine_similarity, BitVector};
use crate::memory::MemoryStore;

use super::Activity;

/// Score `input` against every memory held in `store`.
///
/// Each memory contributes `a = cos(input, m) - k0`. Contributions with
/// `a >= 0` are averaged into `pos`, the rest into `neg`; the two buckets are
/// normalized independently. An empty store yields `Activity::default()`.
pub fn compute(store: &MemoryStore, input: &BitVector, k0: f32) -> Activity {
    compute_excluding(store, input, k0, None)
}

/// Same as [`compute`], ignoring the memory at index `skip`.
pub fn compute_excluding(
    store: &MemoryStore,
    input: &BitVector,
    k0: f32,
    skip: Option<usize>,
) -> Activity {
    let mut pos_sum = 0.0f32;
    let mut neg_sum = 0.0f32;
    let mut pos_count = 0u32;
    let mut neg_count = 0u32;

    for (i, memory) in store.iter().enumerate() {
        if skip == Some(i) {
            continue;
        }
        let a = cosine_similarity(input, memory.vector()) - k0;
        if a >= 0.0 {
            pos_sum += a;
            pos_count += 1;
        } else {
            neg_sum += a;
            neg_count += 1;
        }
    }

    Activity {
        pos: if pos_count > 0 {
            pos_sum / pos_count as f32
        } else {
            0.0
        },
        neg: if neg_count > 0 {
            neg_sum / neg_count as f32
        } else {
            0.0
        },
        count: pos_count + neg_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Memory, Provenance};

    fn store(patterns: &[&str]) -> MemoryStore {
        patterns
            .iter()
            .enumerate()
            .map(|(i, p)| Memory::new(BitVector::parse(p).unwrap(), Provenance(i as u64)))
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_empty_store_is_zero() {
        let input = BitVector::parse("1111").unwrap();
        assert_eq!(compute(&MemoryStore::new(), &input, 0.2), Activity::default());
    }

    #[test]
    fn test_buckets_are_normalized_separately() {
        // cos = 1.0, 0.5, 0.0 against k0 = 0.2 -> +0.8, +0.3, -0.2
        let s = store(&["11110000", "11000000", "00001111"]);
        let input = BitVector::parse("11110000").unwrap();
        let a = compute(&s, &input, 0.2);

        let cos_half = 2.0 / 8f32.sqrt();
        let expected_pos = ((1.0 - 0.2) + (cos_half - 0.2)) / 2.0;
        assert!((a.pos - expected_pos).abs() < 1e-6);
        assert!((a.neg - (-0.2)).abs() < 1e-6);
        assert_eq!(a.count, 3);
    }

    #[test]
    fn test_zero_input_never_produces_nan() {
        let s = store(&["1100", "0011"]);
        let a = compute(&s, &BitVector::zeros(4), 0.2);
        assert!(a.pos.is_finite() && a.neg.is_finite());
        assert!((a.neg - (-0.2)).abs() < 1e-6);
    }

    #[test]
    fn test_excluding_skips_one_memory() {
        let s = store(&["1100", "0011"]);
        let input = BitVector::parse("1100").unwrap();
        let a = compute_excluding(&s, &input, 0.2, Some(0));
        assert_eq!(a.count, 1);
        assert_eq!(a.pos, 0.0);

        let only = compute_excluding(&store(&["1100"]), &input, 0.2, Some(0));
        assert_eq!(only, Activity::default());
    }
}
