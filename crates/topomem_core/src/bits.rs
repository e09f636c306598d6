//! Fixed-length sparse binary feature vectors.
//!
//! Vectors are packed into `u64` words with the set-bit count cached, so the
//! hot scoring path (cosine similarity against every stored memory) is a
//! popcount over `a & b` plus one square root.

use serde::{Deserialize, Serialize};

use crate::{Result, TopoError};

const WORD_BITS: usize = 64;

/// A fixed-length {0,1} vector. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitVector {
    len: usize,
    words: Vec<u64>,
    ones: u32,
}

/// Number of `u64` words needed to hold `len` bits.
pub fn words_for(len: usize) -> usize {
    len.div_ceil(WORD_BITS)
}

impl BitVector {
    /// All-zero vector of `len` bits.
    pub fn zeros(len: usize) -> Self {
        Self {
            len,
            words: vec![0; words_for(len)],
            ones: 0,
        }
    }

    pub fn from_bools(bits: &[bool]) -> Self {
        let mut words = vec![0u64; words_for(bits.len())];
        for (i, _) in bits.iter().enumerate().filter(|(_, &b)| b) {
            words[i / WORD_BITS] |= 1 << (i % WORD_BITS);
        }
        Self::from_words(bits.len(), words)
    }

    /// Build from the positions of the set bits. Fails if any index is out of range.
    pub fn from_indices(len: usize, indices: &[usize]) -> Result<Self> {
        let mut words = vec![0u64; words_for(len)];
        for &i in indices {
            if i >= len {
                return Err(TopoError::InvalidBits(format!(
                    "bit index {i} out of range for length {len}"
                )));
            }
            words[i / WORD_BITS] |= 1 << (i % WORD_BITS);
        }
        Ok(Self::from_words(len, words))
    }

    /// Parse a string of `'0'` / `'1'` characters (whitespace ignored).
    pub fn parse(text: &str) -> Result<Self> {
        let mut bits = Vec::with_capacity(text.len());
        for c in text.chars().filter(|c| !c.is_whitespace()) {
            match c {
                '0' => bits.push(false),
                '1' => bits.push(true),
                other => {
                    return Err(TopoError::InvalidBits(format!(
                        "unexpected character {other:?}"
                    )))
                }
            }
        }
        Ok(Self::from_bools(&bits))
    }

    /// Rebuild from packed words (as written by the dump). Bits past `len`
    /// are masked off.
    pub fn from_words(len: usize, mut words: Vec<u64>) -> Self {
        words.resize(words_for(len), 0);
        let tail = len % WORD_BITS;
        if tail != 0 {
            if let Some(last) = words.last_mut() {
                *last &= (1u64 << tail) - 1;
            }
        }
        let ones = words.iter().map(|w| w.count_ones()).sum();
        Self { len, words, ones }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> u32 {
        self.ones
    }

    pub fn get(&self, i: usize) -> bool {
        i < self.len && self.words[i / WORD_BITS] & (1 << (i % WORD_BITS)) != 0
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Popcount of the intersection.
    pub fn overlap(&self, other: &BitVector) -> u32 {
        self.words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| (a & b).count_ones())
            .sum()
    }
}

impl core::fmt::Display for BitVector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for i in 0..self.len {
            f.write_str(if self.get(i) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Cosine similarity of two binary vectors.
///
/// Defined as 0 when either side has no set bits, so an empty vector never
/// injects NaN into an activity sum.
#[inline]
pub fn cosine_similarity(a: &BitVector, b: &BitVector) -> f32 {
    if a.ones == 0 || b.ones == 0 {
        return 0.0;
    }
    let dot = a.overlap(b) as f32;
    dot / ((a.ones as f32) * (b.ones as f32)).sqrt()
}
