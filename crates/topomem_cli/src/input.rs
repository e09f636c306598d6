//! CSV vector input: one `provenance,bits` row per sample.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use topomem_core::{BitVector, Provenance};

#[derive(Debug, Deserialize)]
struct Row {
    provenance: u64,
    bits: String,
}

/// A parsed input vector with its provenance token.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub provenance: Provenance,
    pub vector: BitVector,
}

pub fn read_samples_from_path(path: &Path, hash_len: usize) -> Result<Vec<Sample>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_samples(file, hash_len).with_context(|| format!("reading {}", path.display()))
}

/// Parse every row, rejecting vectors whose length differs from `hash_len`.
/// Blank lines and lines starting with `#` are skipped.
pub fn read_samples<R: Read>(reader: R, hash_len: usize) -> Result<Vec<Sample>> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut samples = Vec::new();
    for (i, row) in csv.deserialize::<Row>().enumerate() {
        let row = row.with_context(|| format!("row {}", i + 1))?;
        let vector = BitVector::parse(&row.bits).with_context(|| format!("row {}", i + 1))?;
        if vector.len() != hash_len {
            bail!(
                "row {}: vector has {} bits, configured hash length is {}",
                i + 1,
                vector.len(),
                hash_len
            );
        }
        samples.push(Sample {
            provenance: Provenance(row.provenance),
            vector,
        });
    }
    Ok(samples)
}
