//! Map dump files, optionally zstd-compressed.
//!
//! Compression is detected on read from the zstd frame magic, so a map
//! written with either setting loads regardless of the current one.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use topomem_core::{MapConfig, TopoMap};
use tracing::info;

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

pub fn encode(map: &TopoMap, compress: bool, level: i32) -> Result<Vec<u8>> {
    let mut raw = Vec::new();
    map.write_dump(&mut raw)?;
    if compress {
        Ok(zstd::bulk::compress(&raw, level)?)
    } else {
        Ok(raw)
    }
}

/// Restore `map` from dump bytes. Returns the number of memories read.
pub fn decode(map: &mut TopoMap, bytes: &[u8]) -> Result<usize> {
    let count = if bytes.starts_with(&ZSTD_MAGIC) {
        let raw = zstd::stream::decode_all(bytes)?;
        map.read_dump(&mut raw.as_slice())?
    } else {
        map.read_dump(&mut &bytes[..])?
    };
    Ok(count)
}

/// Build a map from `config`, restoring the dump at `path` if one exists.
pub fn load_map(config: &MapConfig, path: &Path) -> Result<TopoMap> {
    let mut map = TopoMap::new(config.clone())?;
    if path.exists() {
        let bytes = fs::read(path).with_context(|| format!("reading dump {}", path.display()))?;
        let count = decode(&mut map, &bytes)
            .with_context(|| format!("restoring dump {}", path.display()))?;
        info!(path = %path.display(), memories = count, "Restored map");
    } else {
        info!(path = %path.display(), "No dump found, starting from an empty map");
    }
    Ok(map)
}

pub fn save_map(map: &TopoMap, path: &Path, compress: bool, level: i32) -> Result<()> {
    let bytes = encode(map, compress, level)?;
    fs::write(path, &bytes).with_context(|| format!("writing dump {}", path.display()))?;
    info!(
        path = %path.display(),
        memories = map.total_memories(),
        bytes = bytes.len(),
        compressed = compress,
        "Saved map"
    );
    Ok(())
}
