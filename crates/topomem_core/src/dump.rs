//! Minimal binary dump of the memory stores.
//!
//! Layout (little-endian):
//! ```text
//! [magic "TMEM"][version u8][width u32][height u32][hash_len u32]
//! per cell, row-major:
//!   [count u32] then count x ([provenance u64][ceil(hash_len / 64) x u64])
//! ```
//! Only vectors and provenance are written. Payloads stay in memory.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::bits::{words_for, BitVector};
use crate::map::TopoMap;
use crate::memory::{Memory, MemoryStore, Provenance};
use crate::{Result, TopoError};

pub const DUMP_MAGIC: &[u8; 4] = b"TMEM";
pub const DUMP_VERSION: u8 = 1;

/// Header of a dump, checked against the map before any cell is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpHeader {
    pub version: u8,
    pub width: u32,
    pub height: u32,
    pub hash_len: u32,
}

impl DumpHeader {
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic).map_err(truncated)?;
        if &magic != DUMP_MAGIC {
            return Err(TopoError::InvalidDump(format!("bad magic {magic:02x?}")));
        }
        let version = r.read_u8().map_err(truncated)?;
        if version != DUMP_VERSION {
            return Err(TopoError::InvalidDump(format!(
                "unsupported version {version} (expected {DUMP_VERSION})"
            )));
        }
        Ok(Self {
            version,
            width: r.read_u32::<LittleEndian>().map_err(truncated)?,
            height: r.read_u32::<LittleEndian>().map_err(truncated)?,
            hash_len: r.read_u32::<LittleEndian>().map_err(truncated)?,
        })
    }
}

fn truncated(e: io::Error) -> TopoError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        TopoError::InvalidDump("unexpected end of dump".into())
    } else {
        TopoError::Io(e)
    }
}

impl TopoMap {
    /// Write every store to `w`.
    pub fn write_dump<W: Write>(&self, w: &mut W) -> Result<()> {
        let hash_len = u32_field("hash_len", self.config.hash_len)?;

        w.write_all(DUMP_MAGIC)?;
        w.write_u8(DUMP_VERSION)?;
        w.write_u32::<LittleEndian>(self.grid.width())?;
        w.write_u32::<LittleEndian>(self.grid.height())?;
        w.write_u32::<LittleEndian>(hash_len)?;

        for store in &self.stores {
            w.write_u32::<LittleEndian>(u32_field("cell memory count", store.len())?)?;
            for memory in store {
                w.write_u64::<LittleEndian>(memory.provenance().0)?;
                for &word in memory.vector().words() {
                    w.write_u64::<LittleEndian>(word)?;
                }
            }
        }

        log::debug!(
            "dumped {} memories from {} cells",
            self.total_memories(),
            self.stores.len()
        );
        Ok(())
    }

    /// Replace every store with the contents of a dump. The dump must have
    /// been written by a map with the same dimensions and hash length. On
    /// error the map is left untouched. Returns the number of memories read.
    pub fn read_dump<R: Read>(&mut self, r: &mut R) -> Result<usize> {
        let header = DumpHeader::read_from(r)?;
        if header.width != self.grid.width()
            || header.height != self.grid.height()
            || header.hash_len as usize != self.config.hash_len
        {
            return Err(TopoError::InvalidDump(format!(
                "dump is {}x{} with hash_len {}, map is {}x{} with hash_len {}",
                header.width,
                header.height,
                header.hash_len,
                self.grid.width(),
                self.grid.height(),
                self.config.hash_len
            )));
        }

        let words = words_for(self.config.hash_len);
        let mut stores = Vec::with_capacity(self.grid.len());
        let mut total = 0usize;
        for _ in 0..self.grid.len() {
            let count = r.read_u32::<LittleEndian>().map_err(truncated)? as usize;
            let mut store = MemoryStore::new();
            for _ in 0..count {
                let provenance = Provenance(r.read_u64::<LittleEndian>().map_err(truncated)?);
                let mut buf = vec![0u64; words];
                r.read_u64_into::<LittleEndian>(&mut buf).map_err(truncated)?;
                let vector = BitVector::from_words(self.config.hash_len, buf);
                store.push(Memory::new(vector, provenance));
            }
            total += count;
            stores.push(store);
        }

        self.restore_stores(stores)?;
        log::info!("restored {} memories from dump", total);
        Ok(total)
    }
}

/// Dump count fields are `u32`; refuse to write one that would wrap.
fn u32_field(name: &str, value: usize) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| TopoError::InvalidDump(format!("{name} {value} does not fit in u32")))
}
