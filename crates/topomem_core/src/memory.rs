//! Stored memories and the per-cell store that owns them.
//!
//! A memory is owned by exactly one cell at a time. Relaxation moves it
//! between stores by value; nothing in the engine clones a stored memory.

use serde::{Deserialize, Serialize};

use crate::bits::BitVector;

/// Opaque token naming the sample a memory came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Provenance(pub u64);

/// One stored feature vector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    vector: BitVector,
    provenance: Provenance,
    /// Carried for external collaborators; never read by the engine
    #[serde(default)]
    payload: Option<Vec<u8>>,
}

impl Memory {
    pub fn new(vector: BitVector, provenance: Provenance) -> Self {
        Self {
            vector,
            provenance,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn vector(&self) -> &BitVector {
        &self.vector
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }
}

/// Insertion-ordered collection of the memories held by one cell.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStore {
    memories: Vec<Memory>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, memory: Memory) {
        self.memories.push(memory);
    }

    /// Remove the memory at `index`, keeping the order of the rest.
    pub fn remove(&mut self, index: usize) -> Option<Memory> {
        (index < self.memories.len()).then(|| self.memories.remove(index))
    }

    pub fn clear(&mut self) {
        self.memories.clear();
    }

    /// Take every memory out, leaving the store empty.
    pub fn drain(&mut self) -> Vec<Memory> {
        std::mem::take(&mut self.memories)
    }

    pub fn len(&self) -> usize {
        self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Memory> {
        self.memories.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Memory> {
        self.memories.get(index)
    }
}

impl From<Vec<Memory>> for MemoryStore {
    fn from(memories: Vec<Memory>) -> Self {
        Self { memories }
    }
}

impl<'a> IntoIterator for &'a MemoryStore {
    type Item = &'a Memory;
    type IntoIter = core::slice::Iter<'a, Memory>;

    fn into_iter(self) -> Self::IntoIter {
        self.memories.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem(bits: &str, id: u64) -> Memory {
        Memory::new(BitVector::parse(bits).unwrap(), Provenance(id))
    }

    #[test]
    fn test_store_keeps_insertion_order() {
        let mut store = MemoryStore::new();
        store.push(mem("1100", 1));
        store.push(mem("0110", 2));
        store.push(mem("0011", 3));

        let removed = store.remove(1).unwrap();
        assert_eq!(removed.provenance(), Provenance(2));
        let ids: Vec<u64> = store.iter().map(|m| m.provenance().0).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(store.remove(5).is_none());
    }

    #[test]
    fn test_drain_empties_store() {
        let mut store = MemoryStore::from(vec![mem("10", 1), mem("01", 2)]);
        let taken = store.drain();
        assert_eq!(taken.len(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_payload_is_opaque() {
        let m = mem("1", 7).with_payload(vec![0xde, 0xad]);
        assert_eq!(m.payload(), Some(&[0xde, 0xad][..]));
        assert_eq!(m.provenance(), Provenance(7));
    }
}
