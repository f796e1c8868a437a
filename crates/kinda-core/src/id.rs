//! Identity types for the kinda runtime
//!
//! Call sites are 64-bit so that decisions stay compact in the record log
//! while remaining unique across any realistic program.

use std::fmt;

use sha2::{Digest, Sha256};

/// Call-site identity - emitted by the transpiler for every construct use
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct CallSiteId(pub u64);

impl CallSiteId {
    pub const ZERO: CallSiteId = CallSiteId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        CallSiteId(id)
    }

    /// Derive a stable id from a source position (truncated SHA-256)
    pub fn from_source(file: &str, line: u32, column: u32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(file.as_bytes());
        hasher.update(line.to_le_bytes());
        hasher.update(column.to_le_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        CallSiteId(u64::from_le_bytes(bytes))
    }

    /// Derive the id of the `index`-th constituent call inside a composed
    /// construct invoked at this site
    #[inline]
    pub fn child(self, index: u32) -> Self {
        let mixed = (self.0 ^ (index as u64 + 1)).wrapping_mul(0x517cc1b727220a95);
        CallSiteId(mixed.rotate_left(17) ^ self.0)
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        CallSiteId(u64::from_le_bytes(bytes))
    }
}

impl fmt::Debug for CallSiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Site({:016x})", self.0)
    }
}

impl fmt::Display for CallSiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Derive an independent sub-stream seed (SplitMix64 finalizer)
///
/// Used when trials run in isolated sessions so that trial `i` always sees
/// the same stream regardless of scheduling.
pub fn substream_seed(seed: u64, index: u64) -> u64 {
    let mut z = seed.wrapping_add(index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_site_roundtrip() {
        let id = CallSiteId::new(0xDEADBEEF_CAFEBABE);
        assert_eq!(CallSiteId::from_bytes(id.to_bytes()), id);
    }

    #[test]
    fn test_from_source_is_stable() {
        let a = CallSiteId::from_source("hello.py.knda", 3, 5);
        let b = CallSiteId::from_source("hello.py.knda", 3, 5);
        let c = CallSiteId::from_source("hello.py.knda", 4, 5);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_children_are_distinct() {
        let parent = CallSiteId::new(42);
        let kids: Vec<_> = (0..16).map(|i| parent.child(i)).collect();
        for (i, a) in kids.iter().enumerate() {
            assert_ne!(*a, parent);
            for b in &kids[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_substreams_differ() {
        assert_ne!(substream_seed(42, 0), substream_seed(42, 1));
        assert_ne!(substream_seed(42, 0), substream_seed(43, 0));
        assert_eq!(substream_seed(7, 9), substream_seed(7, 9));
    }
}
