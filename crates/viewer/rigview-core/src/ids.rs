//! Identifiers and simple allocators for core entities.

use serde::{Deserialize, Serialize};

/// Epoch of one scene selection. Every request issued by a pipeline carries the
/// generation it was created with; completions from older generations are inert.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Generation(pub u64);

/// One image decode issued by the texture cache.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct DecodeId(pub u32);

/// Opaque GPU texture handle handed out by a [`crate::TextureBackend`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TextureHandle(pub u32);

/// Monotonic allocator for generations and decode ids.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_generation: u64,
    next_decode: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_generation(&mut self) -> Generation {
        let id = Generation(self.next_generation);
        self.next_generation = self.next_generation.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_decode(&mut self) -> DecodeId {
        let id = DecodeId(self.next_decode);
        self.next_decode = self.next_decode.wrapping_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_monotonic() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.alloc_generation(), Generation(0));
        assert_eq!(alloc.alloc_generation(), Generation(1));
        assert_eq!(alloc.alloc_decode(), DecodeId(0));
        assert_eq!(alloc.alloc_decode(), DecodeId(1));
    }
}
