//! Address decoding shared by every cache level.

use crate::common::error::CacheError;

/// The fields an address decomposes into for a given cache geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedAddress {
    /// Bits identifying the block within its set.
    pub tag: u32,
    /// Set index, always 0 for a fully associative cache.
    pub index: usize,
    /// Byte offset within the block.
    pub offset: usize,
}

/// Geometry derived from a cache's configured size, associativity, and the
/// crate-wide block size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Number of sets; 1 for a fully associative cache.
    pub num_sets: usize,
    /// Lines per set (the configured associativity, or `size/block` when
    /// fully associative).
    pub ways: usize,
    /// `log2(block_bytes)`.
    pub offset_bits: u32,
    /// `log2(num_sets)`.
    pub index_bits: u32,
    /// Words per block (`block_bytes / 4`).
    pub block_words: usize,
}

impl Geometry {
    /// Derives set count, way count, and bit widths for a cache of
    /// `size_bytes` with `associativity` ways (0 meaning fully associative).
    ///
    /// `size_bytes` must be an exact multiple of `block_bytes * ways` (or of
    /// `block_bytes` alone when fully associative) and the resulting set
    /// count must be a power of two so that `index_bits` is exact.
    pub fn new(size_bytes: usize, associativity: u32, block_bytes: usize) -> Result<Self, CacheError> {
        let block_words = block_bytes / 4;
        let (num_sets, ways) = if associativity == 0 {
            (1usize, size_bytes / block_bytes)
        } else {
            let ways = associativity as usize;
            let num_sets = size_bytes / (block_bytes * ways);
            (num_sets, ways)
        };

        if num_sets == 0 || ways == 0 {
            return Err(CacheError::InternalInvariant(format!(
                "cache geometry collapsed to zero (size={size_bytes}, assoc={associativity}, block={block_bytes})"
            )));
        }
        if !num_sets.is_power_of_two() {
            return Err(CacheError::InternalInvariant(format!(
                "cache set count {num_sets} is not a power of two"
            )));
        }

        Ok(Geometry {
            num_sets,
            ways,
            offset_bits: block_bytes.trailing_zeros(),
            index_bits: num_sets.trailing_zeros(),
            block_words,
        })
    }

    /// Splits `addr` into tag, set index, and byte offset under this
    /// geometry.
    pub fn decode(&self, addr: u32) -> DecodedAddress {
        let offset = (addr as usize) & (self.block_bytes() - 1);
        let index = if self.num_sets == 1 {
            0
        } else {
            ((addr >> self.offset_bits) as usize) & (self.num_sets - 1)
        };
        let tag = addr >> (self.offset_bits + self.index_bits);
        DecodedAddress { tag, index, offset }
    }

    /// Reconstructs the block-aligned address for `(tag, index)`.
    pub fn block_address(&self, tag: u32, index: usize) -> u32 {
        (tag << (self.offset_bits + self.index_bits)) | ((index as u32) << self.offset_bits)
    }

    fn block_bytes(&self) -> usize {
        1usize << self.offset_bits
    }
}
