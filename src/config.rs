use static_assertions::const_assert;

use crate::block::{DSIZE, MIN_BLOCK_SIZE};
use crate::freelist::NTIERS;

/// Heap extension granularity (bytes).
pub const CHUNK_SIZE: usize = 1 << 12;

/// Smallest block size of the second and third free-list tiers.
pub const TIER_BOUNDS: [usize; NTIERS - 1] = [MIN_BLOCK_SIZE + MIN_BLOCK_SIZE / 2, 2 * MIN_BLOCK_SIZE];

const_assert!(CHUNK_SIZE % DSIZE == 0);
const_assert!(CHUNK_SIZE >= MIN_BLOCK_SIZE);
const_assert!(TIER_BOUNDS[0] % DSIZE == 0 && TIER_BOUNDS[1] % DSIZE == 0);
const_assert!(MIN_BLOCK_SIZE < TIER_BOUNDS[0] && TIER_BOUNDS[0] < TIER_BOUNDS[1]);

/// Runtime tunables of an allocator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegConfig {
    /// Minimum number of bytes the heap grows by on a fit miss.
    pub chunk_size: usize,
    /// Smallest block size of the second and third free-list tiers.
    pub tier_bounds: [usize; NTIERS - 1],
}

impl SegConfig {
    /// 4096 byte chunks, tiers `[32, 48)`, `[48, 64)` and `[64, ..)`.
    pub const DEFAULT: SegConfig = SegConfig {
        chunk_size: CHUNK_SIZE,
        tier_bounds: TIER_BOUNDS,
    };

    /// Sizes must keep every block 16-byte aligned and the tiers ordered.
    pub fn is_valid(&self) -> bool {
        let [low, high] = self.tier_bounds;
        self.chunk_size >= MIN_BLOCK_SIZE
            && self.chunk_size % DSIZE == 0
            && low % DSIZE == 0
            && high % DSIZE == 0
            && MIN_BLOCK_SIZE <= low
            && low <= high
    }
}

impl Default for SegConfig {
    fn default() -> SegConfig {
        SegConfig::DEFAULT
    }
}
