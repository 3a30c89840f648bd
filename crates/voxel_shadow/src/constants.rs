//! Node layout and pipeline limits for the shadow voxel tree.
//!
//! # Inner Node Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       INNER NODE (9 × u32 words)                        │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  word 0      child mask (low 16 bits, 2 bits per child)                 │
//! │  word 1..8   child pointers, one per octant (0 for leaf children)       │
//! │                                                                         │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  Child code (bits 2i..2i+1 of the mask):                                │
//! │                                                                         │
//! │    00  shadowed leaf                                                    │
//! │    01  unshadowed leaf                                                  │
//! │    10  inner node (pointer slot i is valid)                             │
//! │    11  reserved                                                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Octant bits follow the usual convention: bit 0 = +X, bit 1 = +Y, bit 2 = +Z.
//!
//! Pointers are word offsets into the owning arena. The consumer binds the
//! arena as an `R32UI` texture buffer, so word addressing maps directly to
//! texel fetches.

/// Number of children per inner node.
pub const CHILD_COUNT: usize = 8;

/// Bits used per child in the child mask.
pub const BITS_PER_CHILD: u32 = 2;

/// Words occupied by one encoded inner node (mask + 8 pointers).
pub const NODE_WORDS: usize = 1 + CHILD_COUNT;

/// Bytes occupied by one encoded inner node.
pub const NODE_BYTES: usize = NODE_WORDS * std::mem::size_of::<u32>();

/// Child mask with all eight children marked as unshadowed leaves.
///
/// `0101 0101 0101 0101`
pub const UNSHADOWED_MASK: u16 = 0x5555;

/// Child mask with all eight children marked as shadowed leaves.
pub const SHADOWED_MASK: u16 = 0x0000;

/// Smallest tile resolution. An 8³ tile is the smallest tree where the lowest
/// level can be expressed purely through leaf codes in the mask.
pub const MIN_TILE_RESOLUTION: u32 = 8;

/// Largest tile resolution (maximum 2D texture size of the depth renderer).
pub const MAX_TILE_RESOLUTION: u32 = 16384;

/// Deepest tree supported (`log2(MAX_TILE_RESOLUTION)`).
pub const MAX_TREE_HEIGHT: u32 = MAX_TILE_RESOLUTION.trailing_zeros();

/// Stride between root addresses in the consumer metadata block.
///
/// Each root occupies one `uvec4` slot; three of the four words are padding.
pub const ROOT_ADDRESS_STRIDE: usize = 4;

/// Default number of tiles per axis.
pub const DEFAULT_TILE_SUBDIVISIONS: u32 = 4;

/// Default number of tile builds allowed in flight at once.
pub const DEFAULT_CONCURRENT_BUILDS: usize = 2;

/// Address of a 2-bit child code inside the mask.
#[inline]
pub const fn child_shift(octant: usize) -> u32 {
  octant as u32 * BITS_PER_CHILD
}

#[cfg(test)]
#[path = "constants_test.rs"]
mod constants_test;
