//! Inner node value type and arena addresses.
//!
//! See [`crate::constants`] for the encoded word layout.

use crate::constants::{child_shift, CHILD_COUNT, NODE_WORDS, UNSHADOWED_MASK};

/// Address of a node inside an arena, in 32-bit words.
///
/// Only meaningful relative to the arena that produced it. Moving a subtree
/// between arenas requires relocation (see [`VoxelPointer::offset`]).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct VoxelPointer(pub u32);

impl VoxelPointer {
  /// The first address of every arena.
  pub const NULL: Self = Self(0);

  /// Raw word offset.
  #[inline]
  pub fn raw(self) -> u32 {
    self.0
  }

  /// Word offset as an index into a word slice.
  #[inline]
  pub fn index(self) -> usize {
    self.0 as usize
  }

  /// Pointer translated by `base` words.
  ///
  /// # Panics
  /// Panics if the result does not fit the 32-bit address space.
  #[inline]
  pub fn offset(self, base: u32) -> Self {
    match self.0.checked_add(base) {
      Some(addr) => Self(addr),
      None => panic!("voxel pointer {} + {} overflows the arena address space", self.0, base),
    }
  }
}

/// 2-bit classification of one child slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ChildCode {
  /// Leaf fully inside the shadow volume.
  Shadowed = 0b00,
  /// Leaf fully lit.
  Unshadowed = 0b01,
  /// Child is an inner node; its pointer slot is valid.
  Node = 0b10,
}

impl ChildCode {
  /// Decode a 2-bit code.
  ///
  /// # Panics
  /// Panics on the reserved code `0b11`.
  #[inline]
  pub fn from_bits(bits: u16) -> Self {
    match bits & 0b11 {
      0b00 => ChildCode::Shadowed,
      0b01 => ChildCode::Unshadowed,
      0b10 => ChildCode::Node,
      _ => panic!("reserved child code 0b11 in voxel node mask"),
    }
  }

  /// True for both leaf codes.
  #[inline]
  pub fn is_leaf(self) -> bool {
    !matches!(self, ChildCode::Node)
  }
}

/// Fixed-size inner node: child mask plus one pointer slot per child.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct VoxelInnerNode {
  /// 2 bits per child, child `i` at bits `2i..2i+1`.
  pub child_mask: u16,
  /// Child addresses. Only slots whose code is [`ChildCode::Node`] are read.
  pub children: [VoxelPointer; CHILD_COUNT],
}

impl Default for VoxelInnerNode {
  fn default() -> Self {
    Self::uniform(ChildCode::Shadowed)
  }
}

impl VoxelInnerNode {
  /// Node whose eight children are all unshadowed leaves.
  ///
  /// Used as the placeholder root of every tile before its build merges.
  pub const UNSHADOWED: Self = Self {
    child_mask: UNSHADOWED_MASK,
    children: [VoxelPointer::NULL; CHILD_COUNT],
  };

  /// Node with every child set to the same leaf code.
  ///
  /// # Panics
  /// Panics if `code` is [`ChildCode::Node`] (no pointers to give).
  pub fn uniform(code: ChildCode) -> Self {
    assert!(code.is_leaf(), "uniform node needs a leaf code");
    let mut node = Self {
      child_mask: 0,
      children: [VoxelPointer::NULL; CHILD_COUNT],
    };
    for octant in 0..CHILD_COUNT {
      node.set_leaf(octant, code);
    }
    node
  }

  /// Code of child `octant`.
  #[inline]
  pub fn child(&self, octant: usize) -> ChildCode {
    ChildCode::from_bits(self.child_mask >> child_shift(octant))
  }

  /// Pointer of child `octant` if it is an inner node.
  #[inline]
  pub fn child_pointer(&self, octant: usize) -> Option<VoxelPointer> {
    match self.child(octant) {
      ChildCode::Node => Some(self.children[octant]),
      _ => None,
    }
  }

  /// Mark child `octant` as a leaf.
  pub fn set_leaf(&mut self, octant: usize, code: ChildCode) {
    debug_assert!(code.is_leaf());
    self.set_code(octant, code);
    self.children[octant] = VoxelPointer::NULL;
  }

  /// Mark child `octant` as an inner node stored at `ptr`.
  pub fn set_node(&mut self, octant: usize, ptr: VoxelPointer) {
    self.set_code(octant, ChildCode::Node);
    self.children[octant] = ptr;
  }

  fn set_code(&mut self, octant: usize, code: ChildCode) {
    let shift = child_shift(octant);
    self.child_mask = (self.child_mask & !(0b11 << shift)) | ((code as u16) << shift);
  }

  /// True when every child is an unshadowed leaf.
  pub fn is_fully_unshadowed(&self) -> bool {
    self.child_mask == UNSHADOWED_MASK
  }

  /// Write the node into `out` (exactly [`NODE_WORDS`] words).
  pub fn encode(&self, out: &mut [u32]) {
    assert_eq!(out.len(), NODE_WORDS, "node encode target must be {} words", NODE_WORDS);
    out[0] = self.child_mask as u32;
    for (slot, ptr) in out[1..].iter_mut().zip(self.children.iter()) {
      *slot = ptr.raw();
    }
  }

  /// Read a node from `words` (exactly [`NODE_WORDS`] words).
  pub fn decode(words: &[u32]) -> Self {
    assert_eq!(words.len(), NODE_WORDS, "node decode source must be {} words", NODE_WORDS);
    let mut children = [VoxelPointer::NULL; CHILD_COUNT];
    for (ptr, word) in children.iter_mut().zip(words[1..].iter()) {
      *ptr = VoxelPointer(*word);
    }
    Self {
      child_mask: words[0] as u16,
      children,
    }
  }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
