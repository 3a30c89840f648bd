//! Append-only node arena.
//!
//! `VoxelWriter` is used twice in the system: each tile builder owns a private
//! writer for its subtree, and the pipeline owns the shared writer that every
//! finished subtree is merged into.
//!
//! ```text
//!   builder arena (private)            shared arena
//!   ┌──────┬──────┬──────┐             ┌───────┬──────────────┬──────┬──────┬──────┐
//!   │ n0   │ n1   │ root │   write_    │ dummy │ earlier      │ n0'  │ n1'  │root' │
//!   │      │      │ →0,→9│   tree()    │       │ tiles        │      │      │→b,→b+9
//!   └──────┴──────┴──────┘  ───────►   └───────┴──────────────┴──────┴──────┴──────┘
//!   0      9      18                   0                      b      b+9    b+18
//! ```
//!
//! Every inner-child pointer of a merged subtree is rewritten by adding `b`,
//! the arena length at the moment of the merge. Bytes already in the arena are
//! never touched.

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::constants::{CHILD_COUNT, MAX_TREE_HEIGHT, NODE_WORDS};
use crate::node::{ChildCode, VoxelInnerNode, VoxelPointer};

/// Single-writer, append-only buffer of encoded inner nodes.
#[derive(Clone, Debug, Default)]
pub struct VoxelWriter {
  words: Vec<u32>,
  /// Nodes written through [`VoxelWriter::write_node`], by tree level.
  nodes_per_level: [u32; MAX_TREE_HEIGHT as usize],
  /// Subtrees merged through [`VoxelWriter::write_tree`].
  merged_trees: u32,
}

impl VoxelWriter {
  /// Create an empty arena.
  pub fn new() -> Self {
    Self::default()
  }

  /// Create an empty arena with room for `nodes` nodes.
  pub fn with_node_capacity(nodes: usize) -> Self {
    Self {
      words: Vec::with_capacity(nodes * NODE_WORDS),
      ..Self::default()
    }
  }

  /// Address the next appended node will receive.
  #[inline]
  pub fn next_pointer(&self) -> VoxelPointer {
    VoxelPointer(self.len_words_u32())
  }

  /// Append one node and return its address.
  ///
  /// `level` is the node's depth below its tile root and `sibling_index` its
  /// octant within the parent; both are bookkeeping only and do not change
  /// the encoding.
  pub fn write_node(&mut self, node: VoxelInnerNode, level: u32, sibling_index: usize) -> VoxelPointer {
    assert!(level < MAX_TREE_HEIGHT, "node level {} exceeds max tree height {}", level, MAX_TREE_HEIGHT);
    assert!(sibling_index < CHILD_COUNT, "sibling index {} out of range", sibling_index);

    let ptr = self.next_pointer();
    let start = self.words.len();
    self.words.resize(start + NODE_WORDS, 0);
    node.encode(&mut self.words[start..]);
    self.nodes_per_level[level as usize] += 1;

    trace!(ptr = ptr.raw(), level, sibling_index, mask = node.child_mask, "write_node");
    ptr
  }

  /// Append a subtree built in another arena and return its relocated root.
  ///
  /// `subtree` must consist of whole encoded nodes (as produced by another
  /// `VoxelWriter`), and `root` must address one of them. Every inner-child
  /// pointer of every node in `subtree` is translated by the current arena
  /// length, so the copied nodes stay consistent whatever their sharing.
  ///
  /// `tile_resolution` bounds the depth of the subtree: no path below `root`
  /// may exceed `log2(tile_resolution)` levels (checked in debug builds).
  ///
  /// # Panics
  /// Panics if `subtree` is not a whole number of nodes, if `root` lies
  /// outside it, or if a child pointer addresses a word outside `subtree`.
  #[tracing::instrument(skip_all, name = "writer::write_tree", fields(words = subtree.len()))]
  pub fn write_tree(&mut self, subtree: &[u32], root: VoxelPointer, tile_resolution: u32) -> VoxelPointer {
    assert!(
      subtree.len() % NODE_WORDS == 0,
      "subtree of {} words is not a whole number of {}-word nodes",
      subtree.len(),
      NODE_WORDS
    );
    assert!(
      root.index() % NODE_WORDS == 0 && root.index() < subtree.len(),
      "subtree root {} outside subtree of {} words",
      root.raw(),
      subtree.len()
    );
    debug_assert!(
      subtree_height(subtree, root) <= tile_resolution.trailing_zeros(),
      "subtree deeper than a {}-resolution tile",
      tile_resolution
    );

    let base = self.len_words_u32();
    let start = self.words.len();
    self.words.extend_from_slice(subtree);

    for record in self.words[start..].chunks_exact_mut(NODE_WORDS) {
      let mask = record[0] as u16;
      for octant in 0..CHILD_COUNT {
        if ChildCode::from_bits(mask >> crate::constants::child_shift(octant)) == ChildCode::Node {
          let local = record[1 + octant] as usize;
          assert!(
            local % NODE_WORDS == 0 && local < subtree.len(),
            "child pointer {} outside subtree of {} words",
            local,
            subtree.len()
          );
          record[1 + octant] = VoxelPointer(local as u32).offset(base).raw();
        }
      }
    }
    self.merged_trees += 1;

    let relocated = root.offset(base);
    debug!(
      base,
      nodes = subtree.len() / NODE_WORDS,
      root = relocated.raw(),
      "merged subtree into arena"
    );
    relocated
  }

  /// Decode the node at `ptr`.
  ///
  /// # Panics
  /// Panics if `ptr` does not address a whole node in this arena.
  pub fn read_node(&self, ptr: VoxelPointer) -> VoxelInnerNode {
    let start = ptr.index();
    assert!(
      start + NODE_WORDS <= self.words.len(),
      "voxel pointer {} outside arena of {} words",
      start,
      self.words.len()
    );
    VoxelInnerNode::decode(&self.words[start..start + NODE_WORDS])
  }

  /// Raw encoded words.
  #[inline]
  pub fn data(&self) -> &[u32] {
    &self.words
  }

  /// Size of [`VoxelWriter::data`] in bytes.
  #[inline]
  pub fn data_size_bytes(&self) -> usize {
    std::mem::size_of_val(self.words.as_slice())
  }

  /// Length in words.
  #[inline]
  pub fn len_words(&self) -> usize {
    self.words.len()
  }

  /// Number of encoded nodes.
  #[inline]
  pub fn node_count(&self) -> usize {
    self.words.len() / NODE_WORDS
  }

  /// True if nothing has been written.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.words.is_empty()
  }

  /// Nodes written individually at each level.
  pub fn nodes_per_level(&self) -> &[u32] {
    &self.nodes_per_level
  }

  /// Number of merged subtrees.
  pub fn merged_trees(&self) -> u32 {
    self.merged_trees
  }

  /// Give up the arena, returning its words.
  pub fn into_words(self) -> Vec<u32> {
    self.words
  }

  fn len_words_u32(&self) -> u32 {
    match u32::try_from(self.words.len()) {
      Ok(len) => len,
      Err(_) => panic!("voxel arena exceeds the 32-bit address space"),
    }
  }
}

/// Longest path (in node levels) below `root` inside `words`.
///
/// A lone root counts as height 1.
pub fn subtree_height(words: &[u32], root: VoxelPointer) -> u32 {
  let mut stack: SmallVec<[(VoxelPointer, u32); 64]> = SmallVec::new();
  stack.push((root, 1));
  let mut height = 0;

  while let Some((ptr, depth)) = stack.pop() {
    height = height.max(depth);
    // A cycle or runaway chain cannot be a valid tree
    if depth > MAX_TREE_HEIGHT {
      break;
    }
    let start = ptr.index();
    if start + NODE_WORDS > words.len() {
      continue;
    }
    let node = VoxelInnerNode::decode(&words[start..start + NODE_WORDS]);
    for octant in 0..CHILD_COUNT {
      if let Some(child) = node.child_pointer(octant) {
        stack.push((child, depth + 1));
      }
    }
  }

  height
}

#[cfg(test)]
#[path = "writer_test.rs"]
mod writer_test;
