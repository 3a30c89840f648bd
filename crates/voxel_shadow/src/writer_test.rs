use super::*;

/// Builds a three-node subtree in a private arena:
///
/// ```text
///   root (local 18) ─┬─ octant 1 → leaf node A (local 0)
///                    └─ octant 6 → leaf node B (local 9)
/// ```
fn synthetic_subtree() -> (Vec<u32>, VoxelPointer) {
  let mut private = VoxelWriter::new();
  let a = private.write_node(VoxelInnerNode::uniform(ChildCode::Shadowed), 1, 1);
  let b = private.write_node(VoxelInnerNode::UNSHADOWED, 1, 6);

  let mut root = VoxelInnerNode::uniform(ChildCode::Unshadowed);
  root.set_node(1, a);
  root.set_node(6, b);
  let root_ptr = private.write_node(root, 0, 0);

  assert_eq!((a, b, root_ptr), (VoxelPointer(0), VoxelPointer(9), VoxelPointer(18)));
  (private.into_words(), root_ptr)
}

#[test]
fn test_write_node_returns_sequential_addresses() {
  let mut writer = VoxelWriter::new();
  assert!(writer.is_empty());

  let first = writer.write_node(VoxelInnerNode::UNSHADOWED, 0, 0);
  let second = writer.write_node(VoxelInnerNode::default(), 2, 3);

  assert_eq!(first, VoxelPointer(0));
  assert_eq!(second, VoxelPointer(NODE_WORDS as u32));
  assert_eq!(writer.node_count(), 2);
  assert_eq!(writer.data_size_bytes(), 2 * crate::constants::NODE_BYTES);
  assert_eq!(writer.nodes_per_level()[0], 1);
  assert_eq!(writer.nodes_per_level()[2], 1);
  assert_eq!(writer.read_node(first), VoxelInnerNode::UNSHADOWED);
}

#[test]
#[should_panic(expected = "sibling index")]
fn test_write_node_rejects_bad_sibling() {
  VoxelWriter::new().write_node(VoxelInnerNode::UNSHADOWED, 0, 8);
}

/// Relocated pointers equal the original plus the prior arena length.
#[test]
fn test_write_tree_relocates_pointers() {
  let (subtree, local_root) = synthetic_subtree();

  let mut arena = VoxelWriter::new();
  arena.write_node(VoxelInnerNode::UNSHADOWED, 0, 0);
  arena.write_node(VoxelInnerNode::default(), 0, 0);
  let prior = arena.len_words() as u32;

  let root = arena.write_tree(&subtree, local_root, 8);
  assert_eq!(root, VoxelPointer(18 + prior));

  let node = arena.read_node(root);
  assert_eq!(node.child_pointer(1), Some(VoxelPointer(prior)));
  assert_eq!(node.child_pointer(6), Some(VoxelPointer(9 + prior)));
  for octant in [0, 2, 3, 4, 5, 7] {
    assert_eq!(node.child(octant), ChildCode::Unshadowed);
    assert_eq!(node.children[octant], VoxelPointer::NULL, "leaf slots stay untouched");
  }

  // Children dereference to the copied nodes
  assert_eq!(arena.read_node(VoxelPointer(prior)), VoxelInnerNode::uniform(ChildCode::Shadowed));
  assert_eq!(arena.read_node(VoxelPointer(prior + 9)), VoxelInnerNode::UNSHADOWED);
  assert_eq!(arena.merged_trees(), 1);
}

/// Merging never rewrites what is already in the arena.
#[test]
fn test_write_tree_preserves_existing_bytes() {
  let (subtree, local_root) = synthetic_subtree();
  let mut arena = VoxelWriter::new();
  arena.write_node(VoxelInnerNode::UNSHADOWED, 0, 0);

  let first = arena.write_tree(&subtree, local_root, 8);
  let snapshot = arena.data().to_vec();
  let second = arena.write_tree(&subtree, local_root, 8);

  assert_ne!(first, second);
  assert_eq!(&arena.data()[..snapshot.len()], snapshot.as_slice());
  assert_eq!(second.raw() - first.raw(), subtree.len() as u32);

  // Second copy points into itself, not into the first copy
  let node = arena.read_node(second);
  assert_eq!(node.child_pointer(1), Some(VoxelPointer(snapshot.len() as u32)));
}

/// A subtree whose nodes share a child relocates the shared pointer once per
/// referencing slot, never twice for the same slot.
#[test]
fn test_write_tree_shared_children() {
  let mut private = VoxelWriter::new();
  let shared = private.write_node(VoxelInnerNode::uniform(ChildCode::Shadowed), 1, 0);
  let mut root = VoxelInnerNode::UNSHADOWED;
  root.set_node(0, shared);
  root.set_node(7, shared);
  let local_root = private.write_node(root, 0, 0);

  let mut arena = VoxelWriter::new();
  arena.write_node(VoxelInnerNode::UNSHADOWED, 0, 0);
  let merged = arena.write_tree(private.data(), local_root, 8);

  let node = arena.read_node(merged);
  assert_eq!(node.child_pointer(0), Some(VoxelPointer(9)));
  assert_eq!(node.child_pointer(7), Some(VoxelPointer(9)));
}

#[test]
#[should_panic(expected = "whole number")]
fn test_write_tree_rejects_partial_nodes() {
  let mut arena = VoxelWriter::new();
  arena.write_tree(&[0u32; 10], VoxelPointer(0), 8);
}

#[test]
#[should_panic(expected = "outside subtree")]
fn test_write_tree_rejects_root_out_of_range() {
  let (subtree, _) = synthetic_subtree();
  VoxelWriter::new().write_tree(&subtree, VoxelPointer(27), 8);
}

#[test]
#[should_panic(expected = "child pointer")]
fn test_write_tree_rejects_dangling_child() {
  let mut root = VoxelInnerNode::UNSHADOWED;
  root.set_node(2, VoxelPointer(90));
  let mut words = vec![0u32; NODE_WORDS];
  root.encode(&mut words);
  VoxelWriter::new().write_tree(&words, VoxelPointer(0), 8);
}

#[test]
fn test_subtree_height() {
  let (subtree, local_root) = synthetic_subtree();
  assert_eq!(subtree_height(&subtree, local_root), 2);
  assert_eq!(subtree_height(&subtree, VoxelPointer(0)), 1);
}
