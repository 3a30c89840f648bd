use super::*;

#[test]
fn test_resolution_limits_are_powers_of_two() {
  assert!(MIN_TILE_RESOLUTION.is_power_of_two());
  assert!(MAX_TILE_RESOLUTION.is_power_of_two());
  assert_eq!(MAX_TREE_HEIGHT, 14);
}

#[test]
fn test_node_layout() {
  assert_eq!(NODE_WORDS, 9);
  assert_eq!(NODE_BYTES, 36);
}

#[test]
fn test_unshadowed_mask_marks_every_child() {
  for octant in 0..CHILD_COUNT {
    let code = (UNSHADOWED_MASK >> child_shift(octant)) & 0b11;
    assert_eq!(code, 0b01, "octant {} should be unshadowed", octant);
  }
  // 16 bits exactly cover 8 children
  assert_eq!(child_shift(CHILD_COUNT), 16);
}
