//! Axis-aligned bounding box in light space.

use glam::Vec3;

/// Single-precision axis-aligned bounding box.
///
/// Used for the light-space domain covered by the voxel tree and for the
/// sub-rectangles handed to the depth sampler for each tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb3 {
	/// Minimum corner (inclusive).
	pub min: Vec3,
	/// Maximum corner (inclusive).
	pub max: Vec3,
}

impl Aabb3 {
	/// Create a new AABB from min and max corners.
	///
	/// # Panics
	/// Debug-asserts that min <= max on all axes.
	pub fn new(min: Vec3, max: Vec3) -> Self {
		debug_assert!(
			min.x <= max.x && min.y <= max.y && min.z <= max.z,
			"AABB min must be <= max on all axes"
		);
		Self { min, max }
	}

	/// Degenerate box containing a single point.
	pub fn from_point(point: Vec3) -> Self {
		Self {
			min: point,
			max: point,
		}
	}

	/// Grow the box so it contains `point`.
	#[inline]
	pub fn expand_to_cover(&mut self, point: Vec3) {
		self.min = self.min.min(point);
		self.max = self.max.max(point);
	}

	/// Check if this AABB contains a point.
	#[inline]
	pub fn contains_point(&self, point: Vec3) -> bool {
		point.cmpge(self.min).all() && point.cmple(self.max).all()
	}

	/// Area of the overlap of the two boxes' XY footprints (0 when they only
	/// touch along an edge or not at all).
	#[inline]
	pub fn overlap_area_xy(&self, other: &Aabb3) -> f32 {
		let w = (self.max.x.min(other.max.x) - self.min.x.max(other.min.x)).max(0.0);
		let h = (self.max.y.min(other.max.y) - self.min.y.max(other.min.y)).max(0.0);
		w * h
	}

	/// Area of the XY footprint.
	#[inline]
	pub fn area_xy(&self) -> f32 {
		let size = self.size();
		size.x * size.y
	}

	/// Get the size of the AABB (max - min).
	#[inline]
	pub fn size(&self) -> Vec3 {
		self.max - self.min
	}

	/// Get the center of the AABB.
	#[inline]
	pub fn center(&self) -> Vec3 {
		(self.min + self.max) * 0.5
	}
}
