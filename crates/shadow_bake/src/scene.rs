//! Box scene and a CPU depth sampler for it.
//!
//! Each box is projected into light space as its light-space bounding box,
//! which is exact for boxes aligned with the light and conservative
//! otherwise.

use glam::{Mat4, Quat, Vec3};
use voxel_shadow::{Aabb3, DepthMaps, DepthSampler, MeshInstance, Scene};

use crate::config::Config;

/// Occluder boxes lit by one directional light.
pub struct BoxScene {
	instances: Vec<MeshInstance>,
	world_to_light: Mat4,
}

impl BoxScene {
	/// `direction` is where the light travels; it becomes light-space +Z.
	pub fn new(boxes: &[Aabb3], direction: Vec3) -> Self {
		let instances = boxes
			.iter()
			.map(|b| MeshInstance::new(Mat4::IDENTITY, corners(b).to_vec()))
			.collect();
		let world_to_light = Mat4::from_quat(Quat::from_rotation_arc(direction.normalize(), Vec3::Z));
		Self {
			instances,
			world_to_light,
		}
	}

	pub fn from_config(config: &Config) -> Self {
		Self::new(&world_boxes(config), Vec3::from_array(config.light.direction))
	}
}

impl Scene for BoxScene {
	fn mesh_instances(&self) -> &[MeshInstance] {
		&self.instances
	}

	fn light_world_to_local(&self) -> Mat4 {
		self.world_to_light
	}
}

pub fn world_boxes(config: &Config) -> Vec<Aabb3> {
	config
		.boxes
		.iter()
		.map(|b| Aabb3::new(Vec3::from_array(b.min), Vec3::from_array(b.max)))
		.collect()
}

fn corners(b: &Aabb3) -> [Vec3; 8] {
	let mut out = [Vec3::ZERO; 8];
	for (i, corner) in out.iter_mut().enumerate() {
		*corner = Vec3::new(
			if i & 1 == 0 { b.min.x } else { b.max.x },
			if i & 2 == 0 { b.min.y } else { b.max.y },
			if i & 4 == 0 { b.min.z } else { b.max.z },
		);
	}
	out
}

/// Rasterizes world boxes into entry/exit depth grids on the CPU.
pub struct BoxSceneSampler {
	boxes: Vec<Aabb3>,
	/// Tiles rendered so far.
	pub renders: usize,
}

impl BoxSceneSampler {
	pub fn new(boxes: Vec<Aabb3>) -> Self {
		Self { boxes, renders: 0 }
	}
}

impl DepthSampler for BoxSceneSampler {
	fn render_depths(&mut self, bounds: &Aabb3, world_to_light: Mat4, resolution: u32) -> DepthMaps {
		self.renders += 1;

		let light_boxes: Vec<Aabb3> = self
			.boxes
			.iter()
			.map(|b| {
				let points = corners(b).map(|p| world_to_light.transform_point3(p));
				let mut light = Aabb3::from_point(points[0]);
				for p in &points[1..] {
					light.expand_to_cover(*p);
				}
				light
			})
			.collect();

		let size = bounds.size();
		let depth_of = |z: f32| {
			if size.z > f32::EPSILON {
				((z - bounds.min.z) / size.z).clamp(0.0, 1.0)
			} else {
				0.0
			}
		};

		let len = (resolution * resolution) as usize;
		let mut entry = vec![1.0f32; len];
		let mut exit = vec![1.0f32; len];
		for y in 0..resolution {
			let py = bounds.min.y + (y as f32 + 0.5) / resolution as f32 * size.y;
			for x in 0..resolution {
				let px = bounds.min.x + (x as f32 + 0.5) / resolution as f32 * size.x;
				let texel = (y * resolution + x) as usize;
				let mut hit = false;
				for b in &light_boxes {
					if px < b.min.x || px > b.max.x || py < b.min.y || py > b.max.y {
						continue;
					}
					let near = depth_of(b.min.z);
					let far = depth_of(b.max.z);
					if !hit || near < entry[texel] {
						entry[texel] = near;
					}
					if !hit || far > exit[texel] {
						exit[texel] = far;
					}
					hit = true;
				}
			}
		}

		DepthMaps::new(resolution, entry, exit)
	}
}
