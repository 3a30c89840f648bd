//! Scene access and light-space domain bounds.
//!
//! The voxel tree covers the light-space footprint of every visible mesh. The
//! footprint is measured with the light's rotation only: translating the light
//! does not move the shadow volume.

use glam::{Mat4, Vec3, Vec4};

use crate::bounds::Aabb3;

/// One placed mesh.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshInstance {
  /// Model to world transform.
  pub local_to_world: Mat4,
  /// Model-space vertex positions.
  pub vertices: Vec<Vec3>,
}

impl MeshInstance {
  pub fn new(local_to_world: Mat4, vertices: Vec<Vec3>) -> Self {
    Self {
      local_to_world,
      vertices,
    }
  }
}

/// Scene geometry consumed by the voxel tree.
///
/// Read on the driver thread only.
pub trait Scene {
  /// Mesh instances currently visible.
  fn mesh_instances(&self) -> &[MeshInstance];

  /// World to local transform of the primary (directional) light.
  fn light_world_to_local(&self) -> Mat4;
}

/// Light transform with its translation removed.
pub fn world_to_light_rotation<S: Scene + ?Sized>(scene: &S) -> Mat4 {
  let mut world_to_light = scene.light_world_to_local();
  world_to_light.w_axis = Vec4::W;
  world_to_light
}

/// Light-space bounds covering every vertex of every visible instance.
///
/// Starts from a box containing only the origin, matching how the depth
/// renderer frames its light-space view.
#[tracing::instrument(skip_all, name = "scene::bounds_light_space")]
pub fn scene_bounds_light_space<S: Scene + ?Sized>(scene: &S) -> Aabb3 {
  let world_to_light = world_to_light_rotation(scene);
  let mut bounds = Aabb3::from_point(Vec3::ZERO);

  for instance in scene.mesh_instances() {
    let model_to_light = world_to_light * instance.local_to_world;
    for vertex in &instance.vertices {
      bounds.expand_to_cover(model_to_light.transform_point3(*vertex));
    }
  }

  bounds
}

/// Transform from world space into `[0,1]³` across `domain`.
///
/// Degenerate axes (zero extent) map to 0 instead of dividing by zero.
pub fn world_to_unit_domain(domain: &Aabb3, world_to_light: Mat4) -> Mat4 {
  let size = domain.size();
  let inv = Vec3::new(safe_recip(size.x), safe_recip(size.y), safe_recip(size.z));
  Mat4::from_scale(inv) * Mat4::from_translation(-domain.min) * world_to_light
}

#[inline]
fn safe_recip(v: f32) -> f32 {
  if v > f32::EPSILON {
    1.0 / v
  } else {
    0.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use glam::Quat;

  struct TestScene {
    instances: Vec<MeshInstance>,
    light: Mat4,
  }

  impl Scene for TestScene {
    fn mesh_instances(&self) -> &[MeshInstance] {
      &self.instances
    }

    fn light_world_to_local(&self) -> Mat4 {
      self.light
    }
  }

  fn unit_cube() -> Vec<Vec3> {
    (0..8)
      .map(|i| Vec3::new((i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32))
      .collect()
  }

  #[test]
  fn test_empty_scene_is_origin() {
    let scene = TestScene {
      instances: vec![],
      light: Mat4::IDENTITY,
    };
    assert_eq!(scene_bounds_light_space(&scene), Aabb3::from_point(Vec3::ZERO));
  }

  /// The origin is always covered even when all geometry is far away.
  #[test]
  fn test_bounds_include_origin() {
    let scene = TestScene {
      instances: vec![MeshInstance::new(
        Mat4::from_translation(Vec3::new(10.0, 20.0, 30.0)),
        unit_cube(),
      )],
      light: Mat4::IDENTITY,
    };
    let bounds = scene_bounds_light_space(&scene);
    assert_eq!(bounds.min, Vec3::ZERO);
    assert_eq!(bounds.max, Vec3::new(11.0, 21.0, 31.0));
  }

  /// Light translation is ignored, rotation is applied.
  #[test]
  fn test_light_translation_ignored() {
    let rotation = Mat4::from_quat(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
    let scene = TestScene {
      instances: vec![MeshInstance::new(
        Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)),
        unit_cube(),
      )],
      light: Mat4::from_translation(Vec3::new(100.0, -50.0, 7.0)) * rotation,
    };
    let bounds = scene_bounds_light_space(&scene);

    // x in [2,3] rotates onto y in [2,3]; y in [0,1] onto x in [-1,0]
    assert!((bounds.min - Vec3::new(-1.0, 0.0, 0.0)).abs().max_element() < 1e-5);
    assert!((bounds.max - Vec3::new(0.0, 3.0, 1.0)).abs().max_element() < 1e-5);
  }

  #[test]
  fn test_bounds_cover_every_vertex() {
    let scene = TestScene {
      instances: vec![
        MeshInstance::new(Mat4::from_scale(Vec3::splat(3.0)), unit_cube()),
        MeshInstance::new(Mat4::from_translation(Vec3::splat(-5.0)), unit_cube()),
      ],
      light: Mat4::from_quat(Quat::from_rotation_x(0.4)),
    };
    let bounds = scene_bounds_light_space(&scene);
    let rot = world_to_light_rotation(&scene);
    for instance in scene.mesh_instances() {
      for v in &instance.vertices {
        let p = (rot * instance.local_to_world).transform_point3(*v);
        let padded = Aabb3::new(bounds.min - 1e-4, bounds.max + 1e-4);
        assert!(padded.contains_point(p), "{:?} outside {:?}", p, bounds);
      }
    }
  }

  #[test]
  fn test_unit_domain_maps_corners() {
    let domain = Aabb3::new(Vec3::new(-2.0, 1.0, 0.0), Vec3::new(2.0, 5.0, 10.0));
    let m = world_to_unit_domain(&domain, Mat4::IDENTITY);
    assert!((m.transform_point3(domain.min)).abs().max_element() < 1e-6);
    assert!((m.transform_point3(domain.max) - Vec3::ONE).abs().max_element() < 1e-6);
  }

  #[test]
  fn test_unit_domain_degenerate_axis() {
    let domain = Aabb3::from_point(Vec3::ZERO);
    let m = world_to_unit_domain(&domain, Mat4::IDENTITY);
    assert_eq!(m.transform_point3(Vec3::splat(4.0)), Vec3::ZERO);
  }
}
