use glam::DVec3;

use super::scene::NodePrimitive;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
	pub origin: DVec3,
	/// Unit length.
	pub direction: DVec3,
}

impl Ray {
	pub fn new(origin: DVec3, direction: DVec3) -> Self {
		Self {
			origin,
			direction: direction.normalize_or(DVec3::NEG_Z),
		}
	}

	pub fn at(&self, t: f64) -> DVec3 {
		self.origin + self.direction * t
	}

	/// Nearest non-negative distance at which the ray enters the sphere.
	pub fn hit_sphere(&self, center: DVec3, radius: f64) -> Option<f64> {
		let to_center = self.origin - center;
		let b = to_center.dot(self.direction);
		let c = to_center.length_squared() - radius * radius;
		let discriminant = b * b - c;
		if discriminant < 0.0 {
			return None;
		}
		let root = discriminant.sqrt();
		[-b - root, -b + root].into_iter().find(|t| *t >= 0.0)
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
	/// Index into the node primitive list.
	pub primitive: usize,
	pub distance: f64,
}

/// Closest node primitive under the ray, honouring the current emphasis scale.
pub fn intersect_spheres(ray: &Ray, primitives: &[NodePrimitive]) -> Option<Hit> {
	primitives
		.iter()
		.enumerate()
		.filter_map(|(index, primitive)| {
			ray.hit_sphere(primitive.position, primitive.pick_radius())
				.map(|distance| Hit {
					primitive: index,
					distance,
				})
		})
		.min_by(|a, b| a.distance.total_cmp(&b.distance))
}
