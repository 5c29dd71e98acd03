use glam::{DMat4, DVec2, DVec3};

use super::config::CameraConfig;
use super::picking::Ray;

const MAX_ELEVATION: f64 = 1.5;
const ZOOM_STEP: f64 = 1.1;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
	pub width: f64,
	pub height: f64,
}

impl Viewport {
	pub fn new(width: f64, height: f64) -> Self {
		Self { width, height }
	}

	pub fn aspect(&self) -> f64 {
		if self.width <= 0.0 || self.height <= 0.0 {
			1.0
		} else {
			self.width / self.height
		}
	}

	/// Surface pixel coordinates to normalized device coordinates.
	pub fn to_ndc(&self, x: f64, y: f64) -> DVec2 {
		DVec2::new(
			(x / self.width.max(1.0)) * 2.0 - 1.0,
			-(y / self.height.max(1.0)) * 2.0 + 1.0,
		)
	}
}

impl Default for Viewport {
	fn default() -> Self {
		Self::new(800.0, 600.0)
	}
}

/// A world point mapped onto the surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projected {
	pub x: f64,
	pub y: f64,
	/// Distance in front of the camera.
	pub depth: f64,
	/// Screen pixels covered by one world unit at this depth.
	pub pixels_per_unit: f64,
}

#[derive(Clone, Debug)]
pub struct Camera {
	config: CameraConfig,
	pub position: DVec3,
	pub target: DVec3,
	aspect: f64,
	auto_orbit: bool,
	idle_frames: u64,
}

impl Camera {
	pub fn new(config: &CameraConfig, viewport: Viewport) -> Self {
		let mut camera = Self {
			config: config.clone(),
			position: DVec3::from_array(config.position),
			target: DVec3::ZERO,
			aspect: viewport.aspect(),
			auto_orbit: config.auto_orbit,
			idle_frames: 0,
		};
		camera.clamp_distance();
		camera
	}

	pub fn set_viewport(&mut self, viewport: Viewport) {
		self.aspect = viewport.aspect();
	}

	pub fn aspect(&self) -> f64 {
		self.aspect
	}

	pub fn is_auto_orbiting(&self) -> bool {
		self.auto_orbit
	}

	pub fn distance(&self) -> f64 {
		self.position.distance(self.target)
	}

	pub fn view(&self) -> DMat4 {
		DMat4::look_at_rh(self.position, self.target, DVec3::Y)
	}

	pub fn projection(&self) -> DMat4 {
		DMat4::perspective_rh_gl(
			self.config.fov_degrees.to_radians(),
			self.aspect,
			self.config.near,
			self.config.far,
		)
	}

	pub fn project(&self, point: DVec3, viewport: Viewport) -> Option<Projected> {
		let eye = self.view().transform_point3(point);
		let depth = -eye.z;
		if depth <= self.config.near || depth >= self.config.far {
			return None;
		}
		let ndc = self.projection().project_point3(eye);
		let focal = (viewport.height / 2.0) / (self.config.fov_degrees.to_radians() / 2.0).tan();
		Some(Projected {
			x: (ndc.x + 1.0) * 0.5 * viewport.width,
			y: (1.0 - ndc.y) * 0.5 * viewport.height,
			depth,
			pixels_per_unit: focal / depth,
		})
	}

	/// World-space ray under a surface pixel.
	pub fn ray_through(&self, x: f64, y: f64, viewport: Viewport) -> Ray {
		let ndc = viewport.to_ndc(x, y);
		let inverse = (self.projection() * self.view()).inverse();
		let near = inverse.project_point3(DVec3::new(ndc.x, ndc.y, -1.0));
		let far = inverse.project_point3(DVec3::new(ndc.x, ndc.y, 1.0));
		Ray::new(near, far - near)
	}

	/// Drag-to-orbit around the target, `dx`/`dy` in pixels.
	pub fn orbit(&mut self, dx: f64, dy: f64) {
		self.touch();
		let offset = self.position - self.target;
		let radius = offset.length();
		if radius <= f64::EPSILON {
			return;
		}
		let azimuth = offset.z.atan2(offset.x) + dx * self.config.rotate_speed;
		let pitch = (offset.y / radius).clamp(-1.0, 1.0).asin();
		let elevation =
			(pitch + dy * self.config.rotate_speed).clamp(-MAX_ELEVATION, MAX_ELEVATION);
		self.position = self.target
			+ DVec3::new(
				radius * elevation.cos() * azimuth.cos(),
				radius * elevation.sin(),
				radius * elevation.cos() * azimuth.sin(),
			);
	}

	/// Wheel zoom; positive deltas move away.
	pub fn zoom(&mut self, delta: f64) {
		self.touch();
		let factor = if delta > 0.0 { ZOOM_STEP } else { 1.0 / ZOOM_STEP };
		self.position = self.target + (self.position - self.target) * factor;
		self.clamp_distance();
	}

	/// Per-frame controls update: idle auto-orbit around the vertical axis.
	pub fn update(&mut self) {
		if !self.config.auto_orbit {
			return;
		}
		if !self.auto_orbit {
			self.idle_frames += 1;
			if self.idle_frames >= self.config.auto_orbit_resume_frames {
				self.auto_orbit = true;
			}
			return;
		}
		let offset = self.position - self.target;
		let radius = offset.x.hypot(offset.z);
		let angle = offset.z.atan2(offset.x) + self.config.auto_orbit_speed;
		let offset = DVec3::new(angle.cos() * radius, offset.y, angle.sin() * radius);
		self.position = self.target + offset;
	}

	fn touch(&mut self) {
		self.auto_orbit = false;
		self.idle_frames = 0;
	}

	fn clamp_distance(&mut self) {
		let offset = self.position - self.target;
		let distance = offset.length();
		if distance <= f64::EPSILON {
			return;
		}
		let clamped = distance.clamp(self.config.min_distance, self.config.max_distance);
		self.position = self.target + offset * (clamped / distance);
	}
}
